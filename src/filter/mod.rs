//! Attribute eligibility rules for boundary-matched parcels.
//!
//! Rules are independent objects applied in a fixed order, each a hard
//! exclusion. A record failing rule *k* is never evaluated against
//! rule *k+1*. Rules never error: attribute coercion failures resolve
//! to a fixed keep/exclude decision per rule.

use tracing::debug;

use crate::config::FilterConfig;
use crate::models::{ParcelDataset, ParcelRecord};

/// Owner-name substrings marking corporate or commercial ownership.
pub const CORPORATE_KEYWORDS: [&str; 9] = [
    "LLC",
    "INC",
    "CORP",
    "TRUST",
    "COMPANY",
    "PROPERTIES",
    "ENTERPRISE",
    "INVESTMENTS",
    "HOLDINGS",
];

/// A single hard-exclusion eligibility rule.
pub trait EligibilityRule {
    fn name(&self) -> &'static str;

    /// False excludes the record.
    fn keep(&self, record: &ParcelRecord) -> bool;
}

/// Excludes corporate/commercial owners by keyword, case-normalized.
/// A missing owner name passes: missing data must not silently drop
/// otherwise valid rows.
pub struct CorporateOwner;

impl EligibilityRule for CorporateOwner {
    fn name(&self) -> &'static str {
        "corporate-owner"
    }

    fn keep(&self, record: &ParcelRecord) -> bool {
        match record.owner_name() {
            Some(owner) => {
                let owner = owner.to_uppercase();
                !CORPORATE_KEYWORDS.iter().any(|kw| owner.contains(kw))
            }
            None => true,
        }
    }
}

/// Excludes mailing addresses starting with "0 ", the assessor's
/// placeholder for unknown or invalid addresses.
pub struct PlaceholderMailing;

impl EligibilityRule for PlaceholderMailing {
    fn name(&self) -> &'static str {
        "placeholder-mailing"
    }

    fn keep(&self, record: &ParcelRecord) -> bool {
        record
            .mailing_address()
            .is_none_or(|addr| !addr.starts_with("0 "))
    }
}

/// Excludes records whose structure year is absent or non-numeric.
pub struct ParseableBuildYear;

impl EligibilityRule for ParseableBuildYear {
    fn name(&self) -> &'static str {
        "parseable-build-year"
    }

    fn keep(&self, record: &ParcelRecord) -> bool {
        record.structure_year().is_some()
    }
}

/// Keeps structure years strictly below the cutoff and, when a floor
/// is configured, strictly above it.
pub struct BuildYearWindow {
    pub cutoff: i32,
    pub floor: Option<i32>,
}

impl EligibilityRule for BuildYearWindow {
    fn name(&self) -> &'static str {
        "build-year-window"
    }

    fn keep(&self, record: &ParcelRecord) -> bool {
        match record.structure_year() {
            Some(year) => {
                year < f64::from(self.cutoff)
                    && self.floor.is_none_or(|floor| year > f64::from(floor))
            }
            None => false,
        }
    }
}

/// The standard rule sequence, in contract order.
pub fn standard_rules(filter: &FilterConfig) -> Vec<Box<dyn EligibilityRule>> {
    vec![
        Box::new(CorporateOwner),
        Box::new(PlaceholderMailing),
        Box::new(ParseableBuildYear),
        Box::new(BuildYearWindow {
            cutoff: filter.cutoff_year,
            floor: filter.min_year,
        }),
    ]
}

/// Apply the rules to matched positions, preserving order.
pub fn apply_rules(
    dataset: &ParcelDataset,
    matched: &[usize],
    rules: &[Box<dyn EligibilityRule>],
) -> Vec<usize> {
    let mut dropped = vec![0usize; rules.len()];

    let eligible: Vec<usize> = matched
        .iter()
        .copied()
        .filter(|&position| {
            let record = &dataset.records[position];
            for (rule_idx, rule) in rules.iter().enumerate() {
                if !rule.keep(record) {
                    dropped[rule_idx] += 1;
                    return false;
                }
            }
            true
        })
        .collect();

    for (rule, count) in rules.iter().zip(&dropped) {
        debug!("Rule '{}' excluded {} parcels", rule.name(), count);
    }
    eligible
}
