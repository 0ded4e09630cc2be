//! Parcel records and the per-jurisdiction dataset container.

use geo::MultiPolygon;
use hashbrown::HashMap;

use crate::crs::Crs;

/// Source table field names, as shipped in the county assessor schema.
pub mod field {
    pub const OWNER: &str = "OWNNAME";
    pub const MAILING_ADDRESS: &str = "MAILADD";
    pub const SITE_ADDRESS: &str = "SITEADD";
    pub const CITY: &str = "SCITY";
    pub const ZIP: &str = "SZIP";
    pub const STRUCTURE_YEAR: &str = "STRUCTYEAR";
    pub const IMPROVEMENT_VALUE: &str = "IMPROVVAL";
    pub const LAND_VALUE: &str = "LANDVAL";
}

/// One attribute value from the parcel table.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Null,
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric coercion: numbers pass through, numeric strings parse
    /// after trimming. Anything else (including NaN) is None.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) if n.is_finite() => Some(*n),
            AttrValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

/// A single parcel: footprint geometry plus its source attribute row.
///
/// Attribute names are stored uppercased; lookups are case-insensitive
/// on the caller side for free.
#[derive(Debug, Clone)]
pub struct ParcelRecord {
    pub geometry: MultiPolygon<f64>,
    attrs: HashMap<String, AttrValue>,
}

impl ParcelRecord {
    pub fn new(
        geometry: MultiPolygon<f64>,
        attrs: impl IntoIterator<Item = (String, AttrValue)>,
    ) -> Self {
        Self {
            geometry,
            attrs: attrs
                .into_iter()
                .map(|(name, value)| (name.to_uppercase(), value))
                .collect(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(&name.to_uppercase())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(AttrValue::as_text)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(AttrValue::as_number)
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.text(field::OWNER)
    }

    pub fn mailing_address(&self) -> Option<&str> {
        self.text(field::MAILING_ADDRESS)
    }

    pub fn site_address(&self) -> Option<&str> {
        self.text(field::SITE_ADDRESS)
    }

    pub fn structure_year(&self) -> Option<f64> {
        self.number(field::STRUCTURE_YEAR)
    }
}

/// Ordered parcel collection for one jurisdiction, sharing one CRS.
///
/// Loaded fresh per request; read-only once built.
#[derive(Debug, Clone)]
pub struct ParcelDataset {
    pub jurisdiction: String,
    pub crs: Crs,
    pub records: Vec<ParcelRecord>,
}

impl ParcelDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_string_coerces() {
        assert_eq!(AttrValue::Text("1972".into()).as_number(), Some(1972.0));
        assert_eq!(AttrValue::Text(" 1972 ".into()).as_number(), Some(1972.0));
        assert_eq!(AttrValue::Number(1972.0).as_number(), Some(1972.0));
    }

    #[test]
    fn test_non_numeric_is_none() {
        assert_eq!(AttrValue::Text("unknown".into()).as_number(), None);
        assert_eq!(AttrValue::Null.as_number(), None);
        assert_eq!(AttrValue::Number(f64::NAN).as_number(), None);
    }

    #[test]
    fn test_attr_lookup_is_case_insensitive() {
        let record = ParcelRecord::new(
            MultiPolygon::new(vec![]),
            vec![("OwnName".to_string(), AttrValue::Text("Jane Doe".into()))],
        );
        assert_eq!(record.owner_name(), Some("Jane Doe"));
        assert_eq!(record.text("ownname"), Some("Jane Doe"));
    }
}
