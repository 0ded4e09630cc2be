pub mod output;
pub mod parcel;

pub use output::OutputRow;
pub use parcel::{AttrValue, ParcelDataset, ParcelRecord};
