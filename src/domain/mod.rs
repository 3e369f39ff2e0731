pub mod classifier;
pub mod filters;
pub mod listing;
pub mod normalize;

pub use listing::{ListingRow, NormalizedListing, SellerType};
