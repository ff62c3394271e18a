pub mod document;
pub mod eventbrite;
pub mod traits;

pub use traits::{ListingCrawler, ListingParser, LocatorStrategy, ParsedListing, SourceInfo};
