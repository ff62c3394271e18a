/// Identifier stamped on every record produced by the Eventbrite ingester.
pub const EVENTBRITE_SOURCE: &str = "Eventbrite";

pub const EVENTBRITE_BASE_URL: &str = "https://www.eventbrite.com.au";
pub const EVENTBRITE_LISTING_URL: &str = "https://www.eventbrite.com.au/d/australia--sydney/events/";

/// Path segment that marks an event detail page on Eventbrite.
pub const EVENT_DETAIL_PATH: &str = "/e/";

pub const DEFAULT_CATEGORY: &str = "Event";
pub const DEFAULT_PRICE: &str = "Free";
pub const FALLBACK_LINK_TITLE: &str = "Eventbrite Event";

// Read-side image resolution
pub const WHATSON_SOURCE: &str = "WhatsOnSydney";
pub const WHATSON_BASE_URL: &str = "https://whatson.cityofsydney.nsw.gov.au";
pub const GENERIC_IMAGE_BASE_URL: &str = "https://www.sydney.com";

pub const DEFAULT_INTERVAL_HOURS: u64 = 6;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATABASE_PATH: &str = "data/events.db";

pub const DEFAULT_PAGE_SIZE: u32 = 12;
