//! Eventbrite Sydney discovery page: fetch, locate candidates, extract fields.

pub mod crawler;
pub mod dates;
pub mod fields;
pub mod parser;
pub mod price;

pub use crawler::EventbriteCrawler;
pub use parser::EventbriteParser;
