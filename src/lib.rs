pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod queries;
pub mod scheduler;
pub mod scrapers;
pub mod server;
pub mod storage;
pub mod types;
