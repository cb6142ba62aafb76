pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod parse;

pub use config::{CrawlConfig, RevisitPolicy};
pub use crawl::{close_when_released, link_parents, CrawlReport, Crawler, VisitLedger};
pub use error::CrawlError;
