//! starscrape: resumable cast and popularity-rank crawler.
//!
//! Reads a title table, loads each title page in a real browser to collect
//! the starring cast, visits every cast member's profile for their current
//! popularity rank, and checkpoints the results window by window so an
//! interrupted crawl picks up where it stopped.

pub mod browser;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod input;
pub mod models;

pub use error::{CrawlError, FetchError, Result};
