//! Data models for starscrape.

mod cast;
mod title;

pub use cast::{CastEntry, CastLink, Rating, Trend};
pub use title::{TitleRecord, TitleTarget};
