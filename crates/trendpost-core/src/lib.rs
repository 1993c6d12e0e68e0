//! Network-free parts of the trending-post pipeline: the data handed between
//! stages, the seen-log dedup, post identifiers and classification
//! resolution.

pub mod classify;
pub mod csv;
pub mod dedup;
pub mod handoff;
pub mod item;
pub mod seen_log;
pub mod slug;

pub use self::item::{CandidateItem, PostRecord};

pub const LOG_TARGET: &str = "trendpost::core";
