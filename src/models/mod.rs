//! Core data models for wordfold.
//!
//! - Records and labels as read from the source
//! - The four word-frequency accumulators
//! - Configuration and error types

mod config;
mod counts;
mod error;
mod record;

pub use config::*;
pub use counts::*;
pub use error::*;
pub use record::*;
