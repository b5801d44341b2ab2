//! Mandi price tracker.
//!
//! Fetches commodity prices for Indian agricultural markets and derives
//! day-over-day movement between the two most recent observation dates.

pub mod board;
pub mod config;
pub mod data;
pub mod error;
pub mod monitoring;
pub mod prices;

pub use error::{FetchError, InsufficientDataError};
