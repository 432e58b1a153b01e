//! # Eglise Common Library
//!
//! Shared code for the church hierarchy crates:
//! - Qualification vocabulary and level resolution
//! - Database models, schema creation and migrations
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod qualification;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use qualification::{level_of, level_of_str, Qualification};
