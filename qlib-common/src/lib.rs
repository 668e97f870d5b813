//! # qlib Common Library
//!
//! Shared code for the qlib crates:
//! - Error type and `Result` alias
//! - Configuration loading
//! - Question text and response-scale normalization
//! - Year-range text codec

pub mod config;
pub mod error;
pub mod normalize;
pub mod years;

pub use error::{Error, Result};
