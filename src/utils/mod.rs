//! Shared utilities

pub mod error;

pub use error::{NavError, Result};
