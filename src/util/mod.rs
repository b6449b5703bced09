//! Basic utilities: error types and shared helpers.

mod error;

pub use error::{Error, Result};
