//! Shared building blocks for the Graph client workspace
//!
//! `Secret` keeps application secrets and refresh tokens out of logs;
//! `Error` covers configuration loading for the binaries.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
