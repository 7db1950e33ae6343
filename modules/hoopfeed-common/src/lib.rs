//! Shared vocabulary of the engagement engine: event taxonomy, referenced
//! entities, the error taxonomy, and configuration.

pub mod bounded;
pub mod config;
pub mod error;
pub mod models;
pub mod types;

pub use bounded::bounded;
pub use config::Config;
pub use error::{EngagementError, Result};
pub use models::*;
pub use types::*;
