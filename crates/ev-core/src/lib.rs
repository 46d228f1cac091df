//! ev-core - Core library for Evolve
//!
//! This crate provides configuration parsing, the migration script naming
//! convention, and content checksums shared across all Evolve components.

pub mod checksum;
pub mod config;
pub mod error;
pub mod script_name;
pub(crate) mod serde_helpers;

pub use checksum::compute_checksum;
pub use config::{DatabaseConfig, EvolveConfig};
pub use error::{CoreError, CoreResult};
pub use script_name::ScriptName;
