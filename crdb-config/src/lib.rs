//! Configuration management for the CockroachDB provider.
//!
//! Provides environment detection, layered loading from YAML files and
//! environment variables, secret handling and the shared configuration types
//! consumed by the provider library and binary.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
