//! CockroachDB objects managed by the provider.
//!
//! Every operation runs through [`crate::provider::Provider::run`] with the
//! resource's own local port, so each resource type can target a different
//! tunnel port.

mod backup;
mod data_source;
mod database;
mod user;

pub use backup::*;
pub use data_source::*;
pub use database::*;
pub use user::*;

use crate::bail;
use crate::error::{CrdbResult, ErrorKind};

fn require_non_empty(value: &str, description: &'static str) -> CrdbResult<()> {
    if value.is_empty() {
        bail!(ErrorKind::ValidationError, description);
    }

    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}
