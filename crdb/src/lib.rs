//! Manage CockroachDB databases, users and backup schedules, optionally
//! through a Kubernetes port-forward.
//!
//! When a [`crdb_config::shared::KubeConfig`] is set, every resource operation
//! opens its own tunnel from a local port to a pod behind the CockroachDB
//! service, runs against a fresh session, and tears the tunnel down before
//! returning. Without it the configured connection string is used directly.

pub mod client;
pub mod concurrency;
pub mod endpoint;
pub mod error;
pub mod guard;
pub mod k8s;
mod macros;
pub mod provider;
pub mod resources;
pub mod tunnel;
