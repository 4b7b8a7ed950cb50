mod base;
mod kube;
mod provider;

pub use base::*;
pub use kube::*;
pub use provider::*;
