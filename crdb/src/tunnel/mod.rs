//! Local TCP listener that forwards every accepted connection to a remote endpoint.

mod connector;
mod forward;
mod handle;

pub use connector::*;
pub use forward::*;
pub use handle::*;
