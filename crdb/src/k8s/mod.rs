mod base;
mod http;

pub use base::*;
pub use http::*;
