//! Destination API (API2) access
//!
//! - [`traits`]: the `DestinationClient` trait used by the engine
//! - [`http`]: HTTP implementation with rate-limit retry

pub mod http;
pub mod traits;

pub use http::HttpDestinationClient;
pub use traits::DestinationClient;

#[cfg(test)]
pub use traits::MockDestinationClient;
