//! Source API (API1) access
//!
//! The engine reads customers through the [`SourceReader`] trait;
//! [`HttpSourceReader`] is the offset-paginated HTTP implementation.

pub mod http;
pub mod traits;

pub use http::HttpSourceReader;
pub use traits::SourceReader;

#[cfg(test)]
pub use traits::MockSourceReader;
