#![allow(unreachable_pub)]

mod cache_key;
mod error;
mod request;
mod response;
mod transport_status;

pub use cache_key::CacheKey;
pub use error::ErrorKind;
pub use request::{AfterComplete, OnComplete, Request, RequestOptions};
pub use response::Response;
pub use transport_status::TransportStatus;

/// The volley `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
