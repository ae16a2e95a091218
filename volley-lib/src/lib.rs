//! `volley` runs many HTTP requests concurrently.
//!
//! Requests are queued on a [`Dispatcher`], which executes them with a bounded
//! number of transport operations in flight and invokes callbacks as
//! responses arrive:
//!
//! ```no_run
//! use volley_lib::{Dispatcher, Request, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let dispatcher = Dispatcher::new()?;
//!     for url in ["https://example.com", "https://example.org"] {
//!         let request = Request::new(url)?;
//!         request.on_complete(|response| println!("{response}"));
//!         dispatcher.enqueue(request)?;
//!     }
//!     dispatcher.run().await;
//!     Ok(())
//! }
//! ```
//!
//! Callbacks may queue more work on the dispatcher which is running them.
//! Identical `GET` requests in flight at the same time share one transport
//! operation, and a [cache](crate::cache) can answer requests without any:
//!
//! ```no_run
//! use std::{collections::HashMap, sync::{Arc, Mutex}};
//! use volley_lib::{CacheKey, Dispatcher, Response, Result};
//!
//! # fn main() -> Result<()> {
//! let store: Arc<Mutex<HashMap<CacheKey, Response>>> = Arc::default();
//! let dispatcher = Dispatcher::new()?;
//!
//! let reader = Arc::clone(&store);
//! dispatcher.set_cache_getter(move |request| {
//!     Ok(reader.lock().unwrap().get(request.cache_key()).cloned())
//! });
//! dispatcher.set_cache_setter(move |request| {
//!     if let Some(response) = request.response() {
//!         store
//!             .lock()
//!             .unwrap()
//!             .insert(request.cache_key().clone(), response.clone());
//!     }
//!     Ok(())
//! });
//! # Ok(())
//! # }
//! ```
//!
//! Which hosts may be contacted at all is controlled process-wide by the
//! [`policy`] module.
#![warn(missing_docs)]

mod dispatcher;
mod types;

pub mod cache;
pub mod config;
pub mod hooks;
pub mod policy;
pub mod transport;
#[cfg(test)]
pub(crate) mod test_utils;

pub use cache::CachePort;
pub use config::{DispatcherConfig, TransportConfig};
pub use dispatcher::{
    Dispatcher, DispatcherBuilder, GlobalOnComplete, set_shared_dispatcher, shared_dispatcher,
};
pub use hooks::{clear_global_hooks, register_after_request_hook};
pub use policy::NetworkPolicy;
pub use transport::{ReqwestTransport, Transport};
pub use types::*;
