//! Request-coalescing data loader.
//!
//! Point lookups issued while a batch is open are deduplicated and resolved
//! by a single bulk [Loader::load] call. Successful values are cached for the
//! lifetime of the [DataLoader].

mod batch;
pub mod config;
mod data_loader;
mod error;
mod loader;
mod thunk;
pub mod tracing;

pub use data_loader::DataLoader;
pub use error::{Error, Result};
pub use loader::{loader_fn, Loader, LoaderFn};
pub use thunk::{Thunk, ThunkMany};
pub use tokio_util::sync::CancellationToken;
