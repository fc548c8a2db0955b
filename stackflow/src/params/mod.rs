//! Output parameters and the shared store they are exchanged through.
//!
//! This module provides:
//! - Validated parameter keys and typed values
//! - The `ParameterStore` trait with an in-memory implementation
//! - `ParameterExchange`, which adds per-deployment ownership on top

mod exchange;
mod key;
mod store;

pub use exchange::{ParameterExchange, PublishedParameter};
pub use key::{ParameterKey, ParameterKind, ParameterValue, MAX_KEY_LEN};
pub use store::{InMemoryParameterStore, ParameterStore, StoredParameter};
