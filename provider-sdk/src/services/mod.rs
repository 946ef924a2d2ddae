//! Provider adapter implementations
//!
//! One module per resource. Each concrete adapter implements
//! `ProviderAdapter` and normalizes its provider's response through a
//! free-standing function exported next to it.

pub mod browser;
pub mod chat;
pub(crate) mod common;
pub mod memory;
pub mod runtime;
pub mod search;

pub use common::{parse_error_response, HttpTransport, UserAgent};
