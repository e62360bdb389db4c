//! Filesystem-backed, TTL-indexed cache primitives.
//!
//! This crate provides the leaf components a named cache is built from:
//! filename encoding (no in-memory index — expiration and id live in the
//! basename), namespace resolution, the process-wide config registry, the
//! permanent and temp stores, and their two background cleaners. The
//! request/response surface (`put`/`get`/`execute`/...) and the
//! supervisor that wires these together per named cache live in the
//! `file-cache` crate.

pub mod cleaners;
pub mod config;
pub mod error;
pub mod namespace;
pub mod owner;
pub mod paths;
pub mod permanent;
pub mod registry;
pub mod temp;

pub use config::{CacheConfig, CacheOptions, ConfigValue, UnknownFiles};
pub use error::{CacheError, ParseError, ProducerError};
pub use namespace::NamespaceSpec;
pub use owner::OwnerToken;
pub use permanent::PermEntry;
pub use paths::{ParsedPerm, ParsedTemp};
