//! Schema pointers
//!
//! JSON-pointer style addressing for nodes of a JSON Schema document.
//!
//! # Example
//!
//! ```rust
//! use schema_pointer::SchemaPointer;
//!
//! let parent: SchemaPointer = "#/properties/address".parse().unwrap();
//! let street = parent.join("properties").join("street");
//!
//! assert_eq!(street.to_string(), "#/properties/address/properties/street");
//! assert!(parent.is_ancestor(&street));
//! ```

#![warn(missing_docs)]

pub mod pointer;

// Re-exports
pub use pointer::{
    escape_segment, is_ancestor, join, segments, unescape_segment, PointerError, SchemaPointer,
    ROOT_MARKER,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
