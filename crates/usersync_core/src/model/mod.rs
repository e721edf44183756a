//! Value types shared by properties, the remote document and the consumer API.
//!
//! # Responsibility
//! - Define the flat document shape exchanged with local and remote stores.
//! - Define the typed values carried by concrete properties.
//!
//! # Invariants
//! - Every value serializes to the exact JSON shape stored in the remote
//!   document, so export/import is lossless.

pub mod document;
pub mod values;
