//! Core types and trait definitions for the Colloquy discussion data layer.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod error;
pub mod group;
pub mod identity;
pub mod invite;
pub mod message;
pub mod rag;
pub mod session;
pub mod store;

pub use error::{Error, ErrorKind, Result};
