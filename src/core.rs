//! Core system components.
//!
//! Contains the URL rewriting logic and the proxy service that applies it
//! to live exchanges.

pub mod proxy;
pub mod rewrite;
