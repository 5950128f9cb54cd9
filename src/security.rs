//! Security enforcement modules.
//!
//! Provides the domain allow-list that gates which origins may be routed
//! through the relay.

pub mod allowlist;
