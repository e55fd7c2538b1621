//! # kvlink Core
//!
//! Error taxonomy, result aliases and logging setup shared by every kvlink
//! crate. Nothing in here talks to the network.

pub mod error;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use result::*;
