//! Utility functions and constants shared across the protocol modules.

pub mod constants;
pub mod message;

pub use constants::*;
pub use message::*;
