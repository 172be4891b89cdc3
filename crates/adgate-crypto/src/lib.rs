//! Cryptography utilities for Adgate

pub mod hash;
pub mod password;

pub use hash::*;
pub use password::*;
