//! Local identity storage for Adgate
//!
//! The authentication core only reads from the store. The in-memory
//! implementation is seeded from a TOML users file or programmatically.

pub mod repository;
pub mod traits;

pub use repository::MemoryIdentityStore;
pub use traits::*;
