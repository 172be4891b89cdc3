//! Core types for Adgate

mod user;

pub use user::*;
