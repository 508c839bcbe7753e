//! Shared helpers.

pub mod lenient;
