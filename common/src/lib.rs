//! Shared domain models, configuration, and key layout.

pub mod keys;
pub mod model;
pub mod signal;

pub use signal::Cancellation;
