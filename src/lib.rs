//! oprelay: operation tracking with live notification relay.
//! The workspace crates are re-exported here; most callers want [`prelude`].

pub mod prelude;

pub use common;
pub use engine;
pub use errors;
pub use queue;
pub use storage;
pub use tracker;
pub use utils;
