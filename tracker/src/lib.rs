//! Operation records: the single source of truth for an operation's status.

pub mod store;


pub use store::OperationStore;
