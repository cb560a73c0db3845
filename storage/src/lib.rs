//! Key-value persistence for operation records.

pub mod backend;
pub mod local_backend;
pub mod redis_backend;

#[cfg(test)]
mod tests;

pub use backend::KvBackend;
pub use local_backend::LocalBackend;
pub use redis_backend::RedisBackend;
