pub mod auth;
pub mod error;
pub mod handlers;
pub mod health;
pub mod router;
pub mod state;
pub mod ws;


pub use router::router;
pub use state::AppState;
