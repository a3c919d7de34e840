//! WordGuard Server
//!
//! HTTP front end for the forbidden-word lexicon and the per-user
//! sensitive-phrase index, persisted in SQLite.

pub mod config;
pub mod routes;
pub mod state;
pub mod store;

pub use config::{Cli, ServerConfig};
pub use routes::create_router;
pub use state::AppState;
pub use store::SqliteStore;
