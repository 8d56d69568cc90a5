pub mod config;
pub mod core;
pub mod db;
pub mod logging;
pub mod services;
pub mod state;
pub mod types;

pub use config::Config;
pub use db::{MemoryStore, SqliteStore, Store, StoreError};
pub use services::{EngineError, ErrorKind};
pub use state::EngineState;
