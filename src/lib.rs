#![doc = "The `tasklist` library crate."]
#![doc = ""]
#![doc = "Accounts with cookie sessions, per-user task storage and the HTTP routes over them,"]
#![doc = "plus a client task store with optimistic updates. The binary (`main.rs`) wires"]
#![doc = "these together against Postgres; tests run the same routes on `MemoryStore`."]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use error::AppError;
pub use state::AppState;
