// src/lib.rs
pub mod aggregate;
pub mod config;
pub mod error;
pub mod haproxy;
pub mod instance;
pub mod metrics;
pub mod proxy;
pub mod retry;
pub mod stats;
pub mod transport;

pub use error::{Error, Result};
pub use haproxy::{HaProxy, ListRef};
pub use proxy::{Backend, Frontend, Server, ServerState, Weight};
