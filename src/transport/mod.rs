// src/transport/mod.rs
mod client;
mod endpoint;

pub use client::{split_response, Transport};
pub use endpoint::{Endpoint, TcpEndpoint, UnixEndpoint};
