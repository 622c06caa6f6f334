// src/stats/mod.rs
mod parser;
mod record;

pub use parser::{parse_info, parse_stats};
pub use record::{BackendStats, StatRecord, StatsDump};
