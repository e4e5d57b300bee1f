pub mod models;
pub mod config;
pub mod ingest;
pub mod tls;
pub mod flow;
pub mod window;
pub mod filter;
pub mod features;
pub mod markov;
pub mod dataset;
pub mod pipeline;

#[cfg(test)]
mod testutil;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
