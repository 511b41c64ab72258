pub mod config;
pub mod embedding;
pub mod errors;
pub mod index;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod search;
pub mod server;
