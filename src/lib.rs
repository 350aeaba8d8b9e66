pub mod cli;
pub mod config;
pub mod relay;
pub mod server;

pub use config::Config;
pub use relay::QueryPipeline;
