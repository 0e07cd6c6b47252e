pub mod cli;
pub mod load_config;
pub mod serve;

pub use cli::{run, Cli, Commands};
