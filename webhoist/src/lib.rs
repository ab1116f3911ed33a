pub mod aws;
pub mod cli;
pub mod github;

pub use cli::{run, Cli};
