pub mod app;

pub use app::{AddServerArgs, Cli, Commands, ServerCommands};
