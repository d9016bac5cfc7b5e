pub mod args;
mod command;
mod driver;
pub mod updates;

pub use command::CommandTool;
pub use driver::{DatabaseTool, ToolReport};
