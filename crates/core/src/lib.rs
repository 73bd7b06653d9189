mod command;
pub use command::{Command, NewCommand};
