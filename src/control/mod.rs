mod service;

pub use service::{CommandDispatcher, CommandSettings, SLOW_COMMAND_DELAY};
