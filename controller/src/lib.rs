pub mod command;
pub mod core;
