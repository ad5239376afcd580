pub mod client;
pub mod fault_injection;
pub mod heartbeat;
pub mod probe;
pub mod state;
