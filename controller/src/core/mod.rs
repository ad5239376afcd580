pub mod jobs;
pub mod listener;
pub mod liveness;
pub mod monitor;
pub mod node;
pub mod orchestrator;
pub mod registry;
pub mod routes;
pub mod state;
pub mod stats;
