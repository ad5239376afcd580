pub mod api_error;
pub mod chunking;
pub mod codec;
pub mod constants;
pub mod error;
pub mod schemas;
pub mod telemetry;
pub mod time_utils;
