pub mod nodes;
pub mod serve;
pub mod transfer;
