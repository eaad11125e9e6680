//! Client-facing networking.

pub mod connection;
pub mod gateway;

pub use gateway::Gateway;
