// Application layer - use cases organized by caller
// Orchestrates domain logic through the ports it defines

pub mod ai;
pub mod authorization;
pub mod connections;
pub mod error;
pub mod guest;
pub mod host;
pub mod join_feed;
pub mod ports;
pub mod reaper;
pub mod relay;
pub mod scope_guard;
pub mod services;
