//! Huddle: time-boxed collaboration sessions with a scope-guarded realtime
//! AI participant.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod testutil;
