//! Realtime AI relay.
//!
//! A connection moves through `CONNECTING -> AUTHORIZED -> BRIDGING -> CLOSED`.
//! [`admission::authorize`] covers the first transition and runs before the
//! transport is upgraded; [`bridge::run`] owns the rest and talks to the
//! client only through frame channels, so it is transport agnostic.

pub mod admission;
pub mod bridge;
pub mod messages;
pub mod pipeline;

use std::sync::Arc;

use crate::application::ports::RealtimeUpstream;
use crate::application::scope_guard::ScopeGuard;
use crate::application::services::Services;

pub use admission::{authorize, Admission, RelayParams, RelayRejection};
pub use messages::{ClientFrame, ServerFrame};

pub const DEFAULT_PENDING_LIMIT: usize = 256;

/// Shared by every relay connection of the process.
#[derive(Clone)]
pub struct RelayContext {
    pub services: Arc<Services>,
    pub guard: Arc<ScopeGuard>,
    pub upstream: Option<Arc<dyn RealtimeUpstream>>,
    /// Capacity of the per-connection queue of client frames awaiting the
    /// pipeline, including frames buffered before the upstream is ready.
    pub pending_limit: usize,
}
