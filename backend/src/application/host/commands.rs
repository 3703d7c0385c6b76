// Host commands: everything gated by a host capability, plus session creation.

pub mod create_session;
pub mod decide_join_request;
pub mod end_session;
pub mod join_as_host;
pub mod list_join_requests;

pub use create_session::{CreateSessionCommand, CreateSessionResult};
pub use join_as_host::HostRoomAccess;
