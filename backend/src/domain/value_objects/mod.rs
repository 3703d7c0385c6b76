pub mod session_id;
pub mod join_request_id;
pub mod session_kind;
pub mod roles;
pub mod client_identity;

pub use session_id::SessionId;
pub use join_request_id::JoinRequestId;
pub use session_kind::SessionKind;
pub use roles::{CapabilityRole, RequestedRole};
pub use client_identity::{ClientIdentity, HOST_SUBJECT};
