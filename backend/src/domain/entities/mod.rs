pub mod session;
pub mod join_request;

pub use session::Session;
pub use join_request::{JoinRequest, JoinStatus, RoomGrant};
