// Guest commands: no capability required, the session id is the invitation.

pub mod join_request_status;
pub mod request_join;
pub mod view_session;

pub use request_join::RequestJoinCommand;
pub use view_session::SessionView;
