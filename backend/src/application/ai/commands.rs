// AI access commands

pub mod negotiate_access;

pub use negotiate_access::{AiAccess, NegotiateAccessCommand, NegotiatedRole};
