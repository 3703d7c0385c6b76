// Driving adapters - HTTP routes and the relay WebSocket endpoint

pub mod http;
pub mod relay;

pub use http::router;
