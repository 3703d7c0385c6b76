pub mod websocket_upstream;

pub use websocket_upstream::WebSocketUpstream;
