// Driven adapters - implementations of the application ports

pub mod classifier;
pub mod clock;
pub mod persistence;
pub mod realtime;
pub mod rooms;

pub use classifier::ChatCompletionsClassifier;
pub use clock::SystemClock;
pub use realtime::WebSocketUpstream;
pub use rooms::HttpRoomProvider;
