// Application ports - Driven ports (output ports implemented by infrastructure)

pub mod clock;
pub mod room_provider;
pub mod text_classifier;
pub mod realtime_upstream;

pub use clock::Clock;
pub use room_provider::{MediaDefaults, Room, RoomError, RoomProvider};
pub use text_classifier::{ClassifierError, TextClassifier};
pub use realtime_upstream::{RealtimeUpstream, UpstreamError, UpstreamFrame, UpstreamLink};
