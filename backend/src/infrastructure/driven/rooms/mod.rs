pub mod http_room_provider;

pub use http_room_provider::HttpRoomProvider;
