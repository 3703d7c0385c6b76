pub mod protocol;

pub use protocol::{close_codes, ErrorBody, QuotaSnapshot, RelayEvent};
