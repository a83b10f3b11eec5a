pub mod channel;
pub mod messages;
pub mod toggle;

pub use channel::{relay_channel, Envelope, RelayClient, RequestLedger, RequestState, Responder};
pub use messages::{CommandRequest, CommandResponse, Interpretation, PageSignal, RelayRequest};
pub use toggle::{Overlay, ToggleBus};
