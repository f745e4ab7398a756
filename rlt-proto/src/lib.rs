pub mod error;
pub mod frame;
pub mod sample;

pub use error::ProtocolError;
pub use frame::{decode_init_ack, decode_switch, encode_init, encode_switch, InitAck};
pub use sample::{decode_signal_vector, SampleType};

/// UDP port the embedded test application listens on.
pub const DEVICE_PORT: u16 = 5044;

/// Fixed "range" field carried by every SWITCH command. The embedded side
/// treats it as an opaque constant; it must be sent as the literal 5.0.
pub const SWITCH_RANGE: f32 = 5.0;
