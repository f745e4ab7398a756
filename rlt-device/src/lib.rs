pub mod capture;
pub mod config;
pub mod error;
pub mod role;
pub mod session;
pub mod transport;

pub use capture::CaptureMatrix;
pub use config::DeviceConfig;
pub use error::DeviceError;
pub use role::{DeviceRole, TestType};
pub use session::{ConnectionState, DeviceSession};
pub use transport::{Transport, UdpTransport};
