use rlt_proto::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    /// Device unreachable at the network layer, before any protocol exchange.
    #[error("device {0} is not reachable")]
    Connectivity(String),

    /// No datagram arrived within the socket deadline.
    #[error("no response from device within {0:?}")]
    Timeout(std::time::Duration),

    #[error("malformed response: {0}")]
    Malformed(#[from] ProtocolError),

    /// Required configuration key absent or unparsable.
    #[error("device config: missing or invalid key '{0}'")]
    ConfigMissing(&'static str),

    #[error("invalid value: {0}")]
    Validation(String),

    #[error("session is in state {0}, operation requires {1}")]
    BadState(&'static str, &'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
