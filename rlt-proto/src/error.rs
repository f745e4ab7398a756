use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame too short: got {got} bytes, need {need}")]
    TooShort { got: usize, need: usize },

    #[error("unexpected opcode {0:#04x}")]
    BadOpcode(u8),

    #[error("unexpected field value: {field} = {value:#04x}")]
    UnexpectedValue { field: &'static str, value: u8 },
}
