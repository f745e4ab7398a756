use crate::error::ProtocolError;

pub const OPCODE_INIT: u8 = b'I';
pub const OPCODE_SWITCH: u8 = b'M';

/// SWITCH request length: opcode (1) + range f32 (4) + baseline id (1).
pub const SWITCH_FRAME_LEN: usize = 6;

/// INIT response length: ack flag (1) + Nbins u16 (2).
pub const INIT_ACK_LEN: usize = 3;

/// Decoded INIT response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitAck {
    pub ack: bool,
    pub nbins: u16,
}

/// Builds an INIT request: opcode followed by the raw UTF-8 configuration
/// document. The device parses the XML itself; the text is sent verbatim.
pub fn encode_init(config_text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + config_text.len());
    frame.push(OPCODE_INIT);
    frame.extend_from_slice(config_text.as_bytes());
    frame
}

/// Builds a SWITCH request for one antenna baseline.
pub fn encode_switch(range: f32, baseline: u8) -> [u8; SWITCH_FRAME_LEN] {
    let mut frame = [0u8; SWITCH_FRAME_LEN];
    frame[0] = OPCODE_SWITCH;
    frame[1..5].copy_from_slice(&range.to_le_bytes());
    frame[5] = baseline;
    frame
}

/// Parses a SWITCH request back into (range, baseline).
pub fn decode_switch(data: &[u8]) -> Result<(f32, u8), ProtocolError> {
    if data.len() < SWITCH_FRAME_LEN {
        return Err(ProtocolError::TooShort {
            got: data.len(),
            need: SWITCH_FRAME_LEN,
        });
    }

    if data[0] != OPCODE_SWITCH {
        return Err(ProtocolError::BadOpcode(data[0]));
    }

    let range = f32::from_le_bytes([data[1], data[2], data[3], data[4]]);

    Ok((range, data[5]))
}

/// Parses the INIT response sent by the DUT application.
pub fn decode_init_ack(data: &[u8]) -> Result<InitAck, ProtocolError> {
    if data.len() < INIT_ACK_LEN {
        return Err(ProtocolError::TooShort {
            got: data.len(),
            need: INIT_ACK_LEN,
        });
    }

    Ok(InitAck {
        ack: data[0] == 1,
        nbins: u16::from_le_bytes([data[1], data[2]]),
    })
}
