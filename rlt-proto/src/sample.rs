use crate::error::ProtocolError;

/// On-wire sample format of one capture frame. The tester application emits
/// unsigned bytes, the DUT application emits IEEE-754 floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    F32,
}

impl SampleType {
    pub const fn width(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::F32 => 4,
        }
    }
}

/// Reinterprets one capture datagram as `nbins` fixed-width samples and
/// returns the signal vector. Sample 0 is a per-frame sequence/header value
/// and is dropped, so the result holds `nbins - 1` values.
pub fn decode_signal_vector(
    payload: &[u8],
    sample_type: SampleType,
    nbins: usize,
) -> Result<Vec<f32>, ProtocolError> {
    // The header sample is mandatory, so a frame always carries at least one
    // sample.
    if nbins == 0 {
        return Err(ProtocolError::UnexpectedValue {
            field: "nbins",
            value: 0,
        });
    }

    let need = nbins * sample_type.width();
    if payload.len() < need {
        return Err(ProtocolError::TooShort {
            got: payload.len(),
            need,
        });
    }

    let mut signal = Vec::with_capacity(nbins.saturating_sub(1));

    match sample_type {
        SampleType::U8 => {
            signal.extend(payload[1..nbins].iter().map(|&b| b as f32));
        }
        SampleType::F32 => {
            for i in 1..nbins {
                let off = i * 4;
                signal.push(f32::from_le_bytes([
                    payload[off],
                    payload[off + 1],
                    payload[off + 2],
                    payload[off + 3],
                ]));
            }
        }
    }

    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_header_dropped() {
        let payload = [0x07u8, 10, 20, 30];
        let signal = decode_signal_vector(&payload, SampleType::U8, 4).expect("decoded");

        assert_eq!(signal, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_f32_header_dropped() {
        let mut payload = Vec::new();
        for v in [99.0f32, 1.5, -2.25] {
            payload.extend_from_slice(&v.to_le_bytes());
        }

        let signal = decode_signal_vector(&payload, SampleType::F32, 3).expect("decoded");

        assert_eq!(signal, vec![1.5, -2.25]);
    }

    #[test]
    fn test_zero_bins_rejected() {
        assert_eq!(
            decode_signal_vector(&[0x07], SampleType::U8, 0),
            Err(ProtocolError::UnexpectedValue {
                field: "nbins",
                value: 0
            })
        );
    }

    #[test]
    fn test_short_payload_rejected() {
        let payload = [0u8; 8];

        assert_eq!(
            decode_signal_vector(&payload, SampleType::F32, 3),
            Err(ProtocolError::TooShort { got: 8, need: 12 })
        );
    }
}
