use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::DeviceError;

pub const KEY_FPS_MOTION: &str = "FPS_Motion";
pub const KEY_MOTION_TIME: &str = "motionTime";
pub const KEY_UDP_BUFFER_LENGTH: &str = "udpBufferLength";
pub const KEY_TRANSMIT_GAIN: &str = "transmitGain";

/// Configuration document sent to the embedded application at INIT.
///
/// The raw XML text is kept verbatim because the device parses it with its
/// own (strict) parser; the typed fields below are extracted eagerly so a
/// broken document fails at load time instead of mid-sweep.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    text: String,
    fps_motion: u32,
    motion_time: f64,
    udp_buffer_length: usize,
    transmit_gain: u8,
}

impl DeviceConfig {
    pub fn from_xml(text: &str) -> Result<Self, DeviceError> {
        let values = flatten_elements(text)?;

        let fps_motion = parse_key(&values, KEY_FPS_MOTION)?;
        let motion_time = parse_key(&values, KEY_MOTION_TIME)?;
        let udp_buffer_length = parse_key(&values, KEY_UDP_BUFFER_LENGTH)?;
        let transmit_gain = parse_key(&values, KEY_TRANSMIT_GAIN)?;

        Ok(Self {
            text: text.to_string(),
            fps_motion,
            motion_time,
            udp_buffer_length,
            transmit_gain,
        })
    }

    /// Raw document, exactly as it goes on the wire.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fps_motion(&self) -> u32 {
        self.fps_motion
    }

    pub fn motion_time(&self) -> f64 {
        self.motion_time
    }

    /// Number of capture frames aggregated per switch() call.
    pub fn no_fasts(&self) -> usize {
        (self.fps_motion as f64 * self.motion_time).floor() as usize
    }

    /// Expected datagram payload size in bytes.
    pub fn recv_buffer_len(&self) -> usize {
        self.udp_buffer_length
    }

    pub fn transmit_gain(&self) -> u8 {
        self.transmit_gain
    }

    /// Rewrites the `<transmitGain>` element content in place.
    ///
    /// This is a deliberate textual splice, not a re-serialization: the
    /// embedded parser expects the document byte-for-byte as shipped, so
    /// everything outside the gain digits must stay untouched.
    pub fn apply_gain(&mut self, value: u8) -> Result<(), DeviceError> {
        let close = format!("</{}>", KEY_TRANSMIT_GAIN);
        let close_idx = self
            .text
            .find(&close)
            .ok_or(DeviceError::ConfigMissing(KEY_TRANSMIT_GAIN))?;

        let open = format!("<{}", KEY_TRANSMIT_GAIN);
        let open_idx = self.text[..close_idx]
            .rfind(&open)
            .ok_or(DeviceError::ConfigMissing(KEY_TRANSMIT_GAIN))?;
        let content_start = self.text[open_idx..close_idx]
            .find('>')
            .map(|i| open_idx + i + 1)
            .ok_or(DeviceError::ConfigMissing(KEY_TRANSMIT_GAIN))?;

        self.text
            .replace_range(content_start..close_idx, &value.to_string());
        self.transmit_gain = value;

        Ok(())
    }
}

/// Collects `tag -> text` for every leaf element in the document, at any
/// depth. Unknown tags are kept but unused; duplicate tags keep the last
/// occurrence, which matches how the embedded parser reads the file.
fn flatten_elements(text: &str) -> Result<HashMap<String, String>, DeviceError> {
    let mut reader = Reader::from_str(text);
    let mut values = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Text(t)) => {
                if let Some(tag) = &current {
                    let value = t
                        .unescape()
                        .map_err(|e| DeviceError::Validation(format!("bad XML text: {e}")))?;
                    let value = value.trim();
                    if !value.is_empty() {
                        values.insert(tag.clone(), value.to_string());
                    }
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(DeviceError::Validation(format!(
                    "invalid device config XML: {e}"
                )))
            }
        }
    }

    Ok(values)
}

fn parse_key<T: std::str::FromStr>(
    values: &HashMap<String, String>,
    key: &'static str,
) -> Result<T, DeviceError> {
    values
        .get(key)
        .and_then(|v| v.parse().ok())
        .ok_or(DeviceError::ConfigMissing(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "<config>\n  <radar>\n    <FPS_Motion>17</FPS_Motion>\n    <motionTime>2.5</motionTime>\n  </radar>\n  <udpBufferLength>1472</udpBufferLength>\n  <transmitGain>1</transmitGain>\n  <unused>x</unused>\n</config>";

    #[test]
    fn test_required_keys_parsed() {
        let cfg = DeviceConfig::from_xml(SAMPLE).expect("parsed config");

        assert_eq!(cfg.fps_motion(), 17);
        assert_eq!(cfg.motion_time(), 2.5);
        assert_eq!(cfg.recv_buffer_len(), 1472);
        assert_eq!(cfg.transmit_gain(), 1);
        assert_eq!(cfg.no_fasts(), 42); // floor(17 * 2.5)
    }

    #[test]
    fn test_missing_key_is_named() {
        let doc = SAMPLE.replace("transmitGain", "txGain");
        let err = DeviceConfig::from_xml(&doc).unwrap_err();

        match err {
            DeviceError::ConfigMissing(key) => assert_eq!(key, KEY_TRANSMIT_GAIN),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparsable_value_is_missing() {
        let doc = SAMPLE.replace("<FPS_Motion>17<", "<FPS_Motion>fast<");
        let err = DeviceConfig::from_xml(&doc).unwrap_err();

        match err {
            DeviceError::ConfigMissing(key) => assert_eq!(key, KEY_FPS_MOTION),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_apply_gain_touches_only_gain_digits() {
        let mut cfg = DeviceConfig::from_xml(SAMPLE).expect("parsed config");
        cfg.apply_gain(3).expect("gain applied");

        assert_eq!(cfg.transmit_gain(), 3);
        assert_eq!(cfg.text(), SAMPLE.replace(
            "<transmitGain>1</transmitGain>",
            "<transmitGain>3</transmitGain>"
        ));
    }
}
