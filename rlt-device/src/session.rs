use std::time::Duration;

use rlt_proto::{
    decode_init_ack, decode_signal_vector, encode_init, encode_switch, ProtocolError, SWITCH_RANGE,
};

use crate::capture::CaptureMatrix;
use crate::config::DeviceConfig;
use crate::error::DeviceError;
use crate::role::{DeviceRole, TestType};
use crate::transport::Transport;

/// Per-datagram deadline, also bounds the connect handshake.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(2);

/// Sector the tester is flipped to when verifying its connection.
const TESTER_VERIFY_SECTOR: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconfigured,
    Configured,
    Connecting,
    /// `nbins` is negotiated with the DUT during INIT. The tester application
    /// sends no init-ack, so a tester session carries 0 here and its capture
    /// payloads are never parsed.
    Connected { nbins: u16 },
    Failed,
}

impl ConnectionState {
    pub const fn label(&self) -> &'static str {
        match self {
            ConnectionState::Unconfigured => "Unconfigured",
            ConnectionState::Configured => "Configured",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected { .. } => "Connected",
            ConnectionState::Failed => "Failed",
        }
    }
}

/// Control session to one embedded device.
///
/// Not reentrant: receive-buffer sizing and the sequential capture read loop
/// assume a single caller, so all operations take `&mut self` and the
/// orchestrator serializes access.
pub struct DeviceSession<T: Transport> {
    role: DeviceRole,
    transport: T,
    config: Option<DeviceConfig>,
    state: ConnectionState,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(role: DeviceRole, transport: T) -> Self {
        Self {
            role,
            transport,
            config: None,
            state: ConnectionState::Unconfigured,
        }
    }

    pub fn role(&self) -> DeviceRole {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected { .. })
    }

    pub fn config(&self) -> Option<&DeviceConfig> {
        self.config.as_ref()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn load_config(&mut self, config: DeviceConfig) {
        self.config = Some(config);
        self.state = ConnectionState::Configured;
    }

    /// Sends the configuration document and verifies the device took it.
    ///
    /// The socket is drained first so leftover capture frames from a previous
    /// run cannot be mistaken for the handshake response.
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        let (text, recv_len) = match self.config.as_ref() {
            Some(cfg) => (cfg.text().to_string(), cfg.recv_buffer_len()),
            None => return Err(DeviceError::BadState(self.state.label(), "Configured")),
        };

        self.state = ConnectionState::Connecting;

        if !self.transport.probe().await {
            self.state = ConnectionState::Failed;
            return Err(DeviceError::Connectivity(self.transport.peer()));
        }

        self.drain(recv_len).await?;

        self.transport.send(&encode_init(&text)).await?;

        match self.role {
            DeviceRole::Tester => self.verify_tester(recv_len).await,
            DeviceRole::Dut => self.await_init_ack(recv_len).await,
        }
    }

    /// The tester application sends no init-ack. Connection is verified by
    /// flipping one tx sector and checking that anything comes back.
    async fn verify_tester(&mut self, recv_len: usize) -> Result<(), DeviceError> {
        let baseline = self
            .role
            .baseline(TestType::Tx, TESTER_VERIFY_SECTOR)
            .expect("verify sector is in range");

        self.transport
            .send(&encode_switch(SWITCH_RANGE, baseline))
            .await?;

        let mut buf = vec![0u8; recv_len.max(1)];
        match self.transport.recv(&mut buf, SOCKET_TIMEOUT).await {
            Ok(_) => {
                log::info!("### Tester: is connected");
                self.state = ConnectionState::Connected { nbins: 0 };
                Ok(())
            }
            Err(DeviceError::Timeout(d)) => {
                log::error!("### Tester: app isn't running");
                self.state = ConnectionState::Failed;
                Err(DeviceError::Timeout(d))
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    async fn await_init_ack(&mut self, recv_len: usize) -> Result<(), DeviceError> {
        let mut buf = vec![0u8; recv_len.max(rlt_proto::frame::INIT_ACK_LEN)];

        let n = match self.transport.recv(&mut buf, SOCKET_TIMEOUT).await {
            Ok(n) => n,
            Err(e) => {
                if matches!(e, DeviceError::Timeout(_)) {
                    log::error!("### DUT: app isn't running");
                }
                self.state = ConnectionState::Failed;
                return Err(e);
            }
        };

        let ack = match decode_init_ack(&buf[..n]) {
            Ok(ack) => ack,
            Err(e) => {
                self.state = ConnectionState::Failed;
                return Err(e.into());
            }
        };

        if !ack.ack {
            self.state = ConnectionState::Failed;
            return Err(ProtocolError::UnexpectedValue {
                field: "ack",
                value: buf[0],
            }
            .into());
        }

        log::info!("### DUT: is connected, nbins={}", ack.nbins);
        self.state = ConnectionState::Connected { nbins: ack.nbins };
        Ok(())
    }

    /// Flips the antenna matrix to one sector and collects the resulting
    /// capture burst.
    ///
    /// Returns `Ok(None)` for a tester session: its first datagram is treated
    /// as a positive acknowledgment and the payload is never parsed. For a
    /// DUT session, reads exactly `no_fasts` frames; a timeout on any frame
    /// aborts the whole call without a partial matrix and without retrying.
    pub async fn switch(
        &mut self,
        test_type: TestType,
        sector: usize,
    ) -> Result<Option<CaptureMatrix>, DeviceError> {
        let nbins = match self.state {
            ConnectionState::Connected { nbins } => nbins as usize,
            _ => return Err(DeviceError::BadState(self.state.label(), "Connected")),
        };

        let (no_fasts, recv_len) = {
            let cfg = self
                .config
                .as_ref()
                .ok_or(DeviceError::BadState(self.state.label(), "Configured"))?;
            (cfg.no_fasts(), cfg.recv_buffer_len())
        };

        let baseline = self.role.baseline(test_type, sector).ok_or_else(|| {
            DeviceError::Validation(format!(
                "sector {sector} out of range for {} {:?}",
                self.role.label(),
                test_type
            ))
        })?;

        self.transport
            .send(&encode_switch(SWITCH_RANGE, baseline))
            .await?;

        // The whole burst can arrive faster than we drain it.
        self.transport.set_recv_buffer(no_fasts * recv_len)?;

        let mut buf = vec![0u8; recv_len.max(1)];

        if self.role == DeviceRole::Tester {
            self.transport.recv(&mut buf, SOCKET_TIMEOUT).await?;
            return Ok(None);
        }

        let mut matrix = CaptureMatrix::with_capacity(nbins.saturating_sub(1), no_fasts);
        for _ in 0..no_fasts {
            let n = self.transport.recv(&mut buf, SOCKET_TIMEOUT).await?;
            let row = decode_signal_vector(&buf[..n], self.role.sample_type(), nbins)?;
            matrix.push_row(&row);
        }

        Ok(Some(matrix))
    }

    /// Discards queued datagrams until a receive deadline passes with no
    /// data. "No more data" is the success condition here, not an error.
    pub async fn clear_buffer(&mut self) -> Result<(), DeviceError> {
        let recv_len = self
            .config
            .as_ref()
            .map(|cfg| cfg.recv_buffer_len())
            .ok_or(DeviceError::BadState(self.state.label(), "Configured"))?;

        self.drain(recv_len).await
    }

    async fn drain(&mut self, recv_len: usize) -> Result<(), DeviceError> {
        let mut buf = vec![0u8; recv_len.max(1)];
        loop {
            match self.transport.recv(&mut buf, SOCKET_TIMEOUT).await {
                Ok(_) => continue,
                Err(DeviceError::Timeout(_)) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Validates and applies a new transmit gain, then reconnects so the
    /// device picks it up. Out-of-range values change nothing.
    pub async fn change_transmit_gain(&mut self, value: i32) -> Result<(), DeviceError> {
        if !(0..=3).contains(&value) {
            return Err(DeviceError::Validation(format!(
                "transmit gain {value} out of range [0, 3]"
            )));
        }

        let cfg = self
            .config
            .as_mut()
            .ok_or(DeviceError::BadState(self.state.label(), "Configured"))?;
        cfg.apply_gain(value as u8)?;

        self.connect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    const CONFIG_XML: &str = "<config><FPS_Motion>2</FPS_Motion><motionTime>1.5</motionTime><udpBufferLength>12</udpBufferLength><transmitGain>1</transmitGain></config>";

    /// Scripted transport: each queue entry is one `recv` outcome, `None`
    /// meaning the deadline elapsed.
    struct MockTransport {
        reachable: bool,
        replies: VecDeque<Option<Vec<u8>>>,
        sent: Vec<Vec<u8>>,
        recv_buffer: Option<usize>,
    }

    impl MockTransport {
        fn new(replies: Vec<Option<Vec<u8>>>) -> Self {
            Self {
                reachable: true,
                replies: replies.into(),
                sent: Vec::new(),
                recv_buffer: None,
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn probe(&mut self) -> bool {
            self.reachable
        }

        async fn send(&mut self, payload: &[u8]) -> Result<(), DeviceError> {
            self.sent.push(payload.to_vec());
            Ok(())
        }

        async fn recv(&mut self, buf: &mut [u8], deadline: Duration) -> Result<usize, DeviceError> {
            match self.replies.pop_front().flatten() {
                Some(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                None => Err(DeviceError::Timeout(deadline)),
            }
        }

        fn set_recv_buffer(&mut self, bytes: usize) -> Result<(), DeviceError> {
            self.recv_buffer = Some(bytes);
            Ok(())
        }

        fn peer(&self) -> String {
            "mock:5044".to_string()
        }
    }

    fn dut_frame(values: &[f32]) -> Vec<u8> {
        let mut payload = Vec::new();
        for v in values {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload
    }

    fn configured(role: DeviceRole, replies: Vec<Option<Vec<u8>>>) -> DeviceSession<MockTransport> {
        let mut session = DeviceSession::new(role, MockTransport::new(replies));
        session.load_config(DeviceConfig::from_xml(CONFIG_XML).expect("test config"));
        session
    }

    #[tokio::test]
    async fn test_dut_connect_negotiates_nbins() {
        // First None terminates the pre-INIT drain, then the init-ack.
        let mut session = configured(
            DeviceRole::Dut,
            vec![None, Some(vec![0x01, 0x20, 0x00])],
        );

        session.connect().await.expect("connected");

        assert_eq!(session.state(), ConnectionState::Connected { nbins: 32 });
        assert_eq!(session.transport.sent[0][0], b'I');
    }

    #[tokio::test]
    async fn test_dut_connect_rejected_ack() {
        let mut session = configured(
            DeviceRole::Dut,
            vec![None, Some(vec![0x00, 0x20, 0x00])],
        );

        let err = session.connect().await.unwrap_err();

        assert!(matches!(err, DeviceError::Malformed(_)));
        assert_eq!(session.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_dut_connect_timeout() {
        let mut session = configured(DeviceRole::Dut, vec![None, None]);

        let err = session.connect().await.unwrap_err();

        assert!(matches!(err, DeviceError::Timeout(_)));
        assert_eq!(session.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_connect_requires_config() {
        let mut session = DeviceSession::new(DeviceRole::Dut, MockTransport::new(vec![]));

        let err = session.connect().await.unwrap_err();

        assert!(matches!(err, DeviceError::BadState(_, _)));
    }

    #[tokio::test]
    async fn test_unreachable_device() {
        let mut session = configured(DeviceRole::Dut, vec![]);
        session.transport.reachable = false;

        let err = session.connect().await.unwrap_err();

        assert!(matches!(err, DeviceError::Connectivity(_)));
        assert_eq!(session.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_tester_connect_verifies_with_switch() {
        // Drain end, then any datagram acknowledges the verify switch.
        let mut session = configured(DeviceRole::Tester, vec![None, Some(vec![0u8; 12])]);

        session.connect().await.expect("connected");

        assert!(session.is_connected());
        // INIT then the tx sector-1 verify command (baseline 16).
        assert_eq!(session.transport.sent[0][0], b'I');
        let verify = &session.transport.sent[1];
        assert_eq!(verify[0], b'M');
        assert_eq!(verify[5], 16);
    }

    #[tokio::test]
    async fn test_tester_connect_app_not_running() {
        let mut session = configured(DeviceRole::Tester, vec![None, None]);

        let err = session.connect().await.unwrap_err();

        assert!(matches!(err, DeviceError::Timeout(_)));
        assert_eq!(session.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_switch_collects_full_matrix() {
        let mut replies = vec![None, Some(vec![0x01, 0x03, 0x00])];
        // no_fasts = floor(2 * 1.5) = 3 frames of nbins = 3 f32 samples.
        for i in 0..3 {
            replies.push(Some(dut_frame(&[i as f32, 1.0 + i as f32, 2.0 + i as f32])));
        }
        let mut session = configured(DeviceRole::Dut, replies);

        session.connect().await.expect("connected");
        let matrix = session
            .switch(TestType::Rx, 5)
            .await
            .expect("switched")
            .expect("capture matrix");

        assert_eq!(matrix.row_count(), 3);
        assert_eq!(matrix.bins(), 2);
        let rows: Vec<&[f32]> = matrix.rows().collect();
        assert_eq!(rows[0], &[1.0, 2.0]);
        assert_eq!(rows[2], &[3.0, 4.0]);
        // SO_RCVBUF sized for the whole burst.
        assert_eq!(session.transport.recv_buffer, Some(3 * 12));
    }

    #[tokio::test]
    async fn test_switch_timeout_returns_no_partial_matrix() {
        let replies = vec![
            None,
            Some(vec![0x01, 0x03, 0x00]),
            Some(dut_frame(&[0.0, 1.0, 2.0])),
            Some(dut_frame(&[0.0, 1.0, 2.0])),
            None, // frame 3 of 3 times out
        ];
        let mut session = configured(DeviceRole::Dut, replies);

        session.connect().await.expect("connected");
        let err = session.switch(TestType::Rx, 0).await.unwrap_err();

        assert!(matches!(err, DeviceError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_switch_requires_connected() {
        let mut session = configured(DeviceRole::Dut, vec![]);

        let err = session.switch(TestType::Tx, 0).await.unwrap_err();

        assert!(matches!(err, DeviceError::BadState(_, _)));
    }

    #[tokio::test]
    async fn test_tester_switch_acks_on_first_frame() {
        let replies = vec![
            None,
            Some(vec![0u8; 12]), // connect verify
            Some(vec![0u8; 12]), // switch ack
        ];
        let mut session = configured(DeviceRole::Tester, replies);

        session.connect().await.expect("connected");
        let result = session.switch(TestType::Rx, 3).await.expect("switched");

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_sector_rejected() {
        let mut session = configured(
            DeviceRole::Dut,
            vec![None, Some(vec![0x01, 0x03, 0x00])],
        );
        session.connect().await.expect("connected");

        let err = session.switch(TestType::Tx, 8).await.unwrap_err();

        assert!(matches!(err, DeviceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_gain_out_of_range_changes_nothing() {
        let mut session = configured(DeviceRole::Dut, vec![]);
        let before = session.config().expect("config").text().to_string();

        let err = session.change_transmit_gain(4).await.unwrap_err();

        assert!(matches!(err, DeviceError::Validation(_)));
        assert_eq!(session.config().expect("config").text(), before);
        assert_eq!(session.state(), ConnectionState::Configured);
    }

    #[tokio::test]
    async fn test_gain_change_reconnects() {
        let mut session = configured(
            DeviceRole::Dut,
            vec![
                None,
                Some(vec![0x01, 0x20, 0x00]), // first connect
                None,
                Some(vec![0x01, 0x20, 0x00]), // reconnect after gain change
            ],
        );
        session.connect().await.expect("connected");

        session.change_transmit_gain(3).await.expect("gain applied");

        assert_eq!(session.config().expect("config").transmit_gain(), 3);
        assert!(session.is_connected());
        // Second INIT carries the new gain digits.
        let second_init = session
            .transport
            .sent
            .iter()
            .filter(|f| f[0] == b'I')
            .nth(1)
            .expect("second INIT");
        let text = std::str::from_utf8(&second_init[1..]).expect("utf8 config");
        assert!(text.contains("<transmitGain>3</transmitGain>"));
    }

    #[tokio::test]
    async fn test_clear_buffer_drains_until_timeout() {
        let mut session = configured(
            DeviceRole::Dut,
            vec![Some(vec![0u8; 12]), Some(vec![0u8; 12]), None],
        );

        session.clear_buffer().await.expect("drained");

        assert!(session.transport.replies.is_empty());
    }
}
