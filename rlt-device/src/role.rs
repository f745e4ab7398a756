use rlt_proto::SampleType;

/// Which side of the bench a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    /// Reference companion unit with known antenna excitation.
    Tester,
    /// Radar module under validation.
    Dut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestType {
    Tx,
    Rx,
}

pub const TX_SECTORS: usize = 8;
pub const RX_SECTORS: usize = 32;

// Firmware-level switch-matrix ids, indexed by logical sector. The orderings
// differ per unit because the tester and DUT boards route their antenna
// matrices differently.
const TESTER_BASELINES_TX: [u8; TX_SECTORS] = [48, 16, 40, 8, 32, 0, 56, 24];
const TESTER_BASELINES_RX: [u8; RX_SECTORS] = [
    7, 6, 5, 4, 3, 2, 1, 0, //
    31, 30, 29, 28, 27, 26, 25, 24, //
    23, 22, 21, 20, 19, 18, 17, 16, //
    15, 14, 13, 12, 11, 10, 9, 8,
];

const DUT_BASELINES_TX: [u8; TX_SECTORS] = [16, 48, 24, 56, 0, 32, 8, 40];
const DUT_BASELINES_RX: [u8; RX_SECTORS] = [
    0, 1, 2, 3, 4, 5, 6, 7, //
    8, 9, 10, 11, 12, 13, 14, 15, //
    16, 17, 18, 19, 20, 21, 22, 23, //
    24, 25, 26, 27, 28, 29, 30, 31,
];

impl DeviceRole {
    pub const fn sample_type(self) -> SampleType {
        match self {
            DeviceRole::Tester => SampleType::U8,
            DeviceRole::Dut => SampleType::F32,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DeviceRole::Tester => "Tester",
            DeviceRole::Dut => "DUT",
        }
    }

    /// Maps a logical sector index to the physical baseline id.
    pub fn baseline(self, test_type: TestType, sector: usize) -> Option<u8> {
        match (self, test_type) {
            (DeviceRole::Tester, TestType::Tx) => TESTER_BASELINES_TX.get(sector).copied(),
            (DeviceRole::Tester, TestType::Rx) => TESTER_BASELINES_RX.get(sector).copied(),
            (DeviceRole::Dut, TestType::Tx) => DUT_BASELINES_TX.get(sector).copied(),
            (DeviceRole::Dut, TestType::Rx) => DUT_BASELINES_RX.get(sector).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_lookup_is_deterministic() {
        for sector in 0..TX_SECTORS {
            let a = DeviceRole::Tester.baseline(TestType::Tx, sector);
            let b = DeviceRole::Tester.baseline(TestType::Tx, sector);
            assert_eq!(a, b);
            assert!(a.is_some());
        }

        for sector in 0..RX_SECTORS {
            assert!(DeviceRole::Dut.baseline(TestType::Rx, sector).is_some());
        }
    }

    #[test]
    fn test_baseline_tables() {
        assert_eq!(DeviceRole::Tester.baseline(TestType::Tx, 0), Some(48));
        assert_eq!(DeviceRole::Tester.baseline(TestType::Tx, 1), Some(16));
        assert_eq!(DeviceRole::Tester.baseline(TestType::Rx, 0), Some(7));
        assert_eq!(DeviceRole::Tester.baseline(TestType::Rx, 8), Some(31));
        assert_eq!(DeviceRole::Dut.baseline(TestType::Tx, 4), Some(0));
        assert_eq!(DeviceRole::Dut.baseline(TestType::Rx, 31), Some(31));
    }

    #[test]
    fn test_out_of_range_sector() {
        assert_eq!(DeviceRole::Tester.baseline(TestType::Tx, TX_SECTORS), None);
        assert_eq!(DeviceRole::Dut.baseline(TestType::Rx, RX_SECTORS), None);
    }

    #[test]
    fn test_sample_types() {
        assert_eq!(
            DeviceRole::Tester.sample_type(),
            rlt_proto::SampleType::U8
        );
        assert_eq!(DeviceRole::Dut.sample_type(), rlt_proto::SampleType::F32);
    }
}
