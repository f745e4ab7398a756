/// Frequency span of the analyzer's spectrum curve.
pub const START_FREQ_GHZ: f64 = 7.5;
pub const END_FREQ_GHZ: f64 = 9.5;

/// Frequencies checked during the Tx sweep.
pub const TX_TARGETS_GHZ: [f64; 3] = [8.3, 8.58, 8.9];

/// Picks the power value nearest each target frequency.
///
/// The spectrum is assumed linear over [`START_FREQ_GHZ`, `END_FREQ_GHZ`].
/// When a target falls exactly between two bin centers the lower index wins.
/// Values are returned in target order; an empty spectrum yields no values.
pub fn measure_power_at_frequencies(spectrum: &[f64], targets_ghz: &[f64]) -> Vec<f64> {
    if spectrum.is_empty() {
        return Vec::new();
    }

    let n = spectrum.len();
    let axis = |i: usize| {
        if n == 1 {
            START_FREQ_GHZ
        } else {
            START_FREQ_GHZ + (END_FREQ_GHZ - START_FREQ_GHZ) * i as f64 / (n - 1) as f64
        }
    };

    targets_ghz
        .iter()
        .map(|&target| {
            let mut best = 0;
            let mut best_delta = (axis(0) - target).abs();
            for i in 1..n {
                let delta = (axis(i) - target).abs();
                if delta < best_delta {
                    best = i;
                    best_delta = delta;
                }
            }
            spectrum[best]
        })
        .collect()
}
