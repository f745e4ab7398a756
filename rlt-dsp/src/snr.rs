use std::sync::Arc;

use num_complex::Complex;
use rlt_device::CaptureMatrix;
use rustfft::{Fft, FftPlanner};

/// Transform length for every capture row; rows are zero-padded or truncated
/// to fit.
pub const FFT_LEN: usize = 512;

/// Radar ADC sampling rate.
pub const SAMPLING_RATE_GHZ: f64 = 23.238;

/// Real-input spectrum length, bins 0..=FFT_LEN/2.
const SPECTRUM_BINS: usize = FFT_LEN / 2 + 1;

// 8.0-9.5 GHz guard band at the sampling rate above, used as the noise floor
// window.
const NOISE_BAND_START: usize = 176;
const NOISE_BAND_END: usize = 209;

/// Number of per-call SNR ratios averaged by `mean_snr_db`.
const RING_SLOTS: usize = 10;

/// Turns capture matrices into an averaged SNR figure.
///
/// Each recorded matrix contributes one signal/noise ratio to a fixed ring;
/// `mean_snr_db` averages whatever the ring currently holds, so ten captures
/// of a sector fully replace the previous sector's contribution.
pub struct SnrEngine {
    fft: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex<f64>>,
    ring: [f64; RING_SLOTS],
    filled: usize,
    next: usize,
}

impl Default for SnrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SnrEngine {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();

        Self {
            fft: planner.plan_fft_forward(FFT_LEN),
            scratch: vec![Complex::new(0.0, 0.0); FFT_LEN],
            ring: [0.0; RING_SLOTS],
            filled: 0,
            next: 0,
        }
    }

    /// Computes one SNR ratio from a capture burst and pushes it into the
    /// ring, overwriting the oldest entry once full.
    ///
    /// Per row: 512-point real-input DFT, magnitude squared. The power
    /// spectra are averaged across rows; noise is the median of the guard
    /// band, signal the global spectrum maximum.
    pub fn record_snr_sample(&mut self, matrix: &CaptureMatrix) {
        if matrix.row_count() == 0 {
            return;
        }

        let mut mean_power = [0.0f64; SPECTRUM_BINS];

        for row in matrix.rows() {
            self.scratch.fill(Complex::new(0.0, 0.0));
            for (slot, &sample) in self.scratch.iter_mut().zip(row.iter()).take(FFT_LEN) {
                slot.re = sample as f64;
            }

            self.fft.process(&mut self.scratch);

            for (acc, bin) in mean_power.iter_mut().zip(self.scratch.iter()) {
                *acc += bin.norm_sqr();
            }
        }

        let rows = matrix.row_count() as f64;
        for p in mean_power.iter_mut() {
            *p /= rows;
        }

        let noise = median(&mean_power[NOISE_BAND_START..NOISE_BAND_END]);
        let signal = mean_power.iter().copied().fold(f64::MIN, f64::max);

        self.push_ratio(signal / noise);
    }

    fn push_ratio(&mut self, ratio: f64) {
        self.ring[self.next] = ratio;
        self.next = (self.next + 1) % RING_SLOTS;
        self.filled = (self.filled + 1).min(RING_SLOTS);
    }

    /// `10 * log10(mean ratio)` over the recorded samples, or `None` before
    /// the first `record_snr_sample` call.
    pub fn mean_snr_db(&self) -> Option<f64> {
        if self.filled == 0 {
            return None;
        }

        let mean = self.ring[..self.filled].iter().sum::<f64>() / self.filled as f64;
        Some(10.0 * mean.log10())
    }
}

// Garbled DUT datagrams decode to arbitrary f32 bit patterns, so the power
// values here can be NaN. total_cmp keeps the sort well defined; a NaN median
// yields a NaN ratio, which the verdict counts as a failing cell.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
