//! Per-frame Fourier coefficient production.
//!
//! Sampled frames go through a windowed real-to-complex FFT with unit scale;
//! event frames go through a direct non-uniform Fourier sum against the
//! windowed timestamps. Either way the result is a frequency-major complex
//! matrix `a_w` of shape `(F, m)` with `F` the retained bins `f ≤ f_max`,
//! produced fresh per frame and never persisted past it.

use std::sync::Arc;

use ndarray::{Array2, Array3, ArrayView2};
use rand::rngs::StdRng;
use rand::Rng;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::kernel::{ConfigError, ExecInvariantViolation};
use crate::spectra::window::{AnalysisWindow, EventWindow};

/// Complex sample type used throughout the estimation engine.
pub type Complex64 = Complex<f64>;

/// One-sided frequency grid `k / (n·dt)` for `k = 0..n/2`.
pub fn onesided_freqs(n: usize, dt: f64) -> Vec<f64> {
    (0..=n / 2).map(|k| k as f64 / (n as f64 * dt)).collect()
}

/// Number of leading bins of `freqs` with `f ≤ f_max`.
pub fn retained_bins(freqs: &[f64], f_max: f64) -> usize {
    freqs.iter().take_while(|&&f| f <= f_max).count()
}

/// Windowed FFT producer for sampled (or binned) frames.
///
/// Owns the FFT plan so repeated frames reuse it; the plan is the only
/// compute-context state and is injected by construction, never global.
pub struct SampledCoeffs {
    window: AnalysisWindow,
    fft: Arc<dyn Fft<f64>>,
    freqs: Vec<f64>,
    f_max_ind: usize,
}

impl SampledCoeffs {
    /// Build a producer for windows of `window.len()` samples, retaining
    /// frequencies up to `f_max`.
    pub fn try_new(window: AnalysisWindow, f_max: f64) -> Result<Self, ConfigError> {
        if !f_max.is_finite() || f_max <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "f_max",
                reason: "f_max must be finite and > 0",
            });
        }
        let freqs = onesided_freqs(window.len(), window.dt());
        let f_max_ind = retained_bins(&freqs, f_max);
        if f_max_ind == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "f_max",
                reason: "f_max retains no frequency bins",
            });
        }
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(window.len());
        let mut freqs = freqs;
        freqs.truncate(f_max_ind);
        Ok(Self {
            window,
            fft,
            freqs,
            f_max_ind,
        })
    }

    /// Retained frequency grid.
    pub fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    /// The analysis window in use.
    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }

    /// Windowed coefficients for one frame of `m` contiguous segments.
    ///
    /// `frame` must hold `m · window_points` samples; segment `k` occupies
    /// column `k` of the output.
    pub fn frame_coeffs(
        &self,
        frame: &[f64],
        m: usize,
        scaling_factor: f64,
    ) -> Result<Array2<Complex64>, ExecInvariantViolation> {
        let n = self.window.len();
        if frame.len() != n * m {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "frame",
                expected: n * m,
                got: frame.len(),
            });
        }
        let mut a_w = Array2::<Complex64>::zeros((self.f_max_ind, m));
        let mut buf = vec![Complex64::new(0.0, 0.0); n];
        let w = self.window.samples();
        for k in 0..m {
            let segment = &frame[k * n..(k + 1) * n];
            for i in 0..n {
                buf[i] = Complex64::new(segment[i] * scaling_factor * w[i], 0.0);
            }
            self.fft.process(&mut buf);
            for f in 0..self.f_max_ind {
                a_w[[f, k]] = buf[f];
            }
        }
        Ok(a_w)
    }
}

/// Direct non-uniform Fourier sum for one frame of event sub-windows.
///
/// For each retained frequency `f` and sub-window `k`,
/// `a_w[f, k] = Σ_t g(t)·exp(i·2π·f·t)` with `t` relative to the sub-window
/// start. An empty sub-window contributes an all-zero column, which is the
/// mathematically correct zero-event contribution and is never filtered out.
pub fn event_frame_coeffs(
    freqs: &[f64],
    window: &EventWindow,
    times: &[f64],
    subs: &[crate::spectra::frames::SubWindow],
) -> Array2<Complex64> {
    let mut a_w = Array2::<Complex64>::zeros((freqs.len(), subs.len()));
    let mut rel = Vec::new();
    for (k, sub) in subs.iter().enumerate() {
        rel.clear();
        rel.extend(
            times[sub.events.clone()]
                .iter()
                .map(|&t| t - sub.start_time),
        );
        if rel.is_empty() {
            continue;
        }
        let weights = window.weights(&rel);
        for (f, &freq) in freqs.iter().enumerate() {
            let w_ang = 2.0 * std::f64::consts::PI * freq;
            let mut sum = Complex64::new(0.0, 0.0);
            for (&t, &g) in rel.iter().zip(weights.iter()) {
                sum += g * Complex64::new(0.0, w_ang * t).exp();
            }
            a_w[[f, k]] = sum;
        }
    }
    a_w
}

/// Tile the coefficient array into the third bispectrum axis:
/// `a_w3[i, j, k] = conj(a_w[i + j, k])` for `i, j` over the half range.
///
/// The half range is structural: the third frequency is derived as
/// `w3 = -w1 - w2`, so `w1 + w2` must stay inside the retained grid.
pub fn calc_a_w3(a_w: ArrayView2<'_, Complex64>) -> Array3<Complex64> {
    let f_half = a_w.nrows() / 2;
    let m = a_w.ncols();
    let mut a_w3 = Array3::<Complex64>::zeros((f_half, f_half, m));
    for i in 0..f_half {
        for j in 0..f_half {
            for k in 0..m {
                a_w3[[i, j, k]] = a_w[[i + j, k]].conj();
            }
        }
    }
    a_w3
}

/// Divide out a known transfer function, bin by bin.
pub fn apply_transfer_filter(
    a_w: &mut Array2<Complex64>,
    filter: &[Complex64],
) -> Result<(), ExecInvariantViolation> {
    if filter.len() != a_w.nrows() {
        return Err(ExecInvariantViolation::LengthMismatch {
            arg: "filter",
            expected: a_w.nrows(),
            got: filter.len(),
        });
    }
    for (f, row) in a_w.outer_iter_mut().enumerate() {
        let h = filter[f];
        for v in row {
            *v /= h;
        }
    }
    Ok(())
}

/// Multiply each window's coefficients by `exp(i·2π·f·r)` with one draw
/// `r ~ Uniform(0, window_width)` per window, shared across all frequencies
/// of that window. Decoheres artificially coherent signals. A correlation
/// channel, when present, receives the same rotation as the main channel so
/// that cross relations within the window survive the shift.
pub fn apply_random_phase(
    a_w: &mut Array2<Complex64>,
    mut a_w_corr: Option<&mut Array2<Complex64>>,
    freqs: &[f64],
    window_width: f64,
    rng: &mut StdRng,
) {
    for k in 0..a_w.ncols() {
        let r: f64 = rng.gen_range(0.0..window_width);
        for (f, &freq) in freqs.iter().enumerate() {
            let phase = Complex64::new(0.0, 2.0 * std::f64::consts::PI * freq * r).exp();
            a_w[[f, k]] *= phase;
            if let Some(corr) = a_w_corr.as_deref_mut() {
                corr[[f, k]] *= phase;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelLifecycle;
    use crate::spectra::frames::SubWindow;
    use crate::spectra::window::{WindowConfig, N_WINDOW_FULL};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    fn producer(n: usize, dt: f64, f_max: f64) -> SampledCoeffs {
        let window = AnalysisWindow::try_new(WindowConfig {
            n_window: n,
            fs: 1.0 / dt,
            ones: false,
        })
        .expect("window");
        SampledCoeffs::try_new(window, f_max).expect("producer")
    }

    #[test]
    fn zero_signal_yields_zero_coefficients() {
        let p = producer(32, 1.0, 0.5);
        let frame = vec![0.0; 32 * 3];
        let a_w = p.frame_coeffs(&frame, 3, 1.0).expect("coeffs");
        assert!(a_w.iter().all(|c| c.norm() == 0.0));
    }

    #[test]
    fn frequency_grid_is_truncated_at_f_max() {
        let p = producer(64, 1.0, 0.25);
        // bins k/64 for k=0..=16 satisfy f <= 0.25
        assert_eq!(p.freqs().len(), 17);
        assert_abs_diff_eq!(p.freqs()[16], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn calc_a_w3_on_ones_is_ones() {
        let a_w = Array2::<Complex64>::from_elem((8, 3), Complex64::new(1.0, 0.0));
        let a_w3 = calc_a_w3(a_w.view());
        assert_eq!(a_w3.dim(), (4, 4, 3));
        assert!(a_w3.iter().all(|c| (c - Complex64::new(1.0, 0.0)).norm() < 1e-15));
    }

    #[test]
    fn event_sum_matches_fft_on_grid_aligned_events() {
        // Events at every reference grid point with unit weight equal the
        // conjugate of an rfft of the window itself.
        let t_window = 1.0;
        let event = EventWindow::try_new(t_window, false).expect("event window");
        let dt = event.dt_full();
        let times: Vec<f64> = (0..N_WINDOW_FULL).map(|i| i as f64 * dt).collect();
        let freqs = onesided_freqs(N_WINDOW_FULL, dt);
        let subs = vec![SubWindow {
            start_time: 0.0,
            events: 0..times.len(),
        }];
        let a_ev = event_frame_coeffs(&freqs[..10], &event, &times, &subs);

        let window = event.reference().clone();
        let p = SampledCoeffs::try_new(window, freqs[9]).expect("producer");
        let frame = vec![1.0; N_WINDOW_FULL];
        let a_fft = p.frame_coeffs(&frame, 1, 1.0).expect("coeffs");

        for f in 0..10 {
            assert_abs_diff_eq!(a_ev[[f, 0]].norm(), a_fft[[f, 0]].norm(), epsilon = 1e-8);
        }
    }

    #[test]
    fn empty_sub_window_contributes_zero_column() {
        let event = EventWindow::try_new(1.0, false).expect("event window");
        let times = [0.1, 0.2];
        let subs = vec![
            SubWindow {
                start_time: 0.0,
                events: 0..2,
            },
            SubWindow {
                start_time: 1.0,
                events: 2..2,
            },
        ];
        let a_w = event_frame_coeffs(&[0.0, 1.0, 2.0], &event, &times, &subs);
        assert!(a_w.column(1).iter().all(|c| c.norm() == 0.0));
        assert!(a_w.column(0).iter().any(|c| c.norm() > 0.0));
    }

    #[test]
    fn transfer_filter_divides_each_bin() {
        let mut a_w = Array2::<Complex64>::from_elem((2, 2), Complex64::new(4.0, 0.0));
        let filter = [Complex64::new(2.0, 0.0), Complex64::new(4.0, 0.0)];
        apply_transfer_filter(&mut a_w, &filter).expect("filter");
        assert_abs_diff_eq!(a_w[[0, 0]].re, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a_w[[1, 1]].re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn random_phase_preserves_magnitudes_and_is_uniform_per_window() {
        let mut rng = StdRng::seed_from_u64(7);
        let freqs = [0.0, 1.0, 2.0];
        let mut a_w = Array2::<Complex64>::from_elem((3, 2), Complex64::new(1.0, 0.0));
        apply_random_phase(&mut a_w, None, &freqs, 1.0, &mut rng);
        for c in a_w.iter() {
            assert_abs_diff_eq!(c.norm(), 1.0, epsilon = 1e-12);
        }
        // f = 0 is never rotated; within a window the phase is linear in f,
        // so the bin-2 rotation is the square of the bin-1 rotation.
        for k in 0..2 {
            assert_abs_diff_eq!(a_w[[0, k]].re, 1.0, epsilon = 1e-12);
            let expected = a_w[[1, k]] * a_w[[1, k]];
            assert_abs_diff_eq!(a_w[[2, k]].re, expected.re, epsilon = 1e-12);
            assert_abs_diff_eq!(a_w[[2, k]].im, expected.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn random_phase_rotates_both_channels_identically() {
        let mut rng = StdRng::seed_from_u64(19);
        let freqs = [0.0, 0.5, 1.0, 1.5];
        let mut a_w = Array2::<Complex64>::from_elem((4, 3), Complex64::new(1.0, 0.0));
        let mut a_corr = Array2::<Complex64>::from_elem((4, 3), Complex64::new(2.0, 0.0));
        apply_random_phase(&mut a_w, Some(&mut a_corr), &freqs, 1.0, &mut rng);
        for (x, y) in a_w.iter().zip(a_corr.iter()) {
            assert_abs_diff_eq!((y - 2.0 * x).norm(), 0.0, epsilon = 1e-12);
        }
    }
}
