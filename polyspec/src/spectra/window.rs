//! Approximate confined Gaussian analysis windows.
//!
//! The same window shape is used for sampled data (evaluated at integer
//! sample positions) and for event timestamps (evaluated at fractional
//! positions against a fixed-resolution reference grid).

use crate::kernel::{ConfigError, KernelLifecycle};

/// Temporal width parameter of the approximate confined Gaussian window.
pub const SIGMA_T: f64 = 0.14;

/// Fixed reference resolution used to normalize event-mode windows.
pub const N_WINDOW_FULL: usize = 70;

/// Evaluate the approximate confined Gaussian shape at position `x` for a
/// window of `n_window` samples. `x` may be fractional (event mode).
pub(crate) fn confined_gaussian(x: f64, n_window: usize) -> f64 {
    let n = n_window as f64;
    let l = n + 1.0;
    let g = |x: f64| {
        let u = (x - n / 2.0) / (2.0 * l * SIGMA_T);
        (-u * u).exp()
    };
    g(x) - g(-0.5) * (g(x + l) + g(x - l)) / (g(-0.5 + l) + g(-0.5 - l))
}

/// Constructor config for [`AnalysisWindow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    /// Window length in samples.
    pub n_window: usize,
    /// Sampling rate in Hz.
    pub fs: f64,
    /// Rectangular (all-ones) mode, used for unweighted comparison runs.
    pub ones: bool,
}

/// A sampled analysis window together with its normalization constant.
///
/// Immutable once built for a given `(n_window, fs)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisWindow {
    samples: Vec<f64>,
    norm: f64,
    fs: f64,
}

impl KernelLifecycle for AnalysisWindow {
    type Config = WindowConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.n_window == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "n_window",
                reason: "window length must be greater than zero",
            });
        }
        if !config.fs.is_finite() || config.fs <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "fs",
                reason: "fs must be finite and > 0",
            });
        }

        let samples: Vec<f64> = if config.ones {
            vec![1.0; config.n_window]
        } else {
            (0..config.n_window)
                .map(|i| confined_gaussian(i as f64, config.n_window))
                .collect()
        };
        let norm = samples.iter().map(|w| w * w).sum::<f64>() / config.fs;
        Ok(Self {
            samples,
            norm,
            fs: config.fs,
        })
    }
}

impl AnalysisWindow {
    /// Window coefficients.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Window length in samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window is empty (never true for a constructed window).
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `Σ w² / fs`, the second-order normalization constant.
    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// Sample interval the window was built for.
    pub fn dt(&self) -> f64 {
        1.0 / self.fs
    }

    /// Per-order scale divisor `dt · Σ(w^order)`.
    ///
    /// The exponent generalizes the order-2 Parseval normalization to the
    /// higher orders without a separate derivation; this exact form is pinned
    /// by tests and deliberately not "corrected".
    pub fn order_norm(&self, order: u32) -> f64 {
        let sum: f64 = self.samples.iter().map(|w| w.powi(order as i32)).sum();
        self.dt() * sum
    }
}

/// Window evaluation for irregular event timestamps.
///
/// Events in a sub-interval of duration `t_window` are weighted by the same
/// confined Gaussian shape as sampled data, evaluated at the fractional
/// positions `x = t / dt_full`. Normalization uses a reference window at the
/// fixed [`N_WINDOW_FULL`] resolution so that event-mode estimates are
/// commensurable with sampled ones.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWindow {
    reference: AnalysisWindow,
    dt_full: f64,
    ones: bool,
}

impl EventWindow {
    /// Build the event window for sub-intervals of duration `t_window`.
    pub fn try_new(t_window: f64, ones: bool) -> Result<Self, ConfigError> {
        if !t_window.is_finite() || t_window <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "t_window",
                reason: "t_window must be finite and > 0",
            });
        }
        let dt_full = t_window / N_WINDOW_FULL as f64;
        let reference = AnalysisWindow::try_new(WindowConfig {
            n_window: N_WINDOW_FULL,
            fs: 1.0 / dt_full,
            ones,
        })?;
        Ok(Self {
            reference,
            dt_full,
            ones,
        })
    }

    /// Reference window used for normalization.
    pub fn reference(&self) -> &AnalysisWindow {
        &self.reference
    }

    /// Reference sample interval `t_window / N_WINDOW_FULL`.
    pub fn dt_full(&self) -> f64 {
        self.dt_full
    }

    /// Window weights at event times `t` (relative to the sub-window start).
    pub fn weights(&self, times: &[f64]) -> Vec<f64> {
        if self.ones {
            return vec![1.0; times.len()];
        }
        times
            .iter()
            .map(|&t| confined_gaussian(t / self.dt_full, N_WINDOW_FULL))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rectangular_mode_returns_all_ones() {
        let win = AnalysisWindow::try_new(WindowConfig {
            n_window: 16,
            fs: 4.0,
            ones: true,
        })
        .expect("valid config");
        assert!(win.samples().iter().all(|&w| w == 1.0));
        assert_abs_diff_eq!(win.norm(), 16.0 / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn confined_gaussian_window_is_symmetric_and_positive() {
        let n = 64;
        let win = AnalysisWindow::try_new(WindowConfig {
            n_window: n,
            fs: 1.0,
            ones: false,
        })
        .expect("valid config");
        let w = win.samples();
        for i in 0..n {
            assert!(w[i] > 0.0);
            // symmetric around (n-1)/2
            assert_abs_diff_eq!(w[i], w[n - 1 - i], epsilon = 1e-9);
        }
        let peak = w.iter().cloned().fold(f64::MIN, f64::max);
        assert!(peak <= 1.0 + 1e-12);
        // tapered at the edges
        assert!(w[0] < 0.2 * peak);
    }

    #[test]
    fn norm_matches_sum_of_squares_over_fs() {
        let win = AnalysisWindow::try_new(WindowConfig {
            n_window: 32,
            fs: 10.0,
            ones: false,
        })
        .expect("valid config");
        let expected: f64 = win.samples().iter().map(|w| w * w).sum::<f64>() / 10.0;
        assert_abs_diff_eq!(win.norm(), expected, epsilon = 1e-12);
    }

    #[test]
    fn order_normalization_is_pinned() {
        // The order-k divisor is dt * Σ w^k for every k, including k > 2.
        let win = AnalysisWindow::try_new(WindowConfig {
            n_window: 8,
            fs: 2.0,
            ones: false,
        })
        .expect("valid config");
        for order in [2u32, 3, 4] {
            let expected: f64 = win
                .samples()
                .iter()
                .map(|w| w.powi(order as i32))
                .sum::<f64>()
                * 0.5;
            assert_abs_diff_eq!(win.order_norm(order), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn event_weights_match_reference_window_on_the_grid() {
        let event = EventWindow::try_new(7.0, false).expect("valid config");
        let dt = event.dt_full();
        let grid: Vec<f64> = (0..N_WINDOW_FULL).map(|i| i as f64 * dt).collect();
        let weights = event.weights(&grid);
        for (w, r) in weights.iter().zip(event.reference().samples()) {
            assert_abs_diff_eq!(w, r, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_length_window_is_rejected() {
        let err = AnalysisWindow::try_new(WindowConfig {
            n_window: 0,
            fs: 1.0,
            ones: false,
        })
        .expect_err("zero-length window must fail");
        assert!(matches!(err, ConfigError::InvalidArgument { arg: "n_window", .. }));
    }
}
