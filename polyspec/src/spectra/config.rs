//! Estimation run configuration.

use crate::kernel::ConfigError;
use crate::spectra::coeffs::Complex64;

/// Which spectrum orders to estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSelection {
    /// Power spectrum.
    pub s2: bool,
    /// Bispectrum.
    pub s3: bool,
    /// Trispectrum.
    pub s4: bool,
}

impl OrderSelection {
    /// All three orders.
    pub fn all() -> Self {
        Self {
            s2: true,
            s3: true,
            s4: true,
        }
    }

    /// Power spectrum only.
    pub fn power_spectrum() -> Self {
        Self {
            s2: true,
            s3: false,
            s4: false,
        }
    }

    /// Whether any order is selected.
    pub fn any(&self) -> bool {
        self.s2 || self.s3 || self.s4
    }
}

impl Default for OrderSelection {
    fn default() -> Self {
        Self::all()
    }
}

/// Configuration shared by every ingestion regime.
///
/// `t_window` is the analysis window duration in seconds; a frame spans
/// `m · t_window`. `m` is both the averaging width and the bias-correction
/// parameter of the cumulant estimators, so it bounds the highest order that
/// may be requested.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumConfig {
    /// Sample interval of sampled-mode data. Required for `calc_spec`;
    /// ignored by the event drivers.
    pub delta_t: Option<f64>,
    /// Analysis window duration in seconds.
    pub t_window: f64,
    /// Upper bound of the retained frequency grid in Hz.
    pub f_max: f64,
    /// Windows per frame.
    pub m: usize,
    /// Frames per error-estimate block.
    pub m_var: usize,
    /// Frames per stationarity snapshot block, if tracking drift.
    pub m_stationarity: Option<usize>,
    /// Orders to estimate.
    pub orders: OrderSelection,
    /// Skip mean subtraction in the order-2 estimator.
    pub coherent: bool,
    /// Use a rectangular window instead of the confined Gaussian.
    pub rect_win: bool,
    /// Frame advance in frame units; values below 1 overlap frames.
    pub window_shift: f64,
    /// Pre-multiplier applied to samples and binned counts.
    pub scaling_factor: f64,
    /// Known transfer function divided out of every coefficient column.
    pub filter: Option<Vec<Complex64>>,
    /// Decohere each window by a per-window random phase draw.
    pub random_phase: bool,
    /// Seed for the random-phase draws and synthetic white noise.
    pub seed: u64,
    /// Stop after this many frames regardless of remaining data.
    pub break_after: Option<usize>,
    /// Pinned expected frame count for the event-mode consistency guard.
    /// When unset, the guard uses the count derived from the dataset.
    pub expected_frames: Option<usize>,
    /// Plot the first frame's coefficient magnitudes (diagnostic).
    pub first_frame_plot: bool,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            delta_t: None,
            t_window: 1.0,
            f_max: 1.0,
            m: 10,
            m_var: 10,
            m_stationarity: None,
            orders: OrderSelection::default(),
            coherent: false,
            rect_win: false,
            window_shift: 1.0,
            scaling_factor: 1.0,
            filter: None,
            random_phase: false,
            seed: 42,
            break_after: None,
            expected_frames: None,
            first_frame_plot: false,
        }
    }
}

impl SpectrumConfig {
    /// Validate every precondition that does not depend on the dataset.
    ///
    /// Estimator `m` bounds are enforced here so that a too-small `m` fails
    /// before any frame is processed rather than as a division inside the
    /// cumulant math.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !self.t_window.is_finite() || self.t_window <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "t_window",
                reason: "t_window must be finite and > 0",
            });
        }
        if !self.f_max.is_finite() || self.f_max <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "f_max",
                reason: "f_max must be finite and > 0",
            });
        }
        if !self.orders.any() {
            return Err(ConfigError::InvalidArgument {
                arg: "orders",
                reason: "at least one spectrum order must be selected",
            });
        }
        if self.m == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "at least one window per frame is required",
            });
        }
        if self.orders.s2 && !self.coherent && self.m < 2 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "order-2 mean subtraction requires m > 1",
            });
        }
        if self.orders.s3 && self.m < 3 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "order-3 bias correction requires m > 2",
            });
        }
        if self.orders.s4 && self.m < 4 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "order-4 bias correction requires m > 3",
            });
        }
        if self.m_var < 2 {
            return Err(ConfigError::InvalidArgument {
                arg: "m_var",
                reason: "block variance requires m_var > 1",
            });
        }
        if self.m_stationarity == Some(0) {
            return Err(ConfigError::InvalidArgument {
                arg: "m_stationarity",
                reason: "stationarity blocks must hold at least one frame",
            });
        }
        if !self.window_shift.is_finite() || self.window_shift <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "window_shift",
                reason: "window_shift must be finite and > 0",
            });
        }
        if !self.scaling_factor.is_finite() {
            return Err(ConfigError::InvalidArgument {
                arg: "scaling_factor",
                reason: "scaling_factor must be finite",
            });
        }
        Ok(())
    }
}
