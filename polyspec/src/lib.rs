//! Higher-order spectral estimation for sampled traces and event streams.
//!
//! `polyspec` estimates power spectra, bispectra, and trispectra as
//! frame-averaged, bias-corrected cumulants of windowed Fourier
//! coefficients. Datasets stream through the estimator frame by frame, so
//! memory stays bounded by the per-frame coefficient matrix rather than the
//! dataset length.
//!
//! Three ingestion regimes share one pipeline:
//!
//! * [`calc_spec`] for evenly sampled traces (FFT path),
//! * [`calc_spec_poisson`] for raw event timestamps (direct non-uniform
//!   Fourier sums, no binning),
//! * [`calc_spec_mini_bins`] for event timestamps histogrammed into
//!   fixed-width bins and run through the FFT path.
//!
//! ```
//! use polyspec::spectra::{calc_spec, CrossInput, OrderSelection, SpectrumConfig};
//!
//! let data: Vec<f64> = (0..4096).map(|i| (0.2 * i as f64).sin()).collect();
//! let config = SpectrumConfig {
//!     delta_t: Some(1.0),
//!     t_window: 64.0,
//!     f_max: 0.25,
//!     m: 8,
//!     m_var: 4,
//!     orders: OrderSelection::power_spectrum(),
//!     ..SpectrumConfig::default()
//! };
//! let result = calc_spec(&data, CrossInput::None, &config)?;
//! let s2 = result.s2.expect("order 2 was requested");
//! assert_eq!(s2.spectrum.len(), result.freq.len());
//! # Ok::<(), polyspec::kernel::ExecInvariantViolation>(())
//! ```
//!
//! [`calc_spec`]: spectra::calc_spec
//! [`calc_spec_poisson`]: spectra::calc_spec_poisson
//! [`calc_spec_mini_bins`]: spectra::calc_spec_mini_bins

#![warn(missing_docs)]

pub mod kernel;
pub mod plot;
pub mod spectra;
