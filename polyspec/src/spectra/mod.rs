//! Cumulant-based polyspectra estimation.
//!
//! The pipeline is frame-streaming: a dataset is segmented into frames of
//! `m` analysis windows, each frame is turned into a Fourier coefficient
//! matrix, the bias-corrected cumulant kernels reduce it to single-frame
//! spectrum estimates, and per-order accumulators fold those into averaged
//! spectra with block-variance error bars. The `driver` module ties the
//! stages together behind one [`FrameSource`] abstraction per ingestion
//! regime.
//!
//! [`FrameSource`]: driver::FrameSource

pub mod accumulator;
pub mod coeffs;
pub mod config;
pub mod cumulants;
pub mod driver;
pub mod frames;
pub mod window;

pub use accumulator::{BlockEvents, OrderAccumulator, OrderOutput};
pub use coeffs::{
    calc_a_w3, event_frame_coeffs, onesided_freqs, retained_bins, Complex64, SampledCoeffs,
};
pub use config::{OrderSelection, SpectrumConfig};
pub use cumulants::{c2, c3, c4, C2Kernel, C3Kernel, C4Kernel};
pub use driver::{
    calc_spec, calc_spec_mini_bins, calc_spec_poisson, BinnedSource, CrossInput, EventSource,
    FrameCoeffs, FrameSource, SampledSource, SpectrumEstimator, SpectrumResult,
};
pub use frames::{EventFrames, SampledFrames, SubWindow};
pub use window::{AnalysisWindow, EventWindow, WindowConfig};
