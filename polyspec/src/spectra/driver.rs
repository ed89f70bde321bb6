//! Estimation drivers: frame sources and the streaming spectrum loop.
//!
//! The three ingestion regimes (sampled traces, raw event timestamps, binned
//! event counts) differ only in how a frame of Fourier coefficients is
//! produced. Each is a [`FrameSource`]; the [`SpectrumEstimator`] loop on top
//! of them is regime-agnostic and runs the per-frame cumulant kernels and the
//! per-order accumulators identically for all three.

use log::{debug, info, warn};
use ndarray::{s, Array2, Ix1, Ix2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D};
use crate::plot;
use crate::spectra::accumulator::{OrderAccumulator, OrderOutput};
use crate::spectra::coeffs::{
    apply_random_phase, apply_transfer_filter, calc_a_w3, event_frame_coeffs, Complex64,
    SampledCoeffs,
};
use crate::spectra::config::SpectrumConfig;
use crate::spectra::cumulants::{C2Config, C2Kernel, C3Config, C3Kernel, C4Config, C4Kernel};
use crate::spectra::frames::{EventFrames, SampledFrames};
use crate::spectra::window::{AnalysisWindow, EventWindow, WindowConfig};

/// One frame's Fourier coefficients, window-major in columns.
#[derive(Debug, Clone)]
pub struct FrameCoeffs {
    /// Main channel, shape `(F, m)`.
    pub a_w: Array2<Complex64>,
    /// Optional correlation channel of the same shape.
    pub a_w_corr: Option<Array2<Complex64>>,
}

/// A streaming producer of coefficient frames for one ingestion regime.
///
/// Sources own their dataset cursor; `next_frame` never rewinds. `freqs` and
/// `order_norm` are fixed for the lifetime of the source, so the estimator
/// queries them once up front.
pub trait FrameSource {
    /// Retained frequency grid, shared by every frame.
    fn freqs(&self) -> &[f64];

    /// Normalization divisor for the given cumulant order.
    fn order_norm(&self, order: u32) -> f64;

    /// Frames this source is expected to yield over the full dataset.
    fn expected_frames(&self) -> usize;

    /// Produce the next frame, or `None` at end of data.
    fn next_frame(&mut self) -> Result<Option<FrameCoeffs>, ExecInvariantViolation>;

    /// Whether a mismatch between yielded and expected frames is fatal.
    ///
    /// Event timestamps carry their own clock, so falling short of the
    /// coverage the final timestamp implies indicates a corrupt dataset.
    /// Sampled data has no such cross-check.
    fn enforce_frame_count(&self) -> bool {
        false
    }
}

/// Correlation-channel input for the sampled-data driver.
#[derive(Debug, Clone, Copy)]
pub enum CrossInput<'a> {
    /// Auto-spectra only.
    None,
    /// A second measured trace, sample-aligned with the main one.
    Data(&'a [f64]),
    /// A synthetic unit-variance white-noise trace, for calibrating the
    /// cross-spectrum noise floor of a given windowing setup.
    SyntheticWhiteNoise,
}

enum CorrTrace<'a> {
    Borrowed(&'a [f64]),
    Owned(Vec<f64>),
}

impl CorrTrace<'_> {
    fn as_slice(&self) -> &[f64] {
        match self {
            CorrTrace::Borrowed(s) => s,
            CorrTrace::Owned(v) => v,
        }
    }
}

/// Frame source over an evenly sampled trace.
pub struct SampledSource<'a> {
    producer: SampledCoeffs,
    frames: SampledFrames,
    data: &'a [f64],
    corr: Option<CorrTrace<'a>>,
    m: usize,
    scaling_factor: f64,
}

impl<'a> SampledSource<'a> {
    /// Build a source over `data`, deriving the window length from
    /// `t_window / delta_t`.
    pub fn try_new(
        data: &'a [f64],
        corr: CrossInput<'a>,
        config: &SpectrumConfig,
    ) -> Result<Self, ConfigError> {
        if data.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "data" });
        }
        let delta_t = config.delta_t.ok_or(ConfigError::MissingValue { arg: "delta_t" })?;
        if !delta_t.is_finite() || delta_t <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "delta_t",
                reason: "delta_t must be finite and > 0",
            });
        }
        let window_points = (config.t_window / delta_t).round() as usize;
        if window_points == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "t_window",
                reason: "t_window must cover at least one sample",
            });
        }
        let window = AnalysisWindow::try_new(WindowConfig {
            n_window: window_points,
            fs: 1.0 / delta_t,
            ones: config.rect_win,
        })?;
        let producer = SampledCoeffs::try_new(window, config.f_max)?;
        let frames =
            SampledFrames::try_new(data.len(), window_points, config.m, config.window_shift)?;

        let corr = match corr {
            CrossInput::None => None,
            CrossInput::Data(trace) => {
                if trace.len() != data.len() {
                    return Err(ConfigError::LengthMismatch {
                        arg: "corr",
                        expected: data.len(),
                        got: trace.len(),
                    });
                }
                Some(CorrTrace::Borrowed(trace))
            }
            CrossInput::SyntheticWhiteNoise => {
                // Offset seed keeps the noise trace decoupled from the
                // random-phase draws, which consume the base seed.
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
                let noise: Vec<f64> = (0..data.len())
                    .map(|_| rng.sample::<f64, _>(StandardNormal))
                    .collect();
                Some(CorrTrace::Owned(noise))
            }
        };

        Ok(Self {
            producer,
            frames,
            data,
            corr,
            m: config.m,
            scaling_factor: config.scaling_factor,
        })
    }
}

impl FrameSource for SampledSource<'_> {
    fn freqs(&self) -> &[f64] {
        self.producer.freqs()
    }

    fn order_norm(&self, order: u32) -> f64 {
        self.producer.window().order_norm(order)
    }

    fn expected_frames(&self) -> usize {
        self.frames.frame_count()
    }

    fn next_frame(&mut self) -> Result<Option<FrameCoeffs>, ExecInvariantViolation> {
        let Some(start) = self.frames.next_start() else {
            return Ok(None);
        };
        let end = start + self.frames.frame_points();
        let a_w = self
            .producer
            .frame_coeffs(&self.data[start..end], self.m, self.scaling_factor)?;
        let a_w_corr = match &self.corr {
            Some(trace) => Some(self.producer.frame_coeffs(
                &trace.as_slice()[start..end],
                self.m,
                self.scaling_factor,
            )?),
            None => None,
        };
        Ok(Some(FrameCoeffs { a_w, a_w_corr }))
    }
}

/// Frame source over sorted event timestamps, via the direct Fourier sum.
pub struct EventSource<'a> {
    window: EventWindow,
    frames: EventFrames,
    times: &'a [f64],
    freqs: Vec<f64>,
    expected: usize,
    scaling_factor: f64,
}

impl<'a> EventSource<'a> {
    /// Build a source over sorted timestamps.
    pub fn try_new(times: &'a [f64], config: &SpectrumConfig) -> Result<Self, ConfigError> {
        if times.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "times" });
        }
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(ConfigError::InvalidArgument {
                arg: "times",
                reason: "timestamps must be sorted ascending",
            });
        }
        let window = EventWindow::try_new(config.t_window, config.rect_win)?;
        let frames = EventFrames::try_new(config.t_window, config.m)?;
        // Grid spacing 1 / t_window, up to and including f_max.
        let k_max = (config.f_max * config.t_window).floor() as usize;
        let freqs: Vec<f64> = (0..=k_max).map(|k| k as f64 / config.t_window).collect();
        let expected = config
            .expected_frames
            .unwrap_or_else(|| frames.expected_frames(times));
        Ok(Self {
            window,
            frames,
            times,
            freqs,
            expected,
            scaling_factor: config.scaling_factor,
        })
    }
}

impl FrameSource for EventSource<'_> {
    fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    fn order_norm(&self, order: u32) -> f64 {
        self.window.reference().order_norm(order)
    }

    fn expected_frames(&self) -> usize {
        self.expected
    }

    fn next_frame(&mut self) -> Result<Option<FrameCoeffs>, ExecInvariantViolation> {
        let Some(subs) = self.frames.next_frame(self.times) else {
            return Ok(None);
        };
        let mut a_w = event_frame_coeffs(&self.freqs, &self.window, self.times, &subs);
        if self.scaling_factor != 1.0 {
            let s = self.scaling_factor;
            a_w.mapv_inplace(|v| v * s);
        }
        Ok(Some(FrameCoeffs {
            a_w,
            a_w_corr: None,
        }))
    }

    fn enforce_frame_count(&self) -> bool {
        true
    }
}

/// Frame source that histograms event timestamps into fixed-width bins and
/// then runs the sampled FFT path over the counts with `delta_t = t_bin`.
pub struct BinnedSource {
    producer: SampledCoeffs,
    frames: SampledFrames,
    counts: Vec<f64>,
    m: usize,
    scaling_factor: f64,
}

impl BinnedSource {
    /// Build a source binning `times` at width `t_bin`. `t_window` must be an
    /// integer multiple of `t_bin` so that windows tile the bin grid exactly.
    pub fn try_new(
        times: &[f64],
        t_bin: f64,
        config: &SpectrumConfig,
    ) -> Result<Self, ConfigError> {
        if times.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "times" });
        }
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(ConfigError::InvalidArgument {
                arg: "times",
                reason: "timestamps must be sorted ascending",
            });
        }
        if !t_bin.is_finite() || t_bin <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "t_bin",
                reason: "t_bin must be finite and > 0",
            });
        }
        let ratio = config.t_window / t_bin;
        if (ratio - ratio.round()).abs() > 1e-9 * ratio.abs() {
            return Err(ConfigError::InvalidArgument {
                arg: "t_bin",
                reason: "t_window must be an integer multiple of t_bin",
            });
        }
        let window_points = ratio.round() as usize;
        if window_points == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "t_bin",
                reason: "t_bin must not exceed t_window",
            });
        }

        // Only complete bins are kept; a partial trailing bin would bias the
        // last window's counts low.
        let last = times[times.len() - 1];
        let n_bins = (last / t_bin) as usize;
        if n_bins == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "t_bin",
                reason: "dataset spans less than one bin",
            });
        }
        let mut counts = vec![0.0f64; n_bins];
        for &t in times {
            let idx = (t / t_bin) as usize;
            if idx < n_bins {
                counts[idx] += 1.0;
            }
        }

        let window = AnalysisWindow::try_new(WindowConfig {
            n_window: window_points,
            fs: 1.0 / t_bin,
            ones: config.rect_win,
        })?;
        let producer = SampledCoeffs::try_new(window, config.f_max)?;
        let frames =
            SampledFrames::try_new(counts.len(), window_points, config.m, config.window_shift)?;
        Ok(Self {
            producer,
            frames,
            counts,
            m: config.m,
            scaling_factor: config.scaling_factor,
        })
    }
}

impl FrameSource for BinnedSource {
    fn freqs(&self) -> &[f64] {
        self.producer.freqs()
    }

    fn order_norm(&self, order: u32) -> f64 {
        self.producer.window().order_norm(order)
    }

    fn expected_frames(&self) -> usize {
        self.frames.frame_count()
    }

    fn next_frame(&mut self) -> Result<Option<FrameCoeffs>, ExecInvariantViolation> {
        let Some(start) = self.frames.next_start() else {
            return Ok(None);
        };
        let end = start + self.frames.frame_points();
        let a_w = self
            .producer
            .frame_coeffs(&self.counts[start..end], self.m, self.scaling_factor)?;
        Ok(Some(FrameCoeffs {
            a_w,
            a_w_corr: None,
        }))
    }
}

/// Finalized multi-order estimation result.
#[derive(Debug, Clone)]
pub struct SpectrumResult {
    /// Retained frequency grid for orders 2 and 4.
    pub freq: Vec<f64>,
    /// Half grid spanned by each bispectrum axis.
    pub freq_half: Vec<f64>,
    /// Power spectrum output, when requested.
    pub s2: Option<OrderOutput<Ix1>>,
    /// Bispectrum output over `(freq_half, freq_half)`, when requested.
    pub s3: Option<OrderOutput<Ix2>>,
    /// Trispectrum output over `(freq, freq)`, when requested.
    pub s4: Option<OrderOutput<Ix2>>,
    /// Frames folded into the outputs.
    pub frames_processed: usize,
}

/// Regime-agnostic streaming estimation loop.
pub struct SpectrumEstimator {
    config: SpectrumConfig,
    rng: StdRng,
}

impl KernelLifecycle for SpectrumEstimator {
    type Config = SpectrumConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self { config, rng })
    }
}

impl SpectrumEstimator {
    /// Drain `source` and return the finalized spectra.
    ///
    /// Fails when the dataset cannot fill a single frame, and, for sources
    /// that enforce it, when the yielded frame count diverges from the
    /// dataset's expected coverage (unless `break_after` cut the run short).
    pub fn run<S: FrameSource>(
        &mut self,
        source: &mut S,
    ) -> Result<SpectrumResult, ExecInvariantViolation> {
        let freqs: Vec<f64> = source.freqs().to_vec();
        let f_bins = freqs.len();
        let f_half = f_bins / 2;
        let orders = self.config.orders;
        let m = self.config.m;
        let m_var = self.config.m_var;
        let m_stationarity = self.config.m_stationarity;
        let t_window = self.config.t_window;

        if orders.s3 && f_half == 0 {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "bispectrum needs at least two retained frequency bins",
            });
        }
        if let Some(filter) = &self.config.filter {
            if filter.len() != f_bins {
                return Err(ExecInvariantViolation::LengthMismatch {
                    arg: "filter",
                    expected: f_bins,
                    got: filter.len(),
                });
            }
        }

        let c2k = orders
            .s2
            .then(|| {
                C2Kernel::try_new(C2Config {
                    m,
                    coherent: self.config.coherent,
                })
            })
            .transpose()?;
        let c3k = orders.s3.then(|| C3Kernel::try_new(C3Config { m })).transpose()?;
        let c4k = orders.s4.then(|| C4Kernel::try_new(C4Config { m })).transpose()?;

        let mut acc2 = orders
            .s2
            .then(|| OrderAccumulator::try_new(Ix1(f_bins), m_var, m_stationarity))
            .transpose()?;
        let mut acc3 = orders
            .s3
            .then(|| OrderAccumulator::try_new(Ix2(f_half, f_half), m_var, m_stationarity))
            .transpose()?;
        let mut acc4 = orders
            .s4
            .then(|| OrderAccumulator::try_new(Ix2(f_bins, f_bins), m_var, m_stationarity))
            .transpose()?;

        let expected = source.expected_frames();
        debug!(
            "estimating over {f_bins} bins, m = {m}, expecting {expected} frames"
        );

        let mut frames_processed = 0usize;
        loop {
            if let Some(cap) = self.config.break_after {
                if frames_processed >= cap {
                    break;
                }
            }
            let Some(mut frame) = source.next_frame()? else {
                break;
            };

            if let Some(filter) = &self.config.filter {
                apply_transfer_filter(&mut frame.a_w, filter)?;
                if let Some(corr) = frame.a_w_corr.as_mut() {
                    apply_transfer_filter(corr, filter)?;
                }
            }
            if self.config.random_phase {
                apply_random_phase(
                    &mut frame.a_w,
                    frame.a_w_corr.as_mut(),
                    &freqs,
                    t_window,
                    &mut self.rng,
                );
            }

            if frames_processed == 0 {
                debug!(
                    "first frame: {} bins x {} windows",
                    frame.a_w.nrows(),
                    frame.a_w.ncols()
                );
                if self.config.first_frame_plot {
                    self.plot_first_frame(&frame.a_w);
                }
            }

            if let (Some(kernel), Some(acc)) = (&c2k, acc2.as_mut()) {
                let corr_view = match &frame.a_w_corr {
                    Some(corr) => corr.view(),
                    None => frame.a_w.view(),
                };
                let mut est = kernel.run(frame.a_w.view(), corr_view)?;
                let norm = source.order_norm(2);
                est.mapv_inplace(|v| v / norm);
                acc.store(est);
            }
            if let (Some(kernel), Some(acc)) = (&c3k, acc3.as_mut()) {
                let half = frame.a_w.slice(s![..f_half, ..]);
                let a_w3 = calc_a_w3(frame.a_w.view());
                let mut est = kernel.run(half, half, a_w3.view())?;
                let norm = source.order_norm(3);
                est.mapv_inplace(|v| v / norm);
                acc.store(est);
            }
            if let (Some(kernel), Some(acc)) = (&c4k, acc4.as_mut()) {
                let corr_view = match &frame.a_w_corr {
                    Some(corr) => corr.view(),
                    None => frame.a_w.view(),
                };
                let mut est = kernel.run(frame.a_w.view(), corr_view)?;
                let norm = source.order_norm(4);
                est.mapv_inplace(|v| v / norm);
                acc.store(est);
            }
            frames_processed += 1;
        }

        if frames_processed == 0 {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "dataset too short for a single frame",
            });
        }
        if source.enforce_frame_count()
            && self.config.break_after.is_none()
            && frames_processed != expected
        {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "frame count diverged from the dataset's expected coverage",
            });
        }
        info!("averaged {frames_processed} frames over {f_bins} frequency bins");

        let s2 = acc2.and_then(|a| a.finalize());
        let s3 = acc3.and_then(|a| a.finalize());
        let s4 = acc4.and_then(|a| a.finalize());
        for (name, missing) in [
            ("s2", s2.as_ref().map(|o| o.err.is_none())),
            ("s3", s3.as_ref().map(|o| o.err.is_none())),
            ("s4", s4.as_ref().map(|o| o.err.is_none())),
        ] {
            if missing == Some(true) {
                warn!(
                    "{name}: fewer than m_var = {m_var} frames, error bars unavailable"
                );
            }
        }

        Ok(SpectrumResult {
            freq: freqs,
            freq_half: source.freqs()[..f_half].to_vec(),
            s2,
            s3,
            s4,
            frames_processed,
        })
    }

    fn plot_first_frame(&self, a_w: &Array2<Complex64>) {
        let magnitudes: Vec<Vec<f64>> = (0..a_w.ncols())
            .map(|k| a_w.column(k).iter().map(|c| c.norm()).collect())
            .collect();
        let windows: Vec<&[f64]> = magnitudes.iter().map(|w| w.as_slice()).collect();
        match plot::python_plot_frame(windows) {
            Ok(path) => debug!("first frame plot written to {}", path.display()),
            Err(err) => warn!("first frame plot failed: {err}"),
        }
    }
}

/// Estimate the selected spectra of an evenly sampled trace.
///
/// `config.delta_t` is required; the window length is `t_window / delta_t`
/// samples rounded to the nearest integer.
pub fn calc_spec<I>(
    data: &I,
    corr: CrossInput<'_>,
    config: &SpectrumConfig,
) -> Result<SpectrumResult, ExecInvariantViolation>
where
    I: Read1D<f64> + ?Sized,
{
    let mut estimator = SpectrumEstimator::try_new(config.clone())?;
    let data = data.read_slice()?;
    let mut source = SampledSource::try_new(data, corr, config)?;
    estimator.run(&mut source)
}

/// Estimate the selected spectra of a point process from its sorted event
/// timestamps, without binning.
pub fn calc_spec_poisson<I>(
    times: &I,
    config: &SpectrumConfig,
) -> Result<SpectrumResult, ExecInvariantViolation>
where
    I: Read1D<f64> + ?Sized,
{
    let mut estimator = SpectrumEstimator::try_new(config.clone())?;
    let times = times.read_slice()?;
    let mut source = EventSource::try_new(times, config)?;
    estimator.run(&mut source)
}

/// Estimate the selected spectra of a point process by histogramming the
/// timestamps into bins of width `t_bin` and running the sampled path over
/// the counts.
pub fn calc_spec_mini_bins<I>(
    times: &I,
    t_bin: f64,
    config: &SpectrumConfig,
) -> Result<SpectrumResult, ExecInvariantViolation>
where
    I: Read1D<f64> + ?Sized,
{
    let mut estimator = SpectrumEstimator::try_new(config.clone())?;
    let times = times.read_slice()?;
    let mut source = BinnedSource::try_new(times, t_bin, config)?;
    estimator.run(&mut source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectra::config::OrderSelection;
    use approx::assert_abs_diff_eq;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn white_noise(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.sample::<f64, _>(StandardNormal)).collect()
    }

    fn sampled_config() -> SpectrumConfig {
        SpectrumConfig {
            delta_t: Some(1.0),
            t_window: 16.0,
            f_max: 0.4,
            m: 8,
            m_var: 10,
            orders: OrderSelection::power_spectrum(),
            ..SpectrumConfig::default()
        }
    }

    #[test]
    fn white_noise_power_spectrum_is_flat_at_unit_density() {
        init_logs();
        // Unit-variance noise at dt = 1 has two-sided density sigma^2 * dt = 1.
        let config = sampled_config();
        let data = white_noise(16 * 8 * 50, 3);
        let result = calc_spec(&data, CrossInput::None, &config).expect("run");
        assert_eq!(result.frames_processed, 50);

        let s2 = result.s2.expect("order 2 requested");
        assert_eq!(s2.spectrum.len(), result.freq.len());
        assert_eq!(result.freq.len(), 7);
        let mut mean = 0.0;
        for v in s2.spectrum.iter() {
            assert_abs_diff_eq!(v.im, 0.0, epsilon = 1e-9);
            assert!((v.re - 1.0).abs() < 0.3, "bin density {} far from 1", v.re);
            mean += v.re;
        }
        mean /= s2.spectrum.len() as f64;
        assert!((mean - 1.0).abs() < 0.1, "mean density {mean} far from 1");
        assert!(s2.err.is_some(), "50 frames give 5 error blocks");
    }

    #[test]
    fn error_bars_shrink_with_more_frames() {
        let config = SpectrumConfig {
            m_var: 5,
            ..sampled_config()
        };
        let short = calc_spec(&white_noise(16 * 8 * 20, 5), CrossInput::None, &config)
            .expect("short run");
        let long = calc_spec(&white_noise(16 * 8 * 100, 5), CrossInput::None, &config)
            .expect("long run");
        let mean_err = |r: &SpectrumResult| {
            let err = r.s2.as_ref().and_then(|o| o.err.as_ref()).expect("err");
            err.iter().sum::<f64>() / err.len() as f64
        };
        assert!(mean_err(&long) < mean_err(&short));
    }

    #[test]
    fn synthetic_cross_spectrum_sits_on_the_noise_floor() {
        let config = sampled_config();
        let data = white_noise(16 * 8 * 50, 7);
        let result =
            calc_spec(&data, CrossInput::SyntheticWhiteNoise, &config).expect("run");
        let s2 = result.s2.expect("order 2 requested");
        let mean_mag =
            s2.spectrum.iter().map(|v| v.norm()).sum::<f64>() / s2.spectrum.len() as f64;
        assert!(mean_mag < 0.2, "cross floor {mean_mag} too high");
    }

    #[test]
    fn mismatched_correlation_trace_is_rejected() {
        let config = sampled_config();
        let data = white_noise(16 * 8 * 20, 9);
        let short = vec![0.0; 8];
        let err = calc_spec(&data, CrossInput::Data(&short), &config)
            .expect_err("length mismatch must fail");
        assert!(matches!(err, ExecInvariantViolation::Config(_)));
    }

    #[test]
    fn missing_delta_t_is_rejected() {
        let config = SpectrumConfig {
            delta_t: None,
            ..sampled_config()
        };
        let data = white_noise(256, 11);
        let err = calc_spec(&data, CrossInput::None, &config).expect_err("must fail");
        assert!(matches!(
            err,
            ExecInvariantViolation::Config(ConfigError::MissingValue { arg: "delta_t" })
        ));
    }

    #[test]
    fn all_orders_run_produces_consistent_shapes() {
        init_logs();
        let config = SpectrumConfig {
            delta_t: Some(1.0),
            t_window: 8.0,
            f_max: 0.5,
            m: 4,
            m_var: 3,
            m_stationarity: Some(4),
            orders: OrderSelection::all(),
            ..SpectrumConfig::default()
        };
        let data = white_noise(8 * 4 * 12, 13);
        let result = calc_spec(&data, CrossInput::None, &config).expect("run");
        assert_eq!(result.frames_processed, 12);
        assert_eq!(result.freq.len(), 5);
        assert_eq!(result.freq_half.len(), 2);

        let s3 = result.s3.expect("order 3 requested");
        assert_eq!(s3.spectrum.dim(), (2, 2));
        let s4 = result.s4.expect("order 4 requested");
        assert_eq!(s4.spectrum.dim(), (5, 5));

        let snapshots = result
            .s2
            .expect("order 2 requested")
            .stationarity
            .expect("three stationarity blocks of four frames");
        assert_eq!(snapshots.len(), 3);
    }

    #[test]
    fn break_after_caps_the_frame_count() {
        let config = SpectrumConfig {
            break_after: Some(3),
            ..sampled_config()
        };
        let data = white_noise(16 * 8 * 20, 15);
        let result = calc_spec(&data, CrossInput::None, &config).expect("run");
        assert_eq!(result.frames_processed, 3);
    }

    #[test]
    fn event_run_matches_the_dataset_coverage() {
        // 81 events on a regular grid, last at t = 4; two frames of m = 2
        // one-second sub-windows fit exactly.
        let times: Vec<f64> = (0..=80).map(|i| i as f64 * 0.05).collect();
        let config = SpectrumConfig {
            t_window: 1.0,
            f_max: 3.0,
            m: 2,
            m_var: 2,
            orders: OrderSelection::power_spectrum(),
            ..SpectrumConfig::default()
        };
        let result = calc_spec_poisson(&times, &config).expect("run");
        assert_eq!(result.frames_processed, 2);
        assert_eq!(result.freq, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(result.s2.is_some());
    }

    #[test]
    fn event_frame_count_mismatch_is_fatal() {
        // Pinning the expected count above what the timestamps can supply
        // models a truncated dataset.
        let times: Vec<f64> = (0..=80).map(|i| i as f64 * 0.05).collect();
        let config = SpectrumConfig {
            t_window: 1.0,
            f_max: 3.0,
            m: 2,
            m_var: 2,
            orders: OrderSelection::power_spectrum(),
            expected_frames: Some(3),
            ..SpectrumConfig::default()
        };
        let err = calc_spec_poisson(&times, &config).expect_err("mismatch must fail");
        assert!(matches!(err, ExecInvariantViolation::InvalidState { .. }));
    }

    #[test]
    fn unsorted_timestamps_are_rejected() {
        let times = [0.0, 2.0, 1.0, 3.0];
        let config = SpectrumConfig {
            t_window: 1.0,
            f_max: 2.0,
            m: 2,
            orders: OrderSelection::power_spectrum(),
            ..SpectrumConfig::default()
        };
        let err = calc_spec_poisson(&times[..], &config).expect_err("must fail");
        assert!(matches!(err, ExecInvariantViolation::Config(_)));
    }

    #[test]
    fn mini_bins_runs_over_histogrammed_counts() {
        let times: Vec<f64> = (0..400).map(|i| i as f64 * 0.025).collect();
        let config = SpectrumConfig {
            t_window: 1.0,
            f_max: 3.0,
            m: 2,
            m_var: 2,
            orders: OrderSelection::power_spectrum(),
            ..SpectrumConfig::default()
        };
        let result = calc_spec_mini_bins(&times, 0.1, &config).expect("run");
        // 99 complete bins of 0.1 s, frames of 2 x 10 bins.
        assert_eq!(result.frames_processed, 4);
        assert_eq!(result.freq, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(result.s2.is_some());
    }

    #[test]
    fn non_integral_bin_ratio_is_rejected() {
        let times: Vec<f64> = (0..400).map(|i| i as f64 * 0.025).collect();
        let config = SpectrumConfig {
            t_window: 1.0,
            f_max: 2.0,
            m: 2,
            orders: OrderSelection::power_spectrum(),
            ..SpectrumConfig::default()
        };
        let err = calc_spec_mini_bins(&times, 0.3, &config).expect_err("must fail");
        assert!(matches!(
            err,
            ExecInvariantViolation::Config(ConfigError::InvalidArgument { arg: "t_bin", .. })
        ));
    }

    #[test]
    fn too_short_dataset_is_fatal() {
        let config = sampled_config();
        let data = white_noise(16, 17);
        let err = calc_spec(&data, CrossInput::None, &config).expect_err("must fail");
        assert!(matches!(err, ExecInvariantViolation::InvalidState { .. }));
    }
}
