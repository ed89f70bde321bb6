//! Streaming accumulation of per-frame spectra.
//!
//! One accumulator per requested order owns a running sum, an `m_var`-sized
//! ring buffer of single-frame spectra for block-variance error bars, and an
//! optional `m_stationarity`-sized ring buffer for drift snapshots. Ring
//! completion is surfaced as an explicit return value of [`store`], not a
//! counter to be inspected later.
//!
//! [`store`]: OrderAccumulator::store

use ndarray::{Array, Dimension, Zip};

use crate::kernel::ConfigError;
use crate::spectra::coeffs::Complex64;

/// Ring-buffer completions triggered by storing one frame's spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockEvents {
    /// The error ring completed a full `m_var` cycle and folded a block
    /// variance into the error sum.
    pub error_block: bool,
    /// The stationarity ring completed and appended a block average.
    pub stationarity_block: bool,
}

/// Finalized output for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutput<D: Dimension> {
    /// Frame-averaged, scale-normalized spectrum.
    pub spectrum: Array<Complex64, D>,
    /// Standard-error-of-the-mean style error bars, or `None` when fewer
    /// than `m_var` frames were processed (insufficient data for error
    /// estimation, never a silent zero).
    pub err: Option<Array<f64, D>>,
    /// Completed stationarity block averages, oldest first, or `None` when
    /// stationarity tracking was off or no block completed.
    pub stationarity: Option<Vec<Array<Complex64, D>>>,
    /// Frames folded into the spectrum.
    pub frames: usize,
}

/// Per-order streaming accumulator.
#[derive(Debug, Clone)]
pub struct OrderAccumulator<D: Dimension> {
    shape: D,
    sum: Array<Complex64, D>,
    err_sum: Array<f64, D>,
    err_ring: Vec<Array<Complex64, D>>,
    err_head: usize,
    err_blocks: usize,
    m_var: usize,
    stat_ring: Vec<Array<Complex64, D>>,
    stat_head: usize,
    m_stationarity: Option<usize>,
    stationarity: Vec<Array<Complex64, D>>,
    frames: usize,
}

impl<D: Dimension> OrderAccumulator<D> {
    /// Fresh accumulator for spectra of the given shape.
    pub fn try_new(
        shape: D,
        m_var: usize,
        m_stationarity: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if m_var < 2 {
            return Err(ConfigError::InvalidArgument {
                arg: "m_var",
                reason: "block variance requires m_var > 1",
            });
        }
        if m_stationarity == Some(0) {
            return Err(ConfigError::InvalidArgument {
                arg: "m_stationarity",
                reason: "stationarity blocks must hold at least one frame",
            });
        }
        Ok(Self {
            shape: shape.clone(),
            sum: Array::zeros(shape.clone()),
            err_sum: Array::zeros(shape),
            err_ring: Vec::with_capacity(m_var),
            err_head: 0,
            err_blocks: 0,
            m_var,
            stat_ring: Vec::with_capacity(m_stationarity.unwrap_or(0)),
            stat_head: 0,
            m_stationarity,
            stationarity: Vec::new(),
            frames: 0,
        })
    }

    /// Frames stored so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Fold one frame's spectrum estimate into the running state.
    pub fn store(&mut self, estimate: Array<Complex64, D>) -> BlockEvents {
        let mut events = BlockEvents::default();

        self.sum += &estimate;
        if self.err_ring.len() < self.m_var {
            self.err_ring.push(estimate.clone());
        } else {
            self.err_ring[self.err_head] = estimate.clone();
        }
        self.err_head += 1;
        if self.err_head == self.m_var {
            self.fold_error_block();
            self.err_head = 0;
            events.error_block = true;
        }

        if let Some(m_stat) = self.m_stationarity {
            if self.stat_ring.len() < m_stat {
                self.stat_ring.push(estimate);
            } else {
                self.stat_ring[self.stat_head] = estimate;
            }
            self.stat_head += 1;
            if self.stat_head == m_stat {
                let block_mean = self.ring_mean(&self.stat_ring);
                self.stationarity.push(block_mean);
                self.stat_head = 0;
                events.stationarity_block = true;
            }
        }

        self.frames += 1;
        events
    }

    /// Block variance over the completed error ring, in the same functional
    /// form as the non-coherent second-order cumulant, applied to the stream
    /// of per-frame spectrum estimates themselves.
    fn fold_error_block(&mut self) {
        let n = self.m_var as f64;
        let mean = self.ring_mean(&self.err_ring);
        let mut msq = Array::<f64, D>::zeros(self.shape());
        for x in &self.err_ring {
            Zip::from(&mut msq).and(x).for_each(|m, v| *m += v.norm_sqr());
        }
        Zip::from(&mut self.err_sum)
            .and(&mean)
            .and(&msq)
            .for_each(|e, mu, sq| {
                let var = n / (n - 1.0) * (sq / n - mu.norm_sqr());
                *e += var.max(0.0).sqrt();
            });
        self.err_blocks += 1;
    }

    fn ring_mean(&self, ring: &[Array<Complex64, D>]) -> Array<Complex64, D> {
        let mut mean = Array::<Complex64, D>::zeros(self.shape());
        for x in ring {
            mean += x;
        }
        mean.mapv_inplace(|v| v / ring.len() as f64);
        mean
    }

    fn shape(&self) -> D {
        self.shape.clone()
    }

    /// Finalize: divide the running sum by the frame count and normalize the
    /// error sum to standard-error-of-the-mean scale.
    pub fn finalize(self) -> Option<OrderOutput<D>> {
        if self.frames == 0 {
            return None;
        }
        let n = self.frames as f64;
        let mut spectrum = self.sum;
        spectrum.mapv_inplace(|v| v / n);

        let err = if self.err_blocks > 0 {
            let blocks = (self.frames / self.m_var) as f64;
            let mut err = self.err_sum;
            err.mapv_inplace(|v| v / (blocks * n.sqrt()));
            Some(err)
        } else {
            None
        };

        let stationarity = match self.m_stationarity {
            Some(_) if !self.stationarity.is_empty() => Some(self.stationarity),
            _ => None,
        };

        Some(OrderOutput {
            spectrum,
            err,
            stationarity,
            frames: self.frames,
        })
    }
}
