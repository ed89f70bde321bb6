//! Bias-corrected cumulant estimators for spectrum orders 2, 3, and 4.
//!
//! Each estimator consumes one frame's Fourier coefficient matrices with the
//! window axis last and the window count `m` as the bias-correction
//! parameter. Moments are means over the window axis; the combinations are
//! the unbiased multivariate k-statistics, so a frame of identical windows
//! contributes exactly zero at every order above the first.
//!
//! None of the estimators special-case NaN/Inf or all-zero windows: an empty
//! event sub-window is a legitimate zero contribution and flows through the
//! moments unchanged.

use itertools::iproduct;
use ndarray::{Array1, Array2, ArrayView2, ArrayView3};

use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle};
use crate::spectra::coeffs::Complex64;

fn check_window_axis(
    arg: &'static str,
    got: usize,
    m: usize,
) -> Result<(), ExecInvariantViolation> {
    if got != m {
        return Err(ExecInvariantViolation::LengthMismatch {
            arg,
            expected: m,
            got,
        });
    }
    Ok(())
}

/// Constructor config for [`C2Kernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C2Config {
    /// Windows per frame.
    pub m: usize,
    /// Skip mean subtraction, keeping coherent components.
    pub coherent: bool,
}

/// Second-order (power spectrum) cumulant kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C2Kernel {
    m: usize,
    coherent: bool,
}

impl KernelLifecycle for C2Kernel {
    type Config = C2Config;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.m == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "at least one window per frame is required",
            });
        }
        if !config.coherent && config.m < 2 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "mean subtraction requires m > 1",
            });
        }
        Ok(Self {
            m: config.m,
            coherent: config.coherent,
        })
    }
}

impl C2Kernel {
    /// One frame's second-order cumulant, per frequency bin.
    ///
    /// Non-coherent: `m/(m−1)·(E[a·a*_corr] − E[a]·E[a*_corr])`.
    /// Coherent: `E[a·a*_corr]` with no mean subtraction.
    pub fn run(
        &self,
        a: ArrayView2<'_, Complex64>,
        a_corr: ArrayView2<'_, Complex64>,
    ) -> Result<Array1<Complex64>, ExecInvariantViolation> {
        check_window_axis("a", a.ncols(), self.m)?;
        check_window_axis("a_corr", a_corr.ncols(), self.m)?;
        if a_corr.nrows() != a.nrows() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "a_corr",
                expected: a.nrows(),
                got: a_corr.nrows(),
            });
        }

        let m = self.m as f64;
        let mut out = Array1::<Complex64>::zeros(a.nrows());
        for f in 0..a.nrows() {
            let mut m2 = Complex64::new(0.0, 0.0);
            let mut m1 = Complex64::new(0.0, 0.0);
            let mut m1c = Complex64::new(0.0, 0.0);
            for k in 0..self.m {
                let x = a[[f, k]];
                let yc = a_corr[[f, k]].conj();
                m2 += x * yc;
                m1 += x;
                m1c += yc;
            }
            m2 /= m;
            m1 /= m;
            m1c /= m;
            out[f] = if self.coherent {
                m2
            } else {
                m / (m - 1.0) * (m2 - m1 * m1c)
            };
        }
        Ok(out)
    }
}

/// Constructor config for [`C3Kernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C3Config {
    /// Windows per frame.
    pub m: usize,
}

/// Third-order (bispectrum) cumulant kernel over the half-frequency plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C3Kernel {
    m: usize,
}

impl KernelLifecycle for C3Kernel {
    type Config = C3Config;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.m < 3 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "third-order bias correction requires m > 2",
            });
        }
        Ok(Self { m: config.m })
    }
}

impl C3Kernel {
    /// One frame's third-order cumulant over `(w1, w2)`.
    ///
    /// `a_w1` spans rows, `a_w2` spans columns, and `a_w3[i, j, ·]` holds the
    /// conjugated coefficients at `w1 + w2` (see
    /// [`calc_a_w3`](crate::spectra::coeffs::calc_a_w3)).
    pub fn run(
        &self,
        a_w1: ArrayView2<'_, Complex64>,
        a_w2: ArrayView2<'_, Complex64>,
        a_w3: ArrayView3<'_, Complex64>,
    ) -> Result<Array2<Complex64>, ExecInvariantViolation> {
        check_window_axis("a_w1", a_w1.ncols(), self.m)?;
        check_window_axis("a_w2", a_w2.ncols(), self.m)?;
        check_window_axis("a_w3", a_w3.dim().2, self.m)?;
        let (rows, cols) = (a_w1.nrows(), a_w2.nrows());
        if a_w3.dim().0 != rows || a_w3.dim().1 != cols {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "a_w3 plane does not match the (w1, w2) grid",
            });
        }

        let m = self.m as f64;
        let pref = m * m / ((m - 1.0) * (m - 2.0));
        let inv_m = 1.0 / m;

        let mean1: Vec<Complex64> = (0..rows)
            .map(|i| (0..self.m).map(|k| a_w1[[i, k]]).sum::<Complex64>() * inv_m)
            .collect();
        let mean2: Vec<Complex64> = (0..cols)
            .map(|j| (0..self.m).map(|k| a_w2[[j, k]]).sum::<Complex64>() * inv_m)
            .collect();

        let mut out = Array2::<Complex64>::zeros((rows, cols));
        for (i, j) in iproduct!(0..rows, 0..cols) {
            let mut d3 = Complex64::new(0.0, 0.0);
            let mut d12 = Complex64::new(0.0, 0.0);
            let mut d13 = Complex64::new(0.0, 0.0);
            let mut d23 = Complex64::new(0.0, 0.0);
            let mut d123 = Complex64::new(0.0, 0.0);
            for k in 0..self.m {
                let x1 = a_w1[[i, k]];
                let x2 = a_w2[[j, k]];
                let x3 = a_w3[[i, j, k]];
                d3 += x3;
                d12 += x1 * x2;
                d13 += x1 * x3;
                d23 += x2 * x3;
                d123 += x1 * x2 * x3;
            }
            d3 *= inv_m;
            d12 *= inv_m;
            d13 *= inv_m;
            d23 *= inv_m;
            d123 *= inv_m;

            let d1 = mean1[i];
            let d2 = mean2[j];
            out[[i, j]] =
                pref * (d123 - d1 * d23 - d12 * d3 - d13 * d2 + 2.0 * d1 * d2 * d3);
        }
        Ok(out)
    }
}

/// Constructor config for [`C4Kernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C4Config {
    /// Windows per frame.
    pub m: usize,
}

/// Fourth-order (trispectrum) cumulant kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C4Kernel {
    m: usize,
}

impl KernelLifecycle for C4Kernel {
    type Config = C4Config;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.m < 4 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "fourth-order bias correction requires m > 3",
            });
        }
        Ok(Self { m: config.m })
    }
}

impl C4Kernel {
    /// One frame's fourth-order cumulant over `(w1, w2)`.
    ///
    /// Rows index `a` (variables `1`, `1c`), columns index `a_corr`
    /// (variables `2`, `2c`); `a_corr = a` gives the auto-trispectrum. The
    /// eleven mixed-moment terms combine into the unbiased joint k-statistic.
    pub fn run(
        &self,
        a: ArrayView2<'_, Complex64>,
        a_corr: ArrayView2<'_, Complex64>,
    ) -> Result<Array2<Complex64>, ExecInvariantViolation> {
        check_window_axis("a", a.ncols(), self.m)?;
        check_window_axis("a_corr", a_corr.ncols(), self.m)?;

        let mf = self.m as f64;
        let inv_m = 1.0 / mf;
        let pref = mf * mf / ((mf - 1.0) * (mf - 2.0) * (mf - 3.0));
        let (rows, cols) = (a.nrows(), a_corr.nrows());

        // Per-row and per-column moments.
        let mut sum_1 = vec![Complex64::new(0.0, 0.0); rows];
        let mut sum_1c = vec![Complex64::new(0.0, 0.0); rows];
        let mut sum_11c = vec![Complex64::new(0.0, 0.0); rows];
        for i in 0..rows {
            for k in 0..self.m {
                let x = a[[i, k]];
                sum_1[i] += x;
                sum_1c[i] += x.conj();
                sum_11c[i] += x * x.conj();
            }
            sum_1[i] *= inv_m;
            sum_1c[i] *= inv_m;
            sum_11c[i] *= inv_m;
        }
        let mut sum_2 = vec![Complex64::new(0.0, 0.0); cols];
        let mut sum_2c = vec![Complex64::new(0.0, 0.0); cols];
        let mut sum_22c = vec![Complex64::new(0.0, 0.0); cols];
        for j in 0..cols {
            for k in 0..self.m {
                let y = a_corr[[j, k]];
                sum_2[j] += y;
                sum_2c[j] += y.conj();
                sum_22c[j] += y * y.conj();
            }
            sum_2[j] *= inv_m;
            sum_2c[j] *= inv_m;
            sum_22c[j] *= inv_m;
        }

        let mut out = Array2::<Complex64>::zeros((rows, cols));
        for (i, j) in iproduct!(0..rows, 0..cols) {
            let mut sum_11c22c = Complex64::new(0.0, 0.0);
            let mut sum_11c2 = Complex64::new(0.0, 0.0);
            let mut sum_122c = Complex64::new(0.0, 0.0);
            let mut sum_1c22c = Complex64::new(0.0, 0.0);
            let mut sum_11c2c = Complex64::new(0.0, 0.0);
            let mut sum_12c = Complex64::new(0.0, 0.0);
            let mut sum_1c2 = Complex64::new(0.0, 0.0);
            let mut sum_12 = Complex64::new(0.0, 0.0);
            let mut sum_1c2c = Complex64::new(0.0, 0.0);
            for k in 0..self.m {
                let x = a[[i, k]];
                let xc = x.conj();
                let y = a_corr[[j, k]];
                let yc = y.conj();
                sum_11c22c += x * xc * y * yc;
                sum_11c2 += x * xc * y;
                sum_122c += x * y * yc;
                sum_1c22c += xc * y * yc;
                sum_11c2c += x * xc * yc;
                sum_12c += x * yc;
                sum_1c2 += xc * y;
                sum_12 += x * y;
                sum_1c2c += xc * yc;
            }
            sum_11c22c *= inv_m;
            sum_11c2 *= inv_m;
            sum_122c *= inv_m;
            sum_1c22c *= inv_m;
            sum_11c2c *= inv_m;
            sum_12c *= inv_m;
            sum_1c2 *= inv_m;
            sum_12 *= inv_m;
            sum_1c2c *= inv_m;

            let s1 = sum_1[i];
            let s1c = sum_1c[i];
            let s2 = sum_2[j];
            let s2c = sum_2c[j];
            let s11c = sum_11c[i];
            let s22c = sum_22c[j];

            let z = (mf + 1.0) * sum_11c22c
                - (mf + 1.0)
                    * (sum_11c2 * s2c + sum_11c2c * s2 + sum_122c * s1c + sum_1c22c * s1)
                - (mf - 1.0) * (s11c * s22c + sum_12 * sum_1c2c + sum_12c * sum_1c2)
                + 2.0 * mf
                    * (s11c * s2 * s2c
                        + s22c * s1 * s1c
                        + sum_12 * s1c * s2c
                        + sum_12c * s1c * s2
                        + sum_1c2 * s1 * s2c
                        + sum_1c2c * s1 * s2)
                - 6.0 * mf * s1 * s1c * s2 * s2c;
            out[[i, j]] = pref * z;
        }
        Ok(out)
    }
}

/// One frame's second-order cumulant; see [`C2Kernel::run`].
pub fn c2(
    a: ArrayView2<'_, Complex64>,
    a_corr: ArrayView2<'_, Complex64>,
    m: usize,
    coherent: bool,
) -> Result<Array1<Complex64>, ExecInvariantViolation> {
    C2Kernel::try_new(C2Config { m, coherent })?.run(a, a_corr)
}

/// One frame's third-order cumulant; see [`C3Kernel::run`].
pub fn c3(
    a_w1: ArrayView2<'_, Complex64>,
    a_w2: ArrayView2<'_, Complex64>,
    a_w3: ArrayView3<'_, Complex64>,
    m: usize,
) -> Result<Array2<Complex64>, ExecInvariantViolation> {
    C3Kernel::try_new(C3Config { m })?.run(a_w1, a_w2, a_w3)
}

/// One frame's fourth-order cumulant; see [`C4Kernel::run`].
pub fn c4(
    a: ArrayView2<'_, Complex64>,
    a_corr: ArrayView2<'_, Complex64>,
    m: usize,
) -> Result<Array2<Complex64>, ExecInvariantViolation> {
    C4Kernel::try_new(C4Config { m })?.run(a, a_corr)
}
