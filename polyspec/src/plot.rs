//! Diagnostic plotting through a python/matplotlib subprocess.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors raised by plot utilities.
#[derive(Debug)]
pub enum PlotError {
    /// Underlying process or filesystem I/O failure.
    Io(std::io::Error),
    /// Python subprocess stdin was unavailable.
    StdinUnavailable,
    /// Python subprocess exited unsuccessfully.
    PythonExitFailure(ExitStatus),
}

impl core::fmt::Display for PlotError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PlotError::Io(err) => write!(f, "plot I/O failure: {err}"),
            PlotError::StdinUnavailable => {
                write!(f, "failed to open stdin for python plotting process")
            }
            PlotError::PythonExitFailure(status) => {
                write!(f, "python plotting script failed with status: {status}")
            }
        }
    }
}

impl std::error::Error for PlotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlotError::Io(err) => Some(err),
            PlotError::StdinUnavailable | PlotError::PythonExitFailure(_) => None,
        }
    }
}

impl From<std::io::Error> for PlotError {
    fn from(value: std::io::Error) -> Self {
        PlotError::Io(value)
    }
}

/// Debug utility that plots the magnitude of each window's Fourier
/// coefficients in the first processed frame.
///
/// Renders through a non-interactive python/matplotlib subprocess and writes
/// a PNG into `target/polyspec/plots`. Diagnostic side effect only; failures
/// are reported, never fatal to the estimation run.
pub fn python_plot_frame(windows: Vec<&[f64]>) -> Result<PathBuf, PlotError> {
    python_plot_frame_to_path(windows, None::<&Path>)
}

/// Plot the first frame's per-window coefficient magnitudes to `output_path`.
pub fn python_plot_frame_to_path<P: AsRef<Path>>(
    windows: Vec<&[f64]>,
    output_path: Option<P>,
) -> Result<PathBuf, PlotError> {
    let output_path = match output_path {
        Some(path) => path.as_ref().to_path_buf(),
        None => {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            PathBuf::from(format!("target/polyspec/plots/first_frame_{ts}.png"))
        }
    };
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let output_path_literal = output_path.to_string_lossy().replace('\\', "\\\\");
    let script = format!(
        r#"
import matplotlib
matplotlib.use("Agg")
import matplotlib.pyplot as plt

windows = {:?}
fig, ax = plt.subplots(figsize=(10, 6))
for i, w in enumerate(windows):
    ax.plot(w, label=f"window {{i}}")
ax.set_xlabel("Frequency bin")
ax.set_ylabel("|a_w|")
ax.legend(ncol=2, fontsize="small")
fig.tight_layout()
fig.savefig(r"{}", dpi=150)
plt.close(fig)
"#,
        windows, output_path_literal
    );

    let script = script.as_bytes();
    let mut python = std::process::Command::new("python")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null()) // noisy
        .stderr(std::process::Stdio::null()) // noisy
        .spawn()?;

    if let Some(mut stdin) = python.stdin.take() {
        stdin.write_all(script)?;
    } else {
        return Err(PlotError::StdinUnavailable);
    }

    let status = python.wait()?;
    if !status.success() {
        return Err(PlotError::PythonExitFailure(status));
    }
    Ok(output_path)
}
