//! Shared trait-first kernel substrate.
//!
//! Defines the constructor-validation lifecycle, error taxonomy, and 1D
//! buffer adapters used by the spectral estimation kernels.

mod errors;
mod io;
mod lifecycle;

pub use errors::*;
pub use io::*;
pub use lifecycle::*;
