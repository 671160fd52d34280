//! Velocity stacking of radio-astronomy spectral line data.
//!
//! ```text
//!  observed + simulated spectra, StackParams
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  chunk    │  select candidates, cut one window per line
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  clean    │  drop / blank / flag interlopers
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  weight   │  inverse-variance weights, resample onto a velocity grid
//!   └──────────┘
//!        │
//!        ▼
//!   ┌───────────┐
//!   │ composite  │  weighted sum → trimmed SNR spectrum
//!   └───────────┘
//! ```

pub mod constants;
pub mod data;
pub mod error;
pub mod primitives;
pub mod stack;
pub mod sum;
pub mod synth;

pub use data::model::{Sample, Spectrum, SpectrumData};
pub use data::params::{BlankMapping, Selection, StackConfig, StackParams};
pub use error::{StackError, StackResult};
pub use stack::{velocity_stack, StackOutput};
pub use sum::{sum_spectra, SumMode};
