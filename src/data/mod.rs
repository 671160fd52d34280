//! Data layer: sample types, stacking options, and file loading.
//!
//! Architecture:
//! ```text
//!  .parquet / .json / .csv        params .json
//!        │                             │
//!        ▼                             ▼
//!   ┌──────────┐                ┌──────────────┐
//!   │  loader   │               │ StackParams   │  all options optional
//!   └──────────┘                └──────────────┘
//!        │                             │ resolve()
//!        ▼                             ▼
//!   ┌──────────────┐            ┌──────────────┐
//!   │ SpectrumData  │           │ StackConfig   │  validated, defaults filled
//!   └──────────────┘            └──────────────┘
//! ```

pub mod loader;
pub mod model;
pub mod params;
