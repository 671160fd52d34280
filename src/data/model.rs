use crate::error::{StackError, StackResult};

// ---------------------------------------------------------------------------
// Sample – one possibly-missing intensity value
// ---------------------------------------------------------------------------

/// A single intensity sample. `None` marks a missing (blanked, off-grid or
/// uncovered) value; aggregations skip it instead of propagating it.
pub type Sample = Option<f64>;

/// Convert a raw float into a [`Sample`], treating non-finite values as missing.
pub fn sample_from_f64(v: f64) -> Sample {
    v.is_finite().then_some(v)
}

/// Missing-aware aggregations over a run of samples.
pub trait SampleSliceExt {
    /// Sum of the present samples; `0.0` when none are present.
    fn masked_sum(&self) -> f64;
    /// Largest present sample, `None` when all are missing.
    fn masked_max(&self) -> Option<f64>;
    /// Number of present samples.
    fn present(&self) -> usize;
    /// Present samples only, in order.
    fn present_values(&self) -> Vec<f64>;
}

impl SampleSliceExt for [Sample] {
    fn masked_sum(&self) -> f64 {
        self.iter().flatten().sum()
    }

    fn masked_max(&self) -> Option<f64> {
        self.iter().flatten().copied().reduce(f64::max)
    }

    fn present(&self) -> usize {
        self.iter().filter(|s| s.is_some()).count()
    }

    fn present_values(&self) -> Vec<f64> {
        self.iter().flatten().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// SpectrumData – an input frequency/intensity pair
// ---------------------------------------------------------------------------

/// A frequency axis (MHz, ascending) with its intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumData {
    pub freq: Vec<f64>,
    pub int: Vec<Sample>,
}

impl SpectrumData {
    /// Pair an axis with its samples. Descending axes are flipped so that
    /// `freq` is ascending afterwards.
    pub fn new(freq: Vec<f64>, int: Vec<Sample>) -> StackResult<Self> {
        if freq.len() != int.len() {
            return Err(StackError::ShapeMismatch {
                what: "frequency and intensity arrays",
                left: freq.len(),
                right: int.len(),
            });
        }
        let mut data = SpectrumData { freq, int };
        if data.freq.len() > 1 && data.freq[0] > data.freq[data.freq.len() - 1] {
            data.freq.reverse();
            data.int.reverse();
        }
        if data.freq.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(StackError::invalid(
                "freq",
                "frequency axis must be strictly monotonic",
            ));
        }
        Ok(data)
    }

    /// Build from raw floats; non-finite intensities become missing.
    pub fn from_f64(freq: Vec<f64>, int: Vec<f64>) -> StackResult<Self> {
        let int = int.into_iter().map(sample_from_f64).collect();
        Self::new(freq, int)
    }

    pub fn len(&self) -> usize {
        self.freq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Spectrum – the output container
// ---------------------------------------------------------------------------

/// A named bundle of axes filled in by whichever stage produced it.
/// Populated axes always share one length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    pub name: String,
    /// Frequency axis (MHz).
    pub freq: Option<Vec<f64>>,
    /// Intensity on `freq`.
    pub intensity: Option<Vec<Sample>>,
    /// Velocity axis (km/s).
    pub velocity: Option<Vec<f64>>,
    /// Signal-to-noise on `velocity`.
    pub snr: Option<Vec<Sample>>,
    /// Simulated intensity in the same units as `snr`.
    pub int_sim: Option<Vec<Sample>>,
}

impl Spectrum {
    pub fn new(name: impl Into<String>) -> Self {
        Spectrum {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Length shared by all populated axes (0 when nothing is populated).
    pub fn len(&self) -> usize {
        self.axis_lengths().into_iter().next().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every populated axis has the same length.
    pub fn is_consistent(&self) -> bool {
        let lens = self.axis_lengths();
        lens.windows(2).all(|w| w[0] == w[1])
    }

    fn axis_lengths(&self) -> Vec<usize> {
        [
            self.freq.as_ref().map(Vec::len),
            self.intensity.as_ref().map(Vec::len),
            self.velocity.as_ref().map(Vec::len),
            self.snr.as_ref().map(Vec::len),
            self.int_sim.as_ref().map(Vec::len),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
