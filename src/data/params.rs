use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::SpectrumData;
use crate::error::{StackError, StackResult};
use crate::primitives::get_res;

// ---------------------------------------------------------------------------
// Selection – how candidate lines are located
// ---------------------------------------------------------------------------

/// How candidate lines and their reference intensities are picked from the
/// simulated spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Peak channel intensity of each simulated peak.
    Peaks,
    /// Integrated simulated intensity over `dV * dV_ext` around each peak.
    Lines,
}

impl FromStr for Selection {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "peaks" => Ok(Selection::Peaks),
            "lines" => Ok(Selection::Lines),
            other => Err(StackError::UnknownSelection(other.to_string())),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Peaks => write!(f, "peaks"),
            Selection::Lines => write!(f, "lines"),
        }
    }
}

// ---------------------------------------------------------------------------
// BlankMapping – how blanked observed runs are carried to the simulation
// ---------------------------------------------------------------------------

/// How a run of blanked observed samples is located in the simulated window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlankMapping {
    /// Match the run's boundary frequencies on the simulated axis.
    #[default]
    Position,
    /// Match the run's boundary intensities against simulated intensities.
    Value,
}

// ---------------------------------------------------------------------------
// StackParams – user-facing options, everything optional
// ---------------------------------------------------------------------------

/// Stacking options as written in a parameter file. Spectra are supplied
/// separately; see [`StackParams::resolve`] for which fields are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackParams {
    /// `"peaks"` or `"lines"`. Required.
    pub selection: Option<String>,
    /// Channel width of the input data (MHz).
    pub res_inp: Option<f64>,
    /// Line FWHM (km/s). Required.
    #[serde(rename = "dV")]
    pub dv: Option<f64>,
    /// Number of `dV` to integrate over. Required for `lines`.
    #[serde(rename = "dV_ext")]
    pub dv_ext: Option<f64>,
    /// Systemic velocity (km/s). Required.
    pub vlsr: Option<f64>,
    /// Half-width of each stacked window (km/s). Required.
    pub vel_width: Option<f64>,
    /// Output velocity resolution (km/s).
    pub v_res: Option<f64>,
    /// Chunk ids to exclude.
    pub drops: Option<Vec<usize>>,
    pub blank_lines: Option<bool>,
    /// Velocity band `[low, high]` (km/s) exempt from blanking.
    pub blank_keep_range: Option<[f64; 2]>,
    pub blank_mapping: Option<BlankMapping>,
    pub flag_lines: Option<bool>,
    /// Outlier threshold in units of chunk rms.
    pub flag_sigma: Option<f64>,
    /// Detection threshold for peaks found in observed data.
    pub peak_sigma: Option<f64>,
}

/// Fully resolved options, built once by [`StackParams::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct StackConfig {
    pub selection: Selection,
    pub res_inp: f64,
    pub dv: f64,
    pub dv_ext: Option<f64>,
    pub vlsr: f64,
    pub vel_width: f64,
    pub v_res: f64,
    pub drops: BTreeSet<usize>,
    pub blank_lines: bool,
    pub blank_keep_range: (f64, f64),
    pub blank_mapping: BlankMapping,
    pub flag_lines: bool,
    pub flag_sigma: f64,
    pub peak_sigma: f64,
}

const DEFAULT_FLAG_SIGMA: f64 = 5.0;
const DEFAULT_PEAK_SIGMA: f64 = 3.0;

impl StackParams {
    /// Parse a JSON parameter document.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Check required options and fill in defaults.
    ///
    /// `observed` is only consulted for the default channel width.
    pub fn resolve(&self, observed: &SpectrumData) -> StackResult<StackConfig> {
        let selection: Selection = self
            .selection
            .as_deref()
            .ok_or(StackError::MissingOption("selection"))?
            .parse()?;
        let dv = self.dv.ok_or(StackError::MissingOption("dV"))?;
        let vlsr = self.vlsr.ok_or(StackError::MissingOption("vlsr"))?;
        let vel_width = self.vel_width.ok_or(StackError::MissingOption("vel_width"))?;

        let dv_ext = match (selection, self.dv_ext) {
            (Selection::Lines, None) => return Err(StackError::MissingOption("dV_ext")),
            (_, ext) => ext,
        };

        let res_inp = self.res_inp.unwrap_or_else(|| get_res(&observed.freq));
        let v_res = self.v_res.unwrap_or(0.1 * dv);
        let blank_keep_range = self
            .blank_keep_range
            .map(|[lo, hi]| (lo, hi))
            .unwrap_or((-3.0 * dv, 3.0 * dv));

        positive("dV", dv)?;
        positive("vel_width", vel_width)?;
        positive("v_res", v_res)?;
        positive("res_inp", res_inp)?;
        if let Some(ext) = dv_ext {
            positive("dV_ext", ext)?;
        }
        if !vlsr.is_finite() {
            return Err(StackError::invalid("vlsr", "must be finite"));
        }
        if !(blank_keep_range.0 < blank_keep_range.1) {
            return Err(StackError::invalid(
                "blank_keep_range",
                format!(
                    "lower bound {} must be below upper bound {}",
                    blank_keep_range.0, blank_keep_range.1
                ),
            ));
        }

        let cfg = StackConfig {
            selection,
            res_inp,
            dv,
            dv_ext,
            vlsr,
            vel_width,
            v_res,
            drops: self.drops.iter().flatten().copied().collect(),
            blank_lines: self.blank_lines.unwrap_or(false),
            blank_keep_range,
            blank_mapping: self.blank_mapping.unwrap_or_default(),
            flag_lines: self.flag_lines.unwrap_or(false),
            flag_sigma: self.flag_sigma.unwrap_or(DEFAULT_FLAG_SIGMA),
            peak_sigma: self.peak_sigma.unwrap_or(DEFAULT_PEAK_SIGMA),
        };
        positive("flag_sigma", cfg.flag_sigma)?;
        positive("peak_sigma", cfg.peak_sigma)?;
        Ok(cfg)
    }
}

fn positive(field: &'static str, v: f64) -> StackResult<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(StackError::invalid(field, format!("must be positive, got {v}")))
    }
}
