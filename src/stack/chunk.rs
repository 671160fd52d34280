use std::fmt;

use super::weight::{Resampled, Weighted};
use crate::constants::CKM;
use crate::data::model::{Sample, SampleSliceExt, SpectrumData};
use crate::data::params::{Selection, StackConfig};
use crate::error::{StackError, StackResult};
use crate::primitives::{find_nearest, find_peaks, get_rms};

// ---------------------------------------------------------------------------
// FlagReason – why a chunk was left out
// ---------------------------------------------------------------------------

/// Why a chunk was excluded from weighting and compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlagReason {
    /// The observed window is empty (line outside the observed band).
    Empty,
    /// The observed window holds no present samples.
    NoData,
    /// The chunk id was listed in `drops`.
    Dropped,
    /// An outlier survived inside the protected core.
    Interloper,
}

impl fmt::Display for FlagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlagReason::Empty => "empty",
            FlagReason::NoData => "no data",
            FlagReason::Dropped => "dropped",
            FlagReason::Interloper => "interloper",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Chunk – one window of data around one candidate line
// ---------------------------------------------------------------------------

/// Observed and simulated data around one candidate line.
///
/// The observed and simulated windows are cut independently, so their
/// lengths generally differ. Both velocity axes are referenced to the
/// same `cfreq`.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position in the candidate list.
    pub id: usize,
    pub freq_obs: Vec<f64>,
    pub int_obs: Vec<Sample>,
    pub freq_sim: Vec<f64>,
    pub int_sim: Vec<Sample>,
    /// Reference intensity of the line, used for weighting.
    pub peak_int: f64,
    /// `Some` once the chunk is excluded from the stack.
    pub flag: Option<FlagReason>,
    /// Clipped rms of `int_obs`; `None` when nothing is present.
    pub rms: Option<f64>,
    /// Centre frequency (MHz), origin of both velocity axes.
    pub cfreq: f64,
    /// Velocity of `freq_obs` relative to `cfreq` (km/s).
    pub velocity: Vec<f64>,
    /// Velocity of `freq_sim` relative to `cfreq` (km/s).
    pub sim_velocity: Vec<f64>,
    pub weighted: Option<Weighted>,
    pub resampled: Option<Resampled>,
}

impl Chunk {
    /// Build a chunk from its windows. `line_freq` stands in for the centre
    /// frequency when the observed window is empty.
    pub fn new(
        id: usize,
        obs: SpectrumData,
        sim: SpectrumData,
        peak_int: f64,
        line_freq: f64,
    ) -> Self {
        let cfreq = obs.freq.get(obs.freq.len() / 2).copied().unwrap_or(line_freq);
        let mut chunk = Chunk {
            id,
            velocity: to_velocity(&obs.freq, cfreq),
            sim_velocity: to_velocity(&sim.freq, cfreq),
            freq_obs: obs.freq,
            int_obs: obs.int,
            freq_sim: sim.freq,
            int_sim: sim.int,
            peak_int,
            flag: None,
            rms: None,
            cfreq,
            weighted: None,
            resampled: None,
        };
        chunk.set_rms();
        chunk
    }

    /// Recompute `rms` from the current observed samples.
    pub fn set_rms(&mut self) {
        self.rms = get_rms(&self.int_obs);
    }

    pub fn is_flagged(&self) -> bool {
        self.flag.is_some()
    }

    pub fn weight(&self) -> Option<f64> {
        self.weighted.as_ref().map(|w| w.weight)
    }

    /// Frequency band (MHz, ascending) protected by a `[low, high]` velocity
    /// range, with positive velocities below `cfreq`.
    pub fn keep_band(&self, keep: (f64, f64)) -> (f64, f64) {
        let shift = |v: f64| self.cfreq - v * self.cfreq / CKM;
        (shift(keep.1), shift(keep.0))
    }
}

fn to_velocity(freq: &[f64], cfreq: f64) -> Vec<f64> {
    freq.iter().map(|f| (f - cfreq) * CKM / cfreq).collect()
}

// ---------------------------------------------------------------------------
// Candidate selection
// ---------------------------------------------------------------------------

/// Candidate line frequencies with their reference intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidates {
    pub freqs: Vec<f64>,
    pub peak_ints: Vec<f64>,
}

/// Locate candidate lines in the simulated spectrum.
pub fn select_candidates(sim: &SpectrumData, cfg: &StackConfig) -> StackResult<Candidates> {
    let ext = match cfg.selection {
        Selection::Peaks => 1.0,
        Selection::Lines => cfg.dv_ext.ok_or(StackError::MissingOption("dV_ext"))?,
    };
    let indices = find_peaks(
        &sim.freq,
        &sim.int,
        cfg.res_inp,
        cfg.dv * ext,
        true,
        cfg.peak_sigma,
    );
    if indices.is_empty() {
        return Err(StackError::NoCandidates);
    }

    let freqs: Vec<f64> = indices.iter().map(|&i| sim.freq[i]).collect();
    let peak_ints = match cfg.selection {
        Selection::Peaks => indices
            .iter()
            .map(|&i| sim.int[i].unwrap_or(0.0))
            .collect(),
        Selection::Lines => freqs
            .iter()
            .map(|&f| {
                let half = cfg.dv * ext * f / CKM / 2.0;
                let ll = find_nearest(&sim.freq, f - half);
                let ul = find_nearest(&sim.freq, f + half);
                sim.int[ll..ul].masked_sum()
            })
            .collect(),
    };

    log::info!("{} candidate lines selected by {}", freqs.len(), cfg.selection);
    Ok(Candidates { freqs, peak_ints })
}

// ---------------------------------------------------------------------------
// Chunk extraction
// ---------------------------------------------------------------------------

/// Cut one chunk per candidate, `vel_width` km/s either side of the line.
pub fn extract_chunks(
    observed: &SpectrumData,
    simulated: &SpectrumData,
    candidates: &Candidates,
    vel_width: f64,
) -> Vec<Chunk> {
    candidates
        .freqs
        .iter()
        .zip(&candidates.peak_ints)
        .enumerate()
        .map(|(id, (&f, &peak_int))| {
            let width = vel_width * f / CKM;
            let obs = window(observed, f - width, f + width);
            let sim = window(simulated, f - width, f + width);
            Chunk::new(id, obs, sim, peak_int, f)
        })
        .collect()
}

fn window(data: &SpectrumData, lo: f64, hi: f64) -> SpectrumData {
    let ll = find_nearest(&data.freq, lo);
    let ul = find_nearest(&data.freq, hi).max(ll);
    SpectrumData {
        freq: data.freq[ll..ul].to_vec(),
        int: data.int[ll..ul].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::params::StackParams;

    /// 10 kHz channels from 100 GHz; one spike per entry of `lines`.
    fn spiky(n: usize, lines: &[(usize, f64)]) -> SpectrumData {
        let freq: Vec<f64> = (0..n).map(|i| 100_000.0 + i as f64 * 0.01).collect();
        let mut int = vec![0.0; n];
        for &(i, a) in lines {
            int[i] = a;
        }
        SpectrumData::from_f64(freq, int).unwrap()
    }

    fn config(selection: &str, dv_ext: Option<f64>) -> StackConfig {
        let sim = spiky(10, &[]);
        StackParams {
            selection: Some(selection.into()),
            dv: Some(1.0),
            dv_ext,
            vlsr: Some(0.0),
            vel_width: Some(20.0),
            ..Default::default()
        }
        .resolve(&sim)
        .unwrap()
    }

    #[test]
    fn peaks_use_channel_intensity() {
        let sim = spiky(4000, &[(1000, 2.0), (3000, 0.5)]);
        let c = select_candidates(&sim, &config("peaks", None)).unwrap();
        assert_eq!(c.freqs, vec![sim.freq[1000], sim.freq[3000]]);
        assert_eq!(c.peak_ints, vec![2.0, 0.5]);
    }

    #[test]
    fn lines_match_peaks_for_a_spike() {
        let sim = spiky(4000, &[(2000, 1.7)]);
        let peaks = select_candidates(&sim, &config("peaks", None)).unwrap();
        let lines = select_candidates(&sim, &config("lines", Some(1.0))).unwrap();
        assert_eq!(peaks.freqs, lines.freqs);
        assert!((peaks.peak_ints[0] - lines.peak_ints[0]).abs() < 1e-12);
    }

    #[test]
    fn lines_integrate_over_the_width() {
        let sim = spiky(4000, &[(2000, 1.0), (2001, 0.5), (2010, 0.25)]);
        let c = select_candidates(&sim, &config("lines", Some(1.0))).unwrap();
        assert_eq!(c.freqs.len(), 1);
        assert!((c.peak_ints[0] - 1.75).abs() < 1e-12);
    }

    #[test]
    fn flat_simulation_has_no_candidates() {
        let sim = spiky(100, &[]);
        assert_eq!(
            select_candidates(&sim, &config("peaks", None)).unwrap_err(),
            StackError::NoCandidates
        );
    }

    #[test]
    fn windows_keep_paired_lengths() {
        let obs = spiky(3000, &[]);
        let sim = spiky(4000, &[]);
        let cands = Candidates {
            freqs: vec![100_005.0, 100_029.99, 100_039.0],
            peak_ints: vec![1.0, 1.0, 1.0],
        };
        let chunks = extract_chunks(&obs, &sim, &cands, 20.0);
        assert_eq!(chunks.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.id, i);
            assert_eq!(c.freq_obs.len(), c.int_obs.len());
            assert_eq!(c.freq_sim.len(), c.int_sim.len());
            assert_eq!(c.velocity.len(), c.freq_obs.len());
            assert_eq!(c.sim_velocity.len(), c.freq_sim.len());
        }
        // Second window is cut short by the end of the observed band.
        assert!(chunks[1].freq_obs.len() < chunks[1].freq_sim.len());
        // Third line lies beyond the observed band entirely.
        assert!(chunks[2].freq_obs.is_empty());
        assert_eq!(chunks[2].cfreq, 100_039.0);
        assert_eq!(chunks[2].rms, None);
    }

    #[test]
    fn centre_is_the_middle_sample() {
        let obs = spiky(2000, &[]);
        let cands = Candidates {
            freqs: vec![100_010.0],
            peak_ints: vec![1.0],
        };
        let c = &extract_chunks(&obs, &obs, &cands, 20.0)[0];
        let mid = c.freq_obs.len() / 2;
        assert_eq!(c.cfreq, c.freq_obs[mid]);
        assert_eq!(c.velocity[mid], 0.0);
        assert!(c.velocity.windows(2).all(|w| w[1] > w[0]));
        let (lo, hi) = c.keep_band((-1.0, 3.0));
        assert!((lo - (c.cfreq - 3.0 * c.cfreq / CKM)).abs() < 1e-9);
        assert!((hi - (c.cfreq + c.cfreq / CKM)).abs() < 1e-9);
    }
}
