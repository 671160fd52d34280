use super::chunk::Chunk;
use crate::data::model::{Sample, Spectrum};
use crate::error::{StackError, StackResult};
use crate::primitives::get_rms;

/// Grid samples dropped from each end of the composite.
pub const EDGE_TRIM: usize = 5;

/// Noise-normalised sums before trimming and SNR scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub int_avg: Vec<Sample>,
    pub int_sim_avg: Vec<Sample>,
}

/// Sum the resampled chunks at every grid sample and divide by the noise
/// accumulated there. Samples no chunk covers come out missing.
pub fn combine(chunks: &[Chunk], noise: &[f64]) -> StackResult<Composite> {
    if noise.iter().all(|&n| n <= 0.0) {
        return Err(StackError::NoCoverage);
    }

    let mut obs_sum = vec![0.0; noise.len()];
    let mut sim_sum = vec![0.0; noise.len()];
    for r in chunks
        .iter()
        .filter(|c| !c.is_flagged())
        .filter_map(|c| c.resampled.as_ref())
    {
        accumulate(&mut obs_sum, &r.int_samp);
        accumulate(&mut sim_sum, &r.int_sim_samp);
    }

    let normalise = |sums: Vec<f64>| -> Vec<Sample> {
        sums.into_iter()
            .zip(noise)
            .map(|(s, &n)| (n > 0.0).then(|| s / n))
            .collect()
    };
    Ok(Composite {
        int_avg: normalise(obs_sum),
        int_sim_avg: normalise(sim_sum),
    })
}

fn accumulate(acc: &mut [f64], samples: &[Sample]) {
    for (a, s) in acc.iter_mut().zip(samples) {
        if let Some(v) = s {
            *a += v;
        }
    }
}

/// Drop [`EDGE_TRIM`] samples from both ends.
pub fn trim_edges<T: Clone>(values: &[T]) -> Vec<T> {
    if values.len() <= 2 * EDGE_TRIM {
        return Vec::new();
    }
    values[EDGE_TRIM..values.len() - EDGE_TRIM].to_vec()
}

/// Trim the composite and rescale it by its own rms into SNR units.
pub fn to_snr(grid: &[f64], composite: Composite, name: &str) -> StackResult<Spectrum> {
    if grid.len() <= 2 * EDGE_TRIM {
        return Err(StackError::GridTooShort {
            len: grid.len(),
            min: 2 * EDGE_TRIM,
        });
    }
    let velocity = trim_edges(grid);
    let int_avg = trim_edges(&composite.int_avg);
    let int_sim_avg = trim_edges(&composite.int_sim_avg);

    let rms = get_rms(&int_avg)
        .filter(|r| *r > 0.0)
        .ok_or(StackError::ZeroNoise)?;

    let uncovered = int_avg.iter().filter(|s| s.is_none()).count();
    if uncovered > 0 {
        log::warn!("{uncovered} of {} stacked channels have no coverage", int_avg.len());
    }

    let mut stacked = Spectrum::new(name);
    stacked.velocity = Some(velocity);
    stacked.snr = Some(int_avg.iter().map(|s| s.map(|v| v / rms)).collect());
    stacked.int_sim = Some(int_sim_avg.iter().map(|s| s.map(|v| v / rms)).collect());
    Ok(stacked)
}
