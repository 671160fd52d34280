use super::chunk::{Chunk, FlagReason};
use crate::data::model::Sample;
use crate::error::{StackError, StackResult};

// ---------------------------------------------------------------------------
// Per-chunk products of the weighting and resampling stages
// ---------------------------------------------------------------------------

/// Weighted copies of a chunk's intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct Weighted {
    pub weight: f64,
    pub int_weighted: Vec<Sample>,
    pub int_sim_weighted: Vec<Sample>,
}

/// Weighted intensities resampled onto the shared velocity grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    pub int_samp: Vec<Sample>,
    pub int_sim_samp: Vec<Sample>,
}

// ---------------------------------------------------------------------------
// Weighting
// ---------------------------------------------------------------------------

/// Relative line strength over noise variance.
pub fn chunk_weight(peak_int: f64, max_peak_int: f64, rms: f64) -> f64 {
    (peak_int / max_peak_int) / (rms * rms)
}

/// Weight every unflagged chunk against the strongest candidate line.
///
/// The maximum is taken over all chunks, flagged or not. Returns the number
/// of weighted chunks, or [`StackError::AllFlagged`] when there are none.
pub fn apply_weights(chunks: &mut [Chunk]) -> StackResult<usize> {
    let max_peak_int = chunks
        .iter()
        .map(|c| c.peak_int)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut weighted = 0;
    for chunk in chunks.iter_mut().filter(|c| !c.is_flagged()) {
        // Cleaning flags these already; keep the flag and the weight in step.
        let Some(rms) = chunk.rms.filter(|r| *r > 0.0) else {
            log::warn!("chunk {} reached weighting without noise, flagging", chunk.id);
            chunk.flag = Some(FlagReason::NoData);
            continue;
        };
        let weight = chunk_weight(chunk.peak_int, max_peak_int, rms);
        chunk.weighted = Some(Weighted {
            weight,
            int_weighted: scale(&chunk.int_obs, weight),
            int_sim_weighted: scale(&chunk.int_sim, weight),
        });
        weighted += 1;
    }

    if weighted == 0 {
        return Err(StackError::AllFlagged(chunks.len()));
    }
    Ok(weighted)
}

fn scale(samples: &[Sample], by: f64) -> Vec<Sample> {
    samples.iter().map(|s| s.map(|v| v * by)).collect()
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

/// Shared velocity grid `[-vel_width, vel_width)` at step `v_res`.
pub fn velocity_grid(vel_width: f64, v_res: f64) -> Vec<f64> {
    let n = ((2.0 * vel_width) / v_res).ceil().max(0.0) as usize;
    (0..n).map(|i| -vel_width + i as f64 * v_res).collect()
}

/// Linear interpolation of `fp` over ascending `xp` at `x`.
///
/// Outside `[xp[0], xp[last]]` the result is missing, as is any point whose
/// bracketing samples are not both present (an exact hit only needs its own).
pub fn interp_masked(x: f64, xp: &[f64], fp: &[Sample]) -> Sample {
    let (first, last) = (*xp.first()?, *xp.last()?);
    if !(x >= first && x <= last) {
        return None;
    }
    let j = xp.partition_point(|&v| v < x);
    if xp[j] == x {
        return fp[j];
    }
    let (x0, x1) = (xp[j - 1], xp[j]);
    let (y0, y1) = (fp[j - 1]?, fp[j]?);
    Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
}

/// Resample every weighted chunk onto `grid`.
pub fn resample_chunks(chunks: &mut [Chunk], grid: &[f64]) {
    for chunk in chunks.iter_mut().filter(|c| !c.is_flagged()) {
        let Some(w) = &chunk.weighted else {
            continue;
        };
        let int_samp = grid
            .iter()
            .map(|&v| interp_masked(v, &chunk.velocity, &w.int_weighted))
            .collect();
        let int_sim_samp = grid
            .iter()
            .map(|&v| interp_masked(v, &chunk.sim_velocity, &w.int_sim_weighted))
            .collect();
        chunk.resampled = Some(Resampled {
            int_samp,
            int_sim_samp,
        });
    }
}

/// Per-grid-sample noise: the sum of `rms²` over the chunks with observed
/// data at that sample.
pub fn noise_profile(chunks: &[Chunk], grid_len: usize) -> Vec<f64> {
    let mut noise = vec![0.0; grid_len];
    for chunk in chunks.iter().filter(|c| !c.is_flagged()) {
        let (Some(r), Some(rms)) = (&chunk.resampled, chunk.rms) else {
            continue;
        };
        for (acc, s) in noise.iter_mut().zip(&r.int_samp) {
            if s.is_some() {
                *acc += rms * rms;
            }
        }
    }
    noise
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::SpectrumData;

    fn flat_chunk(id: usize, freq: Vec<f64>, value: f64, peak_int: f64) -> Chunk {
        let n = freq.len();
        let data = SpectrumData::from_f64(freq, vec![value; n]).unwrap();
        Chunk::new(id, data.clone(), data, peak_int, 100_000.0)
    }

    #[test]
    fn weight_rises_with_strength_and_falls_with_noise() {
        assert!(chunk_weight(2.0, 4.0, 1.0) > chunk_weight(1.0, 4.0, 1.0));
        assert!(chunk_weight(2.0, 4.0, 1.0) > chunk_weight(2.0, 4.0, 1.5));
        assert_eq!(chunk_weight(1.0, 2.0, 2.0), 0.125);
    }

    #[test]
    fn flagged_chunks_are_not_weighted_but_count_for_the_maximum() {
        let freq: Vec<f64> = (0..5).map(|i| 100_000.0 + i as f64).collect();
        let mut chunks = vec![
            flat_chunk(0, freq.clone(), 1.0, 4.0),
            flat_chunk(1, freq, 1.0, 2.0),
        ];
        chunks[0].flag = Some(FlagReason::Dropped);
        assert_eq!(apply_weights(&mut chunks).unwrap(), 1);
        assert!(chunks[0].weighted.is_none());
        assert_eq!(chunks[1].weight(), Some(0.5));
        assert_eq!(chunks[1].weighted.as_ref().unwrap().int_weighted[0], Some(0.5));
    }

    #[test]
    fn all_flagged_is_an_error() {
        let freq: Vec<f64> = (0..5).map(|i| 100_000.0 + i as f64).collect();
        let mut chunks = vec![flat_chunk(0, freq, 1.0, 1.0)];
        chunks[0].flag = Some(FlagReason::Interloper);
        assert_eq!(apply_weights(&mut chunks).unwrap_err(), StackError::AllFlagged(1));
    }

    #[test]
    fn chunk_without_noise_is_flagged_not_skipped() {
        let freq: Vec<f64> = (0..5).map(|i| 100_000.0 + i as f64).collect();
        let mut chunks = vec![flat_chunk(0, freq, 1.0, 1.0)];
        chunks[0].rms = None;
        assert_eq!(apply_weights(&mut chunks).unwrap_err(), StackError::AllFlagged(1));
        assert_eq!(chunks[0].flag, Some(FlagReason::NoData));
        assert!(chunks[0].weighted.is_none());
    }

    #[test]
    fn grid_is_half_open() {
        let g = velocity_grid(1.0, 0.5);
        assert_eq!(g, vec![-1.0, -0.5, 0.0, 0.5]);
    }

    #[test]
    fn interpolation_never_extrapolates() {
        let xp = [0.0, 1.0, 2.0];
        let fp = [Some(0.0), Some(10.0), None];
        assert_eq!(interp_masked(-0.1, &xp, &fp), None);
        assert_eq!(interp_masked(2.1, &xp, &fp), None);
        assert_eq!(interp_masked(0.5, &xp, &fp), Some(5.0));
        assert_eq!(interp_masked(1.0, &xp, &fp), Some(10.0));
        assert_eq!(interp_masked(1.5, &xp, &fp), None);
        assert_eq!(interp_masked(f64::NAN, &xp, &fp), None);
        assert_eq!(interp_masked(0.5, &[], &[]), None);
    }

    #[test]
    fn resampling_is_deterministic_and_masks_uncovered_grid() {
        // ~±3 km/s of coverage against a ±6 km/s grid.
        let freq: Vec<f64> = (0..21).map(|i| 99_999.0 + i as f64 * 0.1).collect();
        let mut chunks = vec![flat_chunk(0, freq, 1.0, 1.0)];
        chunks[0].rms = Some(2.0);
        apply_weights(&mut chunks).unwrap();

        let grid = velocity_grid(6.0, 0.5);
        resample_chunks(&mut chunks, &grid);
        let first = chunks[0].resampled.clone().unwrap();
        resample_chunks(&mut chunks, &grid);
        assert_eq!(chunks[0].resampled.as_ref(), Some(&first));

        let (vmin, vmax) = (chunks[0].velocity[0], *chunks[0].velocity.last().unwrap());
        for (v, s) in grid.iter().zip(&first.int_samp) {
            if *v < vmin || *v > vmax {
                assert_eq!(*s, None, "grid {v} lies outside the chunk");
            } else {
                assert!((s.unwrap() - 0.25).abs() < 1e-12);
            }
        }

        let noise = noise_profile(&chunks, grid.len());
        for (n, s) in noise.iter().zip(&first.int_samp) {
            assert_eq!(*n, if s.is_some() { 4.0 } else { 0.0 });
        }
    }
}
