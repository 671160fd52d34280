use super::chunk::{Chunk, FlagReason};
use crate::data::model::{Sample, SampleSliceExt};
use crate::data::params::{BlankMapping, StackConfig};
use crate::primitives::{find_missing_runs, find_nearest, find_nearest_unordered};

// ---------------------------------------------------------------------------
// Cleaning passes
// ---------------------------------------------------------------------------

/// Run the drop, blanking and flagging passes over every chunk, in order.
/// Returns the number of chunks still unflagged.
pub fn clean_chunks(chunks: &mut [Chunk], cfg: &StackConfig) -> usize {
    for chunk in chunks.iter_mut() {
        clean_chunk(chunk, cfg);
        if let Some(reason) = chunk.flag {
            log::debug!("chunk {} at {:.4} MHz flagged: {reason}", chunk.id, chunk.cfreq);
        }
    }
    let survivors = chunks.iter().filter(|c| !c.is_flagged()).count();
    log::info!("{survivors} of {} chunks survive cleaning", chunks.len());
    survivors
}

fn clean_chunk(chunk: &mut Chunk, cfg: &StackConfig) {
    if chunk.is_flagged() {
        return;
    }
    if let Some(reason) = drop_reason(chunk, cfg) {
        chunk.flag = Some(reason);
        return;
    }
    if cfg.blank_lines {
        blank_outliers(chunk, cfg.blank_keep_range, cfg.flag_sigma, cfg.blank_mapping);
        // Blanking may leave nothing to measure the noise on.
        if !has_noise(chunk) {
            chunk.flag = Some(FlagReason::NoData);
            return;
        }
    }
    if cfg.flag_lines {
        chunk.flag = interloper(chunk, cfg.flag_sigma);
    }
}

fn drop_reason(chunk: &Chunk, cfg: &StackConfig) -> Option<FlagReason> {
    if chunk.freq_obs.is_empty() {
        Some(FlagReason::Empty)
    } else if cfg.drops.contains(&chunk.id) {
        Some(FlagReason::Dropped)
    } else if !has_noise(chunk) {
        Some(FlagReason::NoData)
    } else {
        None
    }
}

fn has_noise(chunk: &Chunk) -> bool {
    chunk.rms.is_some_and(|r| r > 0.0)
}

/// Flag a chunk whose strongest observed sample still exceeds `sigma * rms`.
fn interloper(chunk: &Chunk, sigma: f64) -> Option<FlagReason> {
    let Some(rms) = chunk.rms else {
        return Some(FlagReason::NoData);
    };
    match chunk.int_obs.masked_max() {
        Some(max) if max > sigma * rms => Some(FlagReason::Interloper),
        Some(_) => None,
        None => Some(FlagReason::NoData),
    }
}

// ---------------------------------------------------------------------------
// Blanking
// ---------------------------------------------------------------------------

/// Blank every observed sample beyond `sigma * rms` and the matching span of
/// the simulation, leaving the protected velocity band `keep` untouched.
/// Positive velocities lie below the chunk's centre frequency.
/// `rms` is recomputed afterwards.
pub fn blank_outliers(chunk: &mut Chunk, keep: (f64, f64), sigma: f64, mapping: BlankMapping) {
    let Some(rms) = chunk.rms else {
        return;
    };
    let (lo, hi) = chunk.keep_band(keep);
    let obs_keep = keep_range(&chunk.freq_obs, lo, hi);
    let sim_keep = keep_range(&chunk.freq_sim, lo, hi);
    let obs_safe = chunk.int_obs[obs_keep.0..obs_keep.1].to_vec();
    let sim_safe = chunk.int_sim[sim_keep.0..sim_keep.1].to_vec();

    let unblanked = chunk.int_obs.clone();
    let threshold = sigma * rms;
    for s in chunk.int_obs.iter_mut() {
        if s.is_some_and(|v| v.abs() > threshold) {
            *s = None;
        }
    }

    for (start, end) in find_missing_runs(&chunk.int_obs) {
        let span = match mapping {
            BlankMapping::Position => position_span(chunk, start, end),
            BlankMapping::Value => value_span(&chunk.int_sim, &unblanked, start, end),
        };
        if let Some((a, b)) = span {
            chunk.int_sim[a..b].fill(None);
        }
    }

    chunk.int_obs[obs_keep.0..obs_keep.1].copy_from_slice(&obs_safe);
    chunk.int_sim[sim_keep.0..sim_keep.1].copy_from_slice(&sim_safe);
    chunk.set_rms();
}

fn keep_range(freq: &[f64], lo: f64, hi: f64) -> (usize, usize) {
    let ll = find_nearest(freq, lo);
    let ul = find_nearest(freq, hi).max(ll);
    (ll, ul)
}

/// Simulated span covering the frequencies of observed samples `start..end`.
fn position_span(chunk: &Chunk, start: usize, end: usize) -> Option<(usize, usize)> {
    let (first, last) = (chunk.freq_sim.first()?, chunk.freq_sim.last()?);
    let (f_lo, f_hi) = (chunk.freq_obs[start], chunk.freq_obs[end - 1]);
    if f_hi < *first || f_lo > *last {
        return None;
    }
    let a = find_nearest(&chunk.freq_sim, f_lo);
    let b = find_nearest(&chunk.freq_sim, f_hi) + 1;
    Some((a, b))
}

/// Simulated span between the samples whose values best match the observed
/// values at the run boundaries, before blanking.
fn value_span(
    int_sim: &[Sample],
    unblanked: &[Sample],
    start: usize,
    end: usize,
) -> Option<(usize, usize)> {
    let (lo, hi) = (unblanked[start]?, unblanked[end - 1]?);
    let a = find_nearest_unordered(int_sim, lo);
    let b = find_nearest_unordered(int_sim, hi);
    (a < b).then_some((a, b))
}
