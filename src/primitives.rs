//! Array primitives shared by the stacking and co-addition code.

use crate::constants::CKM;
use crate::data::model::{Sample, SampleSliceExt};

// ---------------------------------------------------------------------------
// Index lookup
// ---------------------------------------------------------------------------

/// Index of the sample nearest to `value` in an ascending array.
/// Ties resolve to the lower index; an empty array yields 0.
pub fn find_nearest(arr: &[f64], value: f64) -> usize {
    let idx = arr.partition_point(|&x| x < value);
    if idx == 0 {
        return 0;
    }
    if idx == arr.len() {
        return arr.len() - 1;
    }
    if (value - arr[idx - 1]).abs() <= (arr[idx] - value).abs() {
        idx - 1
    } else {
        idx
    }
}

/// Index of the present sample closest in value to `value`, for unordered data.
/// Falls back to 0 when nothing is present.
pub fn find_nearest_unordered(arr: &[Sample], value: f64) -> usize {
    arr.iter()
        .enumerate()
        .filter_map(|(i, s)| s.map(|v| (i, (v - value).abs())))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Noise
// ---------------------------------------------------------------------------

const RMS_CLIP_SIGMA: f64 = 3.0;

/// Noise estimate by iterative 3σ clipping of the present samples.
///
/// Starts from the root-mean-square of everything, then repeatedly drops
/// samples at or above `3 * rms` while the largest remaining sample is above
/// that level. `None` when no samples are present.
pub fn get_rms(samples: &[Sample]) -> Option<f64> {
    let mut values = samples.present_values();
    let mut rms = root_mean_square(&values)?;
    loop {
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max <= RMS_CLIP_SIGMA * rms {
            return Some(rms);
        }
        let cut = RMS_CLIP_SIGMA * rms;
        values.retain(|&v| v < cut);
        rms = root_mean_square(&values)?;
    }
}

fn root_mean_square(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean_sq = values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;
    Some(mean_sq.sqrt())
}

// ---------------------------------------------------------------------------
// Missing runs
// ---------------------------------------------------------------------------

/// Maximal runs of missing samples as half-open `(start, end)` pairs.
pub fn find_missing_runs(samples: &[Sample]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, s) in samples.iter().enumerate() {
        match (s, start) {
            (None, None) => start = Some(i),
            (Some(_), Some(st)) => {
                runs.push((st, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(st) = start {
        runs.push((st, samples.len()));
    }
    runs
}

// ---------------------------------------------------------------------------
// Frequency axis helpers
// ---------------------------------------------------------------------------

/// Median channel spacing of a frequency axis, `0.0` for fewer than two samples.
pub fn get_res(freq: &[f64]) -> f64 {
    let mut diffs: Vec<f64> = freq.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    if diffs.is_empty() {
        return 0.0;
    }
    diffs.sort_by(f64::total_cmp);
    let mid = diffs.len() / 2;
    if diffs.len() % 2 == 0 {
        (diffs[mid - 1] + diffs[mid]) / 2.0
    } else {
        diffs[mid]
    }
}

/// Contiguous coverage segments of an ascending frequency axis.
///
/// A gap is any spacing larger than `spacing_tolerance` channels; each
/// segment is widened by `padding` channels on both sides.
pub fn find_limits(freq: &[f64], spacing_tolerance: f64, padding: f64) -> Vec<(f64, f64)> {
    let Some((&first, rest)) = freq.split_first() else {
        return Vec::new();
    };
    let res = get_res(freq);
    let max_gap = spacing_tolerance * res;

    let mut segments = Vec::new();
    let mut lo = first;
    let mut prev = first;
    for &f in rest {
        if f - prev > max_gap {
            segments.push((lo - padding * res, prev + padding * res));
            lo = f;
        }
        prev = f;
    }
    segments.push((lo - padding * res, prev + padding * res));
    segments
}

// ---------------------------------------------------------------------------
// Peak finding
// ---------------------------------------------------------------------------

/// Indices of local maxima in `int`, thinned to a minimum separation.
///
/// `min_sep` is a velocity (km/s) converted to channels at the band centre
/// using the channel width `res` (MHz). Within that distance only the tallest
/// peak is kept. Simulated spectra keep every positive peak; observed spectra
/// keep peaks above `sigma` times the clipped rms. Returned ascending.
pub fn find_peaks(
    freq: &[f64],
    int: &[Sample],
    res: f64,
    min_sep: f64,
    is_sim: bool,
    sigma: f64,
) -> Vec<usize> {
    let n = int.len().min(freq.len());
    if n < 3 {
        return Vec::new();
    }

    let threshold = if is_sim {
        0.0
    } else {
        match get_rms(int) {
            Some(rms) => sigma * rms,
            None => return Vec::new(),
        }
    };

    let mut candidates: Vec<(usize, f64)> = (1..n - 1)
        .filter_map(|i| {
            let (Some(l), Some(c), Some(r)) = (int[i - 1], int[i], int[i + 1]) else {
                return None;
            };
            (c > l && c >= r && c > threshold).then_some((i, c))
        })
        .collect();

    let centre = (freq[0] + freq[n - 1]) / 2.0;
    let distance = if res > 0.0 {
        ((min_sep * centre / CKM / res).ceil() as usize).max(1)
    } else {
        1
    };

    // Tallest first; a peak survives if no taller survivor sits within `distance`.
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
    for (i, _) in candidates {
        if kept.iter().all(|&k| k.abs_diff(i) >= distance) {
            kept.push(i);
        }
    }
    kept.sort_unstable();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(v: &[f64]) -> Vec<Sample> {
        v.iter().map(|&x| Some(x)).collect()
    }

    #[test]
    fn nearest_index_clamps_and_rounds() {
        let arr = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(find_nearest(&arr, -10.0), 0);
        assert_eq!(find_nearest(&arr, 10.0), 3);
        assert_eq!(find_nearest(&arr, 2.4), 1);
        assert_eq!(find_nearest(&arr, 2.6), 2);
        assert_eq!(find_nearest(&arr, 2.5), 1);
        assert_eq!(find_nearest(&[], 1.0), 0);
    }

    #[test]
    fn nearest_value_in_unordered_data() {
        let arr = vec![Some(5.0), None, Some(-1.0), Some(0.9)];
        assert_eq!(find_nearest_unordered(&arr, 1.0), 3);
        assert_eq!(find_nearest_unordered(&arr, -3.0), 2);
    }

    #[test]
    fn rms_of_flat_noise() {
        let s = samples(&[1.0, -1.0, 1.0, -1.0]);
        assert_eq!(get_rms(&s), Some(1.0));
    }

    #[test]
    fn rms_clips_a_spike() {
        let mut v = vec![1.0, -1.0].repeat(50);
        v.push(1000.0);
        let rms = get_rms(&samples(&v)).unwrap();
        assert!((rms - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rms_of_nothing_is_none() {
        assert_eq!(get_rms(&[None, None]), None);
        assert_eq!(get_rms(&[]), None);
    }

    #[test]
    fn missing_runs_are_half_open() {
        let s = vec![None, Some(1.0), None, None, Some(2.0), None];
        assert_eq!(find_missing_runs(&s), vec![(0, 1), (2, 4), (5, 6)]);
        assert!(find_missing_runs(&samples(&[1.0, 2.0])).is_empty());
    }

    #[test]
    fn resolution_is_median_spacing() {
        assert_eq!(get_res(&[0.0, 1.0, 2.0, 10.0]), 1.0);
        assert_eq!(get_res(&[5.0]), 0.0);
    }

    #[test]
    fn limits_split_on_gaps() {
        let freq = [0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0];
        assert_eq!(find_limits(&freq, 2.0, 0.0), vec![(0.0, 3.0), (10.0, 12.0)]);
        assert_eq!(find_limits(&freq, 2.0, 1.0), vec![(-1.0, 4.0), (9.0, 13.0)]);
    }

    #[test]
    fn peaks_respect_min_separation() {
        // 1 kHz channels at ~100 GHz: 1 km/s ≈ 0.334 MHz ≈ 334 channels.
        let freq: Vec<f64> = (0..2000).map(|i| 100_000.0 + i as f64 * 0.001).collect();
        let mut int = vec![Some(0.0); 2000];
        int[500] = Some(1.0);
        int[600] = Some(2.0);
        int[1500] = Some(0.5);
        let peaks = find_peaks(&freq, &int, 0.001, 1.0, true, 3.0);
        assert_eq!(peaks, vec![600, 1500]);
    }

    #[test]
    fn observed_peaks_need_significance() {
        let freq: Vec<f64> = (0..100).map(|i| 1000.0 + i as f64).collect();
        let mut v: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        v[40] = 5.0;
        v[71] = 0.2;
        let peaks = find_peaks(&freq, &samples(&v), 1.0, 0.0, false, 3.0);
        assert_eq!(peaks, vec![40]);
    }
}
