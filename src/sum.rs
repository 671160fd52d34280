//! Co-addition of several spectra onto one frequency grid.

use crate::constants::{H, K};
use crate::data::model::{Spectrum, SpectrumData};
use crate::error::{StackError, StackResult};
use crate::primitives::{find_limits, get_res};
use crate::stack::weight::interp_masked;

/// How co-added intensities are combined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SumMode {
    /// Optically thin: intensities add directly.
    Thin,
    /// Inputs are optical depths; the summed depth is converted to a
    /// brightness temperature at one excitation and background temperature (K).
    Thick { tex: f64, tbg: f64 },
}

/// Planck-corrected radiation temperature `J(T)` at `freq` (MHz).
pub fn radiation_temperature(freq: f64, t: f64) -> f64 {
    let hv_k = H * freq * 1e6 / K;
    hv_k / ((hv_k / t).exp() - 1.0)
}

/// Resample every input onto a common grid and add them up.
///
/// The grid covers each contiguous stretch of the pooled input frequencies
/// at step `res` (default: the finest input resolution). Inputs contribute
/// zero outside their own coverage and wherever they have missing samples.
pub fn sum_spectra(
    inputs: &[SpectrumData],
    mode: SumMode,
    res: Option<f64>,
    name: &str,
) -> StackResult<Spectrum> {
    if inputs.iter().all(SpectrumData::is_empty) {
        return Err(StackError::invalid("inputs", "no spectra to sum"));
    }
    let res = match res {
        Some(r) => r,
        None => inputs
            .iter()
            .map(|sp| get_res(&sp.freq))
            .filter(|r| *r > 0.0)
            .fold(f64::INFINITY, f64::min),
    };
    if !(res.is_finite() && res > 0.0) {
        return Err(StackError::invalid("res", format!("must be positive, got {res}")));
    }
    if let SumMode::Thick { tex, tbg } = mode {
        if !(tex > 0.0 && tbg > 0.0) {
            return Err(StackError::invalid("tex/tbg", "temperatures must be positive"));
        }
    }

    let mut total: Vec<f64> = inputs.iter().flat_map(|sp| sp.freq.iter().copied()).collect();
    total.sort_by(f64::total_cmp);
    let freq: Vec<f64> = find_limits(&total, 2.0, 0.0)
        .into_iter()
        .flat_map(|(ll, ul)| {
            let n = ((ul - ll) / res).ceil().max(0.0) as usize;
            (0..n).map(move |i| ll + i as f64 * res)
        })
        .collect();

    let mut acc = vec![0.0; freq.len()];
    for sp in inputs {
        for (a, &f) in acc.iter_mut().zip(&freq) {
            *a += interp_masked(f, &sp.freq, &sp.int).unwrap_or(0.0);
        }
    }

    let intensity = match mode {
        SumMode::Thin => acc,
        SumMode::Thick { tex, tbg } => acc
            .iter()
            .zip(&freq)
            .map(|(tau, &f)| {
                (radiation_temperature(f, tex) - radiation_temperature(f, tbg))
                    * (1.0 - (-tau).exp())
            })
            .collect(),
    };
    log::debug!("summed {} spectra onto {} channels", inputs.len(), freq.len());

    let mut summed = Spectrum::new(name);
    summed.intensity = Some(intensity.into_iter().map(Some).collect());
    summed.freq = Some(freq);
    Ok(summed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: f64, n: usize, value: f64) -> SpectrumData {
        let freq = (0..n).map(|i| start + i as f64).collect();
        SpectrumData::from_f64(freq, vec![value; n]).unwrap()
    }

    #[test]
    fn thin_sum_adds_overlapping_spectra() {
        let a = ramp(100.0, 11, 1.0);
        let b = ramp(105.0, 11, 2.0);
        let sp = sum_spectra(&[a, b], SumMode::Thin, None, "sum").unwrap();
        let freq = sp.freq.as_ref().unwrap();
        let int = sp.intensity.as_ref().unwrap();
        assert!(sp.is_consistent());
        assert_eq!(freq[0], 100.0);
        for (f, i) in freq.iter().zip(int) {
            let expected = match *f {
                f if f < 105.0 => 1.0,
                f if f <= 110.0 => 3.0,
                _ => 2.0,
            };
            assert_eq!(i.unwrap(), expected, "at {f} MHz");
        }
    }

    #[test]
    fn gaps_are_not_filled() {
        let a = ramp(100.0, 5, 1.0);
        let b = ramp(200.0, 5, 1.0);
        let sp = sum_spectra(&[a, b], SumMode::Thin, Some(0.5), "sum").unwrap();
        let freq = sp.freq.unwrap();
        assert!(freq.iter().all(|f| *f < 104.0 || *f >= 200.0));
        assert_eq!(freq.len(), 16);
    }

    #[test]
    fn thick_sum_saturates() {
        let thin = ramp(100_000.0, 5, 1e-6);
        let thick = ramp(100_000.0, 5, 50.0);
        let mode = SumMode::Thick { tex: 10.0, tbg: 2.7 };
        let j = radiation_temperature(100_000.0, 10.0) - radiation_temperature(100_000.0, 2.7);

        let sp = sum_spectra(&[thin], mode, None, "thin").unwrap();
        let v = sp.intensity.unwrap()[0].unwrap();
        assert!((v - j * 1e-6).abs() < 1e-10);

        let sp = sum_spectra(&[thick], mode, None, "thick").unwrap();
        let v = sp.intensity.unwrap()[0].unwrap();
        assert!((v - j).abs() < 1e-9);
    }

    #[test]
    fn planck_temperature_at_100_ghz() {
        // hν/k ≈ 4.799 K at 100 GHz.
        let j = radiation_temperature(100_000.0, 10.0);
        assert!((j - 7.7916).abs() < 1e-3);
    }

    #[test]
    fn nothing_to_sum() {
        assert!(sum_spectra(&[], SumMode::Thin, None, "sum").is_err());
    }
}
