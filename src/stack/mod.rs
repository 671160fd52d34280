//! Velocity stacking: many weak lines → one composite in SNR units.
//!
//! Stages run strictly in order, each owning the chunk list in turn:
//! ```text
//!   select_candidates → extract_chunks → clean_chunks
//!       → apply_weights → resample_chunks / noise_profile
//!       → combine → to_snr
//! ```
//! Flagged chunks stay in the returned list but take no part after cleaning.

pub mod chunk;
pub mod clean;
pub mod composite;
pub mod weight;

use crate::data::model::{Spectrum, SpectrumData};
use crate::data::params::{StackConfig, StackParams};
use crate::error::{StackError, StackResult};

use chunk::{extract_chunks, select_candidates, Chunk};
use clean::clean_chunks;
use composite::{combine, to_snr, EDGE_TRIM};
use weight::{apply_weights, noise_profile, resample_chunks, velocity_grid};

/// Result of a stack: the composite plus every chunk, flagged ones included.
#[derive(Debug, Clone)]
pub struct StackOutput {
    /// `velocity`, `snr` and `int_sim` are populated.
    pub spectrum: Spectrum,
    pub chunks: Vec<Chunk>,
}

/// Stack `observed` around the lines of `simulated` using `params`.
pub fn velocity_stack(
    observed: &SpectrumData,
    simulated: &SpectrumData,
    params: &StackParams,
    name: &str,
) -> StackResult<StackOutput> {
    let cfg = params.resolve(observed)?;
    stack_with_config(observed, simulated, &cfg, name)
}

/// Stack with options that were already resolved.
pub fn stack_with_config(
    observed: &SpectrumData,
    simulated: &SpectrumData,
    cfg: &StackConfig,
    name: &str,
) -> StackResult<StackOutput> {
    let grid = velocity_grid(cfg.vel_width, cfg.v_res);
    if grid.len() <= 2 * EDGE_TRIM {
        return Err(StackError::GridTooShort {
            len: grid.len(),
            min: 2 * EDGE_TRIM,
        });
    }
    log::info!(
        "stacking '{name}': vlsr {} km/s, ±{} km/s at {} km/s, {} selection",
        cfg.vlsr,
        cfg.vel_width,
        cfg.v_res,
        cfg.selection
    );

    let candidates = select_candidates(simulated, cfg)?;
    let mut chunks = extract_chunks(observed, simulated, &candidates, cfg.vel_width);
    clean_chunks(&mut chunks, cfg);

    apply_weights(&mut chunks)?;
    resample_chunks(&mut chunks, &grid);
    let noise = noise_profile(&chunks, grid.len());
    let composite = combine(&chunks, &noise)?;
    let spectrum = to_snr(&grid, composite, name)?;

    Ok(StackOutput { spectrum, chunks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::SampleSliceExt;
    use crate::primitives::get_rms;
    use crate::stack::chunk::FlagReason;
    use crate::synth::{add_noise, frequency_axis, line_profile, Line, SimpleRng};

    const N_LINES: usize = 20;

    /// 20 lines 20 MHz apart; observed copy scaled by `strength` with unit noise,
    /// plus an optional `(line, offset MHz, amplitude)` interloper.
    fn synthetic(
        strength: f64,
        interloper: Option<(usize, f64, f64)>,
    ) -> (SpectrumData, SpectrumData) {
        let freq = frequency_axis(100_000.0, 0.02, 22_000);
        let lines: Vec<Line> = (0..N_LINES)
            .map(|i| Line {
                freq: 100_010.0 + i as f64 * 20.0,
                fwhm: 2.0,
                amplitude: 1.0 + 0.1 * i as f64,
            })
            .collect();
        let sim = line_profile(&freq, &lines);

        let mut obs_lines: Vec<Line> = lines
            .iter()
            .map(|l| Line {
                amplitude: strength * l.amplitude,
                ..*l
            })
            .collect();
        if let Some((i, offset, amplitude)) = interloper {
            obs_lines.push(Line {
                freq: lines[i].freq + offset,
                fwhm: 2.0,
                amplitude,
            });
        }
        let mut obs = line_profile(&freq, &obs_lines);
        add_noise(&mut obs, 1.0, &mut SimpleRng::new(42));

        (
            SpectrumData::from_f64(freq.clone(), obs).unwrap(),
            SpectrumData::from_f64(freq, sim).unwrap(),
        )
    }

    fn params() -> StackParams {
        StackParams {
            selection: Some("peaks".into()),
            dv: Some(2.0),
            vlsr: Some(0.0),
            vel_width: Some(20.0),
            ..Default::default()
        }
    }

    fn peak_velocity(sp: &Spectrum) -> f64 {
        let v = sp.velocity.as_ref().unwrap();
        let snr = sp.snr.as_ref().unwrap();
        let (i, _) = snr
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|x| (i, x)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        v[i]
    }

    #[test]
    fn weak_lines_stack_into_a_detection() {
        let (obs, sim) = synthetic(2.0, None);
        let out = velocity_stack(&obs, &sim, &params(), "stack").unwrap();
        assert_eq!(out.chunks.len(), N_LINES);
        assert!(out.chunks.iter().all(|c| !c.is_flagged()));

        let sp = &out.spectrum;
        assert!(sp.is_consistent());
        assert_eq!(sp.name, "stack");
        let snr = sp.snr.as_ref().unwrap();
        assert!(snr.masked_max().unwrap() > 8.0);
        assert!(peak_velocity(sp).abs() < 1.0);
        assert!((get_rms(snr).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn output_grid_is_trimmed() {
        let (obs, sim) = synthetic(2.0, None);
        let cfg = params().resolve(&obs).unwrap();
        let out = stack_with_config(&obs, &sim, &cfg, "stack").unwrap();
        let full = velocity_grid(cfg.vel_width, cfg.v_res);
        assert_eq!(out.spectrum.len(), full.len() - 2 * EDGE_TRIM);
    }

    #[test]
    fn lines_selection_also_stacks() {
        let (obs, sim) = synthetic(2.0, None);
        let p = StackParams {
            selection: Some("lines".into()),
            dv_ext: Some(2.0),
            ..params()
        };
        let out = velocity_stack(&obs, &sim, &p, "lines").unwrap();
        assert_eq!(out.chunks.len(), N_LINES);
        assert!(peak_velocity(&out.spectrum).abs() < 1.0);
    }

    #[test]
    fn all_chunks_dropped_is_an_error() {
        let (obs, sim) = synthetic(2.0, None);
        let p = StackParams {
            drops: Some((0..N_LINES).collect()),
            ..params()
        };
        assert_eq!(
            velocity_stack(&obs, &sim, &p, "stack").unwrap_err(),
            StackError::AllFlagged(N_LINES)
        );
    }

    #[test]
    fn dropped_chunks_are_reported_but_not_stacked() {
        let (obs, sim) = synthetic(2.0, None);
        let p = StackParams {
            drops: Some(vec![0, 5]),
            ..params()
        };
        let out = velocity_stack(&obs, &sim, &p, "stack").unwrap();
        assert_eq!(out.chunks.len(), N_LINES);
        for c in &out.chunks {
            let dropped = c.id == 0 || c.id == 5;
            assert_eq!(c.flag == Some(FlagReason::Dropped), dropped);
            assert_eq!(c.weighted.is_none(), dropped);
            assert_eq!(c.resampled.is_none(), dropped);
        }
    }

    #[test]
    fn off_centre_interloper_is_blanked() {
        let (obs, sim) = synthetic(2.0, Some((3, 3.0, 40.0)));
        let p = StackParams {
            blank_lines: Some(true),
            ..params()
        };
        let out = velocity_stack(&obs, &sim, &p, "stack").unwrap();
        let chunk = &out.chunks[3];
        assert!(!chunk.is_flagged());
        assert!(chunk.int_obs.present() < chunk.int_obs.len());
        assert!(chunk.int_sim.present() < chunk.int_sim.len());
        assert!(peak_velocity(&out.spectrum).abs() < 1.0);
    }

    #[test]
    fn core_interloper_is_flagged() {
        let (obs, sim) = synthetic(0.5, Some((7, 0.1, 60.0)));
        let p = StackParams {
            blank_lines: Some(true),
            flag_lines: Some(true),
            ..params()
        };
        let out = velocity_stack(&obs, &sim, &p, "stack").unwrap();
        assert_eq!(out.chunks[7].flag, Some(FlagReason::Interloper));
        assert_eq!(out.chunks.iter().filter(|c| c.is_flagged()).count(), 1);
    }

    #[test]
    fn bad_config_fails_before_any_work() {
        let (obs, sim) = synthetic(2.0, None);
        let p = StackParams {
            selection: Some("lines".into()),
            ..params()
        };
        assert!(velocity_stack(&obs, &sim, &p, "stack").unwrap_err().is_config());

        let p = StackParams {
            v_res: Some(10.0),
            ..params()
        };
        assert!(matches!(
            velocity_stack(&obs, &sim, &p, "stack").unwrap_err(),
            StackError::GridTooShort { .. }
        ));
    }
}
