use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use molstack::synth::{add_noise, frequency_axis, line_profile, Line, SimpleRng};
use molstack::StackParams;

fn write_spectrum(path: &Path, freq: &[f64], int: &[f64]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::Float64, false),
        Field::new("y", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(freq.to_vec())),
            Arc::new(Float64Array::from(int.to_vec())),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    // 4 GHz of 20 kHz channels from 100 GHz.
    let freq = frequency_axis(100_000.0, 0.02, 200_000);

    // A ladder of weak lines, 37 MHz apart with slowly varying strength.
    let lines: Vec<Line> = (0..100)
        .map(|i| Line {
            freq: 100_020.0 + i as f64 * 37.0,
            fwhm: 1.5,
            amplitude: 0.5 + 0.5 * ((i as f64) * 0.3).sin().abs(),
        })
        .collect();
    let sim = line_profile(&freq, &lines);

    // Observed: the same ladder at 30 % strength, one strong interloper, unit noise.
    let mut obs_lines: Vec<Line> = lines
        .iter()
        .map(|l| Line {
            amplitude: 0.3 * l.amplitude,
            ..*l
        })
        .collect();
    obs_lines.push(Line {
        freq: lines[12].freq + 4.0,
        fwhm: 3.0,
        amplitude: 25.0,
    });
    let mut obs = line_profile(&freq, &obs_lines);
    add_noise(&mut obs, 1.0, &mut rng);

    write_spectrum(Path::new("sample_obs.parquet"), &freq, &obs)?;
    write_spectrum(Path::new("sample_sim.parquet"), &freq, &sim)?;

    let params = StackParams {
        selection: Some("peaks".into()),
        dv: Some(1.5),
        vlsr: Some(0.0),
        vel_width: Some(30.0),
        blank_lines: Some(true),
        flag_lines: Some(true),
        ..Default::default()
    };
    let json = serde_json::to_string_pretty(&params).context("serialising parameters")?;
    std::fs::write("sample_params.json", json).context("writing sample_params.json")?;

    println!(
        "Wrote {} lines over {} channels to sample_obs.parquet / sample_sim.parquet, options to sample_params.json",
        lines.len(),
        freq.len()
    );
    Ok(())
}
