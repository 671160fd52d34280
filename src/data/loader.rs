use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, Float32Array, Float64Array, LargeListArray, ListArray};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::SpectrumData;
use super::params::StackParams;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load one spectrum (frequency in MHz, intensity) from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `x`/`y` columns, either flat floats or list columns (first row is used)
/// * `.json`    – `{ "x": [...], "y": [...] }`
/// * `.csv`     – header with `x` and `y` columns, one channel per row
pub fn load_spectrum(path: &Path) -> Result<SpectrumData> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (x, y) = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    log::debug!("{}: {} channels", path.display(), x.len());
    SpectrumData::from_f64(x, y).with_context(|| format!("invalid spectrum in {}", path.display()))
}

/// Load stacking options from a JSON parameter file.
pub fn load_params(path: &Path) -> Result<StackParams> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading parameter file {}", path.display()))?;
    StackParams::from_json_str(&text).context("parsing stacking parameters")
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema:
///
/// ```json
/// { "x": [100000.0, 100000.1, ...], "y": [0.012, null, ...] }
/// ```
///
/// `null` intensities load as missing samples.
fn load_json(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    let obj = root.as_object().context("Expected top-level JSON object")?;

    let x = json_array_to_f64(obj.get("x"), "x", false)?;
    let y = json_array_to_f64(obj.get("y"), "y", true)?;
    if x.len() != y.len() {
        bail!("x has {} values but y has {}", x.len(), y.len());
    }
    Ok((x, y))
}

fn json_array_to_f64(val: Option<&JsonValue>, col: &str, allow_null: bool) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| match v {
            JsonValue::Null if allow_null => Ok(f64::NAN),
            _ => v
                .as_f64()
                .with_context(|| format!("{col}[{j}]: not a number")),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row naming `x` and `y`, then one channel per row.
/// Other columns are ignored; an empty `y` cell is a missing sample.
fn load_csv(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();

    let x_idx = headers
        .iter()
        .position(|h| h.trim() == "x")
        .context("CSV missing 'x' column")?;
    let y_idx = headers
        .iter()
        .position(|h| h.trim() == "y")
        .context("CSV missing 'y' column")?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let xs = record.get(x_idx).unwrap_or("").trim();
        let ys = record.get(y_idx).unwrap_or("").trim();

        x.push(
            xs.parse::<f64>()
                .with_context(|| format!("Row {row_no}, x: '{xs}' is not a number"))?,
        );
        y.push(if ys.is_empty() {
            f64::NAN
        } else {
            ys.parse::<f64>()
                .with_context(|| format!("Row {row_no}, y: '{ys}' is not a number"))?
        });
    }
    Ok((x, y))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file holding one spectrum.
///
/// Either schema works:
/// - `x`, `y`: Float64/Float32 columns, one channel per row (all batches concatenated)
/// - `x`, `y`: List<Float64> or LargeList<Float64>, one spectrum per row (first row used)
fn load_parquet(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut x = Vec::new();
    let mut y = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let x_idx = schema
            .index_of("x")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'x' column"))?;
        let y_idx = schema
            .index_of("y")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'y' column"))?;

        let x_col = batch.column(x_idx);
        let y_col = batch.column(y_idx);

        if matches!(x_col.data_type(), DataType::List(_) | DataType::LargeList(_)) {
            if batch.num_rows() == 0 {
                continue;
            }
            if batch.num_rows() > 1 {
                log::warn!("{}: {} spectra in file, using the first", path.display(), batch.num_rows());
            }
            let xs = extract_f64_list(x_col, 0).context("failed to read 'x'")?;
            let ys = extract_f64_list(y_col, 0).context("failed to read 'y'")?;
            if xs.len() != ys.len() {
                bail!("x has {} values but y has {}", xs.len(), ys.len());
            }
            return Ok((xs, ys));
        }

        x.extend(extract_f64_column(x_col).context("failed to read 'x'")?);
        y.extend(extract_f64_column(y_col).context("failed to read 'y'")?);
    }

    if x.len() != y.len() {
        bail!("x has {} values but y has {}", x.len(), y.len());
    }
    Ok((x, y))
}

// -- Parquet / Arrow helpers --

/// Read a flat Float64 or Float32 column; nulls become `NaN`.
fn extract_f64_column(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    float_values(col.as_ref())
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    float_values(values_array.as_ref())
}

fn float_values(arr: &dyn Array) -> Result<Vec<f64>> {
    if let Some(f64_arr) = arr.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = arr.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!("column type is {:?}, expected Float64 or Float32", arr.data_type())
    }
}
