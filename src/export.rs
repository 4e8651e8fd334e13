//! Numeric array export
//!
//! Writes a result table as a 2-D little-endian `float64` array in NumPy's
//! `.npy` v1.0 format, one row per result row.

use crate::db::{Table, Value};
use crate::error::{DeddiagError, Result};
use std::path::Path;
use tracing::info;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
// magic + version + header length field
const PREAMBLE_LEN: usize = 10;
const HEADER_ALIGN: usize = 64;

/// Cell as a float: epoch seconds for time values, 0/1 for booleans, NaN for NULL
pub fn to_f64(value: &Value) -> Result<f64> {
    let v = match value {
        Value::Null => f64::NAN,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp() as f64)
            .unwrap_or(f64::NAN),
        Value::Timestamp(ts) => ts.and_utc().timestamp_micros() as f64 / 1e6,
        Value::TimestampTz(ts) => ts.timestamp_micros() as f64 / 1e6,
        Value::Interval(iv) => iv.as_seconds(),
        Value::Text(s) => {
            return Err(DeddiagError::Export(format!(
                "text value '{}' has no numeric representation",
                s
            )))
        }
    };
    Ok(v)
}

/// Encode `table` as `.npy` bytes
pub fn encode_npy(table: &Table) -> Result<Vec<u8>> {
    let rows = table.len();
    let cols = table.columns.len();

    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    // pad with spaces so the data starts on an aligned offset, header ends in \n
    let unpadded = PREAMBLE_LEN + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| DeddiagError::Export("npy header too long".to_string()))?;

    let mut out = Vec::with_capacity(PREAMBLE_LEN + header.len() + rows * cols * 8);
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(header.as_bytes());

    for row in &table.rows {
        for cell in row {
            out.extend_from_slice(&to_f64(cell)?.to_le_bytes());
        }
    }

    Ok(out)
}

/// Write `table` to `path` as `.npy`
pub async fn write_npy(path: impl AsRef<Path>, table: &Table) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_npy(table)?;
    tokio::fs::write(path, bytes).await?;
    info!(path = %path.display(), rows = table.len(), "exported numeric array");
    Ok(())
}

/// File name the `save` command writes for `file_name`
pub fn labelled_measurements_path(file_name: &str) -> String {
    format!("{}_measurement_with_labels.npy", file_name)
}
