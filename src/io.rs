//! Safetensors I/O for recordings.
//!
//! One 1-D tensor per channel, so channels may have different lengths and
//! sampling rates:
//!
//! | key            | dtype      | shape  | contents                          |
//! |----------------|------------|--------|-----------------------------------|
//! | `ch_<i>`       | F32 or F64 | `[T_i]`| samples of channel `i`            |
//! | `sf`           | F64        | `[C]`  | sampling rate per channel (Hz)    |
//! | `ch_names`     | U8         | `[N]`  | channel names joined by `\n`      |
//! | `__metadata__` |            |        | `{"start_time": "%Y-%m-%d %H:%M:%S"}` |
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::annotation::{parse_start_time, TIME_FORMAT};
use crate::recording::Recording;

const METADATA_KEY: &str = "__metadata__";

// ── Low-level safetensors parser ──────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    let end = 8usize.checked_add(n).filter(|&e| e <= bytes.len()).context("safetensors header overruns the file")?;
    let header: HashMap<String, Value> =
        serde_json::from_slice(&bytes[8..end]).context("failed to parse safetensors header")?;
    Ok((header, end))
}

fn tensor_bytes<'a>(bytes: &'a [u8], data_start: usize, name: &str, entry: &Value) -> Result<&'a [u8]> {
    let offsets = entry["data_offsets"]
        .as_array()
        .filter(|o| o.len() == 2)
        .with_context(|| format!("tensor '{name}' has no data_offsets"))?;
    let s = offsets[0].as_u64().with_context(|| format!("tensor '{name}': bad offset"))? as usize;
    let e = offsets[1].as_u64().with_context(|| format!("tensor '{name}': bad offset"))? as usize;
    bytes
        .get(data_start + s..data_start + e)
        .with_context(|| format!("tensor '{name}' lies outside the file"))
}

/// Any float tensor widened to `f64`.
fn read_float_tensor(bytes: &[u8], data_start: usize, name: &str, entry: &Value) -> Result<Vec<f64>> {
    let raw = tensor_bytes(bytes, data_start, name, entry)?;
    match entry["dtype"].as_str() {
        Some("F32") => Ok(raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect()),
        Some("F64") => Ok(raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect()),
        other => bail!("tensor '{name}': unsupported dtype {other:?}"),
    }
}

// ── Recording reader / writer ─────────────────────────────────────────────────

/// Read a recording written by [`save_recording`] (or by any tool using
/// the same layout).
pub fn load_recording(path: &Path) -> Result<Recording> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes)?;

    let sf_entry = header.get("sf").context("missing 'sf' key")?;
    let sf = read_float_tensor(&bytes, data_start, "sf", sf_entry)?;

    let names_entry = header.get("ch_names").context("missing 'ch_names' key")?;
    let raw = tensor_bytes(&bytes, data_start, "ch_names", names_entry)?;
    let channels: Vec<String> = std::str::from_utf8(raw)
        .context("channel names are not UTF-8")?
        .split('\n')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let signals = (0..sf.len())
        .map(|i| {
            let key = format!("ch_{i}");
            let entry = header.get(&key).with_context(|| format!("missing '{key}' key"))?;
            read_float_tensor(&bytes, data_start, &key, entry)
        })
        .collect::<Result<Vec<_>>>()?;

    let start = header
        .get(METADATA_KEY)
        .and_then(|m| m["start_time"].as_str())
        .context("missing start_time metadata")?;
    let start_time = parse_start_time(start)?;

    debug!(path = %path.display(), channels = channels.len(), "loaded recording");
    Ok(Recording::new(signals, channels, sf, start_time)?)
}

/// Write `rec` in the layout [`load_recording`] reads. Samples are stored
/// as F64.
pub fn save_recording(rec: &Recording, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    for (i, signal) in rec.signals().iter().enumerate() {
        w.add_f64(&format!("ch_{i}"), signal, &[signal.len()]);
    }
    w.add_f64("sf", rec.sfreqs(), &[rec.n_channels()]);
    w.add_u8("ch_names", rec.channels().join("\n").as_bytes());
    w.metadata("start_time", &rec.start_time().format(TIME_FORMAT).to_string());
    w.write(path)
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer that handles F32, F64 and U8 tensors.
///
/// Usage:
/// ```rust,no_run
/// use hypno::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[3]);
/// w.add_f64("sf", &[256.0], &[1]);
/// w.metadata("start_time", "2024-03-06 10:00:00");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: serde_json::Map<String, Value>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_u8(&mut self, name: &str, data: &[u8]) {
        self.entries.push((name.to_string(), data.to_vec(), "U8", vec![data.len()]));
    }

    /// String entry of the `__metadata__` table.
    pub fn metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), Value::String(value.to_string()));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert(METADATA_KEY.to_string(), Value::Object(self.metadata.clone()));
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_header_is_rejected() {
        assert!(parse_header(&[1, 2, 3]).is_err());
        let mut bytes = 100u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(parse_header(&bytes).is_err());
    }

    #[test]
    fn f32_tensors_are_widened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.safetensors");
        let mut w = StWriter::new();
        w.add_f32("x", &[1.5, -2.0], &[2]);
        w.write(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let (header, start) = parse_header(&bytes).unwrap();
        assert_eq!(start % 8, 0);
        let v = read_float_tensor(&bytes, start, "x", &header["x"]).unwrap();
        assert_eq!(v, vec![1.5, -2.0]);
    }
}
