//! Tabular raw-signal files.
//!
//! Format: optional `#` comment lines, a header row, then one row per
//! frame. The first comment line written by this crate carries metadata:
//!
//! ```text
//! # fungen-signal v1 fingerprint=<hex> fps=30 model=conv_tcn
//! frame_index,timestamp_ms,predicted_change
//! 0,0.000,0.0132
//! 1,33.333,0.0141
//! ```
//!
//! `frame_index` and `timestamp_ms` are optional on read; every other column
//! becomes a signal channel. Values are written in shortest round-trip form
//! so a signal read back is bit-identical to the one written.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fungen_signal_model::{RawSignal, SignalChannel};

use crate::error::CacheError;

pub const FORMAT_TAG: &str = "fungen-signal v1";

const FRAME_COLUMN: &str = "frame_index";
const TIMESTAMP_COLUMN: &str = "timestamp_ms";

/// Metadata carried in the leading comment line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalHeader {
    pub fingerprint: Option<String>,
    pub fps: Option<f64>,
    pub model: Option<String>,
}

impl SignalHeader {
    fn to_comment(&self) -> String {
        let mut line = format!("# {FORMAT_TAG}");
        if let Some(fp) = &self.fingerprint {
            line.push_str(&format!(" fingerprint={fp}"));
        }
        if let Some(fps) = self.fps {
            line.push_str(&format!(" fps={fps}"));
        }
        if let Some(model) = &self.model {
            line.push_str(&format!(" model={model}"));
        }
        line
    }

    /// Parse a comment line; `None` when it is not a metadata line.
    fn parse_comment(line: &str) -> Option<Self> {
        let rest = line.trim_start_matches('#').trim().strip_prefix(FORMAT_TAG)?;
        let mut header = SignalHeader::default();
        for field in rest.split_whitespace() {
            match field.split_once('=') {
                Some(("fingerprint", v)) => header.fingerprint = Some(v.to_string()),
                Some(("fps", v)) => header.fps = v.parse().ok(),
                Some(("model", v)) => header.model = Some(v.to_string()),
                _ => {}
            }
        }
        Some(header)
    }
}

/// Writes a raw signal row by row.
pub struct SignalWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    columns: usize,
    frame_ms: f64,
    rows_written: u64,
}

impl SignalWriter {
    /// Create the file and write the metadata and header rows.
    pub fn new(
        path: PathBuf,
        header: &SignalHeader,
        fps: f64,
        channel_names: &[&str],
    ) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| CacheError::io(&path, e))?;

        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", header.to_comment()).map_err(|e| CacheError::io(&path, e))?;
        writeln!(
            writer,
            "{FRAME_COLUMN},{TIMESTAMP_COLUMN},{}",
            channel_names.join(",")
        )
        .map_err(|e| CacheError::io(&path, e))?;

        Ok(Self {
            writer,
            path,
            columns: channel_names.len(),
            frame_ms: 1000.0 / fps,
            rows_written: 0,
        })
    }

    /// Append one frame.
    pub fn write_row(&mut self, values: &[f64]) -> Result<(), CacheError> {
        if values.len() != self.columns {
            return Err(CacheError::corrupt(
                &self.path,
                format!("row has {} values, expected {}", values.len(), self.columns),
            ));
        }
        let frame = self.rows_written;
        let cells: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        writeln!(
            self.writer,
            "{frame},{:.3},{}",
            frame as f64 * self.frame_ms,
            cells.join(",")
        )
        .map_err(|e| CacheError::io(&self.path, e))?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CacheError> {
        self.writer
            .flush()
            .map_err(|e| CacheError::io(&self.path, e))
    }
}

impl Drop for SignalWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Write a whole signal to `path`. The metadata line records the signal's
/// own frame rate.
pub fn write_signal(path: &Path, signal: &RawSignal, header: &SignalHeader) -> Result<(), CacheError> {
    let header = SignalHeader {
        fps: Some(signal.fps()),
        ..header.clone()
    };
    let names: Vec<&str> = signal.channels().iter().map(|c| c.name.as_str()).collect();
    let mut writer = SignalWriter::new(path.to_path_buf(), &header, signal.fps(), &names)?;
    let mut row = vec![0.0; names.len()];
    for frame in 0..signal.sample_count() {
        for (cell, channel) in row.iter_mut().zip(signal.channels()) {
            *cell = channel.values[frame];
        }
        writer.write_row(&row)?;
    }
    writer.flush()?;
    writer
        .writer
        .get_ref()
        .sync_all()
        .map_err(|e| CacheError::io(path, e))
}

/// Read a signal file.
///
/// The frame rate comes from the metadata line, else from the spacing of
/// `timestamp_ms`, else `default_fps`.
pub fn read_signal(path: &Path, default_fps: f64) -> Result<(SignalHeader, RawSignal), CacheError> {
    let file = File::open(path).map_err(|e| CacheError::io(path, e))?;
    let corrupt = |message: String| CacheError::corrupt(path, message);

    let mut header = SignalHeader::default();
    let mut columns: Option<Vec<String>> = None;
    let mut timestamps: Vec<f64> = Vec::new();
    let mut channels: Vec<Vec<f64>> = Vec::new();
    let mut timestamp_col = None;
    let mut frame_col = None;

    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| CacheError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            if let Some(parsed) = SignalHeader::parse_comment(line) {
                header = parsed;
            }
            continue;
        }

        let Some(names) = &columns else {
            let names: Vec<String> = line.split(',').map(|c| c.trim().to_string()).collect();
            timestamp_col = names.iter().position(|c| c == TIMESTAMP_COLUMN);
            frame_col = names.iter().position(|c| c == FRAME_COLUMN);
            let data_columns = names.len()
                - usize::from(timestamp_col.is_some())
                - usize::from(frame_col.is_some());
            if data_columns == 0 {
                return Err(corrupt("no signal columns".to_string()));
            }
            channels = vec![Vec::new(); data_columns];
            columns = Some(names);
            continue;
        };

        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.len() != names.len() {
            return Err(corrupt(format!(
                "line {} has {} fields, expected {}",
                number + 1,
                cells.len(),
                names.len()
            )));
        }
        let mut channel = 0;
        for (index, cell) in cells.iter().enumerate() {
            if Some(index) == frame_col {
                continue;
            }
            let value: f64 = cell.parse().map_err(|_| {
                corrupt(format!("line {}: cannot parse {cell:?}", number + 1))
            })?;
            if Some(index) == timestamp_col {
                timestamps.push(value);
            } else {
                channels[channel].push(value);
                channel += 1;
            }
        }
    }

    let Some(names) = columns else {
        return Err(corrupt("missing header row".to_string()));
    };

    let fps = header
        .fps
        .or_else(|| fps_from_timestamps(&timestamps))
        .unwrap_or(default_fps);

    let data_names = names
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != timestamp_col && Some(*i) != frame_col)
        .map(|(_, name)| name.clone());
    let channels = data_names
        .zip(channels)
        .map(|(name, values)| SignalChannel::new(name, values))
        .collect();

    let signal = RawSignal::new(fps, channels).map_err(|e| corrupt(e.to_string()))?;
    Ok((header, signal))
}

fn fps_from_timestamps(timestamps: &[f64]) -> Option<f64> {
    let (first, last) = (timestamps.first()?, timestamps.last()?);
    let span = last - first;
    if timestamps.len() < 2 || span <= 0.0 {
        return None;
    }
    Some(1000.0 * (timestamps.len() - 1) as f64 / span)
}
