//! Recording sources
//!
//! The pipeline only sees a `Recording`. Container formats are decoded by a
//! `RecordingSource`; decode failures surface as `ChannelDecode` before any job
//! is created.

use crate::error::{EegError, Result};
use crate::recording::Recording;
use ndarray::Array2;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Anything that can produce a decoded recording
pub trait RecordingSource: Send + Sync {
    fn read_recording(&self) -> Result<Recording>;

    /// Short description used in log lines
    fn describe(&self) -> String;
}

/// Column delimiter of a text recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Whitespace,
}

impl Delimiter {
    /// `.csv` files are comma separated, everything else whitespace separated
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Delimiter::Comma,
            _ => Delimiter::Whitespace,
        }
    }

    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            // Empty cells are kept so the caller can report them
            Delimiter::Comma => line.split(',').map(str::trim).collect(),
            Delimiter::Whitespace => line.split_whitespace().collect(),
        }
    }
}

/// CSV / ASCII reader: one column per channel, one row per sample.
///
/// A non-numeric first row is taken as channel names, otherwise channels are
/// named `Channel 1..N`. Text files carry no sampling rate, so it is supplied
/// by the caller.
#[derive(Debug, Clone)]
pub struct TextRecordingReader {
    path: PathBuf,
    sfreq: f64,
    delimiter: Delimiter,
}

impl TextRecordingReader {
    pub fn new<P: AsRef<Path>>(path: P, sfreq: f64) -> Self {
        let path = path.as_ref().to_path_buf();
        let delimiter = Delimiter::from_path(&path);
        Self {
            path,
            sfreq,
            delimiter,
        }
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse text content into a recording
    pub fn parse(&self, content: &str) -> Result<Recording> {
        let lines: Vec<(usize, &str)> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();

        let (first_idx, first_line) = lines
            .first()
            .copied()
            .ok_or_else(|| EegError::ChannelDecode("File is empty".to_string()))?;

        let first_row = self.delimiter.split(first_line);
        let has_header = first_row
            .iter()
            .any(|s| !s.is_empty() && s.parse::<f64>().is_err());

        let (channel_names, data_lines) = if has_header {
            if let Some(col) = first_row.iter().position(|s| s.is_empty()) {
                return Err(EegError::ChannelDecode(format!(
                    "Empty channel name at line {}, column {}",
                    first_idx + 1,
                    col + 1
                )));
            }
            let names: Vec<String> = first_row.iter().map(|s| s.to_string()).collect();
            (names, &lines[1..])
        } else {
            let names: Vec<String> = (0..first_row.len())
                .map(|i| format!("Channel {}", i + 1))
                .collect();
            (names, &lines[..])
        };
        log::debug!(
            "Text recording: header={} (line {}), {} channels",
            has_header,
            first_idx + 1,
            channel_names.len()
        );

        let n_channels = channel_names.len();
        let delimiter = self.delimiter;

        let rows: Vec<Vec<f64>> = data_lines
            .par_iter()
            .map(|&(line_idx, line)| {
                let values = delimiter.split(line);
                if values.len() != n_channels {
                    return Err(EegError::ChannelDecode(format!(
                        "Line {} has {} values, expected {} channels",
                        line_idx + 1,
                        values.len(),
                        n_channels
                    )));
                }
                values
                    .iter()
                    .enumerate()
                    .map(|(col, value)| {
                        if value.is_empty() {
                            return Err(EegError::ChannelDecode(format!(
                                "Empty value at line {}, column {}",
                                line_idx + 1,
                                col + 1
                            )));
                        }
                        value.parse::<f64>().map_err(|_| {
                            EegError::ChannelDecode(format!(
                                "Invalid numeric value '{}' at line {}, column {}",
                                value,
                                line_idx + 1,
                                col + 1
                            ))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        if rows.is_empty() {
            return Err(EegError::ChannelDecode("No data rows found".to_string()));
        }

        let n_samples = rows.len();
        let data = Array2::from_shape_fn((n_channels, n_samples), |(c, t)| rows[t][c]);

        Recording::new(channel_names, data, self.sfreq)
    }
}

impl RecordingSource for TextRecordingReader {
    fn read_recording(&self) -> Result<Recording> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            EegError::ChannelDecode(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let recording = self.parse(&content)?;

        log::info!(
            "Loaded {}: {} channels, {} samples at {} Hz",
            self.path.display(),
            recording.n_channels(),
            recording.n_times(),
            recording.sampling_frequency()
        );
        Ok(recording)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_with_header() {
        let reader = TextRecordingReader::new("rec.csv", 10.0);
        let rec = reader.parse("Fp1,Fp2\n1.0,2.0\n3.0,4.0\n\n5.0,6.0\n").unwrap();
        assert_eq!(rec.channel_names(), &["Fp1".to_string(), "Fp2".to_string()][..]);
        assert_eq!(rec.n_times(), 3);
        assert_eq!(rec.to_array()[[1, 2]], 6.0);
    }

    #[test]
    fn test_ascii_without_header() {
        let reader = TextRecordingReader::new("rec.txt", 256.0);
        let rec = reader.parse("1 2 3\n4\t5\t6\n").unwrap();
        assert_eq!(rec.channel_names()[2], "Channel 3");
        assert_eq!(rec.to_array()[[0, 1]], 4.0);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let reader = TextRecordingReader::new("rec.csv", 10.0);
        let err = reader.parse("A,B\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, EegError::ChannelDecode(msg) if msg.contains("Line 3")));
    }

    #[test]
    fn test_empty_cell_reports_position() {
        let reader = TextRecordingReader::new("rec.csv", 10.0);
        let err = reader.parse("Fp1,Fp2,C3\n1,,2\n").unwrap_err();
        assert!(
            matches!(err, EegError::ChannelDecode(ref msg) if msg.contains("line 2, column 2")),
            "{}",
            err
        );

        // Without a header the empty cell is still a data error, not a header
        let err = reader.parse("1,2,3\n4,5,\n").unwrap_err();
        assert!(matches!(err, EegError::ChannelDecode(ref msg) if msg.contains("line 2, column 3")));
        let err = reader.parse(",2,3\n4,5,6\n").unwrap_err();
        assert!(matches!(err, EegError::ChannelDecode(ref msg) if msg.contains("line 1, column 1")));
    }

    #[test]
    fn test_empty_channel_name_rejected() {
        let reader = TextRecordingReader::new("rec.csv", 10.0);
        let err = reader.parse("Fp1,,C3\n1,2,3\n").unwrap_err();
        assert!(matches!(err, EegError::ChannelDecode(ref msg) if msg.contains("column 2")));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let reader = TextRecordingReader::new("/nonexistent/rec.csv", 10.0);
        assert!(matches!(
            reader.read_recording(),
            Err(EegError::ChannelDecode(_))
        ));
    }
}
