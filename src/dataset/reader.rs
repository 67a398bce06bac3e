//! Streaming reader for gzip-compressed, tab-separated dataset files.
//!
//! Lines are decoded on the fly one at a time so peak memory is bounded by
//! the longest line, not the file size.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use reelsync_common::{Error, Result};

/// Line counts from one pass over a file. The header is not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub rows: u64,
    /// Lines that were not valid UTF-8 or had the wrong number of fields.
    pub malformed: u64,
    /// The consumer asked to stop before the end of the file.
    pub stopped: bool,
}

/// Whether the scan should go on after a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Call `on_row` with the fields of every data line of `path`.
///
/// The first line is a header and is skipped. Lines with a field count other
/// than `expected_fields` are counted as malformed and not passed on.
pub fn scan_tsv<F>(path: &Path, expected_fields: usize, mut on_row: F) -> Result<ScanStats>
where
    F: FnMut(&[&str]) -> Flow,
{
    let file = File::open(path)
        .map_err(|e| Error::file("open", path, e))?;
    let mut reader = BufReader::with_capacity(1 << 20, GzDecoder::new(BufReader::new(file)));

    let mut stats = ScanStats::default();
    let mut buf = Vec::with_capacity(1024);
    let mut header = true;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| Error::file("read", path, e))?;
        if read == 0 {
            break;
        }
        if header {
            header = false;
            continue;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches(['\n', '\r']),
            Err(_) => {
                stats.malformed += 1;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != expected_fields {
            stats.malformed += 1;
            continue;
        }

        stats.rows += 1;
        if on_row(&fields) == Flow::Stop {
            stats.stopped = true;
            break;
        }
    }

    Ok(stats)
}
