//! Progress reporting for downloads

use std::path::Path;

use crate::recipe::FileSpec;

/// Receives download progress as bytes arrive
///
/// All methods run on the downloading task, between chunks.
pub trait ProgressObserver: Send {
    /// A file transfer is starting
    fn started(&mut self, _file: &FileSpec) {}

    /// `bytes` received so far out of `total`, when the server announced it
    fn advanced(&mut self, bytes: u64, total: Option<u64>);

    /// The file was downloaded to `path`
    fn finished(&mut self, _file: &FileSpec, _path: &Path) {}

    /// The file already exists at `path` and was not downloaded
    fn skipped(&mut self, _file: &FileSpec, _path: &Path) {}
}

/// Discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn advanced(&mut self, _bytes: u64, _total: Option<u64>) {}
}

/// Human readable size with decimal units, e.g. `9.91MB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];

    if bytes < 1000 {
        return format!("{bytes}B");
    }

    let mut size = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if size < 1000.0 {
            break;
        }
        size /= 1000.0;
        unit = next;
    }

    if size < 9.995 {
        format!("{size:.2}{unit}")
    } else if size < 99.95 {
        format!("{size:.1}{unit}")
    } else {
        format!("{size:.0}{unit}")
    }
}
