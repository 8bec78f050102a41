//! Dataset file transfers
//!
//! ```text
//! FileSpec* ──▶ Transfer::run ──▶ Downloader::fetch ──▶ <dir>/<filename>.part
//!                    │                                          │ rename
//!                    └── ProgressObserver ◀── chunks            ▼
//!                                                       <dir>/<filename>
//! ```

mod downloader;
mod ftp;
mod orchestrator;
mod progress;

pub use downloader::{
    check_scheme, Downloader, NetworkDownloader, ProbeStatus, Scheme, CONNECT_TIMEOUT,
    PROBE_TIMEOUT,
};
pub use orchestrator::{
    part_path, Transfer, TransferOptions, TransferOutcome, TransferReport, PART_SUFFIX,
};
pub use progress::{format_size, NoProgress, ProgressObserver};
