//! Test helpers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use databrewer_core::error::TransportErrorKind;
use databrewer_core::transfer::{Downloader, ProbeStatus, ProgressObserver};
use databrewer_core::TransferError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, Once};

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Write `<dir>/<name>.yaml`
pub fn write_recipe(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(format!("{name}.yaml")), content).unwrap();
}

/// Serves fixed content per URL and records every fetch
///
/// Unknown URLs write a few bytes and then fail with a 404, leaving a
/// partial destination behind like a dropped connection would.
#[derive(Default)]
pub struct ServedDownloader {
    content: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl ServedDownloader {
    pub fn serve(mut self, url: &str, body: &[u8]) -> Self {
        self.content.insert(url.to_string(), body.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for ServedDownloader {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn ProgressObserver,
    ) -> Result<u64, TransferError> {
        self.calls.lock().unwrap().push(url.to_string());

        let Some(body) = self.content.get(url) else {
            fs::write(dest, b"partial").unwrap();
            return Err(TransferError::Transport {
                url: url.to_string(),
                kind: TransportErrorKind::Status(404),
                message: "HTTP 404 Not Found".to_string(),
            });
        };

        let total = body.len() as u64;
        let half = body.len() / 2;
        fs::write(dest, body).unwrap();
        progress.advanced(half as u64, Some(total));
        progress.advanced(total, Some(total));
        Ok(total)
    }

    async fn probe(&self, url: &str) -> ProbeStatus {
        match self.content.get(url) {
            Some(body) => ProbeStatus::Size(body.len() as u64),
            None => ProbeStatus::Failed("HTTP 404".to_string()),
        }
    }
}

/// Records every progress event as a line of text
#[derive(Default)]
pub struct EventLog(pub Vec<String>);

impl ProgressObserver for EventLog {
    fn started(&mut self, file: &databrewer_core::recipe::FileSpec) {
        self.0.push(format!("started {}", file.name));
    }

    fn advanced(&mut self, bytes: u64, total: Option<u64>) {
        self.0.push(format!("advanced {bytes}/{}", total.unwrap_or(0)));
    }

    fn finished(&mut self, file: &databrewer_core::recipe::FileSpec, _path: &Path) {
        self.0.push(format!("finished {}", file.name));
    }

    fn skipped(&mut self, file: &databrewer_core::recipe::FileSpec, _path: &Path) {
        self.0.push(format!("skipped {}", file.name));
    }
}
