//! Progress tracking for archive downloads and extraction

use std::sync::Arc;

/// Progress callback for install operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while a fix archive is fetched and applied
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    DownloadStarted {
        url: String,
        total_size: Option<u64>,
    },
    DownloadProgress {
        url: String,
        downloaded: u64,
        total: Option<u64>,
        speed_bps: f64,
    },
    DownloadComplete {
        url: String,
        final_size: u64,
    },
    RetryAttempt {
        url: String,
        attempt: usize,
        max_attempts: usize,
    },
    /// An archive entry was written to the game folder
    EntryExtracted {
        path: String,
    },
    /// An archive entry was recognized as noise and left out
    EntrySkipped {
        path: String,
    },
    Error {
        url: String,
        error: String,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_download_started(&self, _url: &str, _total_size: Option<u64>) {}
    fn on_download_progress(&self, _url: &str, _downloaded: u64, _total: Option<u64>, _speed_bps: f64) {}
    fn on_download_complete(&self, _url: &str, _final_size: u64) {}
    fn on_retry_attempt(&self, _url: &str, _attempt: usize, _max_attempts: usize) {}
    fn on_entry_extracted(&self, _path: &str) {}
    fn on_entry_skipped(&self, _path: &str) {}
    fn on_error(&self, _url: &str, _error: &str) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::DownloadStarted { url, total_size } => {
                self.on_download_started(&url, total_size);
            }
            ProgressEvent::DownloadProgress { url, downloaded, total, speed_bps } => {
                self.on_download_progress(&url, downloaded, total, speed_bps);
            }
            ProgressEvent::DownloadComplete { url, final_size } => {
                self.on_download_complete(&url, final_size);
            }
            ProgressEvent::RetryAttempt { url, attempt, max_attempts } => {
                self.on_retry_attempt(&url, attempt, max_attempts);
            }
            ProgressEvent::EntryExtracted { path } => {
                self.on_entry_extracted(&path);
            }
            ProgressEvent::EntrySkipped { path } => {
                self.on_entry_skipped(&path);
            }
            ProgressEvent::Error { url, error } => {
                self.on_error(&url, &error);
            }
        })
    }
}

/// Simple console progress reporter implementation
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        match total_size {
            Some(size) => println!("   Downloading {} ({} bytes)", url, size),
            None => println!("   Downloading {}", url),
        }
    }

    fn on_download_progress(&self, _url: &str, downloaded: u64, total: Option<u64>, speed_bps: f64) {
        if self.verbose {
            let speed_kb = speed_bps / 1024.0;
            match total {
                Some(total) if total > 0 => {
                    let percent = (downloaded as f64 / total as f64) * 100.0;
                    println!("   {:.1}% ({}/{} bytes, {:.1} KB/s)", percent, downloaded, total, speed_kb);
                }
                _ => println!("   {} bytes ({:.1} KB/s)", downloaded, speed_kb),
            }
        }
    }

    fn on_retry_attempt(&self, url: &str, attempt: usize, max_attempts: usize) {
        println!("   Retry {}/{} for {}", attempt, max_attempts, url);
    }

    fn on_entry_extracted(&self, path: &str) {
        if self.verbose {
            println!("   + {}", path);
        }
    }

    fn on_entry_skipped(&self, path: &str) {
        if self.verbose {
            println!("   - {} (skipped)", path);
        }
    }

    fn on_error(&self, url: &str, error: &str) {
        eprintln!("   Error downloading {}: {}", url, error);
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}
