use std::{path::PathBuf, time::Duration};

use clap::Parser;

pub const DEFAULT_BASE_URL: &str = "https://todo-app-ingata-1.onrender.com";

/// Browse people and manage their tasks on a remote task service.
#[derive(Debug, Clone, Parser)]
#[command(name = "task-board", version, about)]
pub struct Config {
    /// Root of the task service; `/api/users` and `/api/tasks` are appended.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Give up on a request after this many seconds. Unbounded when omitted.
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Hide the loading banner while requests are pending.
    #[arg(long)]
    pub no_loading_indicator: bool,

    /// Write logs here. Filter with RUST_LOG.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }

    pub fn show_loading_indicator(&self) -> bool {
        !self.no_loading_indicator
    }
}
