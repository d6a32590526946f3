use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use driveconv_core::DriveClient;

use crate::traverse::engine::EngineConfig;
use crate::traverse::predicate::{ConversionPredicate, DEFAULT_EXTENSIONS};

const APP_DIR_NAME: &str = "driveconv";
const DEFAULT_MAX_RUNTIME_SECS: u64 = 300;
const DEFAULT_PAGE_SIZE: u64 = 100;

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub state_db: PathBuf,
    pub trace_dir: PathBuf,
    pub convert: bool,
    pub record_all_files: bool,
    pub extensions: Vec<String>,
    /// `None` runs until the queue is drained.
    pub max_runtime: Option<Duration>,
    pub api_base: Option<String>,
    pub upload_base: Option<String>,
    pub page_size: u32,
}

impl RunConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = dirs::home_dir().context("home directory is unavailable")?;
        let data_root = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR_NAME);

        let state_db = lookup("DRIVECONV_STATE_DB")
            .map(|value| expand_with_home(&value, &home))
            .unwrap_or_else(|| data_root.join("state.db"));
        let trace_dir = lookup("DRIVECONV_TRACE_DIR")
            .map(|value| expand_with_home(&value, &home))
            .unwrap_or_else(|| data_root.join("traces"));
        let convert = read_bool(&lookup, "DRIVECONV_CONVERT", false);
        let record_all_files = read_bool(&lookup, "DRIVECONV_RECORD_ALL_FILES", true);
        let extensions = lookup("DRIVECONV_EXTENSIONS")
            .map(|value| parse_extensions(&value))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect());
        let max_runtime_secs = match lookup("DRIVECONV_MAX_RUNTIME_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("DRIVECONV_MAX_RUNTIME_SECS is not a number: {value}"))?,
            None => DEFAULT_MAX_RUNTIME_SECS,
        };
        let max_runtime = (max_runtime_secs > 0).then(|| Duration::from_secs(max_runtime_secs));
        let page_size = read_u64(&lookup, "DRIVECONV_PAGE_SIZE", DEFAULT_PAGE_SIZE)
            .min(u64::from(u32::MAX)) as u32;

        Ok(Self {
            state_db,
            trace_dir,
            convert,
            record_all_files,
            extensions,
            max_runtime,
            api_base: lookup("DRIVECONV_API_BASE"),
            upload_base: lookup("DRIVECONV_UPLOAD_BASE"),
            page_size,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            convert: self.convert,
            record_all_files: self.record_all_files,
            predicate: ConversionPredicate::new(&self.extensions),
        }
    }

    pub fn drive_client(&self, token: String) -> anyhow::Result<DriveClient> {
        let client = match (&self.api_base, &self.upload_base) {
            (None, None) => DriveClient::new(token)?,
            (api, upload) => {
                let api = api.as_deref().unwrap_or("https://www.googleapis.com");
                let upload = upload.as_deref().unwrap_or(api);
                DriveClient::with_base_urls(api, upload, token)?
            }
        };
        Ok(client)
    }
}

fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn read_bool<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
