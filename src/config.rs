//! Viewer configuration: compiled-in defaults with environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;

/// Movement (and finger separation) in surface units before a press turns
/// into a drag or a pinch.
pub const DEFAULT_TOUCH_SLOP: f32 = 10.0;
/// Window in which a second press counts as a double tap.
pub const DEFAULT_TAP_TIMEOUT_MS: u64 = 200;
/// Smallest allowed scale relative to the idle layout.
pub const MIN_SCALE: f32 = 1.0;
/// Largest allowed scale relative to the idle layout.
pub const MAX_SCALE: f32 = 16.0;
/// File size under which the full decode keeps native resolution.
pub const DEFAULT_DECODE_BUDGET_KB: u64 = 600;
/// Allocation ceiling for one region decode.
pub const DEFAULT_REGION_LIMIT_MB: u64 = 256;
/// Name of the cached map copy inside the data directory.
pub const MAP_FILE_NAME: &str = "map1.jpg";
const DEFAULT_ASSET_PATH: &str = "/usr/share/mapview/subway.jpg";

static CONFIG: Lazy<ViewerConfig> = Lazy::new(ViewerConfig::from_env);

/// Process-wide configuration, read from the environment on first access.
pub fn config() -> &'static ViewerConfig {
    &CONFIG
}

/// Kibibytes to bytes, saturating at `u64::MAX`.
pub fn kib(kb: u64) -> u64 {
    kb.saturating_mul(1024)
}

/// Mebibytes to bytes, saturating at `u64::MAX`.
pub fn mib(mb: u64) -> u64 {
    kib(kib(mb))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Thresholds and bounds used by the gesture state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    pub touch_slop: f32,
    pub tap_timeout: Duration,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: DEFAULT_TOUCH_SLOP,
            tap_timeout: Duration::from_millis(DEFAULT_TAP_TIMEOUT_MS),
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub gesture: GestureConfig,
    /// Full decodes of files larger than this are downsampled.
    pub decode_budget_bytes: u64,
    /// Region decodes that would allocate more than this fail as too large.
    pub region_alloc_bytes: u64,
    pub map_file_name: String,
    /// Bundled map image copied into the data directory on first launch.
    pub asset_path: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            gesture: GestureConfig::default(),
            decode_budget_bytes: kib(DEFAULT_DECODE_BUDGET_KB),
            region_alloc_bytes: mib(DEFAULT_REGION_LIMIT_MB),
            map_file_name: MAP_FILE_NAME.to_string(),
            asset_path: PathBuf::from(DEFAULT_ASSET_PATH),
        }
    }
}

impl ViewerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(slop) = env_parse::<f32>("MAPVIEW_TOUCH_SLOP").filter(|v| *v > 0.0) {
            cfg.gesture.touch_slop = slop;
        }
        if let Some(ms) = env_parse::<u64>("MAPVIEW_TAP_TIMEOUT_MS").filter(|v| *v > 0) {
            cfg.gesture.tap_timeout = Duration::from_millis(ms);
        }
        if let Some(kb) = env_parse::<u64>("MAPVIEW_DECODE_BUDGET_KB").filter(|v| *v > 0) {
            cfg.decode_budget_bytes = kib(kb);
        }
        if let Some(mb) = env_parse::<u64>("MAPVIEW_REGION_LIMIT_MB").filter(|v| *v > 0) {
            cfg.region_alloc_bytes = mib(mb);
        }
        if let Some(path) = std::env::var_os("MAPVIEW_ASSET").filter(|v| !v.is_empty()) {
            cfg.asset_path = PathBuf::from(path);
        }

        cfg
    }
}
