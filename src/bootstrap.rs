//! Map loading: the bundled map is copied into the per-user data directory
//! once and decoded from there; a file picked by the user is decoded in
//! place. Decoding runs off the UI thread.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use tracing::{debug, info, warn};

use crate::image_loader::{self, Bitmap};

/// A decoded map ready to hand to the surface.
#[derive(Debug)]
pub struct LoadedMap {
    pub path: PathBuf,
    pub bitmap: Bitmap,
}

/// Where the map comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapSource {
    /// Bundled asset, extracted to `cache` on first use.
    Bundled { asset: PathBuf, cache: PathBuf },
    /// A file opened explicitly; read in place, never cached.
    File(PathBuf),
}

impl MapSource {
    pub fn load(&self, budget_bytes: u64) -> Result<LoadedMap> {
        match self {
            MapSource::Bundled { asset, cache } => load_map(asset, cache, budget_bytes),
            MapSource::File(path) => decode_map(path, budget_bytes),
        }
    }
}

/// Where the cached copy of the map lives.
pub fn cached_map_path(file_name: &str) -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "mapview").context("Failed to determine project directories")?;
    Ok(dirs.data_dir().join(file_name))
}

/// Make sure `dest` holds a readable image, copying `asset` there if not.
///
/// Returns `true` when a copy was made.
pub fn ensure_cached_map(asset: &Path, dest: &Path) -> Result<bool> {
    if image_loader::is_image_file(dest) {
        debug!(?dest, "Cached map present");
        return Ok(false);
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
    }

    let tmp = dest.with_extension("part");
    std::fs::copy(asset, &tmp)
        .with_context(|| format!("Failed to copy map asset {:?} to {:?}", asset, tmp))?;
    std::fs::rename(&tmp, dest)
        .with_context(|| format!("Failed to move map into place: {:?}", dest))?;

    if !image_loader::is_image_file(dest) {
        let _ = std::fs::remove_file(dest);
        bail!("Map asset is not a readable image: {:?}", asset);
    }

    info!(?asset, ?dest, "Extracted map asset");
    Ok(true)
}

/// Extract if needed, then fully decode under `budget_bytes`.
pub fn load_map(asset: &Path, dest: &Path, budget_bytes: u64) -> Result<LoadedMap> {
    ensure_cached_map(asset, dest)?;
    decode_map(dest, budget_bytes)
}

/// Fully decode `path` under `budget_bytes`; it also becomes the region
/// source.
pub fn decode_map(path: &Path, budget_bytes: u64) -> Result<LoadedMap> {
    let bitmap = image_loader::decode_full(path, budget_bytes)
        .with_context(|| format!("Failed to decode map: {:?}", path))?;
    info!(
        ?path,
        width = bitmap.width(),
        height = bitmap.height(),
        "Map loaded"
    );
    Ok(LoadedMap {
        path: path.to_path_buf(),
        bitmap,
    })
}

/// Load `source` on a worker thread; the result arrives on the returned
/// channel.
pub fn spawn_load(
    source: MapSource,
    budget_bytes: u64,
) -> async_channel::Receiver<Result<LoadedMap>> {
    let (sender, receiver) = async_channel::bounded(1);
    std::thread::spawn(move || {
        let result = source.load(budget_bytes);
        if let Err(err) = &result {
            warn!(error = ?err, "Failed to load map");
        }
        let _ = sender.send_blocking(result);
    });
    receiver
}
