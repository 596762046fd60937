//! Decoding primitives for the map image: header-only probe, memory-capped
//! full decode, and pixel-rectangle region decode.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{ImageError, ImageReader, Limits, RgbaImage};
use thiserror::Error;
use tracing::debug;

use crate::config;
use crate::geometry::PixelRect;

/// Decoded pixels, always RGBA8 so the UI can upload them unchanged.
pub type Bitmap = RgbaImage;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image path is empty")]
    EmptyPath,
    #[error("failed to read image {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a decodable image: {path:?}")]
    NotAnImage { path: PathBuf },
    #[error("failed to decode image {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("decoding {path:?} exceeds the allocation limit")]
    TooLarge { path: PathBuf },
    #[error("region {rect:?} is outside the {width}x{height} image")]
    RegionOutOfBounds {
        rect: PixelRect,
        width: u32,
        height: u32,
    },
}

impl DecodeError {
    fn from_image(path: &Path, source: ImageError) -> Self {
        match source {
            ImageError::Limits(_) => DecodeError::TooLarge {
                path: path.to_path_buf(),
            },
            ImageError::Unsupported(_) => DecodeError::NotAnImage {
                path: path.to_path_buf(),
            },
            ImageError::IoError(source) => DecodeError::Io {
                path: path.to_path_buf(),
                source,
            },
            source => DecodeError::Decode {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// The two operations the region decoder needs from whatever holds the
/// source image.
pub trait ImageSource {
    /// Intrinsic pixel size, read from the header only.
    fn probe(&self, path: &Path) -> Result<(u32, u32), DecodeError>;

    /// Decode exactly `rect` at native resolution.
    fn decode_region(&self, path: &Path, rect: PixelRect) -> Result<Bitmap, DecodeError>;
}

/// `ImageSource` backed by files on disk.
///
/// Region decodes are capped at `max_alloc` bytes; anything larger fails
/// with `DecodeError::TooLarge`.
#[derive(Debug, Clone, Copy)]
pub struct FileImageSource {
    max_alloc: u64,
}

impl FileImageSource {
    pub fn new(max_alloc: u64) -> Self {
        Self { max_alloc }
    }

    pub fn max_alloc(&self) -> u64 {
        self.max_alloc
    }
}

impl Default for FileImageSource {
    fn default() -> Self {
        Self::new(config::mib(config::DEFAULT_REGION_LIMIT_MB))
    }
}

impl ImageSource for FileImageSource {
    fn probe(&self, path: &Path) -> Result<(u32, u32), DecodeError> {
        probe_dimensions(path)
    }

    fn decode_region(&self, path: &Path, rect: PixelRect) -> Result<Bitmap, DecodeError> {
        decode_region(path, rect, self.max_alloc)
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, DecodeError> {
    if path.as_os_str().is_empty() {
        return Err(DecodeError::EmptyPath);
    }
    let io_err = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?;
    if reader.format().is_none() {
        return Err(DecodeError::NotAnImage {
            path: path.to_path_buf(),
        });
    }
    Ok(reader)
}

/// Read the image size without decoding any pixel data.
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32), DecodeError> {
    let (width, height) = open_reader(path)?
        .into_dimensions()
        .map_err(|_| DecodeError::NotAnImage {
            path: path.to_path_buf(),
        })?;
    if width == 0 || height == 0 {
        return Err(DecodeError::NotAnImage {
            path: path.to_path_buf(),
        });
    }
    Ok((width, height))
}

/// Whether `path` exists and carries a readable image header.
pub fn is_image_file(path: &Path) -> bool {
    probe_dimensions(path).is_ok()
}

/// Downsampling factor for a full decode, chosen from the file's byte size.
///
/// Files within the budget keep native resolution, up to four budgets are
/// halved, anything bigger shrinks by `log2(len / budget) + 1` rounded down
/// to a power of two.
pub fn sample_size(file_len: u64, budget: u64) -> u32 {
    let raw = if budget == 0 || file_len <= budget {
        1
    } else if file_len <= budget.saturating_mul(4) {
        2
    } else {
        (file_len / budget).ilog2() + 1
    };
    1 << raw.ilog2()
}

/// Decode the whole image, downsampled so large files stay within
/// `budget_bytes` worth of pixels.
pub fn decode_full(path: &Path, budget_bytes: u64) -> Result<Bitmap, DecodeError> {
    let reader = open_reader(path)?;
    let file_len = std::fs::metadata(path)
        .map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    let sample = sample_size(file_len, budget_bytes);

    let img = reader
        .decode()
        .map_err(|e| DecodeError::from_image(path, e))?;
    let (width, height) = (img.width(), img.height());
    debug!(?path, width, height, file_len, sample, "Decoded full image");

    if sample <= 1 {
        return Ok(img.into_rgba8());
    }
    let new_w = (width / sample).max(1);
    let new_h = (height / sample).max(1);
    Ok(img
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .into_rgba8())
}

/// Decode the pixels inside `rect` at native resolution.
///
/// The codecs in use have no partial-read support, so the source is decoded
/// and the region copied out before the full buffer is dropped. That decode
/// may allocate at most `max_alloc` bytes.
pub fn decode_region(
    path: &Path,
    rect: PixelRect,
    max_alloc: u64,
) -> Result<Bitmap, DecodeError> {
    let reader = open_reader(path)?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| DecodeError::from_image(path, e))?;
    if rect.is_empty() || !rect.fits_within(width, height) {
        return Err(DecodeError::RegionOutOfBounds {
            rect,
            width,
            height,
        });
    }

    let mut limits = Limits::default();
    limits.max_alloc = Some(max_alloc);
    let mut reader = open_reader(path)?;
    reader.limits(limits);
    let img = reader
        .decode()
        .map_err(|e| DecodeError::from_image(path, e))?;
    let region = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
    Ok(region.into_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    const NO_LIMIT: u64 = u64::MAX;

    fn write_png(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("map.png");
        let img = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 7, 255]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_probe_dimensions() {
        let dir = tempdir().unwrap();
        let path = write_png(dir.path(), 40, 30);
        assert_eq!(probe_dimensions(&path).unwrap(), (40, 30));
        assert!(is_image_file(&path));
    }

    #[test]
    fn test_probe_zero_byte_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            probe_dimensions(&path),
            Err(DecodeError::NotAnImage { .. })
        ));
        assert!(!is_image_file(&path));
    }

    #[test]
    fn test_probe_missing_and_empty_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.png");
        assert!(matches!(
            probe_dimensions(&path),
            Err(DecodeError::Io { .. })
        ));
        assert!(matches!(
            probe_dimensions(Path::new("")),
            Err(DecodeError::EmptyPath)
        ));
    }

    #[test]
    fn test_decode_region_copies_exact_pixels() {
        let dir = tempdir().unwrap();
        let path = write_png(dir.path(), 40, 30);
        let crop = decode_region(&path, PixelRect::new(10, 5, 8, 6), NO_LIMIT).unwrap();
        assert_eq!(crop.dimensions(), (8, 6));
        assert_eq!(crop.get_pixel(0, 0), &Rgba([10, 5, 7, 255]));
        assert_eq!(crop.get_pixel(7, 5), &Rgba([17, 10, 7, 255]));
    }

    #[test]
    fn test_decode_region_out_of_bounds() {
        let dir = tempdir().unwrap();
        let path = write_png(dir.path(), 40, 30);
        let err = decode_region(&path, PixelRect::new(35, 0, 10, 10), NO_LIMIT).unwrap_err();
        assert!(matches!(err, DecodeError::RegionOutOfBounds { .. }));
        let err = decode_region(&path, PixelRect::new(0, 0, 0, 10), NO_LIMIT).unwrap_err();
        assert!(matches!(err, DecodeError::RegionOutOfBounds { .. }));
    }

    #[test]
    fn test_decode_region_over_alloc_limit_is_too_large() {
        let dir = tempdir().unwrap();
        let path = write_png(dir.path(), 40, 30);
        // The whole 40x30 RGBA source is decoded first, 4800 bytes.
        let err = decode_region(&path, PixelRect::new(0, 0, 4, 4), 1024).unwrap_err();
        assert!(matches!(err, DecodeError::TooLarge { .. }));

        let source = FileImageSource::new(1024);
        assert!(matches!(
            source.decode_region(&path, PixelRect::new(0, 0, 4, 4)),
            Err(DecodeError::TooLarge { .. })
        ));
        assert!(FileImageSource::new(1024 * 1024)
            .decode_region(&path, PixelRect::new(0, 0, 4, 4))
            .is_ok());
    }

    #[test]
    fn test_sample_size() {
        let budget = 600 * 1024;
        assert_eq!(sample_size(100, budget), 1);
        assert_eq!(sample_size(budget, budget), 1);
        assert_eq!(sample_size(budget + 1, budget), 2);
        assert_eq!(sample_size(budget * 4, budget), 2);
        // 5x budget: log2(5) + 1 = 3, rounded down to 2
        assert_eq!(sample_size(budget * 5, budget), 2);
        assert_eq!(sample_size(budget * 8, budget), 4);
        // 16x budget: 5, rounded down to 4
        assert_eq!(sample_size(budget * 16, budget), 4);
        assert_eq!(sample_size(budget * 128, budget), 8);
        assert_eq!(sample_size(123, 0), 1);
    }

    #[test]
    fn test_decode_full_respects_budget() {
        let dir = tempdir().unwrap();
        let path = write_png(dir.path(), 40, 30);
        let full = decode_full(&path, u64::MAX).unwrap();
        assert_eq!(full.dimensions(), (40, 30));

        let len = std::fs::metadata(&path).unwrap().len();
        let halved = decode_full(&path, len / 3).unwrap();
        assert_eq!(halved.dimensions(), (20, 15));
    }
}
