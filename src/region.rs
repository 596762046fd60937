//! Region decoding for zoomed-in views.
//!
//! When the display rectangle reaches past the visible window, only the
//! visible slice of the source is decoded, at the resolution the current
//! zoom asks for, and drawn 1:1 into the window slice it covers. At most one
//! such crop is alive at a time.

use std::path::Path;

use tracing::{debug, warn};

use crate::geometry::{PixelRect, RectF};
use crate::image_loader::{Bitmap, ImageSource};

/// A decoded slice of the source paired with where it is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCrop {
    pub bitmap: Bitmap,
    /// Surface rectangle the bitmap is stretched into.
    pub target: RectF,
    /// Source pixels the bitmap was decoded from.
    pub source_rect: PixelRect,
}

/// What `refresh_crop` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// A new crop was decoded and installed.
    Installed,
    /// Nothing to decode; any previous crop was released.
    Cleared,
    /// The resident crop was decoded for this exact layout; kept as is.
    Unchanged,
    /// Bad input or a decode failure; the previous crop was left alone.
    Skipped,
}

/// Whether the display rectangle pokes out of the window far enough that a
/// region decode is worthwhile: the visible overlap is strictly smaller
/// than the rectangle itself on some axis.
pub fn needs_region(display: &RectF, visible: &RectF) -> bool {
    match display.intersect(visible) {
        Some(inter) => display.contains_rect(&inter) && inter != *display,
        None => false,
    }
}

/// Map the display/window overlap into source pixels.
///
/// Returns the overlap (the crop's draw target) and the pixel rectangle to
/// decode, or `None` when there is no overlap or the mapping collapses to
/// zero pixels.
pub fn map_to_source(
    display: &RectF,
    visible: &RectF,
    intrinsic: (u32, u32),
) -> Option<(RectF, PixelRect)> {
    let inter = display.intersect(visible)?;
    let (src_w, src_h) = intrinsic;
    let scale_x = src_w as f32 / display.width();
    let scale_y = src_h as f32 / display.height();

    let x = ((inter.left - display.left).abs() * scale_x).round() as u32;
    let y = ((inter.top - display.top).abs() * scale_y).round() as u32;
    let x = x.min(src_w.saturating_sub(1));
    let y = y.min(src_h.saturating_sub(1));
    let width = ((inter.width() * scale_x).round() as u32).min(src_w - x);
    let height = ((inter.height() * scale_y).round() as u32).min(src_h - y);

    let rect = PixelRect::new(x, y, width, height);
    (!rect.is_empty()).then_some((inter, rect))
}

#[derive(Debug)]
pub struct RegionDecoder<S> {
    source: S,
    crop: Option<RegionCrop>,
    // Display and window rectangles the resident crop was decoded for.
    basis: Option<(RectF, RectF)>,
}

impl<S: ImageSource> RegionDecoder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            crop: None,
            basis: None,
        }
    }

    pub fn crop(&self) -> Option<&RegionCrop> {
        self.crop.as_ref()
    }

    /// Install `crop` and hand back whatever it displaced.
    pub fn replace(&mut self, crop: Option<RegionCrop>) -> Option<RegionCrop> {
        self.basis = None;
        std::mem::replace(&mut self.crop, crop)
    }

    /// Release the current crop, e.g. when a drag starts.
    pub fn invalidate(&mut self) {
        if self.replace(None).is_some() {
            debug!("Released region crop");
        }
    }

    /// Bring the crop in line with `display` inside `visible`.
    ///
    /// Decode failures are logged and absorbed; the previous crop stays.
    pub fn refresh_crop(&mut self, path: &Path, display: &RectF, visible: &RectF) -> Refresh {
        if path.as_os_str().is_empty() || display.is_empty() || visible.is_empty() {
            return Refresh::Skipped;
        }

        if !needs_region(display, visible) {
            self.invalidate();
            return Refresh::Cleared;
        }

        if self.crop.is_some() && self.basis == Some((*display, *visible)) {
            let display_rect = display;
            debug!(display = ?display_rect, "Region crop already current");
            return Refresh::Unchanged;
        }

        let intrinsic = match self.source.probe(path) {
            Ok(size) => size,
            Err(err) => {
                warn!(error = ?err, ?path, "Failed to probe map image");
                return Refresh::Skipped;
            }
        };

        let Some((target, source_rect)) = map_to_source(display, visible, intrinsic) else {
            self.invalidate();
            return Refresh::Cleared;
        };

        match self.source.decode_region(path, source_rect) {
            Ok(bitmap) => {
                debug!(?source_rect, ?target, "Decoded region crop");
                // Drop the old crop before the new one is installed.
                self.invalidate();
                self.crop = Some(RegionCrop {
                    bitmap,
                    target,
                    source_rect,
                });
                self.basis = Some((*display, *visible));
                Refresh::Installed
            }
            Err(err) => {
                warn!(error = ?err, ?source_rect, "Failed to decode region");
                Refresh::Skipped
            }
        }
    }
}
