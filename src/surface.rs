//! The map surface: what a host widget drives.
//!
//! Ties the viewport controller to the resident bitmap and the region
//! decoder. Touch events go in, settle steps trigger crop refreshes, and
//! `render_plan` says what to draw where.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::config::GestureConfig;
use crate::geometry::RectF;
use crate::image_loader::{Bitmap, FileImageSource, ImageSource};
use crate::region::{Refresh, RegionCrop, RegionDecoder};
use crate::viewport::{GestureEvent, Outcome, TouchEvent, ViewportController};

/// Draw list for one frame. The surface is cleared first, then `full` is
/// drawn into its rectangle and `crop` over its target.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderPlan<'a> {
    pub full: Option<(&'a Bitmap, RectF)>,
    pub crop: Option<&'a RegionCrop>,
}

#[derive(Debug)]
pub struct MapSurface<S = FileImageSource> {
    controller: ViewportController,
    bitmap: Option<Bitmap>,
    source_path: Option<PathBuf>,
    region: RegionDecoder<S>,
    crop_generation: u64,
    crop_changed: bool,
}

impl MapSurface<FileImageSource> {
    pub fn new(config: GestureConfig) -> Self {
        Self::with_source(config, FileImageSource::default())
    }
}

impl<S: ImageSource> MapSurface<S> {
    pub fn with_source(config: GestureConfig, source: S) -> Self {
        Self {
            controller: ViewportController::new(config),
            bitmap: None,
            source_path: None,
            region: RegionDecoder::new(source),
            crop_generation: 0,
            crop_changed: false,
        }
    }

    pub fn controller(&self) -> &ViewportController {
        &self.controller
    }

    pub fn subscribe(&mut self) -> flume::Receiver<GestureEvent> {
        self.controller.subscribe()
    }

    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_ref()
    }

    pub fn crop(&self) -> Option<&RegionCrop> {
        self.region.crop()
    }

    /// Bumped whenever the crop is installed or released.
    pub fn crop_generation(&self) -> u64 {
        self.crop_generation
    }

    /// Replace the resident bitmap. `None` is ignored and keeps what is shown.
    ///
    /// The previous bitmap and any crop are released before the new one is
    /// laid out on the next `measure`.
    pub fn set_bitmap(&mut self, bitmap: Option<Bitmap>) -> bool {
        let Some(bitmap) = bitmap else {
            return false;
        };
        if !self.controller.set_bitmap_size(Some(bitmap.dimensions())) {
            return false;
        }
        drop(self.bitmap.take());
        self.release_crop();
        debug!(
            width = bitmap.width(),
            height = bitmap.height(),
            "Installed bitmap"
        );
        self.bitmap = Some(bitmap);
        true
    }

    /// File the region decoder reads from.
    pub fn set_source_path(&mut self, path: impl Into<PathBuf>) {
        self.source_path = Some(path.into());
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// One-time surface measurement; see `ViewportController::measure`.
    pub fn measure(&mut self, width: f32, height: f32) -> bool {
        self.controller.measure(width, height)
    }

    pub fn handle_touch(&mut self, event: &TouchEvent) -> Outcome {
        let outcome = self.controller.handle_event(event);
        if outcome.invalidate_crop {
            self.release_crop();
        }
        if outcome.settled {
            self.refresh_crop();
        }
        outcome
    }

    pub fn poll_tap(&mut self, now: Duration) -> bool {
        self.controller.poll_tap(now)
    }

    pub fn tap_deadline(&self) -> Option<Duration> {
        self.controller.tap_deadline()
    }

    /// Whether anything visible changed since the last call.
    pub fn take_redraw(&mut self) -> bool {
        let moved = self.controller.take_redraw();
        moved | std::mem::take(&mut self.crop_changed)
    }

    /// Re-decode the visible slice for the current display rectangle.
    pub fn refresh_crop(&mut self) -> Refresh {
        let (Some(path), Some(visible)) = (self.source_path.as_deref(), self.controller.surface_rect())
        else {
            return Refresh::Skipped;
        };
        let had_crop = self.region.crop().is_some();
        let display = self.controller.display_rect();
        let result = self.region.refresh_crop(path, &display, &visible);
        if result == Refresh::Installed || (result == Refresh::Cleared && had_crop) {
            self.bump_crop();
        }
        result
    }

    pub fn render_plan(&self) -> RenderPlan<'_> {
        if !self.controller.is_measured() {
            return RenderPlan::default();
        }
        RenderPlan {
            full: self
                .bitmap
                .as_ref()
                .map(|b| (b, self.controller.display_rect())),
            crop: self.region.crop(),
        }
    }

    fn release_crop(&mut self) {
        if self.region.replace(None).is_some() {
            self.bump_crop();
        }
    }

    fn bump_crop(&mut self) {
        self.crop_generation = self.crop_generation.wrapping_add(1);
        self.crop_changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PixelRect, PointF};
    use crate::image_loader::{decode_full, DecodeError};
    use crate::viewport::{Pointer, TouchAction};
    use image::{Rgba, RgbaImage};
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::{tempdir, TempDir};

    fn ev(action: TouchAction, points: &[(f32, f32)], t: u64) -> TouchEvent {
        let pointers = points
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Pointer {
                id: i as u64,
                position: PointF::new(*x, *y),
            })
            .collect();
        TouchEvent::new(action, pointers, Duration::from_millis(t))
    }

    /// File-backed source that counts region decodes.
    #[derive(Default)]
    struct CountingSource {
        inner: FileImageSource,
        decodes: Rc<Cell<usize>>,
    }

    impl ImageSource for CountingSource {
        fn probe(&self, path: &Path) -> Result<(u32, u32), DecodeError> {
            self.inner.probe(path)
        }

        fn decode_region(
            &self,
            path: &Path,
            rect: PixelRect,
        ) -> Result<Bitmap, DecodeError> {
            self.decodes.set(self.decodes.get() + 1);
            self.inner.decode_region(path, rect)
        }
    }

    /// 40x30 map on a 1000x800 surface, backed by a real file in `dir`.
    fn surface_with<S: ImageSource>(dir: &TempDir, source: S) -> MapSurface<S> {
        let path = dir.path().join("map.png");
        RgbaImage::from_fn(40, 30, |x, y| Rgba([x as u8, y as u8, 7, 255]))
            .save(&path)
            .unwrap();

        let mut s = MapSurface::with_source(GestureConfig::default(), source);
        assert!(s.set_bitmap(Some(decode_full(&path, u64::MAX).unwrap())));
        s.set_source_path(&path);
        assert!(s.measure(1000.0, 800.0));
        s
    }

    fn surface(dir: &TempDir) -> MapSurface {
        surface_with(dir, FileImageSource::default())
    }

    fn pinch_to_double<S: ImageSource>(s: &mut MapSurface<S>) {
        s.handle_touch(&ev(TouchAction::Down, &[(400.0, 400.0)], 0));
        s.handle_touch(&ev(
            TouchAction::PointerDown,
            &[(400.0, 400.0), (600.0, 400.0)],
            1,
        ));
        let moved = [(300.0, 400.0), (700.0, 400.0)];
        s.handle_touch(&ev(TouchAction::Move, &moved, 2));
        s.handle_touch(&ev(TouchAction::PointerUp, &moved, 3));
        s.handle_touch(&ev(TouchAction::Up, &moved[..1], 4));
    }

    #[test]
    fn test_idle_renders_full_bitmap_only() {
        let dir = tempdir().unwrap();
        let s = surface(&dir);
        let plan = s.render_plan();
        let (bitmap, rect) = plan.full.unwrap();
        assert_eq!(bitmap.dimensions(), (40, 30));
        assert_eq!(rect, RectF::new(0.0, 25.0, 1000.0, 775.0));
        assert!(plan.crop.is_none());
    }

    #[test]
    fn test_unmeasured_surface_draws_nothing() {
        let mut s = MapSurface::new(GestureConfig::default());
        s.set_bitmap(Some(RgbaImage::new(4, 4)));
        let plan = s.render_plan();
        assert!(plan.full.is_none());
        assert!(plan.crop.is_none());
    }

    #[test]
    fn test_zoom_settle_decodes_visible_region() {
        let dir = tempdir().unwrap();
        let mut s = surface(&dir);
        pinch_to_double(&mut s);

        let crop = s.crop().expect("crop after zoom settle");
        assert_eq!(crop.source_rect, PixelRect::new(10, 7, 20, 16));
        assert_eq!(crop.target, RectF::new(0.0, 0.0, 1000.0, 800.0));
        assert_eq!(crop.bitmap.get_pixel(0, 0), &Rgba([10, 7, 7, 255]));
        assert!(s.take_redraw());
        assert!(s.render_plan().crop.is_some());
    }

    #[test]
    fn test_drag_releases_crop_until_settle() {
        let dir = tempdir().unwrap();
        let mut s = surface(&dir);
        pinch_to_double(&mut s);
        let generation = s.crop_generation();

        s.handle_touch(&ev(TouchAction::Down, &[(500.0, 500.0)], 1000));
        s.handle_touch(&ev(TouchAction::Move, &[(600.0, 500.0)], 1010));
        assert!(s.crop().is_none());
        assert!(s.crop_generation() > generation);

        s.handle_touch(&ev(TouchAction::Up, &[(600.0, 500.0)], 1020));
        let crop = s.crop().expect("crop after drag settle");
        // Shifted right by 100 units, i.e. 2 source pixels at 0.02 px/unit.
        assert_eq!(crop.source_rect, PixelRect::new(8, 7, 20, 16));
    }

    #[test]
    fn test_pinch_decodes_region_once() {
        let dir = tempdir().unwrap();
        let decodes = Rc::new(Cell::new(0));
        let source = CountingSource {
            decodes: decodes.clone(),
            ..Default::default()
        };
        let mut s = surface_with(&dir, source);

        pinch_to_double(&mut s);
        assert!(s.crop().is_some());
        assert_eq!(decodes.get(), 1);
    }

    #[test]
    fn test_pinch_start_releases_crop() {
        let dir = tempdir().unwrap();
        let mut s = surface(&dir);
        pinch_to_double(&mut s);
        let generation = s.crop_generation();
        s.take_redraw();

        s.handle_touch(&ev(TouchAction::Down, &[(400.0, 400.0)], 1000));
        let outcome = s.handle_touch(&ev(
            TouchAction::PointerDown,
            &[(400.0, 400.0), (600.0, 400.0)],
            1001,
        ));
        assert!(outcome.invalidate_crop);
        assert!(s.crop().is_none());
        assert!(s.render_plan().crop.is_none());
        assert!(s.crop_generation() > generation);
        assert!(s.take_redraw());
    }

    #[test]
    fn test_new_bitmap_resets_layout_and_crop() {
        let dir = tempdir().unwrap();
        let mut s = surface(&dir);
        pinch_to_double(&mut s);
        assert!(s.crop().is_some());

        assert!(s.set_bitmap(Some(RgbaImage::new(100, 100))));
        assert!(s.crop().is_none());
        assert!(!s.controller().is_measured());
        assert!(s.measure(1000.0, 800.0));
        assert_eq!(
            s.controller().display_rect(),
            RectF::new(100.0, 0.0, 900.0, 800.0)
        );
    }

    #[test]
    fn test_missing_bitmap_is_ignored() {
        let dir = tempdir().unwrap();
        let mut s = surface(&dir);
        assert!(!s.set_bitmap(None));
        assert_eq!(s.bitmap().map(|b| b.dimensions()), Some((40, 30)));
    }

    #[test]
    fn test_refresh_without_source_path_is_skipped() {
        let mut s = MapSurface::new(GestureConfig::default());
        s.set_bitmap(Some(RgbaImage::new(40, 30)));
        s.measure(1000.0, 800.0);
        assert_eq!(s.refresh_crop(), Refresh::Skipped);
    }
}
