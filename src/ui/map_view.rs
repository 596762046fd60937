// Map view widget for the mapview viewer
// Features:
// - Hosts a MapSurface: pinch zoom, drag, double tap to fill
// - Raw touch and mouse input through EventControllerLegacy
// - Draws the full bitmap and, when zoomed past the window, the region crop

use gdk4::{EventType, MemoryFormat, MemoryTexture, Texture};
use glib::translate::ToGlibPtr;
use gtk4::graphene;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use gtk4::EventControllerLegacy;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::config;
use crate::geometry::{PointF, RectF};
use crate::image_loader::{Bitmap, FileImageSource};
use crate::surface::MapSurface;
use crate::viewport::{GestureEvent, PointerTracker, TouchEvent};

/// Pointer id used for the mouse; touch sequences use their own addresses.
const MOUSE_POINTER_ID: u64 = 0;
/// Left mouse button.
const PRIMARY_BUTTON: u32 = 1;

type GestureCallback = Rc<dyn Fn(&GestureEvent)>;

mod imp {
    use super::*;

    pub struct MapViewInner {
        pub surface: RefCell<MapSurface>,
        pub tracker: RefCell<PointerTracker>,
        pub gestures: RefCell<Option<flume::Receiver<GestureEvent>>>,
        pub on_gesture: RefCell<Option<GestureCallback>>,
        // Uploaded textures for the resident bitmap and the current crop.
        pub full_texture: RefCell<Option<Texture>>,
        pub crop_texture: RefCell<Option<(u64, Texture)>>,
        pub tap_source: RefCell<Option<glib::SourceId>>,
    }

    impl Default for MapViewInner {
        fn default() -> Self {
            let cfg = config::config();
            let source = FileImageSource::new(cfg.region_alloc_bytes);
            let mut surface = MapSurface::with_source(cfg.gesture, source);
            let gestures = surface.subscribe();
            Self {
                surface: RefCell::new(surface),
                tracker: RefCell::new(PointerTracker::new()),
                gestures: RefCell::new(Some(gestures)),
                on_gesture: RefCell::new(None),
                full_texture: RefCell::new(None),
                crop_texture: RefCell::new(None),
                tap_source: RefCell::new(None),
            }
        }
    }

    #[glib::object_subclass]
    impl ObjectSubclass for MapViewInner {
        const NAME: &'static str = "MapviewMapView";
        type Type = super::MapView;
        type ParentType = gtk4::Widget;
    }

    impl ObjectImpl for MapViewInner {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.set_hexpand(true);
            obj.set_vexpand(true);
            obj.setup_input();
        }

        fn dispose(&self) {
            if let Some(source) = self.tap_source.take() {
                source.remove();
            }
        }
    }

    impl WidgetImpl for MapViewInner {
        fn snapshot(&self, snapshot: &gtk4::Snapshot) {
            self.obj().draw(snapshot);
        }
    }
}

glib::wrapper! {
    pub struct MapView(ObjectSubclass<imp::MapViewInner>)
        @extends gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget;
}

impl Default for MapView {
    fn default() -> Self {
        Self::new()
    }
}

impl MapView {
    pub fn new() -> Self {
        glib::Object::builder().build()
    }

    /// Show `bitmap`, region-decoding from `path` when zoomed in.
    pub fn set_map(&self, path: &Path, bitmap: Bitmap) {
        let imp = self.imp();
        let texture = create_texture(&bitmap);
        let installed = {
            let mut surface = imp.surface.borrow_mut();
            surface.set_source_path(path);
            surface.set_bitmap(Some(bitmap))
        };
        if installed {
            imp.full_texture.replace(texture);
            imp.crop_texture.replace(None);
            self.queue_draw();
        }
    }

    pub fn connect_gesture<F>(&self, callback: F)
    where
        F: Fn(&GestureEvent) + 'static,
    {
        *self.imp().on_gesture.borrow_mut() = Some(Rc::new(callback));
    }

    fn setup_input(&self) {
        let controller = EventControllerLegacy::new();
        let view_weak = self.downgrade();
        controller.connect_event(move |_, event| {
            let Some(view) = view_weak.upgrade() else {
                return glib::Propagation::Proceed;
            };
            view.handle_raw_event(event)
        });
        self.add_controller(controller);
    }

    fn handle_raw_event(&self, event: &gdk4::Event) -> glib::Propagation {
        let event_type = event.event_type();
        let is_touch = matches!(
            event_type,
            EventType::TouchBegin | EventType::TouchUpdate | EventType::TouchEnd | EventType::TouchCancel
        );
        // Touch is handled natively; skip the pointer events GTK synthesizes from it.
        if !is_touch && event.is_pointer_emulated() {
            return glib::Propagation::Proceed;
        }

        let time = Duration::from_millis(event.time() as u64);
        let Some(pos) = self.widget_position(event) else {
            return glib::Propagation::Proceed;
        };
        let id = if is_touch {
            sequence_id(event)
        } else {
            MOUSE_POINTER_ID
        };

        let touch = {
            let mut tracker = self.imp().tracker.borrow_mut();
            match event_type {
                EventType::TouchBegin => Some(tracker.press(id, pos, time)),
                EventType::ButtonPress if primary_button(event) => {
                    Some(tracker.press(id, pos, time))
                }
                EventType::TouchUpdate | EventType::MotionNotify => tracker.motion(id, pos, time),
                EventType::TouchEnd => tracker.release(id, pos, time),
                EventType::ButtonRelease if primary_button(event) => {
                    tracker.release(id, pos, time)
                }
                EventType::TouchCancel => tracker.cancel(time),
                _ => None,
            }
        };

        match touch {
            Some(touch) => {
                self.dispatch(&touch);
                glib::Propagation::Stop
            }
            None => glib::Propagation::Proceed,
        }
    }

    fn dispatch(&self, touch: &TouchEvent) {
        let imp = self.imp();
        let (deadline, redraw) = {
            let mut surface = imp.surface.borrow_mut();
            surface.handle_touch(touch);
            (surface.tap_deadline(), surface.take_redraw())
        };
        self.deliver_gestures();
        self.schedule_tap_poll(deadline, touch.time);
        if redraw {
            self.queue_draw();
        }
    }

    fn deliver_gestures(&self) {
        let imp = self.imp();
        let callback = imp.on_gesture.borrow().clone();
        let Some(rx) = imp.gestures.borrow().clone() else {
            return;
        };
        for gesture in rx.try_iter() {
            tracing::debug!(?gesture, "Gesture");
            if let Some(callback) = callback.as_ref() {
                callback(&gesture);
            }
        }
    }

    /// Re-arm the glib timeout that delivers a pending single tap.
    fn schedule_tap_poll(&self, deadline: Option<Duration>, now: Duration) {
        let imp = self.imp();
        if let Some(source) = imp.tap_source.take() {
            source.remove();
        }
        let Some(deadline) = deadline else {
            return;
        };

        let delay = deadline.saturating_sub(now);
        let view_weak = self.downgrade();
        let source = glib::timeout_add_local_once(delay, move || {
            if let Some(view) = view_weak.upgrade() {
                view.imp().tap_source.replace(None);
                let fired = view.imp().surface.borrow_mut().poll_tap(deadline);
                if fired {
                    view.deliver_gestures();
                }
            }
        });
        imp.tap_source.replace(Some(source));
    }

    fn draw(&self, snapshot: &gtk4::Snapshot) {
        let imp = self.imp();
        let (width, height) = (self.width() as f32, self.height() as f32);

        let mut surface = imp.surface.borrow_mut();
        surface.measure(width, height);
        let generation = surface.crop_generation();
        let plan = surface.render_plan();

        if let Some((_, rect)) = plan.full {
            if let Some(texture) = imp.full_texture.borrow().as_ref() {
                snapshot.append_texture(texture, &to_graphene(rect));
            }
        }

        if let Some(crop) = plan.crop {
            let mut cached = imp.crop_texture.borrow_mut();
            if cached.as_ref().map(|(g, _)| *g) != Some(generation) {
                *cached = create_texture(&crop.bitmap).map(|t| (generation, t));
            }
            if let Some((_, texture)) = cached.as_ref() {
                snapshot.append_texture(texture, &to_graphene(crop.target));
            }
        } else {
            imp.crop_texture.replace(None);
        }
    }

    /// Translate a legacy event's surface coordinates into this widget.
    fn widget_position(&self, event: &gdk4::Event) -> Option<PointF> {
        let (x, y) = event.position()?;
        let native = self.native()?;
        let (sx, sy) = native.surface_transform();
        let point = graphene::Point::new((x - sx) as f32, (y - sy) as f32);
        let local = native.compute_point(self, &point)?;
        Some(PointF::new(local.x(), local.y()))
    }
}

fn primary_button(event: &gdk4::Event) -> bool {
    event
        .downcast_ref::<gdk4::ButtonEvent>()
        .is_some_and(|b| b.button() == PRIMARY_BUTTON)
}

/// Touch sequences are opaque pointers that stay stable for the lifetime of
/// one touch; the address doubles as the pointer id.
fn sequence_id(event: &gdk4::Event) -> u64 {
    let sequence = event.event_sequence();
    let ptr: *const gdk4::ffi::GdkEventSequence = sequence.to_glib_none().0;
    ptr as usize as u64
}

fn to_graphene(rect: RectF) -> graphene::Rect {
    graphene::Rect::new(rect.left, rect.top, rect.width(), rect.height())
}

/// Upload an RGBA bitmap as a GDK texture.
fn create_texture(bitmap: &Bitmap) -> Option<Texture> {
    let (width, height) = bitmap.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let bytes = glib::Bytes::from(bitmap.as_raw().as_slice());
    let texture = MemoryTexture::new(
        width as i32,
        height as i32,
        MemoryFormat::R8g8b8a8,
        &bytes,
        (width * 4) as usize,
    );
    Some(texture.upcast())
}
