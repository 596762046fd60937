// Main window for the mapview viewer
// ApplicationWindow with the map view, a load spinner and a status line

use gdk4::Display;
use gtk4::prelude::*;
use gtk4::{
    Align, Application, ApplicationWindow, CssProvider, Label, Overlay, Settings, Spinner,
    STYLE_PROVIDER_PRIORITY_APPLICATION,
};
use std::rc::Rc;

use super::map_view::MapView;
use crate::bootstrap::LoadedMap;
use crate::viewport::GestureEvent;

const HINT_TEXT: &str = "Pinch to zoom  |  drag to pan  |  double tap to fill";

const CSS: &str = r#"
window {
    background-color: #0a0a0a;
    color: #e0e0e0;
}

.status-line {
    background-color: rgba(0, 0, 0, 0.7);
    color: #00ff88;
    padding: 4px 8px;
    font-size: 11px;
}

.status-line.error {
    color: #ff5555;
}
"#;

fn load_css() {
    let provider = CssProvider::new();
    provider.load_from_string(CSS);
    if let Some(display) = Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }
}

pub struct MainWindow {
    window: ApplicationWindow,
    map_view: MapView,
    spinner: Spinner,
    status: Label,
}

impl MainWindow {
    pub fn new(app: &Application) -> Rc<Self> {
        load_css();
        if let Some(settings) = Settings::default() {
            settings.set_gtk_application_prefer_dark_theme(true);
        }

        let window = ApplicationWindow::builder()
            .application(app)
            .title("mapview")
            .default_width(1000)
            .default_height(800)
            .build();

        let overlay = Overlay::new();
        let map_view = MapView::new();
        overlay.set_child(Some(&map_view));

        let spinner = Spinner::new();
        spinner.set_halign(Align::Center);
        spinner.set_valign(Align::Center);
        spinner.set_size_request(48, 48);
        overlay.add_overlay(&spinner);

        let status = Label::new(None);
        status.set_halign(Align::Center);
        status.set_valign(Align::End);
        status.set_margin_bottom(12);
        status.add_css_class("status-line");
        status.set_visible(false);
        overlay.add_overlay(&status);

        window.set_child(Some(&overlay));

        let main_window = Rc::new(Self {
            window,
            map_view,
            spinner,
            status,
        });
        main_window.setup_gestures();
        main_window
    }

    pub fn present(&self) {
        self.window.present();
    }

    pub fn set_loading(&self, loading: bool) {
        self.spinner.set_visible(loading);
        self.spinner.set_spinning(loading);
    }

    pub fn show_error(&self, message: &str) {
        self.set_loading(false);
        self.status.add_css_class("error");
        self.status.set_text(message);
        self.status.set_visible(true);
    }

    pub fn set_map(&self, map: LoadedMap) {
        self.set_loading(false);
        self.status.remove_css_class("error");
        self.status.set_visible(false);
        self.map_view.set_map(&map.path, map.bitmap);
    }

    /// A single tap toggles the controls hint.
    fn setup_gestures(&self) {
        let status = self.status.clone();
        self.map_view.connect_gesture(move |gesture| {
            if matches!(gesture, GestureEvent::Tap) && !status.has_css_class("error") {
                let show = !status.is_visible();
                status.set_text(HINT_TEXT);
                status.set_visible(show);
            }
        });
    }
}
