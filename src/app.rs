use gtk4::prelude::*;
use gtk4::{gio, Application};
use std::path::Path;
use std::rc::Rc;

use crate::bootstrap::{self, MapSource};
use crate::config::config;
use crate::ui::MainWindow;

const APP_ID: &str = "org.mapview.SubwayMap";

pub struct MapviewApp {
    app: Application,
}

impl MapviewApp {
    pub fn new() -> Self {
        let app = Application::builder()
            .application_id(APP_ID)
            .flags(gio::ApplicationFlags::HANDLES_OPEN)
            .build();

        app.connect_activate(Self::on_activate);
        app.connect_open(Self::on_open);

        Self { app }
    }

    pub fn run(&self) -> i32 {
        self.app.run().into()
    }

    fn on_activate(app: &Application) {
        Self::open_window(app, None);
    }

    /// A file on the command line is shown instead of the bundled map.
    fn on_open(app: &Application, files: &[gio::File], _hint: &str) {
        let path = files.first().and_then(|f| f.path());
        Self::open_window(app, path.as_deref());
    }

    fn open_window(app: &Application, file: Option<&Path>) {
        let window = MainWindow::new(app);
        window.present();
        Self::start_load(&window, file);
        // Keep the window alive by storing it on the Application.
        unsafe {
            app.set_data("main-window", window);
        }
    }

    fn start_load(window: &Rc<MainWindow>, file: Option<&Path>) {
        let cfg = config();
        let source = match file {
            Some(path) => MapSource::File(path.to_path_buf()),
            None => match bootstrap::cached_map_path(&cfg.map_file_name) {
                Ok(cache) => MapSource::Bundled {
                    asset: cfg.asset_path.clone(),
                    cache,
                },
                Err(err) => {
                    tracing::error!(error = ?err, "No data directory for the map");
                    window.show_error("Failed to load map");
                    return;
                }
            },
        };

        window.set_loading(true);
        let receiver = bootstrap::spawn_load(source, cfg.decode_budget_bytes);
        let window_weak = Rc::downgrade(window);
        glib::spawn_future_local(async move {
            let Ok(result) = receiver.recv().await else {
                return;
            };
            let Some(window) = window_weak.upgrade() else {
                return;
            };
            match result {
                Ok(map) => window.set_map(map),
                Err(_) => window.show_error("Failed to load map"),
            }
        });
    }
}

impl Default for MapviewApp {
    fn default() -> Self {
        Self::new()
    }
}
