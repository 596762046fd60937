pub mod map_view;
pub mod window;

pub use map_view::MapView;
pub use window::MainWindow;
