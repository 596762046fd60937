//! Subway map viewer: pinch-zoom and drag over one large bitmap, with the
//! visible slice re-decoded at full resolution once a gesture settles.

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod geometry;
pub mod image_loader;
pub mod region;
pub mod surface;
pub mod ui;
pub mod viewport;
