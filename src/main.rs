use mapview::app::MapviewApp;
use tracing_subscriber::EnvFilter;

fn main() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "mapview=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let app = MapviewApp::new();
    std::process::exit(app.run());
}
