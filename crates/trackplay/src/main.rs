//! Places every athlete of a race at one instant and prints the standings.
//!
//! ```text
//! trackplay --time 120 --unit s/500m boat-a.gpx boat-b.gpx
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use trackplay::{
    Colour, Config, MapView, RecordingSurface, SpeedUnit, gpx_loader,
    leaderboard::{render_standings, standings},
};

const PALETTE: [Colour; 6] = [
    Colour::RED,
    Colour::BLUE,
    Colour::GREEN,
    Colour::ORANGE,
    Colour::PURPLE,
    Colour::BLACK,
];

const MARKER_SIZE: f64 = 6.0;

/// Replay GPX tracks over map tiles
#[derive(Parser)]
#[command(name = "trackplay")]
#[command(version, about)]
struct Cli {
    /// Seconds since the start of the tracks
    #[arg(short, long, default_value_t = 0.0)]
    time: f64,

    /// Speed unit: m/s, km/h, mph or s/500m
    #[arg(short, long, default_value = "m/s")]
    unit: SpeedUnit,

    /// Zoom around the athletes, 0 is closest and 1 shows the whole map
    #[arg(short, long, default_value_t = 0.1)]
    zoom: f64,

    /// JSON configuration file; environment variables are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GPX files, one per athlete
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::from_env()?,
    };
    tracing::info!("Caching tiles in {}", config.cache_dir.display());

    let mut view = MapView::from_config(&config, RecordingSurface::new())?;

    for (path, colour) in cli.files.iter().zip(PALETTE.iter().cycle()) {
        let loaded = gpx_loader::load_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
        let name = loaded.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });

        view.add_athlete(name, *colour, loaded.track)
            .await
            .with_context(|| format!("adding {}", path.display()))?;
    }

    let positions: Vec<_> = view
        .update_markers(cli.time, MARKER_SIZE)?
        .into_iter()
        .map(|(_, position)| position)
        .collect();
    let viewport = view.center_viewpoint(&positions, cli.zoom)?;

    tracing::info!(
        "{} tiles, viewport x {:.0}..{:.0} y {:.0}..{:.0}",
        view.tile_space().len(),
        viewport.left,
        viewport.right,
        viewport.bottom,
        viewport.top
    );

    let rows = standings(view.athletes(), cli.time, cli.unit)?;
    print!("{}", render_standings(&rows));

    Ok(())
}
