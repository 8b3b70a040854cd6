//! Portal diagnostic tool: run free-position searches against scene files.

mod scene;

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use portal::Settings;
use portal_core::{candidate_rings, Footprint, PlacementSearch, Point, SquareGrid};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scene::SceneFile;

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Token placement diagnostics", long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/portal/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find the nearest free position for a token
    Place {
        /// Scene description (JSON)
        #[arg(long)]
        scene: PathBuf,

        #[arg(long)]
        x: f64,

        #[arg(long)]
        y: f64,

        /// Token width in cells
        #[arg(long, default_value = "1")]
        width: u32,

        /// Token height in cells
        #[arg(long, default_value = "1")]
        height: u32,

        #[arg(long)]
        elevation: Option<f64>,

        /// Ignore walls
        #[arg(long)]
        no_collision: bool,

        /// Rings to scan (overrides settings)
        #[arg(long)]
        max_rings: Option<u32>,
    },

    /// Print the candidate positions scanned around a point
    Rings {
        #[arg(long)]
        x: f64,

        #[arg(long)]
        y: f64,

        /// Cell edge length in pixels
        #[arg(long, default_value = "100")]
        grid_size: f64,

        /// Rings to print (overrides settings)
        #[arg(long)]
        max_rings: Option<u32>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => portal::load_settings_from(path)?,
        None => portal::load_settings(),
    };

    match cli.command {
        Command::Place {
            scene,
            x,
            y,
            width,
            height,
            elevation,
            no_collision,
            max_rings,
        } => {
            if width == 0 || height == 0 {
                bail!("token size must be at least one cell");
            }

            let scene = SceneFile::load(&scene)?;
            let search = search_for(&settings, max_rings);
            let collision = settings.placement.collision && !no_collision;
            let origin = Point::new(x, y).with_elevation(elevation);

            let found = search.find(
                &scene.grid,
                &scene.snapshot(),
                Footprint::new(width, height),
                &origin,
                collision,
            );

            match found {
                Some(position) => println!("{}", serde_json::to_string(&position)?),
                None => bail!("no free position within {} rings", search.max_rings),
            }
        }

        Command::Rings {
            x,
            y,
            grid_size,
            max_rings,
        } => {
            let grid = SquareGrid::new(grid_size, SquareGrid::default().distance);
            let max_rings = search_for(&settings, max_rings).max_rings;
            info!(max_rings, "candidate rings");

            for candidate in candidate_rings(&grid, &Point::new(x, y), max_rings) {
                println!(
                    "{}\t{}\t{}",
                    candidate.ring, candidate.position.x, candidate.position.y
                );
            }
        }
    }

    Ok(())
}

fn search_for(settings: &Settings, max_rings: Option<u32>) -> PlacementSearch {
    let mut search = settings.placement_search();
    if let Some(max_rings) = max_rings {
        search.max_rings = max_rings;
    }
    search
}
