// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CityJSON-Lite pipeline - builds CityJSON-Lite files for the map viewer.
//!
//! # Commands
//!
//! - `load-3dbag` - merge tiled 3D BAG buildings with building and
//!   subdivision tables
//! - `load-custom-building` - build one building from a glTF scene and its
//!   space and unit tables
//! - `load-outdoor` - outdoor units from GeoJSON point features
//! - `split-cj` - split a CityJSON file into geometry (GLB) and attributes
//! - `subset-cj` - keep a list of objects, through `cjio`
//! - `format-codelist` - unit codelist from CSV to JSON
//!
//! `CITYJSON_LITE_SCALE` and `CITYJSON_LITE_ICON_RADII` tune the importers,
//! `RUST_LOG` overrides the `-v` log level.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "cityjson-lite", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Flags shared by the commands that write files.
#[derive(Args, Debug, Clone, Copy)]
struct Common {
    /// Overwrite existing output
    #[arg(short, long, default_value_t = false)]
    overwrite: bool,

    /// More output: -v warnings, -vv progress, -vvv debug
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge 3D BAG tiles with building attributes into a CityJSON file
    #[command(name = "load-3dbag")]
    Load3dBag {
        /// Input CityJSON file with 3D BAG tiles
        input: PathBuf,
        /// Output CityJSON path (.json)
        output: PathBuf,
        /// Buildings attribute table
        #[arg(short, long)]
        buildings: Option<PathBuf>,
        /// Building subdivisions attribute table
        #[arg(short, long)]
        subdivisions: Option<PathBuf>,
        #[command(flatten)]
        common: Common,
    },

    /// Build one building from a glTF scene and its attribute tables
    #[command(name = "load-custom-building")]
    LoadCustomBuilding {
        /// Input scene (.glb or .gltf)
        input: PathBuf,
        /// Output CityJSON path (.json)
        output: PathBuf,
        /// Buildings attribute table
        #[arg(short, long)]
        buildings: Option<PathBuf>,
        /// Building parts attribute table
        #[arg(short, long)]
        parts: Option<PathBuf>,
        /// Storeys attribute table
        #[arg(short, long)]
        storeys: Option<PathBuf>,
        /// Rooms attribute table
        #[arg(short, long)]
        rooms: Option<PathBuf>,
        /// Building units table
        #[arg(short, long)]
        units: Option<PathBuf>,
        #[command(flatten)]
        common: Common,
    },

    /// Load outdoor units from GeoJSON point features
    #[command(name = "load-outdoor")]
    LoadOutdoor {
        /// Input GeoJSON FeatureCollection
        input: PathBuf,
        /// Output CityJSON path (.json)
        output: PathBuf,
        #[command(flatten)]
        common: Common,
    },

    /// Split a CityJSON file into geometry.glb and attributes.city.json
    #[command(name = "split-cj")]
    SplitCj {
        /// Input CityJSON file
        input: PathBuf,
        /// Output folder
        output: PathBuf,
        #[command(flatten)]
        common: Common,
    },

    /// Keep only the listed objects of a CityJSON file (needs `cjio`)
    #[command(name = "subset-cj")]
    SubsetCj {
        /// Input CityJSON path (.json)
        input: PathBuf,
        /// Output CityJSON path (.json)
        output: PathBuf,
        /// Text file with one object id per line
        ids: PathBuf,
    },

    /// Format the unit codelist from CSV into JSON
    #[command(name = "format-codelist")]
    FormatCodelist {
        /// Input codelist (.csv)
        input: PathBuf,
        /// Output JSON path (.json)
        output: PathBuf,
        /// Overwrite existing output
        #[arg(short, long, default_value_t = false)]
        overwrite: bool,
    },
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => bail!("verbosity goes from 0 to 3 (nothing, -v, -vv or -vvv)"),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    let verbose = match &cli.command {
        Command::Load3dBag { common, .. }
        | Command::LoadCustomBuilding { common, .. }
        | Command::LoadOutdoor { common, .. }
        | Command::SplitCj { common, .. } => common.verbose,
        Command::SubsetCj { .. } | Command::FormatCodelist { .. } => 0,
    };
    init_logging(verbose)?;

    tracing::debug!(scale = ?config.import.scale, radii = ?config.import.icon_radii, "configuration");

    match cli.command {
        Command::Load3dBag {
            input,
            output,
            buildings,
            subdivisions,
            common,
        } => commands::load_3dbag(
            &config,
            &input,
            &output,
            buildings.as_deref(),
            subdivisions.as_deref(),
            common.overwrite,
        ),
        Command::LoadCustomBuilding {
            input,
            output,
            buildings,
            parts,
            storeys,
            rooms,
            units,
            common,
        } => commands::load_custom_building(
            &config,
            &input,
            &output,
            &commands::SpaceTables {
                buildings,
                parts,
                storeys,
                rooms,
                units,
            },
            common.overwrite,
        ),
        Command::LoadOutdoor {
            input,
            output,
            common,
        } => commands::load_outdoor(&config, &input, &output, common.overwrite),
        Command::SplitCj {
            input,
            output,
            common,
        } => commands::split_cj(&input, &output, common.overwrite),
        Command::SubsetCj { input, output, ids } => commands::subset_cj(&input, &output, &ids),
        Command::FormatCodelist {
            input,
            output,
            overwrite,
        } => commands::format_codelist(&input, &output, overwrite),
    }
}
