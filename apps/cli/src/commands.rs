// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command handlers.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, ensure, Context, Result};
use cityjson_lite_model::SpaceKind;
use cityjson_lite_processing::{
    add_units, apply_space_attributes, format_codelist as write_codelist, import_scene,
    import_tiled, read_points, read_scene, split_file, write_city_json, AttributeReader,
    AttributeRecord, BuildingRecord, CityJsonDataset, CityModel, KeyCounter, PartRecord,
    RoomRecord, StoreyRecord, SubdivisionRecord, UnitRecord,
};
use tracing::info;

use crate::config::Config;

/// Attribute tables of a custom building, all optional.
#[derive(Debug, Default)]
pub struct SpaceTables {
    pub buildings: Option<PathBuf>,
    pub parts: Option<PathBuf>,
    pub storeys: Option<PathBuf>,
    pub rooms: Option<PathBuf>,
    pub units: Option<PathBuf>,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.contains(&e))
}

fn check_output(path: &Path, overwrite: bool) -> Result<()> {
    ensure!(
        has_extension(path, &["json"]),
        "the output path {} should end with '.json'",
        path.display()
    );
    if path.exists() && !overwrite {
        bail!(
            "there is already a file at {}, pass --overwrite to replace it",
            path.display()
        );
    }
    Ok(())
}

fn read_records<R: AttributeRecord>(
    path: Option<&Path>,
    counter: &mut KeyCounter,
) -> Result<AttributeReader<R>> {
    match path {
        Some(path) => AttributeReader::read(path, counter)
            .with_context(|| format!("failed to read attribute table {}", path.display())),
        None => Ok(AttributeReader::default()),
    }
}

fn write(model: &mut CityModel, output: &Path) -> Result<()> {
    write_city_json(model, output, None)
        .with_context(|| format!("failed to write {}", output.display()))
}

pub fn load_3dbag(
    config: &Config,
    input: &Path,
    output: &Path,
    buildings: Option<&Path>,
    subdivisions: Option<&Path>,
    overwrite: bool,
) -> Result<()> {
    check_output(output, overwrite)?;

    let dataset = CityJsonDataset::read(input)
        .with_context(|| format!("failed to load tiles from {}", input.display()))?;
    let mut counter = KeyCounter::new();
    let buildings: AttributeReader<BuildingRecord> = read_records(buildings, &mut counter)?;
    let subdivisions: AttributeReader<SubdivisionRecord> =
        read_records(subdivisions, &mut counter)?;

    let mut import =
        import_tiled(&dataset, &buildings, &subdivisions, &config.import, &mut counter)
            .context("failed to merge the building tiles")?;
    info!(
        objects = import.model.len(),
        orphans = import.orphans.len(),
        "tiles merged"
    );
    write(&mut import.model, output)
}

pub fn load_custom_building(
    config: &Config,
    input: &Path,
    output: &Path,
    tables: &SpaceTables,
    overwrite: bool,
) -> Result<()> {
    ensure!(
        has_extension(input, &["glb", "gltf"]),
        "the input path {} should end with '.glb' or '.gltf'",
        input.display()
    );
    check_output(output, overwrite)?;

    let meshes =
        read_scene(input).with_context(|| format!("failed to read scene {}", input.display()))?;
    let mut model = import_scene(meshes, &config.import).context("failed to build the spaces")?;

    info!("applying space attributes");
    let mut counter = KeyCounter::new();
    let buildings: AttributeReader<BuildingRecord> =
        read_records(tables.buildings.as_deref(), &mut counter)?;
    let parts: AttributeReader<PartRecord> = read_records(tables.parts.as_deref(), &mut counter)?;
    let storeys: AttributeReader<StoreyRecord> =
        read_records(tables.storeys.as_deref(), &mut counter)?;
    let rooms: AttributeReader<RoomRecord> = read_records(tables.rooms.as_deref(), &mut counter)?;
    apply_space_attributes(&mut model, SpaceKind::Building, &buildings, true)?;
    apply_space_attributes(&mut model, SpaceKind::BuildingPart, &parts, true)?;
    apply_space_attributes(&mut model, SpaceKind::BuildingStorey, &storeys, true)?;
    apply_space_attributes(&mut model, SpaceKind::BuildingRoom, &rooms, true)?;

    if let Some(path) = tables.units.as_deref() {
        info!("adding building units");
        let units: AttributeReader<UnitRecord> = read_records(Some(path), &mut counter)?;
        add_units(&mut model, &units, &config.import, &mut counter)
            .context("failed to add the units")?;
    }

    write(&mut model, output)
}

pub fn load_outdoor(config: &Config, input: &Path, output: &Path, overwrite: bool) -> Result<()> {
    check_output(output, overwrite)?;
    let mut model = read_points(input, &config.import, &mut KeyCounter::new())
        .with_context(|| format!("failed to load points from {}", input.display()))?;
    write(&mut model, output)
}

pub fn split_cj(input: &Path, output: &Path, overwrite: bool) -> Result<()> {
    if output.exists() && !overwrite {
        bail!(
            "{} already exists, pass --overwrite to write into it",
            output.display()
        );
    }
    split_file(input, output, overwrite)
        .with_context(|| format!("failed to split {}", input.display()))
}

/// Object ids from a text file, one per line, blank lines ignored
fn read_ids(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read ids from {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn subset_args(input: &Path, output: &Path, ids: &[String]) -> Vec<String> {
    let mut args = vec![input.display().to_string(), "subset".to_string()];
    for id in ids {
        args.push("--id".to_string());
        args.push(id.clone());
    }
    args.push("save".to_string());
    args.push(output.display().to_string());
    args
}

pub fn subset_cj(input: &Path, output: &Path, ids: &Path) -> Result<()> {
    ensure!(
        has_extension(input, &["json"]),
        "the input path {} should end with '.json'",
        input.display()
    );
    ensure!(
        has_extension(output, &["json"]),
        "the output path {} should end with '.json'",
        output.display()
    );

    let ids = read_ids(ids)?;
    info!(objects = ids.len(), "running cjio subset");
    let status = Command::new("cjio")
        .args(subset_args(input, output, &ids))
        .status()
        .context("failed to run cjio, is it installed?")?;
    ensure!(status.success(), "cjio exited with {status}");
    Ok(())
}

pub fn format_codelist(input: &Path, output: &Path, overwrite: bool) -> Result<()> {
    ensure!(
        has_extension(input, &["csv"]),
        "the input path {} should end with '.csv'",
        input.display()
    );
    check_output(output, overwrite)?;
    write_codelist(input, output)
        .with_context(|| format!("failed to format codelist {}", input.display()))
}
