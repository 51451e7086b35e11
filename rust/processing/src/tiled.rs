// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tiled building datasets.
//!
//! Building rows claim groups of top-level tiles. Each building merges the
//! meshes of its tiles and of their child tiles per output LoD. Top-level
//! tiles that no row claims become buildings of their own.

use std::collections::BTreeMap;

use cityjson_lite_geometry::{merge_meshes, orient_faces_z_up, Mesh};
use cityjson_lite_model::{
    building_prefix, container_id, space_key_to_id, unit_id, AttrValue, CityModel, CityObject,
    ContainerRole, Geometry, ObjectKind, SpaceKind,
};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::loader::CityJsonDataset;
use crate::records::{
    AttributeReader, AttributeRecord, BuildingRecord, KeyCounter, SubdivisionRecord,
};
use crate::units::ensure_container;

/// Attribute carrying the space id of a subdivision unit
pub const SUBDIVISION_NUMBER: &str = "subdivision_number";

/// Result of a tiled import
#[derive(Debug)]
pub struct TiledImport {
    pub model: CityModel,
    /// Top-level tiles no building row claimed, in id order
    pub orphans: Vec<String>,
}

/// Merged geometries of a group of top-level tiles.
///
/// Returns the geometries and every tile consumed, children included.
pub fn merge_tiles(
    dataset: &CityJsonDataset,
    tile_ids: &[String],
    config: &ImportConfig,
) -> Result<(Vec<Geometry>, Vec<String>)> {
    let mut per_lod: BTreeMap<u32, Vec<Mesh>> = BTreeMap::new();
    let mut consumed = Vec::new();

    let mut gather = |id: &str, lods: &BTreeMap<String, u32>| -> Result<Vec<String>> {
        let tile = dataset
            .object(id)
            .ok_or_else(|| Error::MissingObject(id.to_string()))?;
        let mut meshes = dataset
            .object_meshes(id)?
            .ok_or_else(|| Error::MissingGeometry(id.to_string()))?;
        for (input, &output) in lods {
            let mesh = meshes.remove(input).ok_or_else(|| Error::MissingLod {
                id: id.to_string(),
                lod: input.clone(),
            })?;
            per_lod.entry(output).or_default().push(mesh);
        }
        consumed.push(id.to_string());
        Ok(tile.children.clone())
    };

    for id in tile_ids {
        let children = gather(id, &config.tile_lods.top_level)?;
        for child in &children {
            gather(child, &config.tile_lods.children)?;
        }
    }

    let mut geometries = Vec::new();
    for (lod, meshes) in per_lod {
        let mut merged = merge_meshes(&meshes, true);
        if merged.is_empty() {
            debug!(lod, tiles = tile_ids.len(), "no geometry left after merge");
            continue;
        }
        if lod == 0 {
            orient_faces_z_up(&mut merged)?;
        }
        geometries.push(Geometry::multi_surface_from_mesh(lod, &merged));
    }

    Ok((geometries, consumed))
}

fn building(
    id: String,
    space_id: &str,
    geometries: Vec<Geometry>,
    record: Option<&BuildingRecord>,
    config: &ImportConfig,
) -> Result<CityObject> {
    let mut object = CityObject::with_radii(
        id,
        ObjectKind::space(SpaceKind::Building, space_id),
        geometries,
        record.and_then(|r| r.icon),
        &config.icon_radii,
    )?;
    if let Some(record) = record {
        object.add_attributes(record.object_attributes(), false)?;
    }
    Ok(object)
}

/// Build a model from a tiled dataset and the building and subdivision
/// tables.
///
/// Rows flagged `skip` produce no object, their tiles are still claimed.
/// Subdivision units are numbered per container through `counter`.
pub fn import_tiled(
    dataset: &CityJsonDataset,
    buildings: &AttributeReader<BuildingRecord>,
    subdivisions: &AttributeReader<SubdivisionRecord>,
    config: &ImportConfig,
    counter: &mut KeyCounter,
) -> Result<TiledImport> {
    let mut model = CityModel::new(config.scale);
    let mut claimed: FxHashSet<String> = FxHashSet::default();

    let rows: Vec<&BuildingRecord> = buildings.iter().map(|(_, record)| record).collect();
    info!(buildings = rows.len(), tiles = dataset.len(), "merging building tiles");

    let merged = rows
        .par_iter()
        .filter(|record| !record.skip)
        .map(|&record| -> Result<(CityObject, Vec<String>)> {
            let (geometries, consumed) = merge_tiles(dataset, &record.tile_ids, config)?;
            let id = space_key_to_id(SpaceKind::Building, &record.key);
            let object = building(id, &record.space_id, geometries, Some(record), config)?;
            Ok((object, consumed))
        })
        .collect::<Result<Vec<_>>>()?;

    for record in rows.iter().filter(|record| record.skip) {
        debug!(key = %record.key, "skipping building");
        claimed.extend(record.tile_ids.iter().cloned());
    }
    for (object, consumed) in merged {
        claimed.extend(consumed);
        model.add_object(object)?;
    }

    add_subdivisions(&mut model, subdivisions, config, counter)?;

    let orphans: Vec<String> = dataset
        .objects()
        .filter(|(id, tile)| tile.parents.is_empty() && !claimed.contains(*id))
        .map(|(id, _)| id.to_string())
        .collect();
    if !orphans.is_empty() {
        warn!(count = orphans.len(), "tiles not claimed by any building");
    }

    let fallbacks = orphans
        .par_iter()
        .map(|tile| -> Result<CityObject> {
            let (geometries, _) = merge_tiles(dataset, std::slice::from_ref(tile), config)?;
            let id = space_key_to_id(SpaceKind::Building, tile);
            building(id, tile, geometries, None, config)
        })
        .collect::<Result<Vec<_>>>()?;
    for object in fallbacks {
        debug!(id = object.id(), "adding orphan tile");
        model.add_object(object)?;
    }

    info!(objects = model.len(), orphans = orphans.len(), "tiled import done");
    Ok(TiledImport { model, orphans })
}

/// Add one unit per subdivision row under `<building>/<"">/<code>`
fn add_subdivisions(
    model: &mut CityModel,
    subdivisions: &AttributeReader<SubdivisionRecord>,
    config: &ImportConfig,
    counter: &mut KeyCounter,
) -> Result<()> {
    let code = config.subdivision_code.as_str();

    for (key, record) in subdivisions.iter() {
        if record.skip {
            debug!(key, "skipping subdivision");
            continue;
        }
        let prefix = building_prefix(&record.parent_key);
        let building_id = space_key_to_id(SpaceKind::Building, &record.parent_key);
        let building = model
            .key(&building_id)
            .ok_or(Error::MissingObject(building_id))?;

        let main = ensure_container(model, building, "", &prefix)?;
        let container = ensure_container(model, main, code, &prefix)?;

        let index = counter.next_index(&container_id(
            ContainerRole::BuildingUnitContainer,
            code,
            &prefix,
        ));
        let mut unit = CityObject::with_radii(
            unit_id(code, &prefix, index),
            ObjectKind::BuildingUnit {
                code: code.to_string(),
                storeys: Vec::new(),
            },
            Vec::new(),
            record.icon,
            &config.icon_radii,
        )?;
        unit.insert_attribute(SUBDIVISION_NUMBER, AttrValue::from(record.space_id.as_str()), false)?;
        unit.add_attributes(record.object_attributes(), false)?;

        let unit = model.add_object(unit)?;
        model.add_parent_child(container, unit, false)?;
    }
    Ok(())
}
