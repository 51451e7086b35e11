// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scene-hierarchy import.
//!
//! Meshes are named `<dot.path>-lod_<n>`. The dotted path gives the space
//! hierarchy (building, part, storey, room); every prefix of a path is a
//! space too, with or without geometry of its own.

use std::collections::BTreeMap;

use cityjson_lite_geometry::{flatten, orient_faces_z_up, Mesh};
use cityjson_lite_model::{space_key_to_id, CityModel, CityObject, Geometry, ObjectKind, SpaceKind};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::gltf_reader::NamedMesh;
use crate::records::{AttributeReader, AttributeRecord};

const LOD_SEPARATOR: &str = "-lod_";

/// Split `<path>-lod_<n>` into the path and the LoD
pub fn parse_mesh_name(name: &str) -> Result<(&str, u32)> {
    let (path, lod) = name
        .rsplit_once(LOD_SEPARATOR)
        .ok_or_else(|| Error::InvalidMeshName(name.to_string()))?;
    let lod = lod
        .parse()
        .map_err(|_| Error::InvalidMeshName(name.to_string()))?;
    if path.is_empty() {
        return Err(Error::InvalidMeshName(name.to_string()));
    }
    Ok((path, lod))
}

/// Parent path of a dotted path
fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('.').map(|(parent, _)| parent)
}

/// Build the space hierarchy of a scene.
///
/// Spaces without a LoD 0 mesh get one by flattening their finest mesh,
/// the one with the highest LoD, never the coarsest.
pub fn import_scene(meshes: Vec<NamedMesh>, config: &ImportConfig) -> Result<CityModel> {
    let mut spaces: BTreeMap<String, BTreeMap<u32, Mesh>> = BTreeMap::new();
    for NamedMesh { name, mut mesh } in meshes {
        let (path, lod) = parse_mesh_name(&name)?;
        if mesh.is_empty() {
            debug!(mesh = %name, "skipping empty mesh");
            spaces.entry(path.to_string()).or_default();
            continue;
        }
        if lod == 0 {
            orient_faces_z_up(&mut mesh)?;
        }
        spaces.entry(path.to_string()).or_default().insert(lod, mesh);
    }

    let paths: Vec<String> = spaces.keys().cloned().collect();
    for path in &paths {
        let mut current = path.as_str();
        while let Some(parent) = parent_path(current) {
            spaces.entry(parent.to_string()).or_default();
            current = parent;
        }
    }
    info!(spaces = spaces.len(), "building scene hierarchy");

    let objects = spaces
        .into_par_iter()
        .map(|(path, mut lods)| -> Result<CityObject> {
            let depth = path.matches('.').count();
            let kind =
                SpaceKind::from_depth(depth).ok_or_else(|| Error::HierarchyTooDeep(path.clone()))?;

            if !lods.is_empty() && !lods.contains_key(&0) {
                if let Some((_, finest)) = lods.iter().next_back() {
                    let footprint = flatten(finest, None)?;
                    lods.insert(0, footprint);
                }
            }

            let geometries = lods
                .iter()
                .map(|(&lod, mesh)| Geometry::multi_surface_from_mesh(lod, mesh))
                .collect();
            Ok(CityObject::with_radii(
                space_key_to_id(kind, &path),
                ObjectKind::space(kind, path.as_str()),
                geometries,
                None,
                &config.icon_radii,
            )?)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut model = CityModel::new(config.scale);
    for object in objects {
        model.add_object(object)?;
    }

    let links: Vec<(String, String)> = model
        .iter()
        .filter_map(|(_, object)| {
            let parent = parent_path(object.space_id()?)?;
            let kind = SpaceKind::from_depth(parent.matches('.').count())?;
            Some((space_key_to_id(kind, parent), object.id().to_string()))
        })
        .collect();
    for (parent, child) in links {
        let parent = model.require(&parent)?;
        let child = model.require(&child)?;
        model.add_parent_child(parent, child, false)?;
    }

    Ok(model)
}

/// Merge the records of a table into the spaces of one kind, matched by
/// space id.
///
/// Row attributes never overwrite. An explicit icon replaces the computed
/// one only with `overwrite_icon`. Returns how many spaces were matched.
pub fn apply_space_attributes<R: AttributeRecord>(
    model: &mut CityModel,
    kind: SpaceKind,
    records: &AttributeReader<R>,
    overwrite_icon: bool,
) -> Result<usize> {
    let targets = model.keys_where(|k| matches!(k, ObjectKind::Space { kind: space, .. } if *space == kind));

    let mut matched = 0;
    for key in targets {
        let Some(object) = model.get_mut(key) else {
            continue;
        };
        let Some(record) = object.space_id().and_then(|id| records.get(id)) else {
            continue;
        };
        object.add_attributes(record.object_attributes(), false)?;
        if let Some(icon) = record.icon() {
            object.set_icon(icon, overwrite_icon)?;
        }
        matched += 1;
    }

    debug!(kind = kind.type_name(), matched, "applied attributes");
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{BuildingRecord, KeyCounter, StoreyRecord};
    use cityjson_lite_geometry::Point3;
    use cityjson_lite_model::AttrValue;

    fn cube(x: f64, z: f64) -> Mesh {
        let p = |dx: f64, dy: f64, dz: f64| Point3::new(x + dx, dy, z + dz);
        let positions = vec![
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(0.0, 0.0, 1.0),
            p(1.0, 0.0, 1.0),
            p(1.0, 1.0, 1.0),
            p(0.0, 1.0, 1.0),
        ];
        let indices = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        Mesh::from_parts(positions, indices).unwrap()
    }

    fn named(name: &str, mesh: Mesh) -> NamedMesh {
        NamedMesh {
            name: name.to_string(),
            mesh,
        }
    }

    #[test]
    fn mesh_names() {
        assert_eq!(parse_mesh_name("2200.0.01-lod_2").unwrap(), ("2200.0.01", 2));
        assert_eq!(parse_mesh_name("a-b-lod_1").unwrap(), ("a-b", 1));
        assert!(parse_mesh_name("2200.0.01").is_err());
        assert!(parse_mesh_name("2200-lod_x").is_err());
        assert!(parse_mesh_name("-lod_1").is_err());
    }

    #[test]
    fn hierarchy_is_completed() {
        let model = import_scene(
            vec![
                named("2200.0.0.01-lod_2", cube(0.0, 0.0)),
                named("2200.0.0.02-lod_2", cube(2.0, 0.0)),
            ],
            &ImportConfig::default(),
        )
        .unwrap();
        assert_eq!(model.len(), 5);
        model.check_hierarchy(None).unwrap();

        let room = model.object("Building_2200-BuildingRoom-2200_0_0_01").unwrap();
        let lods: Vec<u32> = room.geometries().iter().map(|g| g.lod).collect();
        assert_eq!(lods, vec![0, 2]);
        assert_eq!(room.space_kind(), Some(SpaceKind::BuildingRoom));

        let storey = model.require("Building_2200-BuildingStorey-2200_0_0").unwrap();
        assert_eq!(model.child_count(storey), 2);
        assert!(model.get(storey).unwrap().geometries().is_empty());

        let root = model.root().unwrap();
        assert_eq!(model.get(root).unwrap().id(), "Building_2200-Building-2200");
    }

    #[test]
    fn footprint_comes_from_the_finest_lod() {
        let model = import_scene(
            vec![named("7-lod_1", cube(0.0, 0.0)), named("7-lod_2", cube(5.0, 0.0))],
            &ImportConfig::default(),
        )
        .unwrap();
        let building = model.object("Building_7-Building-7").unwrap();
        let footprint = building.geometries().iter().find(|g| g.lod == 0).unwrap();
        let mesh = footprint.to_mesh().unwrap();
        assert!(!mesh.is_empty());
        assert!(mesh.positions.iter().all(|p| p.x >= 5.0 - 1e-9));
    }

    #[test]
    fn too_deep() {
        let result = import_scene(vec![named("1.2.3.4.5-lod_1", cube(0.0, 0.0))], &ImportConfig::default());
        assert!(matches!(result, Err(Error::HierarchyTooDeep(p)) if p == "1.2.3.4.5"));
    }

    #[test]
    fn attributes_by_space_id() {
        let mut model = import_scene(
            vec![named("7.0.1-lod_1", cube(0.0, 0.0))],
            &ImportConfig::default(),
        )
        .unwrap();

        let storeys = "CREFM ID [str];Level [float];Storey CREFM ID [str];Use [str]\n7.0.1;1,5;S1;office\n9.9.9;;;\n";
        let storeys = AttributeReader::<StoreyRecord>::from_reader(storeys.as_bytes(), "storeys", &mut KeyCounter::new())
            .unwrap();
        assert_eq!(apply_space_attributes(&mut model, SpaceKind::BuildingStorey, &storeys, true).unwrap(), 1);
        let storey = model.object("Building_7-BuildingStorey-7_0_1").unwrap();
        assert_eq!(storey.attributes()["Use"], AttrValue::from("office"));
        assert_eq!(storey.attributes()["storey_level"], AttrValue::Float(1.5));

        let buildings = "Key [str];CREFM ID [str];3D BAG Buildings IDs [list,str];Skip [bool];Icon Position [list,float]\n7;7.X;;;1,2,3\n";
        let buildings = AttributeReader::<BuildingRecord>::from_reader(buildings.as_bytes(), "buildings", &mut KeyCounter::new())
            .unwrap();
        apply_space_attributes(&mut model, SpaceKind::Building, &buildings, false).unwrap();
        let building = model.object("Building_7-Building-7").unwrap();
        assert_eq!(building.icon(), Some(Point3::new(1.0, 2.0, 3.0)));

        // The icon is now set: replacing it needs the flag
        assert!(apply_space_attributes(&mut model, SpaceKind::Building, &buildings, false).is_err());
        apply_space_attributes(&mut model, SpaceKind::Building, &buildings, true).unwrap();
    }
}
