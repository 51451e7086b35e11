// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CityJSON 2.0 output.
//!
//! All geometries of the model go through one [`GeometryContainer`], so the
//! written vertex list is deduplicated across objects. The translation is
//! recomputed on every write from the unique vertices.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::attributes::{self, AttrValue, Attributes};
use crate::container::{GeometryContainer, GeometryRecord};
use crate::error::Result;
use crate::keys::ObjectKey;
use crate::model::CityModel;

/// Reference system written in the metadata
pub const REFERENCE_SYSTEM: &str = "https://www.opengis.net/def/crs/EPSG/0/7415";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityJsonDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub metadata: Metadata,
    #[serde(rename = "CityObjects")]
    pub city_objects: BTreeMap<String, CityObjectRecord>,
    pub transform: Transform,
    pub vertices: Vec<[i64; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "referenceSystem")]
    pub reference_system: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub scale: [f64; 3],
    pub translate: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityObjectRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geometry: Vec<GeometryRecord>,
}

impl CityModel {
    fn sorted_ids(&self, keys: impl Iterator<Item = ObjectKey>) -> Vec<String> {
        let mut ids: Vec<String> = keys
            .filter_map(|key| self.get(key).map(|o| o.id().to_string()))
            .collect();
        ids.sort();
        ids
    }

    /// Build the document, updating the stored translation
    pub fn to_document(&mut self) -> Result<CityJsonDocument> {
        let container = GeometryContainer::new(
            self.objects
                .values()
                .flat_map(|object| object.geometries().iter()),
        )?;
        let translate = container.optimal_translate(self.scale);
        let mut records = container.geometry_records().into_iter();
        let vertices = container.quantized_vertices(self.scale, translate);
        info!(
            objects = self.objects.len(),
            geometries = container.len(),
            vertices = vertices.len(),
            "serializing city model"
        );

        let mut city_objects = BTreeMap::new();
        for (key, object) in &self.objects {
            let mut attributes = object.attributes().clone();
            if object.space_id().is_some() {
                attributes.insert(
                    attributes::PARENT_UNITS.to_string(),
                    AttrValue::from(self.sorted_ids(self.space_units(key))),
                );
            }
            if object.is_unit() {
                attributes.insert(
                    attributes::UNIT_SPACES.to_string(),
                    AttrValue::from(self.sorted_ids(self.unit_spaces(key))),
                );
            }

            let record = CityObjectRecord {
                kind: object.type_name().to_string(),
                parents: self.sorted_ids(self.parent(key).into_iter()),
                children: self.sorted_ids(self.children(key)),
                attributes,
                geometry: records.by_ref().take(object.geometries().len()).collect(),
            };
            city_objects.insert(object.id().to_string(), record);
        }

        self.translate = translate;
        Ok(CityJsonDocument {
            kind: "CityJSON".to_string(),
            version: "2.0".to_string(),
            metadata: Metadata {
                reference_system: REFERENCE_SYSTEM.to_string(),
            },
            city_objects,
            transform: Transform {
                scale: self.scale,
                translate,
            },
            vertices,
        })
    }

    pub fn to_json(&mut self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_document()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use crate::object::{CityObject, ObjectKind, SpaceKind};
    use cityjson_lite_geometry::Mesh;
    use nalgebra::Point3;

    fn block(x: f64) -> Geometry {
        let mesh = Mesh::from_parts(
            vec![
                Point3::new(x, 0.0, 0.0),
                Point3::new(x + 1.0, 0.0, 0.0),
                Point3::new(x + 1.0, 1.0, 0.0),
                Point3::new(x, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap();
        Geometry::multi_surface_from_mesh(0, &mesh)
    }

    fn sample() -> CityModel {
        let mut model = CityModel::default();
        let building = model
            .add_object(
                CityObject::new(
                    "Building_A-Building-A",
                    ObjectKind::space(SpaceKind::Building, "A"),
                    vec![block(0.0)],
                    None,
                )
                .unwrap(),
            )
            .unwrap();
        for (key, x) in [("A.1", 1.0), ("A.0", 0.0)] {
            let part = model
                .add_object(
                    CityObject::new(
                        format!("Building_A-BuildingPart-{}", key.replace('.', "_")),
                        ObjectKind::space(SpaceKind::BuildingPart, key),
                        vec![block(x)],
                        None,
                    )
                    .unwrap(),
                )
                .unwrap();
            model.add_parent_child(building, part, false).unwrap();
        }
        let unit = model
            .add_object(
                CityObject::new(
                    "Building_A-BuildingUnit-BuildingUnit_WC@0",
                    ObjectKind::BuildingUnit {
                        code: "WC".into(),
                        storeys: Vec::new(),
                    },
                    Vec::new(),
                    None,
                )
                .unwrap(),
            )
            .unwrap();
        model.add_parent_child(building, unit, false).unwrap();
        let part = model.require("Building_A-BuildingPart-A_0").unwrap();
        model.add_unit_space(unit, part).unwrap();
        model
    }

    #[test]
    fn document_layout() {
        let mut model = sample();
        let document = model.to_document().unwrap();

        assert_eq!(document.kind, "CityJSON");
        assert_eq!(document.version, "2.0");
        assert_eq!(document.metadata.reference_system, REFERENCE_SYSTEM);
        // Blocks at x = 0 and x = 1 share an edge
        assert_eq!(document.vertices.len(), 6);
        assert_eq!(document.transform.translate, model.translate());

        let building = &document.city_objects["Building_A-Building-A"];
        assert_eq!(building.kind, "Building");
        assert_eq!(
            building.children,
            vec![
                "Building_A-BuildingPart-A_0",
                "Building_A-BuildingPart-A_1",
                "Building_A-BuildingUnit-BuildingUnit_WC@0",
            ]
        );
        assert_eq!(building.geometry.len(), 1);
        assert_eq!(building.geometry[0].lod, "0");
        assert_eq!(building.attributes[attributes::PARENT_UNITS], AttrValue::List(Vec::new()));

        let part = &document.city_objects["Building_A-BuildingPart-A_0"];
        assert_eq!(part.parents, vec!["Building_A-Building-A"]);
        assert_eq!(
            part.attributes[attributes::PARENT_UNITS],
            AttrValue::from(vec!["Building_A-BuildingUnit-BuildingUnit_WC@0"])
        );

        let unit = &document.city_objects["Building_A-BuildingUnit-BuildingUnit_WC@0"];
        assert!(unit.geometry.is_empty());
        assert_eq!(
            unit.attributes[attributes::UNIT_SPACES],
            AttrValue::from(vec!["Building_A-BuildingPart-A_0"])
        );
    }

    #[test]
    fn membership_attributes_are_not_kept_on_objects() {
        let mut model = sample();
        model.to_json().unwrap();
        let part = model.object("Building_A-BuildingPart-A_0").unwrap();
        assert!(!part.attributes().contains_key(attributes::PARENT_UNITS));
    }

    #[test]
    fn json_parses_back() {
        let mut model = sample();
        let json = model.to_json().unwrap();
        let document: CityJsonDocument = serde_json::from_str(&json).unwrap();
        let expected = model.to_document().unwrap();
        assert_eq!(document.city_objects, expected.city_objects);
        assert_eq!(document.vertices, expected.vertices);
        for axis in 0..3 {
            approx::assert_relative_eq!(
                document.transform.translate[axis],
                expected.transform.translate[axis]
            );
        }

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["CityObjects"]["Building_A-BuildingUnit-BuildingUnit_WC@0"]
            .get("geometry")
            .is_none());
    }
}
