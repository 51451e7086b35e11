// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading quantized CityJSON input into meshes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use cityjson_lite_geometry::{merge_meshes, triangulate_surface, Mesh, Point3};
use cityjson_lite_model::Transform;
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// A city object as found in an input file
#[derive(Debug, Clone, Deserialize)]
pub struct InputObject {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub geometry: Vec<InputGeometry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// Either a string such as `"1.3"` or a plain number
    pub lod: Value,
    pub boundaries: Value,
}

impl InputGeometry {
    /// LoD as a string key; numbers keep their JSON spelling
    pub fn lod_key(&self) -> Result<String> {
        match &self.lod {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(Error::InvalidCityJson(format!("lod must be a string or a number, got {other}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct InputDocument {
    #[serde(rename = "CityObjects")]
    city_objects: BTreeMap<String, InputObject>,
    transform: Transform,
    vertices: Vec<[i64; 3]>,
}

/// A CityJSON file with its vertices in real coordinates
#[derive(Debug, Clone)]
pub struct CityJsonDataset {
    objects: BTreeMap<String, InputObject>,
    vertices: Vec<Point3<f64>>,
}

impl CityJsonDataset {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let document: InputDocument = serde_json::from_slice(bytes)?;
        let Transform { scale, translate } = document.transform;
        let vertices = document
            .vertices
            .iter()
            .map(|v| {
                Point3::new(
                    v[0] as f64 * scale[0] + translate[0],
                    v[1] as f64 * scale[1] + translate[1],
                    v[2] as f64 * scale[2] + translate[2],
                )
            })
            .collect();
        Ok(Self {
            objects: document.city_objects,
            vertices,
        })
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn object(&self, id: &str) -> Option<&InputObject> {
        self.objects.get(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (&str, &InputObject)> {
        self.objects.iter().map(|(id, object)| (id.as_str(), object))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// One mesh per LoD of an object, `None` if it has no geometry
    pub fn object_meshes(&self, id: &str) -> Result<Option<BTreeMap<String, Mesh>>> {
        let object = self
            .object(id)
            .ok_or_else(|| Error::MissingObject(id.to_string()))?;
        if object.geometry.is_empty() {
            return Ok(None);
        }

        let mut meshes = BTreeMap::new();
        for geometry in &object.geometry {
            let mesh = match geometry.kind.as_str() {
                "MultiSurface" => {
                    let surfaces: Vec<Vec<Vec<u32>>> =
                        serde_json::from_value(geometry.boundaries.clone())?;
                    self.multi_surface_mesh(&surfaces)?
                }
                "Solid" => {
                    let shells: Vec<Vec<Vec<Vec<u32>>>> =
                        serde_json::from_value(geometry.boundaries.clone())?;
                    let shells = shells
                        .iter()
                        .map(|shell| self.multi_surface_mesh(shell))
                        .collect::<Result<Vec<_>>>()?;
                    merge_meshes(&shells, true)
                }
                other => return Err(Error::UnexpectedGeometryType(other.to_string())),
            };
            meshes.insert(geometry.lod_key()?, mesh);
        }
        Ok(Some(meshes))
    }

    fn multi_surface_mesh(&self, surfaces: &[Vec<Vec<u32>>]) -> Result<Mesh> {
        let meshes = surfaces
            .par_iter()
            .map(|rings| self.surface_mesh(rings))
            .collect::<Result<Vec<_>>>()?;
        let meshes: Vec<Mesh> = meshes.into_iter().flatten().collect();
        Ok(merge_meshes(&meshes, true))
    }

    fn surface_mesh(&self, rings: &[Vec<u32>]) -> Result<Option<Mesh>> {
        let Some((outer, holes)) = rings.split_first() else {
            return Ok(None);
        };
        match triangulate_surface(&self.vertices, outer, holes)? {
            Ok(mesh) => Ok(Some(mesh)),
            Err(defect) => {
                debug!(%defect, rings = rings.len(), "dropping surface");
                Ok(None)
            }
        }
    }
}
