// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Split a CityJSON file into geometry and attributes.
//!
//! The geometry goes to a GLB scene with one node per city object, nested
//! like the objects, and one child mesh node per geometry named
//! `<id>-lod_<lod>`. The attributes stay in a CityJSON copy without
//! geometry and with an empty vertex list.

use std::fs;
use std::path::Path;

use cityjson_lite_geometry::Mesh;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::loader::CityJsonDataset;

pub const GEOMETRY_FILE: &str = "geometry.glb";
pub const ATTRIBUTES_FILE: &str = "attributes.city.json";

/// GLB magic number: "glTF"
const GLB_MAGIC: u32 = 0x46546C67;
const GLB_VERSION: u32 = 2;
const CHUNK_TYPE_JSON: u32 = 0x4E4F534A;
const CHUNK_TYPE_BIN: u32 = 0x004E4942;

/// glTF component types
const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;

/// glTF buffer view targets
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// A node of the output scene
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub name: String,
    pub mesh: Option<Mesh>,
    pub children: Vec<usize>,
}

/// Both halves of a split file
#[derive(Debug, Clone)]
pub struct SplitOutput {
    pub glb: Vec<u8>,
    pub attributes: Value,
}

/// Encode a node tree as GLB. Positions are written as f32.
pub fn build_glb(nodes: &[SceneNode], roots: &[usize]) -> Result<Vec<u8>> {
    let mut bin_data: Vec<u8> = Vec::new();
    let mut accessors = Vec::new();
    let mut buffer_views = Vec::new();
    let mut gltf_meshes = Vec::new();
    let mut gltf_nodes = Vec::new();

    for node in nodes {
        let mut gltf_node = json!({ "name": node.name });
        if !node.children.is_empty() {
            gltf_node["children"] = json!(node.children);
        }

        if let Some(mesh) = node.mesh.as_ref().filter(|m| !m.is_empty()) {
            let (min, max) = mesh.bounds();

            let pos_offset = bin_data.len();
            for p in &mesh.positions {
                for c in [p.x, p.y, p.z] {
                    bin_data.extend_from_slice(&(c as f32).to_le_bytes());
                }
            }
            let pos_length = bin_data.len() - pos_offset;

            let idx_offset = bin_data.len();
            for i in mesh.indices.iter().flatten() {
                bin_data.extend_from_slice(&i.to_le_bytes());
            }
            let idx_length = bin_data.len() - idx_offset;

            let view = buffer_views.len();
            buffer_views.push(json!({
                "buffer": 0,
                "byteOffset": pos_offset,
                "byteLength": pos_length,
                "target": ARRAY_BUFFER
            }));
            buffer_views.push(json!({
                "buffer": 0,
                "byteOffset": idx_offset,
                "byteLength": idx_length,
                "target": ELEMENT_ARRAY_BUFFER
            }));

            let accessor = accessors.len();
            accessors.push(json!({
                "bufferView": view,
                "componentType": FLOAT,
                "count": mesh.vertex_count(),
                "type": "VEC3",
                "min": [min.x as f32, min.y as f32, min.z as f32],
                "max": [max.x as f32, max.y as f32, max.z as f32]
            }));
            accessors.push(json!({
                "bufferView": view + 1,
                "componentType": UNSIGNED_INT,
                "count": mesh.triangle_count() * 3,
                "type": "SCALAR"
            }));

            gltf_node["mesh"] = json!(gltf_meshes.len());
            gltf_meshes.push(json!({
                "name": node.name,
                "primitives": [{
                    "attributes": { "POSITION": accessor },
                    "indices": accessor + 1
                }]
            }));
        }

        gltf_nodes.push(gltf_node);
    }

    let mut document = json!({
        "asset": { "version": "2.0", "generator": "cityjson-lite" },
        "scene": 0,
        "scenes": [{ "nodes": roots }],
        "nodes": gltf_nodes,
    });
    if !gltf_meshes.is_empty() {
        document["meshes"] = json!(gltf_meshes);
        document["accessors"] = json!(accessors);
        document["bufferViews"] = json!(buffer_views);
        document["buffers"] = json!([{ "byteLength": bin_data.len() }]);
    }

    let mut json_bytes = serde_json::to_vec(&document)?;
    // JSON pads with spaces, BIN with zeros
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    while bin_data.len() % 4 != 0 {
        bin_data.push(0);
    }

    let json_chunk_length = json_bytes.len() as u32;
    let bin_chunk_length = bin_data.len() as u32;
    let mut total_length = 12 + 8 + json_chunk_length;
    if !bin_data.is_empty() {
        total_length += 8 + bin_chunk_length;
    }

    let mut glb = Vec::with_capacity(total_length as usize);
    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&total_length.to_le_bytes());

    glb.extend_from_slice(&json_chunk_length.to_le_bytes());
    glb.extend_from_slice(&CHUNK_TYPE_JSON.to_le_bytes());
    glb.extend_from_slice(&json_bytes);

    if !bin_data.is_empty() {
        glb.extend_from_slice(&bin_chunk_length.to_le_bytes());
        glb.extend_from_slice(&CHUNK_TYPE_BIN.to_le_bytes());
        glb.extend_from_slice(&bin_data);
    }

    Ok(glb)
}

/// Split a CityJSON document held in memory
pub fn split_city_json(bytes: &[u8]) -> Result<SplitOutput> {
    let dataset = CityJsonDataset::from_slice(bytes)?;

    let mut nodes: Vec<SceneNode> = Vec::new();
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    for (id, _) in dataset.objects() {
        index.insert(id, nodes.len());
        nodes.push(SceneNode {
            name: id.to_string(),
            ..SceneNode::default()
        });
    }

    let mut has_parent = vec![false; nodes.len()];
    for (id, object) in dataset.objects() {
        let node = index[id];
        for child in &object.children {
            let &child = index
                .get(child.as_str())
                .ok_or_else(|| Error::MissingObject(child.clone()))?;
            has_parent[child] = true;
            nodes[node].children.push(child);
        }

        for (lod, mesh) in dataset.object_meshes(id)?.unwrap_or_default() {
            let mesh_node = nodes.len();
            nodes.push(SceneNode {
                name: format!("{id}-lod_{lod}"),
                mesh: Some(mesh),
                children: Vec::new(),
            });
            has_parent.push(true);
            nodes[node].children.push(mesh_node);
        }
    }

    let roots: Vec<usize> = (0..nodes.len()).filter(|&n| !has_parent[n]).collect();
    let glb = build_glb(&nodes, &roots)?;

    let mut attributes: Value = serde_json::from_slice(bytes)?;
    if let Some(objects) = attributes
        .get_mut("CityObjects")
        .and_then(Value::as_object_mut)
    {
        for object in objects.values_mut().filter_map(Value::as_object_mut) {
            object.remove("geometry");
        }
    }
    attributes["vertices"] = json!([]);

    info!(objects = index.len(), nodes = nodes.len(), "split city model");
    Ok(SplitOutput { glb, attributes })
}

/// Split `input` into `output_dir`/geometry.glb and
/// `output_dir`/attributes.city.json
pub fn split_file(input: &Path, output_dir: &Path, overwrite: bool) -> Result<()> {
    let glb_path = output_dir.join(GEOMETRY_FILE);
    let attributes_path = output_dir.join(ATTRIBUTES_FILE);
    if !overwrite {
        for path in [&glb_path, &attributes_path] {
            if path.exists() {
                return Err(Error::AlreadyExists(path.clone()));
            }
        }
    }

    let bytes = fs::read(input).map_err(|e| Error::io(input, e))?;
    let output = split_city_json(&bytes)?;

    fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;
    fs::write(&glb_path, &output.glb).map_err(|e| Error::io(&glb_path, e))?;
    let attributes = serde_json::to_vec(&output.attributes)?;
    fs::write(&attributes_path, attributes).map_err(|e| Error::io(&attributes_path, e))?;
    Ok(())
}
