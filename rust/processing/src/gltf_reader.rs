// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! glTF/GLB scene input.
//!
//! Every node carrying a mesh yields one [`NamedMesh`] in world
//! coordinates. Scenes are authored Y-up, so positions are rotated to Z-up
//! after the node transforms are applied, then the mesh is repaired.

use std::path::Path;

use cityjson_lite_geometry::{repair_mesh, Matrix4, Mesh, Point3};
use gltf::mesh::Mode;
use tracing::debug;

use crate::error::{Error, Result};

/// A mesh and the name of the node holding it
#[derive(Debug, Clone)]
pub struct NamedMesh {
    pub name: String,
    pub mesh: Mesh,
}

/// `(x, y, z) -> (-z, -x, y)`
fn axis_swap() -> Matrix4<f64> {
    Matrix4::new(
        0.0, 0.0, -1.0, 0.0, //
        -1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

pub fn read_scene(path: &Path) -> Result<Vec<NamedMesh>> {
    let (document, buffers, _images) = gltf::import(path)?;
    collect_meshes(&document, &buffers)
}

pub fn read_scene_slice(bytes: &[u8]) -> Result<Vec<NamedMesh>> {
    let (document, buffers, _images) = gltf::import_slice(bytes)?;
    collect_meshes(&document, &buffers)
}

fn collect_meshes(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Result<Vec<NamedMesh>> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(Error::EmptyScene)?;

    let mut meshes = Vec::new();
    for node in scene.nodes() {
        visit(&node, &axis_swap(), buffers, &mut meshes)?;
    }
    debug!(meshes = meshes.len(), "read glTF scene");
    Ok(meshes)
}

fn visit(
    node: &gltf::Node,
    parent: &Matrix4<f64>,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<NamedMesh>,
) -> Result<()> {
    let local = node.transform().matrix();
    let world = parent * Matrix4::from_fn(|r, c| f64::from(local[c][r]));

    if let Some(gltf_mesh) = node.mesh() {
        let name = node
            .name()
            .or_else(|| gltf_mesh.name())
            .ok_or_else(|| Error::UnnamedMesh(format!("node {}", node.index())))?
            .to_string();

        let mut mesh = Mesh::new();
        for primitive in gltf_mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                debug!(node = %name, mode = ?primitive.mode(), "skipping primitive");
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Point3<f64>> = positions
                .map(|p| Point3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2])))
                .collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let triangles = indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
            mesh.merge(&Mesh::from_parts(positions, triangles)?);
        }

        mesh.transform(&world);
        repair_mesh(&mut mesh);
        out.push(NamedMesh { name, mesh });
    }

    for child in node.children() {
        visit(&child, &world, buffers, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_swap_is_a_rotation() {
        let m = axis_swap();
        let p = m.transform_point(&Point3::new(1.0, 2.0, 3.0));
        assert_eq!(p, Point3::new(-3.0, -1.0, 2.0));
        assert!((m.fixed_view::<3, 3>(0, 0).clone_owned().determinant() - 1.0).abs() < 1e-12);
    }
}
