// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh merging and topology repair
//!
//! Merging is plain index-offsetting concatenation. The repair pass is lossy
//! on purpose and is only meant for merged shells: it welds coincident
//! vertices, drops degenerate and duplicate faces, makes the winding
//! consistent and outward-facing, and closes the small gaps that appear
//! along seams between adjoining surfaces.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::Mesh;

/// Grid used to decide that two vertices are the same point
const WELD_TOLERANCE: f64 = 1e-8;

/// Faces with a smaller area are degenerate
const MIN_FACE_AREA: f64 = 1e-12;

/// Largest boundary loop closed by [`fill_holes`]
const MAX_FILLED_LOOP: usize = 4;

/// Concatenate meshes, optionally repairing the result
pub fn merge_meshes(meshes: &[Mesh], fix_geometry: bool) -> Mesh {
    let mut merged = Mesh::new();
    merged.merge_all(meshes);

    if merged.is_empty() {
        return merged;
    }

    if fix_geometry {
        repair_mesh(&mut merged);
    }

    merged
}

/// Run every repair step in order
pub fn repair_mesh(mesh: &mut Mesh) {
    weld_vertices(mesh);
    remove_degenerate_faces(mesh);
    remove_duplicate_faces(mesh);
    fix_winding(mesh);
    fix_normals(mesh);
    fill_holes(mesh);
    mesh.remove_unreferenced_vertices();
}

/// Merge vertices that fall on the same weld grid cell
pub fn weld_vertices(mesh: &mut Mesh) {
    let mut cells: FxHashMap<[i64; 3], u32> = FxHashMap::default();
    let mut positions = Vec::with_capacity(mesh.positions.len());
    let remap: Vec<u32> = mesh
        .positions
        .iter()
        .map(|p| {
            let cell = [
                (p.x / WELD_TOLERANCE).round() as i64,
                (p.y / WELD_TOLERANCE).round() as i64,
                (p.z / WELD_TOLERANCE).round() as i64,
            ];
            *cells.entry(cell).or_insert_with(|| {
                positions.push(*p);
                (positions.len() - 1) as u32
            })
        })
        .collect();

    for face in &mut mesh.indices {
        for index in face.iter_mut() {
            *index = remap[*index as usize];
        }
    }
    mesh.positions = positions;
}

/// Drop faces with repeated corners or no area
pub fn remove_degenerate_faces(mesh: &mut Mesh) {
    let keep: Vec<bool> = (0..mesh.triangle_count())
        .map(|f| {
            let [a, b, c] = mesh.indices[f];
            a != b && b != c && a != c && mesh.face_normal(f).norm() / 2.0 > MIN_FACE_AREA
        })
        .collect();
    retain_faces(mesh, &keep);
}

/// Drop faces that use the same three vertices as an earlier face,
/// whatever their winding
pub fn remove_duplicate_faces(mesh: &mut Mesh) {
    let mut seen: FxHashSet<[u32; 3]> = FxHashSet::default();
    let keep: Vec<bool> = mesh
        .indices
        .iter()
        .map(|face| {
            let mut key = *face;
            key.sort_unstable();
            seen.insert(key)
        })
        .collect();
    retain_faces(mesh, &keep);
}

fn retain_faces(mesh: &mut Mesh, keep: &[bool]) {
    let mut flags = keep.iter();
    mesh.indices.retain(|_| *flags.next().unwrap_or(&false));
}

/// Undirected edge key
#[inline]
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Faces adjacent to each undirected edge
fn edge_faces(mesh: &Mesh) -> FxHashMap<(u32, u32), Vec<usize>> {
    let mut map: FxHashMap<(u32, u32), Vec<usize>> = FxHashMap::default();
    for (f, face) in mesh.indices.iter().enumerate() {
        for k in 0..3 {
            map.entry(edge_key(face[k], face[(k + 1) % 3]))
                .or_default()
                .push(f);
        }
    }
    map
}

/// Whether `face` walks the edge from `a` to `b`
#[inline]
fn has_directed_edge(face: &[u32; 3], a: u32, b: u32) -> bool {
    (0..3).any(|k| face[k] == a && face[(k + 1) % 3] == b)
}

/// Connected components of faces sharing an edge
pub fn face_components(mesh: &Mesh) -> Vec<Vec<usize>> {
    let edges = edge_faces(mesh);
    let mut component = vec![usize::MAX; mesh.triangle_count()];
    let mut components = Vec::new();

    for start in 0..mesh.triangle_count() {
        if component[start] != usize::MAX {
            continue;
        }
        let id = components.len();
        let mut members = vec![start];
        component[start] = id;
        let mut queue = VecDeque::from([start]);
        while let Some(f) = queue.pop_front() {
            let face = mesh.indices[f];
            for k in 0..3 {
                for &g in &edges[&edge_key(face[k], face[(k + 1) % 3])] {
                    if component[g] == usize::MAX {
                        component[g] = id;
                        members.push(g);
                        queue.push_back(g);
                    }
                }
            }
        }
        components.push(members);
    }

    components
}

/// Make the winding of neighbouring faces agree, one component at a time
pub fn fix_winding(mesh: &mut Mesh) {
    let edges = edge_faces(mesh);
    let mut visited = vec![false; mesh.triangle_count()];

    for start in 0..mesh.triangle_count() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(f) = queue.pop_front() {
            let face = mesh.indices[f];
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                for &g in &edges[&edge_key(a, b)] {
                    if visited[g] {
                        continue;
                    }
                    visited[g] = true;
                    // A consistent neighbour walks the shared edge backwards
                    if has_directed_edge(&mesh.indices[g], a, b) {
                        mesh.flip_face(g);
                    }
                    queue.push_back(g);
                }
            }
        }
    }
}

/// Turn closed components outward (positive enclosed volume)
pub fn fix_normals(mesh: &mut Mesh) {
    let edges = edge_faces(mesh);
    for members in face_components(mesh) {
        let closed = members.iter().all(|&f| {
            let face = mesh.indices[f];
            (0..3).all(|k| edges[&edge_key(face[k], face[(k + 1) % 3])].len() == 2)
        });
        if !closed {
            continue;
        }

        if mesh.signed_volume_of(&members) < 0.0 {
            for &f in &members {
                mesh.flip_face(f);
            }
        }
    }
}

/// Close boundary loops of up to four edges.
///
/// A loop is only filled when its component has more faces than the patch
/// would add, so a lone triangle or quad is never closed onto itself.
pub fn fill_holes(mesh: &mut Mesh) {
    let edges = edge_faces(mesh);

    // Boundary edges keep the direction of their single face
    let mut next: FxHashMap<u32, u32> = FxHashMap::default();
    let mut ambiguous: FxHashSet<u32> = FxHashSet::default();
    let mut edge_face: FxHashMap<u32, usize> = FxHashMap::default();
    for (key, faces) in &edges {
        if faces.len() != 1 {
            continue;
        }
        let face = mesh.indices[faces[0]];
        let (a, b) = if has_directed_edge(&face, key.0, key.1) {
            (key.0, key.1)
        } else {
            (key.1, key.0)
        };
        if next.insert(a, b).is_some() {
            ambiguous.insert(a);
        }
        edge_face.insert(a, faces[0]);
    }

    let mut component_of = vec![0usize; mesh.triangle_count()];
    let components = face_components(mesh);
    for (id, members) in components.iter().enumerate() {
        for &f in members {
            component_of[f] = id;
        }
    }

    let mut used: FxHashSet<u32> = FxHashSet::default();
    let mut starts: Vec<u32> = next.keys().copied().collect();
    starts.sort_unstable();

    let mut patches: Vec<[u32; 3]> = Vec::new();
    for start in starts {
        if used.contains(&start) || ambiguous.contains(&start) {
            continue;
        }
        let mut ring = vec![start];
        let mut current = start;
        let closed = loop {
            let Some(&following) = next.get(&current) else {
                break false;
            };
            if following == start {
                break true;
            }
            if ring.len() >= MAX_FILLED_LOOP || ambiguous.contains(&following) || ring.contains(&following) {
                break false;
            }
            ring.push(following);
            current = following;
        };
        used.extend(ring.iter().copied());
        if !closed || ring.len() < 3 {
            continue;
        }

        let component = component_of[edge_face[&start]];
        if components[component].len() <= ring.len() - 2 {
            continue;
        }

        // Patch faces walk the loop backwards to match their neighbours
        match ring.as_slice() {
            [a, b, c] => patches.push([*a, *c, *b]),
            [a, b, c, d] => {
                patches.push([*a, *d, *c]);
                patches.push([*a, *c, *b]);
            }
            _ => {}
        }
    }

    mesh.indices.extend(patches);
    remove_degenerate_faces(mesh);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn quad(z: f64, offset: f64) -> Mesh {
        Mesh::from_parts(
            vec![
                Point3::new(offset, 0.0, z),
                Point3::new(offset + 1.0, 0.0, z),
                Point3::new(offset + 1.0, 1.0, z),
                Point3::new(offset, 1.0, z),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    fn cube_missing_top_triangle() -> Mesh {
        let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
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
            // [4, 6, 7] missing
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

    #[test]
    fn test_merge_without_fix_is_concatenation() {
        let merged = merge_meshes(&[quad(0.0, 0.0), quad(0.0, 1.0)], false);
        assert_eq!(merged.vertex_count(), 8);
        assert_eq!(merged.triangle_count(), 4);
    }

    #[test]
    fn test_merge_empty() {
        let merged = merge_meshes(&[Mesh::new(), Mesh::new()], true);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_fix_keeps_open_surfaces() {
        let merged = merge_meshes(&[quad(0.0, 0.0), quad(0.0, 1.0)], true);
        assert_eq!(merged.triangle_count(), 4);
        // Shared edge welded
        assert_eq!(merged.vertex_count(), 6);
    }

    #[test]
    fn test_duplicate_faces_removed() {
        let mut mesh = quad(0.0, 0.0);
        mesh.indices.push([2, 1, 0]);
        repair_mesh(&mut mesh);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_degenerate_faces_removed() {
        let mut mesh = quad(0.0, 0.0);
        mesh.positions.push(Point3::new(2.0, 0.0, 0.0));
        mesh.indices.push([0, 1, 4]);
        remove_degenerate_faces(&mut mesh);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_winding_made_consistent() {
        let mut mesh = quad(0.0, 0.0);
        mesh.flip_face(1);
        fix_winding(&mut mesh);
        assert!(mesh.face_normal(0).z.signum() == mesh.face_normal(1).z.signum());
    }

    #[test]
    fn test_small_hole_is_filled_outward() {
        let mut mesh = cube_missing_top_triangle();
        repair_mesh(&mut mesh);
        assert_eq!(mesh.triangle_count(), 12);
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_cube_is_turned_outward() {
        let mut mesh = cube_missing_top_triangle();
        mesh.indices.push([4, 6, 7]);
        for f in 0..mesh.triangle_count() {
            mesh.flip_face(f);
        }
        assert!(mesh.signed_volume() < 0.0);
        repair_mesh(&mut mesh);
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-9);
    }
}
