// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs;

use cityjson_lite_geometry::{Mesh, Point3};
use cityjson_lite_processing::{
    import_scene, read_scene_slice, split_city_json, split_file, write_city_json, Error,
    ImportConfig, NamedMesh,
};

fn cube(x: f64, size: f64) -> Mesh {
    let p = |dx: f64, dy: f64, dz: f64| Point3::new(x + dx * size, dy * size, dz * size);
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

fn scene_json() -> Vec<u8> {
    let meshes = vec![
        NamedMesh {
            name: "12.0-lod_1".to_string(),
            mesh: cube(0.0, 4.0),
        },
        NamedMesh {
            name: "12.0.1-lod_2".to_string(),
            mesh: cube(0.0, 2.0),
        },
    ];
    let mut model = import_scene(meshes, &ImportConfig::default()).unwrap();
    model.to_json().unwrap().into_bytes()
}

#[test]
fn test_split_keeps_ids_and_structure() {
    let output = split_city_json(&scene_json()).unwrap();

    let mut meshes = read_scene_slice(&output.glb).unwrap();
    meshes.sort_by(|a, b| a.name.cmp(&b.name));
    let names: Vec<&str> = meshes.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Building_12-BuildingPart-12_0-lod_0",
            "Building_12-BuildingPart-12_0-lod_1",
            "Building_12-BuildingStorey-12_0_1-lod_0",
            "Building_12-BuildingStorey-12_0_1-lod_2",
        ]
    );
    assert_eq!(meshes[1].mesh.triangle_count(), 12);
    assert_eq!(meshes[0].mesh.triangle_count(), 2);

    let objects = output.attributes["CityObjects"].as_object().unwrap();
    assert_eq!(objects.len(), 3);
    assert!(objects.values().all(|o| o.get("geometry").is_none()));
    assert_eq!(
        objects["Building_12-BuildingPart-12_0"]["children"][0],
        "Building_12-BuildingStorey-12_0_1"
    );
    assert_eq!(output.attributes["vertices"].as_array().unwrap().len(), 0);
}

#[test]
fn test_split_files_refuse_to_overwrite() {
    let dir = std::env::temp_dir().join(format!("cityjson-lite-split-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);

    let input = dir.join("in").join("scene.city.json");
    let mut model = import_scene(
        vec![NamedMesh {
            name: "5-lod_1".to_string(),
            mesh: cube(10.0, 3.0),
        }],
        &ImportConfig::default(),
    )
    .unwrap();
    write_city_json(&mut model, &input, None).unwrap();

    let out = dir.join("out");
    split_file(&input, &out, false).unwrap();
    assert!(out.join("geometry.glb").exists());
    assert!(out.join("attributes.city.json").exists());

    assert!(matches!(split_file(&input, &out, false), Err(Error::AlreadyExists(_))));
    split_file(&input, &out, true).unwrap();

    fs::remove_dir_all(&dir).unwrap();
}
