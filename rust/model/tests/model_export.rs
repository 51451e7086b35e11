// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cityjson_lite_geometry::{Mesh, Point3};
use cityjson_lite_model::{
    container_id, space_key_to_id, unit_id, CityModel, CityObject, ContainerRole, Error, Geometry,
    ObjectKind, SpaceKind,
};

fn slab(x0: f64, y0: f64, z: f64) -> Geometry {
    let mesh = Mesh::from_parts(
        vec![
            Point3::new(x0, y0, z),
            Point3::new(x0 + 5.0, y0, z),
            Point3::new(x0 + 5.0, y0 + 5.0, z),
            Point3::new(x0, y0 + 5.0, z),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
    .unwrap();
    Geometry::multi_surface_from_mesh(0, &mesh)
}

/// Building with one storey, one room and a unit covering the room
fn building(model: &mut CityModel, key: &str, x0: f64) {
    let paths = [
        key.to_string(),
        format!("{key}.0"),
        format!("{key}.0.1"),
        format!("{key}.0.1.3"),
    ];
    let mut previous = None;
    for (depth, path) in paths.iter().enumerate() {
        let kind = SpaceKind::from_depth(depth).unwrap();
        let object = CityObject::new(
            space_key_to_id(kind, path),
            ObjectKind::space(kind, path.as_str()),
            vec![slab(x0, 446_000.0, depth as f64 * 3.0)],
            None,
        )
        .unwrap();
        let handle = model.add_object(object).unwrap();
        if let Some(parent) = previous {
            model.add_parent_child(parent, handle, false).unwrap();
        }
        previous = Some(handle);
    }

    let prefix = format!("Building_{key}");
    let root = model.require(&space_key_to_id(SpaceKind::Building, key)).unwrap();
    let container = model
        .add_object(
            CityObject::new(
                container_id(ContainerRole::BuildingUnitContainer, "", &prefix),
                ObjectKind::UnitContainer {
                    role: ContainerRole::BuildingUnitContainer,
                    code: String::new(),
                },
                Vec::new(),
                None,
            )
            .unwrap(),
        )
        .unwrap();
    model.add_parent_child(root, container, false).unwrap();

    let unit = model
        .add_object(
            CityObject::new(
                unit_id("WC", &prefix, 0),
                ObjectKind::BuildingUnit {
                    code: "WC".into(),
                    storeys: vec![format!("{key}.0.1")],
                },
                Vec::new(),
                None,
            )
            .unwrap(),
        )
        .unwrap();
    model.add_parent_child(container, unit, false).unwrap();
    let room = model
        .require(&space_key_to_id(SpaceKind::BuildingRoom, &format!("{key}.0.1.3")))
        .unwrap();
    model.add_unit_space(unit, room).unwrap();
}

#[test]
fn test_two_buildings_check_and_export() {
    let mut model = CityModel::default();
    building(&mut model, "A", 85_000.0);
    building(&mut model, "B", 85_005.0);

    assert_eq!(model.len(), 12);
    model.check_hierarchy(None).unwrap();
    assert!(matches!(
        model.check_hierarchy(Some(3)),
        Err(Error::ComponentCount { found: 2, expected: 3 })
    ));

    let json = model.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    // Slabs of A and B touch along x = 85005 at every level
    let vertices = value["vertices"].as_array().unwrap();
    assert_eq!(vertices.len(), 4 * 6);

    let scale = model.scale();
    let translate = model.translate();
    for v in vertices {
        let x = v[0].as_i64().unwrap() as f64 * scale[0] + translate[0];
        let y = v[1].as_i64().unwrap() as f64 * scale[1] + translate[1];
        assert!((85_000.0 - 1e-5..=85_010.0 + 1e-5).contains(&x));
        assert!((446_000.0 - 1e-5..=446_005.0 + 1e-5).contains(&y));
    }

    let room = &value["CityObjects"]["Building_A-BuildingRoom-A_0_1_3"];
    assert_eq!(room["type"], "BuildingRoom");
    assert_eq!(room["parents"][0], "Building_A-BuildingStorey-A_0_1");
    assert_eq!(
        room["attributes"]["parent_units"][0],
        "Building_A-BuildingUnit-BuildingUnit_WC@0"
    );
    assert_eq!(room["attributes"]["space_id"], "A.0.1.3");
    assert_eq!(room["geometry"][0]["type"], "MultiSurface");

    let container = &value["CityObjects"]["Building_A-CityObjectGroup-BuildingUnitContainer_"];
    assert_eq!(container["type"], "CityObjectGroup");
    assert_eq!(container["attributes"]["code"], "");
}
