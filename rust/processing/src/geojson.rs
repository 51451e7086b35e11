// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point features from GeoJSON.
//!
//! Each feature becomes an outdoor unit whose icon is the point. Units are
//! grouped in one container per type code, all under a single outdoor
//! group.

use std::fs;
use std::path::Path;

use cityjson_lite_geometry::Point3;
use cityjson_lite_model::{
    container_id, group_id, outdoor_unit_id, AttrValue, Attributes, CityModel, CityObject,
    ContainerRole, GroupKind, ObjectKind,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::records::{KeyCounter, CODE_COLUMN};
use crate::table::read_cell;

/// Id prefix of every outdoor object
pub const OUTDOOR_PREFIX: &str = "Outdoor";

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    crs: Value,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Map<String, Value>,
    geometry: FeatureGeometry,
}

#[derive(Debug, Deserialize)]
struct FeatureGeometry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

fn point(geometry: &FeatureGeometry) -> Result<Point3<f64>> {
    if geometry.kind != "Point" {
        return Err(Error::UnexpectedGeometryType(geometry.kind.clone()));
    }
    let coords: Vec<f64> = serde_json::from_value(geometry.coordinates.clone())?;
    match coords.as_slice() {
        [x, y] => Ok(Point3::new(*x, *y, 0.0)),
        [x, y, z] => Ok(Point3::new(*x, *y, *z)),
        other => Err(Error::InvalidGeoJson(format!(
            "a point has {} coordinates",
            other.len()
        ))),
    }
}

/// Typed properties (`<Name> [<type>]`) as attributes
fn feature_attributes(properties: &Map<String, Value>) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for (key, value) in properties {
        if !key.ends_with(']') {
            continue;
        }
        let (name, value) = match value {
            Value::String(raw) => read_cell(key, raw)?,
            Value::Null => read_cell(key, "")?,
            other => {
                let (name, _) = read_cell(key, "")?;
                (name, serde_json::from_value::<AttrValue>(other.clone())?)
            }
        };
        attributes.insert(name, value);
    }
    Ok(attributes)
}

pub fn read_points(
    path: &Path,
    config: &ImportConfig,
    counter: &mut KeyCounter,
) -> Result<CityModel> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    import_points(&bytes, config, counter)
}

/// Build a model from a GeoJSON FeatureCollection of points.
///
/// Units are numbered per container through `counter`.
pub fn import_points(
    bytes: &[u8],
    config: &ImportConfig,
    counter: &mut KeyCounter,
) -> Result<CityModel> {
    let collection: FeatureCollection = serde_json::from_slice(bytes)?;
    if collection.kind != "FeatureCollection" {
        return Err(Error::InvalidGeoJson(format!(
            "expected a FeatureCollection, got '{}'",
            collection.kind
        )));
    }
    let crs = collection
        .crs
        .pointer("/properties/name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if crs != config.reference_system {
        return Err(Error::ReferenceSystem {
            found: crs.to_string(),
            expected: config.reference_system.clone(),
        });
    }

    let mut model = CityModel::new(config.scale);
    let root = model.add_object(CityObject::new(
        group_id(GroupKind::OutdoorObject, OUTDOOR_PREFIX),
        ObjectKind::Group(GroupKind::OutdoorObject),
        Vec::new(),
        None,
    )?)?;

    let mut units = 0;
    for feature in &collection.features {
        let code = match feature.properties.get(CODE_COLUMN) {
            None => return Err(Error::MissingProperty(CODE_COLUMN.to_string())),
            Some(Value::Null) => {
                debug!("skipping feature without code");
                continue;
            }
            Some(Value::String(code)) => code.trim().to_string(),
            Some(other) => {
                return Err(Error::InvalidValue {
                    column: CODE_COLUMN.to_string(),
                    value: other.to_string(),
                    ty: "str".to_string(),
                })
            }
        };

        let container = container_id(ContainerRole::OutdoorUnitContainer, &code, OUTDOOR_PREFIX);
        let index = counter.next_index(&container);
        let container = match model.key(&container) {
            Some(key) => key,
            None => {
                let key = model.add_object(CityObject::new(
                    container,
                    ObjectKind::UnitContainer {
                        role: ContainerRole::OutdoorUnitContainer,
                        code: code.clone(),
                    },
                    Vec::new(),
                    None,
                )?)?;
                model.add_parent_child(root, key, false)?;
                key
            }
        };

        let mut unit = CityObject::new(
            outdoor_unit_id(&code, OUTDOOR_PREFIX, index),
            ObjectKind::OutdoorUnit { code },
            Vec::new(),
            Some(point(&feature.geometry)?),
        )?;
        unit.add_attributes(feature_attributes(&feature.properties)?, false)?;

        let unit = model.add_object(unit)?;
        model.add_parent_child(container, unit, false)?;
        units += 1;
    }

    info!(units, containers = model.child_count(root), "read point features");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(crs: &str, features: Value) -> Vec<u8> {
        serde_json::json!({
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": crs}},
            "features": features,
        })
        .to_string()
        .into_bytes()
    }

    fn feature(code: Value, coordinates: Value) -> Value {
        serde_json::json!({
            "type": "Feature",
            "properties": {"Type Code [str]": code, "Seats [int]": "4", "Remark": "x"},
            "geometry": {"type": "Point", "coordinates": coordinates},
        })
    }

    #[test]
    fn units_per_code() {
        let bytes = collection(
            "urn:ogc:def:crs:EPSG::7415",
            serde_json::json!([
                feature("B1".into(), serde_json::json!([1.0, 2.0])),
                feature("B1".into(), serde_json::json!([3.0, 4.0, 5.0])),
                feature(Value::Null, serde_json::json!([0.0, 0.0])),
                feature("T".into(), serde_json::json!([6.0, 7.0, 8.0])),
            ]),
        );
        let model = import_points(&bytes, &ImportConfig::default(), &mut KeyCounter::new()).unwrap();
        assert_eq!(model.len(), 6);
        model.check_hierarchy(None).unwrap();

        let unit = model.object("Outdoor-GenericCityObject-OutdoorUnit_B1@0").unwrap();
        assert_eq!(unit.icon(), Some(Point3::new(1.0, 2.0, 0.0)));
        assert_eq!(unit.attributes()["Seats"], AttrValue::Int(4));
        assert_eq!(unit.attributes()["code"], AttrValue::from("B1"));
        assert!(!unit.attributes().contains_key("Remark"));

        let container = model
            .require("Outdoor-CityObjectGroup-OutdoorUnitContainer_B1")
            .unwrap();
        assert_eq!(model.child_count(container), 2);
    }

    #[test]
    fn numbering_follows_the_callers_counter() {
        let bytes = collection(
            "urn:ogc:def:crs:EPSG::7415",
            serde_json::json!([feature("B1".into(), serde_json::json!([1.0, 2.0]))]),
        );
        let mut counter = KeyCounter::new();
        counter.next_index("Outdoor-CityObjectGroup-OutdoorUnitContainer_B1");
        let model = import_points(&bytes, &ImportConfig::default(), &mut counter).unwrap();
        assert!(model.contains("Outdoor-GenericCityObject-OutdoorUnit_B1@1"));
        assert_eq!(counter.next_index("Outdoor-CityObjectGroup-OutdoorUnitContainer_B1"), 2);
    }

    #[test]
    fn wrong_reference_system() {
        let bytes = collection("EPSG:4326", serde_json::json!([]));
        assert!(matches!(
            import_points(&bytes, &ImportConfig::default(), &mut KeyCounter::new()),
            Err(Error::ReferenceSystem { .. })
        ));
    }

    #[test]
    fn missing_code_and_bad_geometry() {
        let no_code = collection(
            "urn:ogc:def:crs:EPSG::7415",
            serde_json::json!([{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}
            }]),
        );
        assert!(matches!(
            import_points(&no_code, &ImportConfig::default(), &mut KeyCounter::new()),
            Err(Error::MissingProperty(_))
        ));

        let line = collection(
            "urn:ogc:def:crs:EPSG::7415",
            serde_json::json!([{
                "type": "Feature",
                "properties": {"Type Code [str]": "B"},
                "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}
            }]),
        );
        assert!(matches!(
            import_points(&line, &ImportConfig::default(), &mut KeyCounter::new()),
            Err(Error::UnexpectedGeometryType(t)) if t == "LineString"
        ));
    }
}
