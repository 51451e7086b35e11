// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building units and the containers grouping them by code.
//!
//! Unit codes are hierarchical by prefix: `"A1.2"` sits in `"A1"`, which
//! sits in `"A"`, which sits in the main container `""` hanging under the
//! building.

use cityjson_lite_model::{
    building_prefix, container_id, unit_id, CityModel, CityObject, ContainerRole, ObjectKey,
    ObjectKind,
};
use rustc_hash::FxHashMap;
use tracing::info;

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::records::{AttributeReader, AttributeRecord, KeyCounter, UnitRecord};

/// Code of the container holding `code`, `None` for the main container
pub fn parent_code(code: &str) -> Option<&str> {
    let chars = code.chars().count();
    let keep = match chars {
        0 => return None,
        1 => 0,
        2 => 1,
        n => n - 2,
    };
    let end = code.char_indices().nth(keep).map_or(code.len(), |(i, _)| i);
    Some(&code[..end])
}

/// The building unit container for `code` below `parent`, created when
/// missing.
///
/// An existing container with the same id under another parent is an
/// identity collision.
pub fn ensure_container(
    model: &mut CityModel,
    parent: ObjectKey,
    code: &str,
    prefix: &str,
) -> Result<ObjectKey> {
    let id = container_id(ContainerRole::BuildingUnitContainer, code, prefix);
    if let Some(key) = model.key(&id) {
        if model.parent(key) != Some(parent) {
            let parent = model.get(parent).map(|o| o.id().to_string()).unwrap_or_default();
            return Err(Error::ContainerCollision { id, parent });
        }
        return Ok(key);
    }
    let container = CityObject::new(
        id,
        ObjectKind::UnitContainer {
            role: ContainerRole::BuildingUnitContainer,
            code: code.to_string(),
        },
        Vec::new(),
        None,
    )?;
    let key = model.add_object(container)?;
    model.add_parent_child(parent, key, false)?;
    Ok(key)
}

/// Container for `code` with its whole chain up to `root`
fn ensure_container_chain(
    model: &mut CityModel,
    root: ObjectKey,
    code: &str,
    prefix: &str,
) -> Result<ObjectKey> {
    let parent = match parent_code(code) {
        Some(parent) => ensure_container_chain(model, root, parent, prefix)?,
        None => root,
    };
    ensure_container(model, parent, code, prefix)
}

/// Add one unit per record under the model's single root building and
/// link each unit to the spaces it lists.
///
/// Units are numbered per container through `counter`.
pub fn add_units(
    model: &mut CityModel,
    units: &AttributeReader<UnitRecord>,
    config: &ImportConfig,
    counter: &mut KeyCounter,
) -> Result<()> {
    let root = model.root()?;
    let root_space = model
        .get(root)
        .and_then(|o| o.space_id())
        .ok_or_else(|| Error::MissingSpace("root".to_string()))?;
    let prefix = building_prefix(root_space);

    let spaces: FxHashMap<String, ObjectKey> = model
        .spaces_by_space_id()
        .into_iter()
        .map(|(id, key)| (id.to_string(), key))
        .collect();

    for (_, record) in units.iter() {
        let container = ensure_container_chain(model, root, &record.code, &prefix)?;

        let index = counter.next_index(&container_id(
            ContainerRole::BuildingUnitContainer,
            &record.code,
            &prefix,
        ));
        let mut unit = CityObject::with_radii(
            unit_id(&record.code, &prefix, index),
            ObjectKind::BuildingUnit {
                code: record.code.clone(),
                storeys: record.storeys.clone(),
            },
            Vec::new(),
            record.icon(),
            &config.icon_radii,
        )?;
        unit.add_attributes(record.object_attributes(), false)?;

        let unit = model.add_object(unit)?;
        model.add_parent_child(container, unit, false)?;

        for space_id in &record.spaces {
            let space = spaces
                .get(space_id)
                .copied()
                .ok_or_else(|| Error::MissingSpace(space_id.clone()))?;
            model.add_unit_space(unit, space)?;
        }
    }

    info!(units = units.len(), "added building units");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityjson_lite_model::SpaceKind;

    #[test]
    fn code_chain() {
        assert_eq!(parent_code(""), None);
        assert_eq!(parent_code("A"), Some(""));
        assert_eq!(parent_code("A1"), Some("A"));
        assert_eq!(parent_code("A1.2"), Some("A1"));
        assert_eq!(parent_code("Ä1"), Some("Ä"));
    }

    fn building(model: &mut CityModel, space_id: &str) -> ObjectKey {
        let object = CityObject::new(
            format!("Building_{space_id}-Building-{space_id}"),
            ObjectKind::space(SpaceKind::Building, space_id),
            Vec::new(),
            None,
        )
        .unwrap();
        model.add_object(object).unwrap()
    }

    #[test]
    fn container_ids_are_owned_by_one_parent() {
        let mut model = CityModel::default();
        let a = building(&mut model, "A");
        let b = building(&mut model, "B");

        let container = ensure_container(&mut model, a, "", "Building_X").unwrap();
        assert_eq!(ensure_container(&mut model, a, "", "Building_X").unwrap(), container);
        assert!(matches!(
            ensure_container(&mut model, b, "", "Building_X"),
            Err(Error::ContainerCollision { parent, .. }) if parent == "Building_B-Building-B"
        ));
    }

    #[test]
    fn units_are_numbered_per_container() {
        let mut model = CityModel::default();
        let root = building(&mut model, "12");
        let table = "Type Code [str];Icon Position [list,float];glTF Name [str];CREFM IDs [list,str];Storeys [list,str]\n\
                     WC;;;12;\n\
                     K;;;;\n\
                     WC;;;12;\n";
        let mut counter = KeyCounter::new();
        let units = AttributeReader::<UnitRecord>::from_reader(table.as_bytes(), "units", &mut counter).unwrap();
        add_units(&mut model, &units, &ImportConfig::default(), &mut counter).unwrap();

        let first = model.require("Building_12-BuildingUnit-BuildingUnit_WC@0").unwrap();
        model.require("Building_12-BuildingUnit-BuildingUnit_WC@1").unwrap();
        model.require("Building_12-BuildingUnit-BuildingUnit_K@0").unwrap();
        assert_eq!(model.unit_spaces(first).collect::<Vec<_>>(), vec![root]);

        let wc = model.parent(first).unwrap();
        let w = model.parent(wc).unwrap();
        let main = model.parent(w).unwrap();
        assert_eq!(model.parent(main), Some(root));
        model.check_hierarchy(None).unwrap();
    }
}
