// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! City objects: the typed nodes of the model hierarchy.
//!
//! Every object shares one record (id, attributes, geometries, icon) and a
//! closed [`ObjectKind`] carrying the data specific to its type. Hierarchy
//! edges are not stored here but in the owning [`CityModel`](crate::CityModel).

use cityjson_lite_geometry::{icon_anchor, DEFAULT_SEARCH_RADII};
use nalgebra::Point3;

use crate::attributes::{self, AttrValue, Attributes};
use crate::error::{Error, Result};
use crate::geometry::Geometry;

/// Kinds of spaces, the objects identified by a source `space_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceKind {
    Building,
    BuildingPart,
    BuildingStorey,
    BuildingRoom,
}

impl SpaceKind {
    /// Space kind at a given depth of a dotted key (`A` = 0, `A.1` = 1, ...)
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            0 => Some(SpaceKind::Building),
            1 => Some(SpaceKind::BuildingPart),
            2 => Some(SpaceKind::BuildingStorey),
            3 => Some(SpaceKind::BuildingRoom),
            _ => None,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            SpaceKind::Building => "Building",
            SpaceKind::BuildingPart => "BuildingPart",
            SpaceKind::BuildingStorey => "BuildingStorey",
            SpaceKind::BuildingRoom => "BuildingRoom",
        }
    }
}

/// Grouping roots: objects without geometry that hold a sub-hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    BuildingUnitObject,
    OutdoorObject,
    BuildingRoot,
}

impl GroupKind {
    pub fn name(self) -> &'static str {
        match self {
            GroupKind::BuildingUnitObject => "BuildingUnitObject",
            GroupKind::OutdoorObject => "OutdoorObject",
            GroupKind::BuildingRoot => "BuildingRoot",
        }
    }
}

/// What a unit container groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerRole {
    BuildingUnitContainer,
    OutdoorUnitContainer,
}

impl ContainerRole {
    pub fn name(self) -> &'static str {
        match self {
            ContainerRole::BuildingUnitContainer => "BuildingUnitContainer",
            ContainerRole::OutdoorUnitContainer => "OutdoorUnitContainer",
        }
    }
}

/// The closed set of object kinds with their specific data
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Space { kind: SpaceKind, space_id: String },
    BuildingUnit { code: String, storeys: Vec<String> },
    UnitContainer { role: ContainerRole, code: String },
    Group(GroupKind),
    OutdoorUnit { code: String },
}

impl ObjectKind {
    pub fn space(kind: SpaceKind, space_id: impl Into<String>) -> Self {
        ObjectKind::Space {
            kind,
            space_id: space_id.into(),
        }
    }

    /// CityJSON type written for this kind
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Space { kind, .. } => kind.type_name(),
            ObjectKind::BuildingUnit { .. } => "BuildingUnit",
            ObjectKind::UnitContainer { .. } | ObjectKind::Group(_) => "CityObjectGroup",
            ObjectKind::OutdoorUnit { .. } => "GenericCityObject",
        }
    }

    /// Height added above the mesh when placing the icon
    pub fn icon_z_offset(&self) -> f64 {
        match self {
            ObjectKind::Space { kind, .. } => match kind {
                SpaceKind::Building => 2.0,
                SpaceKind::BuildingPart => 1.0,
                SpaceKind::BuildingStorey | SpaceKind::BuildingRoom => 0.5,
            },
            ObjectKind::BuildingUnit { .. } => 0.5,
            _ => 2.0,
        }
    }
}

/// A node of the city model
#[derive(Debug, Clone)]
pub struct CityObject {
    id: String,
    kind: ObjectKind,
    attributes: Attributes,
    geometries: Vec<Geometry>,
    icon: Option<Point3<f64>>,
}

impl CityObject {
    /// Create an object, searching for the icon with the default radii
    pub fn new(
        id: impl Into<String>,
        kind: ObjectKind,
        geometries: Vec<Geometry>,
        icon: Option<Point3<f64>>,
    ) -> Result<Self> {
        Self::with_radii(id, kind, geometries, icon, &DEFAULT_SEARCH_RADII)
    }

    /// Create an object.
    ///
    /// Without an explicit icon and with geometry, the icon sits on the
    /// geometry with the highest LoD.
    pub fn with_radii(
        id: impl Into<String>,
        kind: ObjectKind,
        geometries: Vec<Geometry>,
        icon: Option<Point3<f64>>,
        radii: &[f64],
    ) -> Result<Self> {
        for geometry in &geometries {
            geometry.validate()?;
        }

        let mut object = Self {
            id: id.into(),
            kind,
            attributes: Attributes::new(),
            geometries,
            icon: None,
        };
        object.insert_attribute(attributes::KEY, object.id.clone().into(), false)?;

        let icon = match icon {
            Some(icon) => Some(icon),
            None => object.computed_icon(radii)?,
        };
        if let Some(icon) = icon {
            object.set_icon(icon, false)?;
        }

        match object.kind.clone() {
            ObjectKind::Space { space_id, .. } => {
                object.insert_attribute(attributes::SPACE_ID, space_id.into(), false)?;
            }
            ObjectKind::BuildingUnit { code, storeys } => {
                object.insert_attribute(attributes::CODE, code.into(), false)?;
                object.insert_attribute(attributes::UNIT_STOREYS, storeys.into(), false)?;
            }
            ObjectKind::UnitContainer { code, .. } | ObjectKind::OutdoorUnit { code } => {
                object.insert_attribute(attributes::CODE, code.into(), false)?;
            }
            ObjectKind::Group(_) => {}
        }

        Ok(object)
    }

    fn computed_icon(&self, radii: &[f64]) -> Result<Option<Point3<f64>>> {
        // First geometry among those with the highest LoD
        let Some(best) = self
            .geometries
            .iter()
            .reduce(|best, g| if g.lod > best.lod { g } else { best })
        else {
            return Ok(None);
        };
        let mesh = best.to_mesh()?;
        Ok(Some(icon_anchor(&mesh, radii, self.kind.icon_z_offset())?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    pub fn icon(&self) -> Option<Point3<f64>> {
        self.icon
    }

    pub fn space_id(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Space { space_id, .. } => Some(space_id),
            _ => None,
        }
    }

    pub fn space_kind(&self) -> Option<SpaceKind> {
        match &self.kind {
            ObjectKind::Space { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::BuildingUnit { code, .. }
            | ObjectKind::UnitContainer { code, .. }
            | ObjectKind::OutdoorUnit { code } => Some(code),
            _ => None,
        }
    }

    pub fn is_building(&self) -> bool {
        self.space_kind() == Some(SpaceKind::Building)
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.kind, ObjectKind::BuildingUnit { .. })
    }

    /// Merge attributes into the bag.
    ///
    /// Without `overwrite`, an existing key is an error and nothing from
    /// the offending key onward is written.
    pub fn add_attributes(&mut self, attributes: Attributes, overwrite: bool) -> Result<()> {
        for (key, value) in attributes {
            self.insert_attribute(&key, value, overwrite)?;
        }
        Ok(())
    }

    pub fn insert_attribute(&mut self, key: &str, value: AttrValue, overwrite: bool) -> Result<()> {
        if !overwrite && self.attributes.contains_key(key) {
            return Err(Error::AttributeExists {
                object: self.id.clone(),
                key: key.to_string(),
            });
        }
        self.attributes.insert(key.to_string(), value);
        Ok(())
    }

    /// Replace the icon and its `icon_position` attribute
    pub fn set_icon(&mut self, icon: Point3<f64>, overwrite: bool) -> Result<()> {
        self.insert_attribute(
            attributes::ICON_POSITION,
            vec![icon.x, icon.y, icon.z].into(),
            overwrite,
        )?;
        self.icon = Some(icon);
        Ok(())
    }
}

/// Icon position from a list of coordinates; an empty list means none
pub fn icon_from_coords(coords: &[f64]) -> Result<Option<Point3<f64>>> {
    match coords {
        [] => Ok(None),
        [x, y, z] => Ok(Some(Point3::new(*x, *y, *z))),
        other => Err(Error::InvalidIconPosition(other.len())),
    }
}

fn sanitize(value: &str) -> String {
    value.replace(['.', '-'], "_")
}

/// Id prefix shared by every object of a building: `Building_<first segment>`
pub fn key_to_prefix(key: &str) -> String {
    let first = key.split('.').next().unwrap_or_default();
    format!("Building_{first}")
}

/// Id prefix of the units and containers of one building: `Building_`
/// followed by its whole key, so buildings sharing a first segment stay
/// apart
pub fn building_prefix(key: &str) -> String {
    format!("Building_{}", sanitize(key))
}

/// Id of a space from its dotted key
pub fn space_key_to_id(kind: SpaceKind, key: &str) -> String {
    format!("{}-{}-{}", key_to_prefix(key), kind.type_name(), sanitize(key))
}

/// Id of a grouping root
pub fn group_id(kind: GroupKind, prefix: &str) -> String {
    format!("{prefix}-CityObjectGroup-{}", kind.name())
}

/// Id of the unit container for `code`
pub fn container_id(role: ContainerRole, code: &str, prefix: &str) -> String {
    format!(
        "{}-CityObjectGroup-{}_{}",
        prefix.replace('-', "_"),
        role.name(),
        sanitize(code)
    )
}

/// Id of the `index`-th building unit with `code`
pub fn unit_id(code: &str, prefix: &str, index: usize) -> String {
    format!(
        "{}-BuildingUnit-BuildingUnit_{}@{index}",
        prefix.replace('-', "_"),
        sanitize(code)
    )
}

/// Id of the `index`-th outdoor unit with `code`
pub fn outdoor_unit_id(code: &str, prefix: &str, index: usize) -> String {
    format!(
        "{}-GenericCityObject-OutdoorUnit_{}@{index}",
        prefix.replace('-', "_"),
        sanitize(code)
    )
}
