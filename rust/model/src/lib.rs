// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CityJSON-Lite Model
//!
//! City object graph and CityJSON serialization.
//!
//! Objects live in a [`CityModel`] arena keyed by [`ObjectKey`] handles.
//! Parent/child links and unit memberships are stored beside the arena and
//! are always written on both sides; [`CityModel::check_hierarchy`] verifies
//! that the result is a forest before the model is serialized. At
//! serialization every geometry goes through a [`GeometryContainer`] so the
//! output holds one deduplicated, quantized vertex list.

pub mod attributes;
pub mod container;
pub mod error;
pub mod geometry;
pub mod hierarchy;
pub mod keys;
pub mod model;
pub mod object;
pub mod serialization;

pub use attributes::{AttrValue, Attributes};
pub use container::{GeometryContainer, GeometryRecord};
pub use error::{Error, Result};
pub use geometry::{Boundaries, Geometry, GeometryKind};
pub use keys::ObjectKey;
pub use model::{CityModel, DEFAULT_SCALE};
pub use object::{
    building_prefix, container_id, group_id, icon_from_coords, key_to_prefix, outdoor_unit_id,
    space_key_to_id, unit_id, CityObject, ContainerRole, GroupKind, ObjectKind, SpaceKind,
};
pub use serialization::{CityJsonDocument, CityObjectRecord, Metadata, Transform, REFERENCE_SYSTEM};
