// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for city objects and their relations.
//!
//! The [`CityModel`] owns every [`CityObject`] in a slot map. Parent/child
//! links and unit/space memberships are kept beside the arena as
//! handle-to-handle maps, so objects never point at each other directly.
//! [`CityModel::add_parent_child`] and [`CityModel::add_unit_space`] write
//! both directions of a relation at once.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{SecondaryMap, SlotMap};

use crate::attributes::Attributes;
use crate::error::{Error, Result};
use crate::keys::ObjectKey;
use crate::object::{CityObject, ObjectKind};

/// Default quantization step of serialized vertices
pub const DEFAULT_SCALE: [f64; 3] = [1e-5; 3];

/// A collection of city objects with their hierarchy
#[derive(Debug, Clone)]
pub struct CityModel {
    pub(crate) objects: SlotMap<ObjectKey, CityObject>,
    pub(crate) ids: FxHashMap<String, ObjectKey>,
    pub(crate) parents: SecondaryMap<ObjectKey, ObjectKey>,
    pub(crate) children: SecondaryMap<ObjectKey, FxHashSet<ObjectKey>>,
    pub(crate) unit_spaces: SecondaryMap<ObjectKey, FxHashSet<ObjectKey>>,
    pub(crate) space_units: SecondaryMap<ObjectKey, FxHashSet<ObjectKey>>,
    pub(crate) scale: [f64; 3],
    pub(crate) translate: [f64; 3],
}

impl Default for CityModel {
    fn default() -> Self {
        Self::new(DEFAULT_SCALE)
    }
}

impl CityModel {
    /// Create an empty model
    pub fn new(scale: [f64; 3]) -> Self {
        Self {
            objects: SlotMap::with_key(),
            ids: FxHashMap::default(),
            parents: SecondaryMap::new(),
            children: SecondaryMap::new(),
            unit_spaces: SecondaryMap::new(),
            space_units: SecondaryMap::new(),
            scale,
            translate: [0.0; 3],
        }
    }

    pub fn scale(&self) -> [f64; 3] {
        self.scale
    }

    /// Translation of the last serialization, zero before that
    pub fn translate(&self) -> [f64; 3] {
        self.translate
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Insert an object; ids must be unique
    pub fn add_object(&mut self, object: CityObject) -> Result<ObjectKey> {
        if self.ids.contains_key(object.id()) {
            return Err(Error::DuplicateObject(object.id().to_string()));
        }
        let id = object.id().to_string();
        let key = self.objects.insert(object);
        self.ids.insert(id, key);
        Ok(key)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Handle of the object with this id
    pub fn key(&self, id: &str) -> Option<ObjectKey> {
        self.ids.get(id).copied()
    }

    /// Handle of the object with this id, as an error when missing
    pub fn require(&self, id: &str) -> Result<ObjectKey> {
        self.key(id)
            .ok_or_else(|| Error::UnknownObject(id.to_string()))
    }

    pub fn get(&self, key: ObjectKey) -> Option<&CityObject> {
        self.objects.get(key)
    }

    pub fn get_mut(&mut self, key: ObjectKey) -> Option<&mut CityObject> {
        self.objects.get_mut(key)
    }

    pub fn object(&self, id: &str) -> Option<&CityObject> {
        self.key(id).and_then(|key| self.objects.get(key))
    }

    /// Objects in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectKey, &CityObject)> {
        self.objects.iter()
    }

    pub fn parent(&self, key: ObjectKey) -> Option<ObjectKey> {
        self.parents.get(key).copied()
    }

    pub fn children(&self, key: ObjectKey) -> impl Iterator<Item = ObjectKey> + '_ {
        self.children.get(key).into_iter().flatten().copied()
    }

    pub fn child_count(&self, key: ObjectKey) -> usize {
        self.children.get(key).map_or(0, FxHashSet::len)
    }

    /// Spaces a unit covers
    pub fn unit_spaces(&self, unit: ObjectKey) -> impl Iterator<Item = ObjectKey> + '_ {
        self.unit_spaces.get(unit).into_iter().flatten().copied()
    }

    /// Units a space belongs to
    pub fn space_units(&self, space: ObjectKey) -> impl Iterator<Item = ObjectKey> + '_ {
        self.space_units.get(space).into_iter().flatten().copied()
    }

    fn id_of(&self, key: ObjectKey) -> String {
        self.objects
            .get(key)
            .map_or_else(|| format!("{key:?}"), |o| o.id().to_string())
    }

    fn check_key(&self, key: ObjectKey) -> Result<&CityObject> {
        self.objects
            .get(key)
            .ok_or_else(|| Error::UnknownObject(format!("{key:?}")))
    }

    /// Link `child` under `parent`.
    ///
    /// A child with a parent is only moved when `replace` is set, in which
    /// case it is also removed from the old parent's children.
    pub fn add_parent_child(
        &mut self,
        parent: ObjectKey,
        child: ObjectKey,
        replace: bool,
    ) -> Result<()> {
        self.check_key(parent)?;
        self.check_key(child)?;

        if let Some(&old) = self.parents.get(child) {
            if !replace {
                return Err(Error::ParentAlreadySet {
                    child: self.id_of(child),
                    parent: self.id_of(old),
                });
            }
            if let Some(siblings) = self.children.get_mut(old) {
                siblings.remove(&child);
            }
        }

        self.parents.insert(child, parent);
        if let Some(entry) = self.children.entry(parent) {
            entry.or_default().insert(child);
        }
        Ok(())
    }

    /// Record that `unit` covers `space`, on both sides
    pub fn add_unit_space(&mut self, unit: ObjectKey, space: ObjectKey) -> Result<()> {
        if !self.check_key(unit)?.is_unit() {
            return Err(Error::WrongKind {
                id: self.id_of(unit),
                expected: "building unit",
            });
        }
        if self.check_key(space)?.space_id().is_none() {
            return Err(Error::WrongKind {
                id: self.id_of(space),
                expected: "space",
            });
        }

        if let Some(entry) = self.unit_spaces.entry(unit) {
            entry.or_default().insert(space);
        }
        if let Some(entry) = self.space_units.entry(space) {
            entry.or_default().insert(unit);
        }
        Ok(())
    }

    /// Merge attributes into an object
    pub fn add_attributes(
        &mut self,
        key: ObjectKey,
        attributes: Attributes,
        overwrite: bool,
    ) -> Result<()> {
        self.objects
            .get_mut(key)
            .ok_or_else(|| Error::UnknownObject(format!("{key:?}")))?
            .add_attributes(attributes, overwrite)
    }

    pub fn building_count(&self) -> usize {
        self.objects.values().filter(|o| o.is_building()).count()
    }

    /// The only object without a parent
    pub fn root(&self) -> Result<ObjectKey> {
        let roots: Vec<ObjectKey> = self
            .objects
            .keys()
            .filter(|&key| !self.parents.contains_key(key))
            .collect();
        match roots.as_slice() {
            [root] => Ok(*root),
            _ => Err(Error::RootCount(roots.len())),
        }
    }

    /// Space lookup by source identifier
    pub fn spaces_by_space_id(&self) -> FxHashMap<&str, ObjectKey> {
        self.objects
            .iter()
            .filter_map(|(key, object)| object.space_id().map(|id| (id, key)))
            .collect()
    }

    /// Objects of a kind matching `predicate`
    pub fn keys_where(&self, predicate: impl Fn(&ObjectKind) -> bool) -> Vec<ObjectKey> {
        self.objects
            .iter()
            .filter(|(_, object)| predicate(object.kind()))
            .map(|(key, _)| key)
            .collect()
    }
}
