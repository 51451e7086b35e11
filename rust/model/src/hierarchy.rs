// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Consistency checks of the parent/child graph.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SecondaryMap;

use crate::error::{Error, Result};
use crate::keys::ObjectKey;
use crate::model::CityModel;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Active,
    Done,
}

impl CityModel {
    /// Check that the hierarchy is a well-formed forest.
    ///
    /// In order: every edge points at a known object, there is no cycle,
    /// a disconnected graph has `expected_components` trees (the number of
    /// buildings when `None`), and every edge is recorded on both sides.
    pub fn check_hierarchy(&self, expected_components: Option<usize>) -> Result<()> {
        self.check_dangling()?;
        self.check_acyclic()?;

        let found = self.component_count();
        if found > 1 {
            let expected = expected_components.unwrap_or_else(|| self.building_count());
            if found != expected {
                return Err(Error::ComponentCount { found, expected });
            }
        }

        self.check_mirrored()
    }

    fn check_dangling(&self) -> Result<()> {
        for (parent, children) in &self.children {
            if !self.objects.contains_key(parent)
                || children.iter().any(|&c| !self.objects.contains_key(c))
            {
                return Err(Error::DanglingReference {
                    from: self.display_key(parent),
                });
            }
        }
        for (child, &parent) in &self.parents {
            if !self.objects.contains_key(child) || !self.objects.contains_key(parent) {
                return Err(Error::DanglingReference {
                    from: self.display_key(child),
                });
            }
        }
        Ok(())
    }

    fn display_key(&self, key: ObjectKey) -> String {
        self.objects
            .get(key)
            .map_or_else(|| format!("{key:?}"), |o| o.id().to_string())
    }

    /// Depth-first search along child edges, reporting the first cycle met
    fn check_acyclic(&self) -> Result<()> {
        let mut marks: SecondaryMap<ObjectKey, Mark> = SecondaryMap::new();

        for start in self.objects.keys() {
            if marks.contains_key(start) {
                continue;
            }
            // Path of (node, remaining children)
            let mut path: Vec<(ObjectKey, Vec<ObjectKey>)> =
                vec![(start, self.children(start).collect())];
            marks.insert(start, Mark::Active);

            while let Some((node, pending)) = path.last_mut() {
                let node = *node;
                let Some(next) = pending.pop() else {
                    marks.insert(node, Mark::Done);
                    path.pop();
                    continue;
                };
                match marks.get(next) {
                    Some(Mark::Done) => {}
                    Some(Mark::Active) => {
                        let from = path.iter().position(|(k, _)| *k == next).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            path[from..].iter().map(|(k, _)| self.display_key(*k)).collect();
                        cycle.push(self.display_key(next));
                        return Err(Error::Cycle(cycle));
                    }
                    None => {
                        marks.insert(next, Mark::Active);
                        path.push((next, self.children(next).collect()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Weakly connected components of the child edges
    pub fn component_count(&self) -> usize {
        let mut listed_by: FxHashMap<ObjectKey, Vec<ObjectKey>> = FxHashMap::default();
        for (parent, children) in &self.children {
            for &child in children {
                listed_by.entry(child).or_default().push(parent);
            }
        }

        let mut seen: FxHashSet<ObjectKey> = FxHashSet::default();
        let mut count = 0;
        for start in self.objects.keys() {
            if !seen.insert(start) {
                continue;
            }
            count += 1;
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                let up = listed_by.get(&node).into_iter().flatten().copied();
                for next in self.children(node).chain(up) {
                    if self.objects.contains_key(next) && seen.insert(next) {
                        stack.push(next);
                    }
                }
            }
        }
        count
    }

    fn check_mirrored(&self) -> Result<()> {
        for (parent, children) in &self.children {
            for &child in children {
                if self.parents.get(child) != Some(&parent) {
                    return Err(Error::UnmirroredEdge {
                        from: self.display_key(parent),
                        to: self.display_key(child),
                    });
                }
            }
        }
        for (child, &parent) in &self.parents {
            let listed = self
                .children
                .get(parent)
                .is_some_and(|children| children.contains(&child));
            if !listed {
                return Err(Error::UnmirroredEdge {
                    from: self.display_key(child),
                    to: self.display_key(parent),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{CityObject, ObjectKind, SpaceKind};

    fn model_with(keys: &[(&str, SpaceKind)]) -> (CityModel, Vec<ObjectKey>) {
        let mut model = CityModel::default();
        let handles = keys
            .iter()
            .map(|(key, kind)| {
                let object =
                    CityObject::new(*key, ObjectKind::space(*kind, *key), Vec::new(), None)
                        .unwrap();
                model.add_object(object).unwrap()
            })
            .collect();
        (model, handles)
    }

    fn small_tree() -> (CityModel, Vec<ObjectKey>) {
        let (mut model, k) = model_with(&[
            ("A", SpaceKind::Building),
            ("A.0", SpaceKind::BuildingPart),
            ("A.0.1", SpaceKind::BuildingStorey),
            ("A.1", SpaceKind::BuildingPart),
        ]);
        model.add_parent_child(k[0], k[1], false).unwrap();
        model.add_parent_child(k[1], k[2], false).unwrap();
        model.add_parent_child(k[0], k[3], false).unwrap();
        (model, k)
    }

    #[test]
    fn built_hierarchy_passes() {
        let (model, _) = small_tree();
        assert_eq!(model.component_count(), 1);
        model.check_hierarchy(None).unwrap();
    }

    #[test]
    fn empty_model_passes() {
        CityModel::default().check_hierarchy(None).unwrap();
    }

    #[test]
    fn one_tree_per_building_by_default() {
        let (mut model, k) = model_with(&[
            ("A", SpaceKind::Building),
            ("B", SpaceKind::Building),
            ("B.0", SpaceKind::BuildingPart),
        ]);
        model.add_parent_child(k[1], k[2], false).unwrap();
        model.check_hierarchy(None).unwrap();
        assert!(matches!(
            model.check_hierarchy(Some(1)),
            Err(Error::ComponentCount { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn direct_child_insertion_is_caught() {
        let (mut model, k) = small_tree();
        // Child edge without the matching parent link
        model.children.entry(k[3]).unwrap().or_default().insert(k[2]);
        model.parents.remove(k[2]);
        model.children.get_mut(k[1]).unwrap().remove(&k[2]);
        assert!(matches!(
            model.check_hierarchy(None),
            Err(Error::UnmirroredEdge { .. })
        ));
    }

    #[test]
    fn direct_parent_change_is_caught() {
        let (mut model, k) = small_tree();
        model.parents.insert(k[2], k[3]);
        assert!(matches!(
            model.check_hierarchy(None),
            Err(Error::UnmirroredEdge { .. })
        ));
    }

    #[test]
    fn cycles_are_reported() {
        let (mut model, k) = small_tree();
        model.children.entry(k[2]).unwrap().or_default().insert(k[0]);
        match model.check_hierarchy(None) {
            Err(Error::Cycle(cycle)) => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&"A.0.1".to_string()));
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }
}
