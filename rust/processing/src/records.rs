// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attribute records: table rows keyed for one kind of object.
//!
//! Each record kind names the columns it needs. Those columns are taken
//! out of the row; every other typed column stays in the attribute bag
//! that is later merged into the matching object.

use std::io::Read;
use std::path::Path;

use cityjson_lite_geometry::Point3;
use cityjson_lite_model::{attributes, icon_from_coords, AttrValue, Attributes};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::table::{read_table, read_table_from, TableRow};

pub const KEY_COLUMN: &str = "Key [str]";
pub const SPACE_ID_COLUMN: &str = "CREFM ID [str]";
pub const ICON_COLUMN: &str = "Icon Position [list,float]";
pub const BAG_IDS_COLUMN: &str = "3D BAG Buildings IDs [list,str]";
pub const SKIP_COLUMN: &str = "Skip [bool]";
pub const PARENT_KEY_COLUMN: &str = "Parent Key [str]";
pub const CODE_COLUMN: &str = "Type Code [str]";
pub const GLTF_NAME_COLUMN: &str = "glTF Name [str]";
pub const UNIT_SPACES_COLUMN: &str = "CREFM IDs [list,str]";
pub const UNIT_STOREYS_COLUMN: &str = "Storeys [list,str]";
pub const STOREY_LEVEL_COLUMN: &str = "Level [float]";
pub const STOREY_SPACE_ID_COLUMN: &str = "Storey CREFM ID [str]";

/// Where a record's key comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// The value of the n-th specific column
    Column(usize),
    /// `<value of the n-th specific column>@<count>`
    Counter(usize),
}

/// Sequence numbers for synthesized keys, one counter per base
#[derive(Debug, Default, Clone)]
pub struct KeyCounter {
    counts: FxHashMap<String, usize>,
}

impl KeyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number for `base`, counting from zero
    pub fn next_index(&mut self, base: &str) -> usize {
        let count = self.counts.entry(base.to_string()).or_insert(0);
        let index = *count;
        *count += 1;
        index
    }

    /// Next `<base>@<n>`
    pub fn next_key(&mut self, base: &str) -> String {
        let index = self.next_index(base);
        format!("{base}@{index}")
    }
}

/// A table row bound to one kind of object
pub trait AttributeRecord: Sized {
    /// Columns taken out of the row, in the order `from_row` sees them
    const COLUMNS: &'static [&'static str];
    const KEY: KeySource;

    fn from_row(key: String, row: TableRow) -> Result<Self>;

    /// Attributes to merge into the object
    fn object_attributes(&self) -> Attributes;

    /// Explicit icon position, if the row gives one
    fn icon(&self) -> Option<Point3<f64>> {
        None
    }
}

fn string(value: &AttrValue) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn required_string(value: &AttrValue, column: &str) -> Result<String> {
    string(value).ok_or_else(|| Error::InvalidValue {
        column: column.to_string(),
        value: value.to_string(),
        ty: "non-empty str".to_string(),
    })
}

fn icon(value: &AttrValue) -> Result<Option<Point3<f64>>> {
    let coords = value.float_list().ok_or_else(|| Error::InvalidValue {
        column: ICON_COLUMN.to_string(),
        value: value.to_string(),
        ty: "list,float".to_string(),
    })?;
    Ok(icon_from_coords(&coords)?)
}

/// Row of the building table
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingRecord {
    pub key: String,
    pub space_id: String,
    /// Tiles of the base dataset making up the building
    pub tile_ids: Vec<String>,
    pub skip: bool,
    pub icon: Option<Point3<f64>>,
    pub attributes: Attributes,
}

impl AttributeRecord for BuildingRecord {
    const COLUMNS: &'static [&'static str] = &[
        KEY_COLUMN,
        SPACE_ID_COLUMN,
        BAG_IDS_COLUMN,
        SKIP_COLUMN,
        ICON_COLUMN,
    ];
    const KEY: KeySource = KeySource::Column(0);

    fn from_row(key: String, row: TableRow) -> Result<Self> {
        let [_, space_id, tiles, skip, position] = row.specific.as_slice() else {
            return Err(Error::MissingColumn {
                column: ICON_COLUMN.to_string(),
                source_name: key,
            });
        };
        Ok(Self {
            space_id: required_string(space_id, SPACE_ID_COLUMN)?,
            tile_ids: tiles.string_list(),
            skip: skip.as_bool().unwrap_or(false),
            icon: icon(position)?,
            key,
            attributes: row.attributes,
        })
    }

    fn object_attributes(&self) -> Attributes {
        self.attributes.clone()
    }

    fn icon(&self) -> Option<Point3<f64>> {
        self.icon
    }
}

/// Row of the subdivision table
#[derive(Debug, Clone, PartialEq)]
pub struct SubdivisionRecord {
    pub key: String,
    pub space_id: String,
    /// Key of the building the subdivision belongs to
    pub parent_key: String,
    pub skip: bool,
    pub icon: Option<Point3<f64>>,
    pub attributes: Attributes,
}

impl AttributeRecord for SubdivisionRecord {
    const COLUMNS: &'static [&'static str] = &[
        KEY_COLUMN,
        SPACE_ID_COLUMN,
        PARENT_KEY_COLUMN,
        SKIP_COLUMN,
        ICON_COLUMN,
    ];
    const KEY: KeySource = KeySource::Column(0);

    fn from_row(key: String, row: TableRow) -> Result<Self> {
        let [_, space_id, parent_key, skip, position] = row.specific.as_slice() else {
            return Err(Error::MissingColumn {
                column: ICON_COLUMN.to_string(),
                source_name: key,
            });
        };
        Ok(Self {
            space_id: required_string(space_id, SPACE_ID_COLUMN)?,
            parent_key: required_string(parent_key, PARENT_KEY_COLUMN)?,
            skip: skip.as_bool().unwrap_or(false),
            icon: icon(position)?,
            key,
            attributes: row.attributes,
        })
    }

    fn object_attributes(&self) -> Attributes {
        self.attributes.clone()
    }

    fn icon(&self) -> Option<Point3<f64>> {
        self.icon
    }
}

/// Row of the building part table, keyed by space id
#[derive(Debug, Clone, PartialEq)]
pub struct PartRecord {
    pub space_id: String,
    pub attributes: Attributes,
}

impl AttributeRecord for PartRecord {
    const COLUMNS: &'static [&'static str] = &[SPACE_ID_COLUMN];
    const KEY: KeySource = KeySource::Column(0);

    fn from_row(key: String, row: TableRow) -> Result<Self> {
        Ok(Self {
            space_id: key,
            attributes: row.attributes,
        })
    }

    fn object_attributes(&self) -> Attributes {
        self.attributes.clone()
    }
}

/// Row of the storey table, keyed by space id
#[derive(Debug, Clone, PartialEq)]
pub struct StoreyRecord {
    pub space_id: String,
    pub level: Option<f64>,
    pub storey_space_id: Option<String>,
    pub attributes: Attributes,
}

impl AttributeRecord for StoreyRecord {
    const COLUMNS: &'static [&'static str] =
        &[SPACE_ID_COLUMN, STOREY_LEVEL_COLUMN, STOREY_SPACE_ID_COLUMN];
    const KEY: KeySource = KeySource::Column(0);

    fn from_row(key: String, row: TableRow) -> Result<Self> {
        let [_, level, storey_space_id] = row.specific.as_slice() else {
            return Err(Error::MissingColumn {
                column: STOREY_SPACE_ID_COLUMN.to_string(),
                source_name: key,
            });
        };
        Ok(Self {
            level: level.as_f64(),
            storey_space_id: string(storey_space_id),
            space_id: key,
            attributes: row.attributes,
        })
    }

    fn object_attributes(&self) -> Attributes {
        let mut attributes = self.attributes.clone();
        attributes.insert(attributes::STOREY_LEVEL.to_string(), self.level.into());
        attributes.insert(
            attributes::STOREY_SPACE_ID.to_string(),
            self.storey_space_id.clone().into(),
        );
        attributes
    }
}

/// Row of the room table, keyed by space id
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRecord {
    pub space_id: String,
    pub icon: Option<Point3<f64>>,
    pub code: Option<String>,
    pub attributes: Attributes,
}

impl AttributeRecord for RoomRecord {
    const COLUMNS: &'static [&'static str] = &[SPACE_ID_COLUMN, ICON_COLUMN, CODE_COLUMN];
    const KEY: KeySource = KeySource::Column(0);

    fn from_row(key: String, row: TableRow) -> Result<Self> {
        let [_, position, code] = row.specific.as_slice() else {
            return Err(Error::MissingColumn {
                column: CODE_COLUMN.to_string(),
                source_name: key,
            });
        };
        Ok(Self {
            icon: icon(position)?,
            code: string(code),
            space_id: key,
            attributes: row.attributes,
        })
    }

    fn object_attributes(&self) -> Attributes {
        let mut attributes = self.attributes.clone();
        attributes.insert(attributes::CODE.to_string(), self.code.clone().into());
        attributes
    }

    fn icon(&self) -> Option<Point3<f64>> {
        self.icon
    }
}

/// Row of the unit table, keyed `<code>@<n>`
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub key: String,
    pub icon: Option<Point3<f64>>,
    pub code: String,
    pub gltf_name: Option<String>,
    /// Space ids the unit covers
    pub spaces: Vec<String>,
    pub storeys: Vec<String>,
    pub attributes: Attributes,
}

impl AttributeRecord for UnitRecord {
    const COLUMNS: &'static [&'static str] = &[
        CODE_COLUMN,
        ICON_COLUMN,
        GLTF_NAME_COLUMN,
        UNIT_SPACES_COLUMN,
        UNIT_STOREYS_COLUMN,
    ];
    const KEY: KeySource = KeySource::Counter(0);

    fn from_row(key: String, row: TableRow) -> Result<Self> {
        let [code, position, gltf_name, spaces, storeys] = row.specific.as_slice() else {
            return Err(Error::MissingColumn {
                column: UNIT_STOREYS_COLUMN.to_string(),
                source_name: key,
            });
        };
        let spaces = spaces.string_list();
        let mut storeys = storeys.string_list();
        if storeys.is_empty() {
            storeys = storeys_of_spaces(&spaces);
        }
        Ok(Self {
            code: required_string(code, CODE_COLUMN)?,
            icon: icon(position)?,
            gltf_name: string(gltf_name),
            spaces,
            storeys,
            key,
            attributes: row.attributes,
        })
    }

    fn object_attributes(&self) -> Attributes {
        self.attributes.clone()
    }

    fn icon(&self) -> Option<Point3<f64>> {
        self.icon
    }
}

/// Storeys holding the given spaces: the parent path of every space with
/// at least three segments, deduplicated in order
fn storeys_of_spaces(spaces: &[String]) -> Vec<String> {
    let mut storeys: Vec<String> = Vec::new();
    for space in spaces {
        if space.split('.').count() < 3 {
            continue;
        }
        if let Some((storey, _)) = space.rsplit_once('.') {
            if !storeys.iter().any(|s| s == storey) {
                storeys.push(storey.to_string());
            }
        }
    }
    storeys
}

/// Records of one table, in file order and indexed by key
#[derive(Debug, Clone)]
pub struct AttributeReader<R> {
    records: Vec<(String, R)>,
    index: FxHashMap<String, usize>,
}

impl<R> Default for AttributeReader<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<R: AttributeRecord> AttributeReader<R> {
    /// Read a table. Synthesized keys are numbered by `counter`.
    pub fn read(path: &Path, counter: &mut KeyCounter) -> Result<Self> {
        let rows = read_table(path, R::COLUMNS)?;
        Self::from_rows(rows, &path.display().to_string(), counter)
    }

    pub fn from_reader(
        reader: impl Read,
        source_name: &str,
        counter: &mut KeyCounter,
    ) -> Result<Self> {
        let rows = read_table_from(reader, source_name, R::COLUMNS)?;
        Self::from_rows(rows, source_name, counter)
    }

    fn from_rows(rows: Vec<TableRow>, source_name: &str, counter: &mut KeyCounter) -> Result<Self> {
        let mut reader = Self::default();

        for row in rows {
            let key = match R::KEY {
                KeySource::Column(i) => required_string(&row.specific[i], R::COLUMNS[i])?,
                KeySource::Counter(i) => {
                    counter.next_key(&required_string(&row.specific[i], R::COLUMNS[i])?)
                }
            };
            if reader.index.contains_key(&key) {
                return Err(Error::DuplicateKey {
                    key,
                    source_name: source_name.to_string(),
                });
            }
            let record = R::from_row(key.clone(), row)?;
            reader.index.insert(key.clone(), reader.records.len());
            reader.records.push((key, record));
        }

        Ok(reader)
    }
}

impl<R> AttributeReader<R> {
    pub fn get(&self, key: &str) -> Option<&R> {
        self.index.get(key).map(|&i| &self.records[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &R)> {
        self.records.iter().map(|(key, record)| (key.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
