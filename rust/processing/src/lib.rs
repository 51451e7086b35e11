// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CityJSON-Lite Processing
//!
//! Importers that turn source data into a [`CityModel`], and the exports
//! that come after.
//!
//! - [`tiled`]: tiled building datasets combined with building and
//!   subdivision tables
//! - [`scene`]: glTF scenes whose mesh names encode the space hierarchy,
//!   completed with attribute tables and [`units`]
//! - [`geojson`]: point features as outdoor units
//! - [`split`]: CityJSON to a GLB scene plus an attribute-only CityJSON
//! - [`codelist`]: unit codelist tables to JSON
//!
//! Attribute tables are `;`-separated with typed headers, see [`table`].

pub mod codelist;
pub mod config;
pub mod error;
pub mod export;
pub mod geojson;
pub mod gltf_reader;
pub mod loader;
pub mod records;
pub mod scene;
pub mod split;
pub mod table;
pub mod tiled;
pub mod units;

pub use cityjson_lite_model::CityModel;

pub use codelist::{format_codelist, read_codelist, Codelist};
pub use config::{ImportConfig, TileLods};
pub use error::{Error, Result};
pub use export::write_city_json;
pub use geojson::{import_points, read_points};
pub use gltf_reader::{read_scene, read_scene_slice, NamedMesh};
pub use loader::CityJsonDataset;
pub use records::{
    AttributeReader, AttributeRecord, BuildingRecord, KeyCounter, PartRecord, RoomRecord,
    StoreyRecord, SubdivisionRecord, UnitRecord,
};
pub use scene::{apply_space_attributes, import_scene};
pub use split::{split_city_json, split_file, SplitOutput};
pub use table::{read_table, ColumnType, TableRow};
pub use tiled::{import_tiled, TiledImport};
pub use units::add_units;
