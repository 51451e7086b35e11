// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Import settings shared by every importer.

use std::collections::BTreeMap;

use cityjson_lite_geometry::DEFAULT_SEARCH_RADII;
use cityjson_lite_model::DEFAULT_SCALE;
use serde::{Deserialize, Serialize};

/// Reference system accepted for point features
pub const POINT_REFERENCE_SYSTEM: &str = "urn:ogc:def:crs:EPSG::7415";

/// Unit code given to tiled-dataset subdivisions
pub const SUBDIVISION_CODE: &str = "BS";

/// Which input LoDs of a tiled dataset feed which output LoD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLods {
    /// Input LoD key on top-level tiles -> output LoD
    pub top_level: BTreeMap<String, u32>,
    /// Input LoD key on child tiles -> output LoD
    pub children: BTreeMap<String, u32>,
}

impl Default for TileLods {
    fn default() -> Self {
        Self {
            top_level: BTreeMap::from([("0".to_string(), 0)]),
            children: BTreeMap::from([("1.3".to_string(), 1), ("2.2".to_string(), 2)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Quantization step of the written vertices
    pub scale: [f64; 3],
    /// Search radii for icon anchors, smallest first
    pub icon_radii: Vec<f64>,
    /// Reference system point features must declare
    pub reference_system: String,
    pub tile_lods: TileLods,
    pub subdivision_code: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            icon_radii: DEFAULT_SEARCH_RADII.to_vec(),
            reference_system: POINT_REFERENCE_SYSTEM.to_string(),
            tile_lods: TileLods::default(),
            subdivision_code: SUBDIVISION_CODE.to_string(),
        }
    }
}
