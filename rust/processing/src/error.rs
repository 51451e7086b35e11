// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for importers and exports.

use std::path::PathBuf;

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error(transparent)]
    Model(#[from] cityjson_lite_model::Error),

    #[error(transparent)]
    Geometry(#[from] cityjson_lite_geometry::Error),

    /// A typed column header is not `<Name> [<type>]`.
    #[error("column header should look like '<Name> [<type>]', got '{0}'")]
    InvalidHeader(String),

    #[error("column type '{0}' is not supported")]
    UnsupportedType(String),

    #[error("cannot read '{value}' as {ty} in column '{column}'")]
    InvalidValue {
        column: String,
        value: String,
        ty: String,
    },

    #[error("two columns resolve to the same name '{name}' in {source_name}")]
    DuplicateColumn { name: String, source_name: String },

    #[error("column '{column}' is missing from {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("key '{key}' appears on more than one row of {source_name}")]
    DuplicateKey { key: String, source_name: String },

    #[error("unexpected geometry type '{0}'")]
    UnexpectedGeometryType(String),

    #[error("object '{0}' has no geometry")]
    MissingGeometry(String),

    #[error("object '{id}' has no geometry at LoD {lod}")]
    MissingLod { id: String, lod: String },

    #[error("object '{0}' is not in the input")]
    MissingObject(String),

    #[error("no space has the identifier '{0}'")]
    MissingSpace(String),

    #[error("container '{id}' already belongs to another object than '{parent}'")]
    ContainerCollision { id: String, parent: String },

    #[error("invalid CityJSON input: {0}")]
    InvalidCityJson(String),

    #[error("invalid GeoJSON input: {0}")]
    InvalidGeoJson(String),

    #[error("unsupported reference system '{found}', expected '{expected}'")]
    ReferenceSystem { found: String, expected: String },

    #[error("a feature is missing the property '{0}'")]
    MissingProperty(String),

    #[error("glTF input has no scene")]
    EmptyScene,

    #[error("mesh node has no name: {0}")]
    UnnamedMesh(String),

    #[error("mesh name '{0}' does not follow '<path>-lod_<n>'")]
    InvalidMeshName(String),

    #[error("unexpected format for an object name: '{0}'")]
    HierarchyTooDeep(String),

    #[error("{0}")]
    Codelist(String),

    #[error("{0} already exists; set `overwrite` to replace it")]
    AlreadyExists(PathBuf),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
