// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for city model operations.

/// Result type alias for city model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, checking or serializing a city model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two objects were given the same id.
    #[error("object id '{0}' is already used by another object")]
    DuplicateObject(String),

    /// An id or handle does not belong to this model.
    #[error("unknown object '{0}'")]
    UnknownObject(String),

    /// The child already has a parent and replacing was not requested.
    #[error("object '{child}' already has parent '{parent}'; set `replace` to change it")]
    ParentAlreadySet { child: String, parent: String },

    /// An attribute with the same key is already set.
    #[error("attribute '{key}' is already set on '{object}'; set `overwrite` to replace it")]
    AttributeExists { object: String, key: String },

    /// The object kind cannot take part in the requested relation.
    #[error("object '{id}' is not a {expected}")]
    WrongKind { id: String, expected: &'static str },

    /// A boundary references a vertex that does not exist.
    #[error("boundary index {index} is out of range for {len} vertices")]
    BoundaryIndexOutOfRange { index: u32, len: usize },

    /// An icon position must have exactly three coordinates.
    #[error("an icon position needs 3 coordinates, got {0}")]
    InvalidIconPosition(usize),

    /// A hierarchy edge points to an object that is not in the model.
    #[error("hierarchy edge from '{from}' references an unknown object")]
    DanglingReference { from: String },

    /// The parent/child graph has a cycle.
    #[error("cycle detected in the hierarchy: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// The parent/child graph does not split into the expected number of trees.
    #[error("the hierarchy has {found} connected components (expected {expected})")]
    ComponentCount { found: usize, expected: usize },

    /// A parent/child edge is only recorded on one side.
    #[error("the edge between '{from}' and '{to}' does not go both ways")]
    UnmirroredEdge { from: String, to: String },

    /// The model does not have exactly one root object.
    #[error("expected a single root object, found {0}")]
    RootCount(usize),

    #[error(transparent)]
    Geometry(#[from] cityjson_lite_geometry::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
