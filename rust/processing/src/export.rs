// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CityJSON file output.

use std::fs;
use std::path::Path;

use cityjson_lite_model::CityModel;
use tracing::info;

use crate::error::{Error, Result};

/// Check the hierarchy, then write the model to `path`.
///
/// Nothing is written when the check fails. Missing parent directories
/// are created.
pub fn write_city_json(
    model: &mut CityModel,
    path: &Path,
    expected_components: Option<usize>,
) -> Result<()> {
    model.check_hierarchy(expected_components)?;
    let json = model.to_json()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, json).map_err(|e| Error::io(path, e))?;

    info!(path = %path.display(), objects = model.len(), "wrote CityJSON");
    Ok(())
}
