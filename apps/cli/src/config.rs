// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration loaded from environment variables.

use cityjson_lite_processing::ImportConfig;

/// Quantization step applied on all three axes
pub const SCALE_VAR: &str = "CITYJSON_LITE_SCALE";
/// Comma-separated icon search radii
pub const ICON_RADII_VAR: &str = "CITYJSON_LITE_ICON_RADII";

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings handed to every importer.
    pub import: ImportConfig,
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// importer defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(SCALE_VAR).ok().as_deref(),
            std::env::var(ICON_RADII_VAR).ok().as_deref(),
        )
    }

    fn from_vars(scale: Option<&str>, radii: Option<&str>) -> Self {
        let mut import = ImportConfig::default();
        if let Some(scale) = scale.and_then(|s| s.trim().parse::<f64>().ok()) {
            if scale > 0.0 {
                import.scale = [scale; 3];
            }
        }
        if let Some(radii) = radii.and_then(parse_radii) {
            import.icon_radii = radii;
        }
        Self { import }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_radii(value: &str) -> Option<Vec<f64>> {
    let radii = value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok().filter(|r| *r > 0.0))
        .collect::<Option<Vec<f64>>>()?;
    (!radii.is_empty()).then_some(radii)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_vars_keep_defaults() {
        let config = Config::from_vars(None, None);
        assert_eq!(config.import, ImportConfig::default());
    }

    #[test]
    fn vars_override_defaults() {
        let config = Config::from_vars(Some("0.001"), Some("2, 5,20"));
        assert_eq!(config.import.scale, [0.001; 3]);
        assert_eq!(config.import.icon_radii, vec![2.0, 5.0, 20.0]);
    }

    #[test]
    fn garbage_is_ignored() {
        let config = Config::from_vars(Some("fine"), Some("1,x"));
        assert_eq!(config.import, ImportConfig::default());
        assert!(parse_radii("").is_none());
        assert!(parse_radii("-1").is_none());
    }
}
