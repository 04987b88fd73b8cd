use crate::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Name used for the user environment when the manifest does not carry one.
pub const DEFAULT_ENV_NAME: &str = "condainer";

/// Written by `init` as a starting point for the user's own manifest.
pub const EXAMPLE_ENVIRONMENT_YML: &str = "\
# Conda environment definition file
# This file is only provided as an example, replace it with your own file!
# Hints on editing manually are available online:
# https://conda.io/projects/conda/en/latest/user-guide/tasks/manage-environments.html#creating-an-environment-file-manually
#
name: basicnumpy
channels:
  - conda-forge
dependencies:
  - python=3.9
  - numpy
";

// Only the name matters here; the package manager owns the rest of the format.
#[derive(Debug, Deserialize)]
struct ManifestHead {
    #[serde(default)]
    name: Option<String>,
}

/// Read the environment name declared in a conda environment manifest.
pub fn resolve_env_name(manifest: &Path) -> Result<String, ConfigError> {
    let content = fs::read_to_string(manifest)?;
    let head: ManifestHead =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Corrupt {
            path: manifest.to_path_buf(),
            source,
        })?;
    Ok(head
        .name
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_ENV_NAME.to_owned()))
}
