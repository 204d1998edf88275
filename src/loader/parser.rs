use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Parses a JSON file into a given type `T`.
///
/// Errors are converted into `crate::error::Error` variants:
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let data = fs::read_to_string(file_path).map_err(Error::IoError)?;

    let parsed_data: T = serde_json::from_str(&data).map_err(Error::DeserializationError)?;

    Ok(parsed_data)
}

/// Parses a YAML file into a given type `T`.
pub fn parse_yaml_file<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let data = fs::read_to_string(file_path).map_err(Error::IoError)?;

    let parsed_data: T = serde_yaml::from_str(&data).map_err(Error::YamlError)?;

    Ok(parsed_data)
}

/// Parses an experiment configuration file, picking the format from the extension.
///
/// `.json` files go through [`parse_json_file`], everything else is read as YAML.
pub fn parse_config_file<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    match file_path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_json_file(file_path),
        _ => parse_yaml_file(file_path),
    }
}
