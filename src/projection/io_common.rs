use log::debug;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use snafu::prelude::*;

use crate::projection::*;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Resolves a document path against the directory of the configuration file.
pub fn resolve_path(root: Option<&Path>, path: &str) -> String {
    match root {
        Some(r) if Path::new(path).is_relative() => {
            let p: PathBuf = [r, Path::new(path)].iter().collect();
            p.as_path().display().to_string()
        }
        _ => path.to_string(),
    }
}

pub fn read_document<T: DeserializeOwned>(path: &str) -> ProjResult<T> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!(
        "read_document: {}: {} bytes",
        simplify_file_name(path),
        contents.len()
    );
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}
