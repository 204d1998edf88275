use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::manifest::builders::ManifestParams;
use crate::domain::manifest::template::{TEMPLATE_SUFFIX, Template};
use crate::error::{Error, Result};

/// A directory holding manifest templates, static manifests and the files generated from them.
#[derive(Debug, Clone)]
pub struct ManifestDir {
    root: PathBuf,
}

impl ManifestDir {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::ConfigValidation(format!("Manifest directory {} does not exist", root.display())));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn template(&self, file_name: &str) -> Result<Template> {
        Template::load(&self.root.join(file_name))
    }

    /// Path of a manifest shipped as is.
    pub fn static_file(&self, file_name: &str) -> Result<PathBuf> {
        let path = self.root.join(file_name);
        if !path.is_file() {
            return Err(Error::ConfigValidation(format!("Manifest {} does not exist", path.display())));
        }
        Ok(path)
    }

    /// Deletes generated files whose name starts with one of `prefixes`. Templates are never
    /// touched. Returns the number of deleted files.
    pub fn purge_generated(&self, prefixes: &[&str]) -> Result<usize> {
        let mut purged = 0;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || name.ends_with(TEMPLATE_SUFFIX) {
                continue;
            }
            if prefixes.iter().any(|prefix| name.starts_with(prefix)) {
                fs::remove_file(&path)?;
                log::debug!("Removed stale manifest {}", path.display());
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Renders `template_name` with `params` into `output_name` next to the template.
    ///
    /// YAML outputs are parsed back; a document that does not parse is removed and
    /// reported as [`Error::InvalidManifest`].
    pub fn render<P: ManifestParams + ?Sized>(&self, template_name: &str, params: &P, output_name: &str) -> Result<PathBuf> {
        let template = self.template(template_name)?;
        let rendered = template.render(&params.substitutions())?;
        let output = self.root.join(output_name);

        if is_yaml(&output) {
            if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(&rendered) {
                return Err(Error::InvalidManifest { path: output, reason: e.to_string() });
            }
        }

        fs::write(&output, rendered)?;
        log::debug!("Generated {} from {}", output.display(), template.path().display());
        Ok(output)
    }

    /// Every applicable manifest of the directory, sorted by file name.
    pub fn manifests(&self) -> Result<Vec<PathBuf>> {
        let mut manifests = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && is_yaml(&path) {
                manifests.push(path);
            }
        }
        manifests.sort();
        Ok(manifests)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
}
