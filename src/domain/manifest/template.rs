use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Suffix of template files. Anything else in a manifest directory is generated or static.
pub const TEMPLATE_SUFFIX: &str = ".template";

lazy_static! {
    /// `{identifier}`. Braces around anything else (YAML flow maps, Erlang tuples) are left alone.
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid");
}

pub type Substitutions = BTreeMap<String, String>;

/// A manifest or config template with `{placeholder}` fields.
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    body: String,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self> {
        let body = fs::read_to_string(path)?;
        Ok(Self { path: path.to_path_buf(), body })
    }

    pub fn from_string(path: impl Into<PathBuf>, body: impl Into<String>) -> Self {
        Self { path: path.into(), body: body.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn placeholders(&self) -> BTreeSet<String> {
        PLACEHOLDER.captures_iter(&self.body).map(|caps| caps[1].to_string()).collect()
    }

    /// Replaces every placeholder in one pass.
    ///
    /// Every placeholder must have a value, otherwise [`Error::MissingPlaceholder`];
    /// substitutions the template does not use are ignored. Values are inserted verbatim
    /// and never rescanned.
    pub fn render(&self, substitutions: &Substitutions) -> Result<String> {
        if let Some(missing) = self.placeholders().into_iter().find(|name| !substitutions.contains_key(name)) {
            return Err(Error::MissingPlaceholder { template: self.path.clone(), placeholder: missing });
        }

        let rendered = PLACEHOLDER.replace_all(&self.body, |caps: &Captures| substitutions[&caps[1]].clone());
        Ok(rendered.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs(pairs: &[(&str, &str)]) -> Substitutions {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn leaves_non_identifier_braces_alone() {
        let template = Template::from_string("client.config", "{concurrent, {concurrency}}.\n{duration, 3}.\nselector: {}\n");
        assert_eq!(template.placeholders().into_iter().collect::<Vec<_>>(), vec!["concurrency".to_string()]);
        assert_eq!(template.render(&subs(&[("concurrency", "16")])).unwrap(), "{concurrent, 16}.\n{duration, 3}.\nselector: {}\n");
    }

    #[test]
    fn inserted_values_are_not_rescanned() {
        let template = Template::from_string("t", "a: {first}\nb: {second}\n");
        let rendered = template.render(&subs(&[("first", "{second}"), ("second", "2")])).unwrap();
        assert_eq!(rendered, "a: {second}\nb: 2\n");
    }
}
