use serde::{Deserialize, Serialize};
use std::fmt;

/// One value of a swept parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Str(String),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            ParamValue::Str(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(value) => write!(f, "{}", value),
            ParamValue::Str(value) => write!(f, "{}", value),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

/// One point of the parameter space: `(name, value)` pairs in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    params: Vec<(String, ParamValue)>,
}

impl Combination {
    pub fn new(params: Vec<(String, ParamValue)>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[(String, ParamValue)] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_int)
    }

    /// File-system safe name made of `name-value` pairs sorted by name,
    /// e.g. `concurrent_clients-16-iteration-1`.
    ///
    /// Distinct combinations never share a slug: characters outside `[A-Za-z0-9._]`
    /// are written as `%XX`, and a string value that would read as a number is
    /// prefixed with `%27`.
    pub fn slug(&self) -> String {
        let mut pairs: Vec<&(String, ParamValue)> = self.params.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.iter().map(|(name, value)| format!("{}-{}", escape(name), value_slug(value))).collect::<Vec<_>>().join("-")
    }
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_') {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

fn value_slug(value: &ParamValue) -> String {
    match value {
        ParamValue::Int(value) => escape(&value.to_string()),
        ParamValue::Str(value) => {
            let digits = value.strip_prefix('-').unwrap_or(value);
            let numeric = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
            if numeric || value.starts_with('\'') { format!("%27{}", escape(value)) } else { escape(value) }
        }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.params.iter().map(|(name, value)| format!("{}={}", name, value)).collect();
        write!(f, "({})", pairs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_sorts_names_and_escapes_values() {
        let combination = Combination::new(vec![
            ("iteration".to_string(), ParamValue::Int(2)),
            ("concurrent_clients".to_string(), ParamValue::Int(16)),
            ("mode".to_string(), ParamValue::from("read/write")),
        ]);
        assert_eq!(combination.slug(), "concurrent_clients-16-iteration-2-mode-read%2Fwrite");
        assert_eq!(combination.to_string(), "(iteration=2, concurrent_clients=16, mode=read/write)");
    }

    #[test]
    fn lookalike_values_get_distinct_slugs() {
        let slug = |value: ParamValue| Combination::new(vec![("mode".to_string(), value)]).slug();
        let values = vec![
            ParamValue::from("read/write"),
            ParamValue::from("read_write"),
            ParamValue::from("read%2Fwrite"),
            ParamValue::Int(1),
            ParamValue::from("1"),
            ParamValue::from("'1"),
            ParamValue::Int(-1),
            ParamValue::from("-1"),
        ];
        let slugs: std::collections::HashSet<String> = values.into_iter().map(slug).collect();
        assert_eq!(slugs.len(), 8);
        assert_eq!(slug(ParamValue::Int(-1)), "mode-%2D1");
        assert_eq!(slug(ParamValue::from("1")), "mode-%271");
    }

    #[test]
    fn untagged_values_round_trip_through_json() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[4, "fast"]"#).unwrap();
        assert_eq!(values, vec![ParamValue::Int(4), ParamValue::from("fast")]);
    }
}
