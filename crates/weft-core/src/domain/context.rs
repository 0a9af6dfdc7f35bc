//! Data handed to templates and path interpolation.
//!
//! The data bag is an ordered JSON object. Built-in entries are written by
//! the treadle compiler first; a treadle's own data builder may then add to
//! or override them. Paths in output and patch specs use `{key}`
//! placeholders resolved against the same bag, with dotted keys walking into
//! nested objects (`{outer.export}`).

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;

use crate::domain::emission::EmittedMethod;
use crate::domain::error::DomainError;

pub type DataBag = BTreeMap<String, Value>;

/// Everything a template receives.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderContext {
    #[serde(flatten)]
    pub data: DataBag,
    pub methods: Vec<EmittedMethod>,
}

impl RenderContext {
    pub fn new(data: DataBag, methods: Vec<EmittedMethod>) -> Self {
        Self { data, methods }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Later entries win.
    pub fn merged(mut self, overrides: &DataBag) -> Self {
        self.data
            .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.data, key)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.]*)\}").expect("placeholder pattern is a valid regex")
    })
}

fn lookup<'a>(data: &'a DataBag, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Resolve every `{key}` in `template` against `data`.
///
/// # Errors
///
/// `UnresolvedPlaceholder` for a key that is absent or not a scalar.
pub fn interpolate(template: &str, data: &DataBag) -> Result<String, DomainError> {
    let mut missing = None;
    let out = placeholder_regex().replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match lookup(data, key).and_then(scalar) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(placeholder) => Err(DomainError::UnresolvedPlaceholder {
            placeholder,
            template: template.to_string(),
        }),
        None => Ok(out.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag() -> DataBag {
        let mut data = DataBag::new();
        data.insert("export".into(), json!("app-android"));
        data.insert("outer".into(), json!({ "name": "android", "depth": 2 }));
        data.insert("list".into(), json!([1, 2]));
        data
    }

    #[test]
    fn interpolates_flat_and_dotted_keys() {
        let path = interpolate("{export}/src/{outer.name}_{outer.depth}.rs", &bag()).unwrap();
        assert_eq!(path, "app-android/src/android_2.rs");
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        assert_eq!(interpolate("src/lib.rs", &bag()).unwrap(), "src/lib.rs");
    }

    #[test]
    fn missing_and_non_scalar_keys_fail() {
        let err = interpolate("{nope}/x", &bag()).unwrap_err();
        assert_eq!(
            err,
            DomainError::UnresolvedPlaceholder {
                placeholder: "nope".into(),
                template: "{nope}/x".into()
            }
        );
        assert!(interpolate("{list}", &bag()).is_err());
    }

    #[test]
    fn context_serializes_flat() {
        let ctx = RenderContext::new(bag(), vec![]).with("extra", true);
        let value = ctx.to_value();
        assert_eq!(value["export"], "app-android");
        assert_eq!(value["extra"], true);
        assert!(value["methods"].as_array().unwrap().is_empty());
        assert_eq!(ctx.get("outer.name"), Some(&json!("android")));
    }
}
