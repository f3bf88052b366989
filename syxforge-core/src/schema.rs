use jsonschema::JSONSchema;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::params::Assignment;
use crate::{ForgeError, Result};

/// Per-parameter bounds taken from the schema's `properties`. An absent
/// bound does not constrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SchemaRange {
    #[serde(default)]
    pub minimum: Option<i64>,
    #[serde(default)]
    pub maximum: Option<i64>,
}

/// Pure predicate over a complete parameter assignment.
pub trait AssignmentValidator {
    fn is_valid(&self, assignment: &Assignment) -> bool;
}

impl<F> AssignmentValidator for F
where
    F: Fn(&Assignment) -> bool,
{
    fn is_valid(&self, assignment: &Assignment) -> bool {
        self(assignment)
    }
}

/// Compiled patch schema plus the property ranges it declares.
pub struct PatchSchema {
    compiled: JSONSchema,
    ranges: BTreeMap<String, SchemaRange>,
}

impl PatchSchema {
    pub fn from_value(doc: &Value) -> Result<Self> {
        let compiled = JSONSchema::compile(doc)
            .map_err(|err| ForgeError::Config(format!("failed to compile JSON schema: {err}")))?;

        let properties = doc
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ForgeError::Config("JSON schema has no 'properties' object".to_string())
            })?;

        let mut ranges = BTreeMap::new();
        for (name, prop) in properties {
            let range: SchemaRange = serde_json::from_value(prop.clone()).map_err(|err| {
                ForgeError::Config(format!("schema property '{name}' is malformed: {err}"))
            })?;
            ranges.insert(name.clone(), range);
        }

        Ok(Self { compiled, ranges })
    }

    pub fn parse(json: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(json)?;
        Self::from_value(&doc)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            ForgeError::Config(format!(
                "failed to read JSON schema '{}': {err}",
                path.display()
            ))
        })?;
        Self::parse(&raw)
    }

    pub fn ranges(&self) -> &BTreeMap<String, SchemaRange> {
        &self.ranges
    }
}

impl AssignmentValidator for PatchSchema {
    fn is_valid(&self, assignment: &Assignment) -> bool {
        match serde_json::to_value(assignment) {
            Ok(instance) => self.compiled.is_valid(&instance),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for PatchSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchSchema")
            .field("ranges", &self.ranges)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "cutoff": {"type": "integer", "minimum": 10, "maximum": 100},
            "reso": {"type": "integer", "maximum": 50},
            "mode": {"type": "integer", "enum": [0, 2]}
        }
    }"#;

    #[test]
    fn collects_property_ranges() {
        let schema = PatchSchema::parse(SCHEMA).unwrap();
        let ranges = schema.ranges();
        assert_eq!(
            ranges["cutoff"],
            SchemaRange {
                minimum: Some(10),
                maximum: Some(100)
            }
        );
        assert_eq!(ranges["reso"].minimum, None);
        assert_eq!(ranges["mode"], SchemaRange::default());
    }

    #[test]
    fn validates_full_assignments() {
        let schema = PatchSchema::parse(SCHEMA).unwrap();
        let ok = Assignment::from([
            ("cutoff".to_string(), 20),
            ("reso".to_string(), 5),
            ("mode".to_string(), 2),
        ]);
        assert!(schema.is_valid(&ok));

        let mut bad = ok.clone();
        bad.insert("mode".to_string(), 1);
        assert!(!schema.is_valid(&bad));

        let mut out_of_range = ok;
        out_of_range.insert("cutoff".to_string(), 101);
        assert!(!schema.is_valid(&out_of_range));
    }

    #[test]
    fn closures_act_as_validators() {
        let even = |a: &Assignment| a.values().all(|v| v % 2 == 0);
        assert!(even.is_valid(&Assignment::from([("x".to_string(), 4)])));
        assert!(!even.is_valid(&Assignment::from([("x".to_string(), 3)])));
    }

    #[test]
    fn schema_without_properties_is_a_config_error() {
        let err = PatchSchema::parse(r#"{"type": "object"}"#).unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }
}
