//! JSON schema description.
//!
//! A schema is a JSON object mapping field names to field specs, in
//! declaration order:
//!
//! ```json
//! {
//!   "Mode": {"start": 4, "width": 1, "type": "bool"},
//!   "Body": {
//!     "start": 0, "width": 4, "type": "bitdict", "selector": "Mode",
//!     "subtype": [
//!       {"A": {"start": 0, "width": 4, "type": "uint", "valid": {"range": [[0, 10]]}}},
//!       null
//!     ]
//!   }
//! }
//! ```
//!
//! This module turns such a document into [Field]s, rejecting what a typed
//! [Field] cannot represent (missing keys, negative or non-integer positions,
//! unknown type names, malformed `valid` blocks). Everything else is checked
//! by [crate::schema::validate] when the fields are compiled.

use serde_json::Value as Json;

use crate::{
    errors::SchemaError,
    field::{Field, FieldType, ValidDef},
    schema::is_identifier,
    value::Value,
};

/// Parses a JSON schema mapping into raw fields.
pub fn schema_from_json(schema: &Json) -> Result<Vec<Field>, SchemaError> {
    let Json::Object(map) = schema else {
        return Err(SchemaError::NotAMapping("schema".to_string()));
    };

    map.iter()
        .map(|(name, spec)| field_from_json(name, spec))
        .collect()
}

fn field_from_json(name: &str, spec: &Json) -> Result<Field, SchemaError> {
    if !is_identifier(name) {
        return Err(SchemaError::InvalidFieldName(name.to_string()));
    }

    let Json::Object(spec) = spec else {
        return Err(SchemaError::NotAMapping(format!("field spec for {name}")));
    };

    for key in ["start", "width", "type"] {
        if !spec.contains_key(key) {
            return Err(SchemaError::MissingKey {
                field: name.to_string(),
                key,
            });
        }
    }

    let start = as_usize(&spec["start"]).ok_or_else(|| SchemaError::InvalidStart {
        field: name.to_string(),
        value: spec["start"].to_string(),
    })?;
    let width = as_usize(&spec["width"]).ok_or_else(|| SchemaError::InvalidWidth {
        field: name.to_string(),
        value: spec["width"].to_string(),
    })?;
    let ty = spec["type"]
        .as_str()
        .and_then(|s| s.parse::<FieldType>().ok())
        .ok_or_else(|| SchemaError::InvalidType {
            field: name.to_string(),
            value: match &spec["type"] {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            },
        })?;

    let mut field = Field::new(name, start, width, ty);

    if let Some(description) = spec.get("description") {
        let description = description
            .as_str()
            .ok_or_else(|| SchemaError::InvalidDescription(name.to_string()))?;
        field.description = Some(description.to_string());
    }

    field.default = spec.get("default").map(Value::from);

    if let Some(valid) = spec.get("valid") {
        field.valid = Some(valid_from_json(name, valid)?);
    }

    if let Some(subtype) = spec.get("subtype") {
        let Json::Array(slots) = subtype else {
            return Err(SchemaError::MissingSubtype(name.to_string()));
        };

        let mut variants = Vec::with_capacity(slots.len());
        for (index, slot) in slots.iter().enumerate() {
            let variant = match slot {
                Json::Null => None,
                other => Some(schema_from_json(other).map_err(|source| SchemaError::Variant {
                    field: name.to_string(),
                    index,
                    source: Box::new(source),
                })?),
            };
            variants.push(variant);
        }
        field.subtype = Some(variants);
    }

    if let Some(selector) = spec.get("selector") {
        let selector = selector
            .as_str()
            .ok_or_else(|| SchemaError::MissingSelector(name.to_string()))?;
        field.selector = Some(selector.to_string());
    }

    Ok(field)
}

fn as_usize(value: &Json) -> Option<usize> {
    value.as_u64().and_then(|v| usize::try_from(v).ok())
}

fn valid_from_json(name: &str, valid: &Json) -> Result<ValidDef, SchemaError> {
    let invalid = |reason| SchemaError::InvalidValid {
        field: name.to_string(),
        reason,
    };

    let Json::Object(valid) = valid else {
        return Err(invalid("must be a mapping"));
    };
    if valid.is_empty() {
        return Err(invalid("cannot be empty"));
    }

    let mut def = ValidDef::default();

    if let Some(values) = valid.get("value") {
        let Json::Array(values) = values else {
            return Err(invalid("`value` must be a set"));
        };
        def.value = Some(values.iter().map(Value::from).collect());
    }

    if let Some(ranges) = valid.get("range") {
        def.range = Some(ranges_from_json(name, ranges)?);
    }

    if def.value.is_none() && def.range.is_none() {
        return Err(invalid("must contain `value` or `range`"));
    }

    Ok(def)
}

fn ranges_from_json(name: &str, ranges: &Json) -> Result<Vec<Vec<i128>>, SchemaError> {
    let Json::Array(ranges) = ranges else {
        return Err(SchemaError::InvalidValid {
            field: name.to_string(),
            reason: "`range` must be a list",
        });
    };

    let tuple_error = || SchemaError::InvalidRangeTuple {
        field: name.to_string(),
    };

    ranges
        .iter()
        .map(|tuple| -> Result<Vec<i128>, SchemaError> {
            let Json::Array(items) = tuple else {
                return Err(tuple_error());
            };
            items
                .iter()
                .map(|item| match Value::from(item) {
                    Value::Int(i) => Ok(i),
                    _ => Err(tuple_error()),
                })
                .collect()
        })
        .collect()
}
