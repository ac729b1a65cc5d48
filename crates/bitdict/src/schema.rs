//! Schema validation: checks a list of raw [Field]s and normalizes it into
//! [CompiledField]s ready to be frozen into a [RecordType].
//!
//! Checks run per field in declaration order: identifier, start/width, type
//! rules, default, `valid`, then the bitdict linkage (which compiles every
//! non-null variant schema recursively). A final pass rejects overlapping
//! bit ranges regardless of declaration order.

use std::collections::HashSet;

use crate::{
    bits::{MAX_RECORD_BITS, MAX_SCALAR_BITS},
    compiled::{CompiledField, CompiledKind, RecordType},
    errors::SchemaError,
    field::{Field, FieldType, ValidDef},
    validity::{Valid, ValidRange},
    value::Value,
};

/// Validates `fields` and returns the normalized schema. Selector fields come
/// back with their `selects` reverse link set, and every bitdict field carries
/// its compiled variant table.
pub fn validate(fields: &[Field]) -> Result<Vec<CompiledField>, SchemaError> {
    let mut seen = HashSet::with_capacity(fields.len());
    let mut compiled = Vec::with_capacity(fields.len());

    for field in fields {
        if !is_identifier(&field.name) {
            return Err(SchemaError::InvalidFieldName(field.name.clone()));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField(field.name.clone()));
        }

        compiled.push(validate_field(field, fields)?);
    }

    link_selectors(&mut compiled)?;
    check_overlapping(&compiled)?;

    Ok(compiled)
}

/// Python-style identifier: a letter or underscore followed by letters,
/// digits or underscores.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn validate_field(field: &Field, schema: &[Field]) -> Result<CompiledField, SchemaError> {
    let name = &field.name;

    if field.width == 0 {
        return Err(SchemaError::InvalidWidth {
            field: name.clone(),
            value: field.width.to_string(),
        });
    }

    let max = match field.ty {
        FieldType::Bool | FieldType::UInt | FieldType::Int => MAX_SCALAR_BITS,
        FieldType::Reserved | FieldType::BitDict => MAX_RECORD_BITS,
    };
    if field.width > max {
        return Err(SchemaError::WidthTooLarge {
            field: name.clone(),
            width: field.width,
            max,
        });
    }

    match field.start.checked_add(field.width) {
        Some(end) if end <= MAX_RECORD_BITS => {}
        end => return Err(SchemaError::RecordTooWide(end.unwrap_or(usize::MAX))),
    }

    if field.ty == FieldType::Bool && field.width != 1 {
        return Err(SchemaError::BoolWidth {
            field: name.clone(),
            width: field.width,
        });
    }

    let kind = match field.ty {
        FieldType::Bool => {
            let default = match &field.default {
                None => false,
                Some(Value::Bool(b)) => *b,
                Some(_) => {
                    return Err(SchemaError::DefaultType {
                        field: name.clone(),
                        expected: "bool",
                    });
                }
            };
            CompiledKind::Bool {
                default,
                valid: compile_valid(field)?,
            }
        }
        FieldType::UInt => {
            let default = int_default(field)?;
            CompiledKind::UInt {
                default: default as u64,
                valid: compile_valid(field)?,
            }
        }
        FieldType::Int => {
            let default = int_default(field)?;
            CompiledKind::Int {
                default: default as i64,
                valid: compile_valid(field)?,
            }
        }
        FieldType::Reserved => {
            no_default(field, "reserved")?;
            // Reserved bits are never read, so a declared constraint is only checked.
            compile_valid(field)?;
            CompiledKind::Reserved
        }
        FieldType::BitDict => {
            no_default(field, "bitdict")?;
            if field.valid.is_some() {
                return Err(SchemaError::ValidNotAllowed(name.clone()));
            }
            compile_bitdict(field, schema)?
        }
    };

    Ok(CompiledField {
        name: name.clone(),
        start: field.start,
        width: field.width,
        kind,
        description: field.description.clone().unwrap_or_default(),
        selects: None,
    })
}

fn no_default(field: &Field, kind: &'static str) -> Result<(), SchemaError> {
    match field.default {
        Some(_) => Err(SchemaError::DefaultNotAllowed {
            field: field.name.clone(),
            kind,
        }),
        None => Ok(()),
    }
}

fn int_default(field: &Field) -> Result<i128, SchemaError> {
    let Some(default) = &field.default else {
        return Ok(0);
    };

    let value = default.as_int().ok_or_else(|| SchemaError::DefaultType {
        field: field.name.clone(),
        expected: "int",
    })?;

    if !in_domain(field.ty, field.width, value) {
        return Err(SchemaError::DefaultOutOfRange {
            field: field.name.clone(),
            value,
        });
    }

    Ok(value)
}

/// Whether `value` is representable by a field of `ty` and `width`.
pub(crate) fn in_domain(ty: FieldType, width: usize, value: i128) -> bool {
    match ty {
        FieldType::Bool => value == 0 || value == 1,
        FieldType::Int => {
            let half = 1i128 << (width - 1).min(126);
            -half <= value && value < half
        }
        FieldType::UInt | FieldType::Reserved | FieldType::BitDict => {
            value >= 0 && (width >= 127 || value < (1i128 << width))
        }
    }
}

fn compile_valid(field: &Field) -> Result<Option<Valid>, SchemaError> {
    field
        .valid
        .as_ref()
        .map(|def| valid_from_def(field, def))
        .transpose()
}

fn valid_from_def(field: &Field, def: &ValidDef) -> Result<Valid, SchemaError> {
    let name = &field.name;

    if def.value.is_none() && def.range.is_none() {
        return Err(SchemaError::InvalidValid {
            field: name.clone(),
            reason: "must contain `value` or `range`",
        });
    }

    let mut valid = Valid::default();

    if let Some(values) = &def.value {
        if values.is_empty() {
            return Err(SchemaError::InvalidValid {
                field: name.clone(),
                reason: "`value` set cannot be empty",
            });
        }

        let mut set = std::collections::BTreeSet::new();
        for v in values {
            let v = v.as_int().ok_or_else(|| SchemaError::ValidValueType {
                field: name.clone(),
            })?;
            if !in_domain(field.ty, field.width, v) {
                return Err(SchemaError::ValidValueOutOfRange {
                    field: name.clone(),
                    value: v,
                });
            }
            set.insert(v);
        }
        valid.value = Some(set);
    }

    if let Some(tuples) = &def.range {
        if tuples.is_empty() {
            return Err(SchemaError::InvalidValid {
                field: name.clone(),
                reason: "`range` list cannot be empty",
            });
        }

        let mut ranges = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            let range =
                ValidRange::from_tuple(tuple).ok_or_else(|| SchemaError::InvalidRangeTuple {
                    field: name.clone(),
                })?;
            // Ranges are monotonic, so the whole expansion is in domain iff both ends are.
            if let Some((lo, hi)) = range.bounds() {
                for v in [lo, hi] {
                    if !in_domain(field.ty, field.width, v) {
                        return Err(SchemaError::ValidValueOutOfRange {
                            field: name.clone(),
                            value: v,
                        });
                    }
                }
            }
            ranges.push(range);
        }
        valid.range = Some(ranges);
    }

    Ok(valid)
}

fn compile_bitdict(field: &Field, schema: &[Field]) -> Result<CompiledKind, SchemaError> {
    let name = &field.name;

    let subtypes = field
        .subtype
        .as_ref()
        .ok_or_else(|| SchemaError::MissingSubtype(name.clone()))?;
    let selector_name = field
        .selector
        .as_ref()
        .ok_or_else(|| SchemaError::MissingSelector(name.clone()))?;

    let (selector, selector_field) = schema
        .iter()
        .enumerate()
        .find(|(_, f)| &f.name == selector_name)
        .ok_or_else(|| SchemaError::UnknownSelector {
            field: name.clone(),
            selector: selector_name.clone(),
        })?;

    if !matches!(selector_field.ty, FieldType::Bool | FieldType::UInt) {
        return Err(SchemaError::SelectorType {
            field: name.clone(),
            selector: selector_name.clone(),
        });
    }
    if selector_field.width > 16 {
        return Err(SchemaError::SelectorWidth {
            field: name.clone(),
            selector: selector_name.clone(),
            width: selector_field.width,
        });
    }

    if subtypes.is_empty() {
        return Err(SchemaError::EmptySubtypes(name.clone()));
    }

    let selector_valid = compile_valid(selector_field)?;

    let mut variants = Vec::with_capacity(subtypes.len());
    for (index, subtype) in subtypes.iter().enumerate() {
        match subtype {
            None => {
                if crate::validity::is_valid(selector_valid.as_ref(), index as i128) {
                    return Err(SchemaError::UnimplementedVariant {
                        field: name.clone(),
                        index,
                    });
                }
                variants.push(None);
            }
            Some(sub) => {
                let variant = RecordType::compile_named(
                    sub,
                    format!("{name}{index}"),
                    format!("{name}: {selector_name} = {index}"),
                )
                .map_err(|source| SchemaError::Variant {
                    field: name.clone(),
                    index,
                    source: Box::new(source),
                })?;
                variants.push(Some(variant));
            }
        }
    }

    let default_index = selector_field
        .default
        .as_ref()
        .and_then(Value::as_int)
        .unwrap_or(0);
    let implemented = usize::try_from(default_index)
        .ok()
        .and_then(|i| variants.get(i))
        .is_some_and(Option::is_some);
    if !implemented {
        return Err(SchemaError::DefaultSelectsNoVariant {
            field: name.clone(),
            index: default_index.max(0) as usize,
        });
    }

    Ok(CompiledKind::BitDict { selector, variants })
}

/// Writes the selector -> bitdict reverse links. A selector governs at most
/// one bitdict field.
fn link_selectors(fields: &mut [CompiledField]) -> Result<(), SchemaError> {
    for index in 0..fields.len() {
        let CompiledKind::BitDict { selector, .. } = fields[index].kind else {
            continue;
        };

        if let Some(owner) = fields[selector].selects {
            return Err(SchemaError::SelectorShared {
                selector: fields[selector].name.clone(),
                owner: fields[owner].name.clone(),
            });
        }
        fields[selector].selects = Some(index);
    }

    Ok(())
}

/// Rejects any two fields whose `[start, start + width)` ranges intersect.
pub fn check_overlapping(fields: &[CompiledField]) -> Result<(), SchemaError> {
    let mut sorted: Vec<&CompiledField> = fields.iter().collect();
    sorted.sort_by_key(|f| f.start);

    let mut widest: Option<&CompiledField> = None;
    for field in sorted {
        if let Some(prev) = widest {
            if field.start < prev.end() {
                return Err(SchemaError::Overlap {
                    bit: field.start,
                    first: prev.name.clone(),
                    second: field.name.clone(),
                });
            }
        }
        if widest.is_none_or(|prev| field.end() > prev.end()) {
            widest = Some(field);
        }
    }

    Ok(())
}
