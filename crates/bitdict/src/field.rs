//! Definition of raw, unvalidated fields used to build a [crate::compiled::RecordType].

use std::{fmt, str::FromStr};

use crate::value::Value;

/// A single named field of a schema, as declared.
///
/// Nothing here is checked until the schema is compiled; see
/// [crate::schema::validate].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Identifier used to address the field.
    pub name: String,
    /// Least significant bit of the field.
    pub start: usize,
    /// Number of bits the field occupies.
    pub width: usize,
    pub ty: FieldType,
    /// Value assigned on reset. Omitted defaults become `false`/`0`.
    pub default: Option<Value>,
    /// Declared value validity constraint.
    pub valid: Option<ValidDef>,
    pub description: Option<String>,
    /// Variant schemas of a `bitdict` field, indexed by selector value.
    pub subtype: Option<Vec<Option<Vec<Field>>>>,
    /// Name of the field whose value selects the active variant.
    pub selector: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, start: usize, width: usize, ty: FieldType) -> Self {
        Field {
            name: name.into(),
            start,
            width,
            ty,
            default: None,
            valid: None,
            description: None,
            subtype: None,
            selector: None,
        }
    }

    pub fn bool(name: impl Into<String>, start: usize) -> Self {
        Field::new(name, start, 1, FieldType::Bool)
    }

    pub fn uint(name: impl Into<String>, start: usize, width: usize) -> Self {
        Field::new(name, start, width, FieldType::UInt)
    }

    pub fn int(name: impl Into<String>, start: usize, width: usize) -> Self {
        Field::new(name, start, width, FieldType::Int)
    }

    pub fn reserved(name: impl Into<String>, start: usize, width: usize) -> Self {
        Field::new(name, start, width, FieldType::Reserved)
    }

    /// A nested record field whose layout is `subtype[selector value]`.
    /// `None` slots declare selector values with no variant.
    pub fn bitdict(
        name: impl Into<String>,
        start: usize,
        width: usize,
        selector: impl Into<String>,
        subtype: Vec<Option<Vec<Field>>>,
    ) -> Self {
        let mut field = Field::new(name, start, width, FieldType::BitDict);
        field.selector = Some(selector.into());
        field.subtype = Some(subtype);
        field
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_valid_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.valid.get_or_insert_with(ValidDef::default).value =
            Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Adds `range(*tuple)` style constraints: `[stop]`, `[start, stop]` or
    /// `[start, stop, step]`.
    pub fn with_valid_ranges<I>(mut self, ranges: I) -> Self
    where
        I: IntoIterator<Item = Vec<i128>>,
    {
        self.valid.get_or_insert_with(ValidDef::default).range = Some(ranges.into_iter().collect());
        self
    }
}

/// Declared kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldType {
    /// One bit, read as `true`/`false`.
    Bool,
    /// Unsigned integer.
    UInt,
    /// Two's complement signed integer.
    Int,
    /// Padding; neither readable nor writable.
    Reserved,
    /// Nested record chosen by a selector field.
    BitDict,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::UInt => "uint",
            FieldType::Int => "int",
            FieldType::Reserved => "reserved",
            FieldType::BitDict => "bitdict",
        }
    }
}

impl FromStr for FieldType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(FieldType::Bool),
            "uint" => Ok(FieldType::UInt),
            "int" => Ok(FieldType::Int),
            "reserved" => Ok(FieldType::Reserved),
            "bitdict" => Ok(FieldType::BitDict),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `valid` constraint: a value set and/or a list of range tuples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidDef {
    pub value: Option<Vec<Value>>,
    pub range: Option<Vec<Vec<i128>>>,
}
