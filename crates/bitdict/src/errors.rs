//! Error types for schema validation and record access.

/// Errors produced while validating a schema into a [crate::compiled::RecordType].
///
/// A schema that fails validation never yields a usable record type.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema (or one field spec inside it) is not a mapping.
    #[error("{0} must be a mapping")]
    NotAMapping(String),
    /// Field name is not a valid identifier.
    #[error("invalid field name: {0:?}")]
    InvalidFieldName(String),
    /// Field name declared twice in the same schema.
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
    /// One of `start`, `width` or `type` is absent.
    #[error("field {field}: missing required key `{key}`")]
    MissingKey { field: String, key: &'static str },
    /// `start` is negative or not an integer.
    #[error("field {field}: invalid start value {value}")]
    InvalidStart { field: String, value: String },
    /// `width` is zero, negative or not an integer.
    #[error("field {field}: invalid width value {value}")]
    InvalidWidth { field: String, value: String },
    /// Field is wider than its kind can store.
    #[error("field {field}: width {width} exceeds the {max} bit limit")]
    WidthTooLarge { field: String, width: usize, max: usize },
    /// `type` is not one of `bool`, `uint`, `int`, `reserved`, `bitdict`.
    #[error("field {field}: invalid type value {value:?}")]
    InvalidType { field: String, value: String },
    /// `bool` fields must be exactly one bit wide.
    #[error("field {field}: bool fields must have width 1, got {width}")]
    BoolWidth { field: String, width: usize },
    /// `description` is present but not a string.
    #[error("field {0}: description must be a string")]
    InvalidDescription(String),
    /// `reserved` and `bitdict` fields cannot declare a default.
    #[error("field {field}: {kind} fields cannot have a default value")]
    DefaultNotAllowed { field: String, kind: &'static str },
    /// Default value has the wrong host type for the field.
    #[error("field {field}: default must be of type {expected}")]
    DefaultType { field: String, expected: &'static str },
    /// Default value does not fit in the field.
    #[error("field {field}: default value {value} out of range")]
    DefaultOutOfRange { field: String, value: i128 },
    /// `bitdict` fields cannot declare a `valid` constraint.
    #[error("field {0}: `valid` is not allowed for bitdict fields")]
    ValidNotAllowed(String),
    /// `valid` is malformed: not a mapping, empty, or missing both keys.
    #[error("field {field}: invalid `valid` constraint: {reason}")]
    InvalidValid { field: String, reason: &'static str },
    /// A `valid.value` entry is not a boolean or integer.
    #[error("field {field}: invalid value type in `valid` set")]
    ValidValueType { field: String },
    /// A `valid.range` entry is not a 1 to 3 element integer tuple (or has a zero step).
    #[error("field {field}: invalid range tuple in `valid` list")]
    InvalidRangeTuple { field: String },
    /// A `valid` value (or expanded range value) does not fit in the field.
    #[error("field {field}: valid value {value} out of range")]
    ValidValueOutOfRange { field: String, value: i128 },
    /// `bitdict` field without a subtype list.
    #[error("field {0}: bitdict fields require a `subtype` list")]
    MissingSubtype(String),
    /// `bitdict` field without a selector name.
    #[error("field {0}: bitdict fields require a `selector` field")]
    MissingSelector(String),
    /// Selector names a field not declared in the same schema.
    #[error("field {field}: selector {selector} is not declared")]
    UnknownSelector { field: String, selector: String },
    /// Selector is not a `bool` or `uint` field.
    #[error("field {field}: selector {selector} must be of type bool or uint")]
    SelectorType { field: String, selector: String },
    /// Selector is wider than 16 bits (65536 variants).
    #[error("field {field}: selector {selector} width {width} exceeds 16 bits")]
    SelectorWidth { field: String, selector: String, width: usize },
    /// The same selector already governs another bitdict field.
    #[error("selector {selector} already governs bitdict field {owner}")]
    SelectorShared { selector: String, owner: String },
    /// `subtype` list has no entries.
    #[error("field {0}: bitdict fields must have at least one subtype")]
    EmptySubtypes(String),
    /// A null subtype slot is a valid selector value.
    #[error("field {field}: subtype {index} is a valid selection but no variant is defined")]
    UnimplementedVariant { field: String, index: usize },
    /// The selector default indexes a slot with no variant.
    #[error("field {field}: selector default {index} selects no variant")]
    DefaultSelectsNoVariant { field: String, index: usize },
    /// A nested variant schema failed validation.
    #[error("field {field}: variant {index}: {source}")]
    Variant {
        field: String,
        index: usize,
        source: Box<SchemaError>,
    },
    /// Two fields claim the same bit.
    #[error("overlapping bit definitions: bit {bit} is used by {first} and {second}")]
    Overlap {
        bit: usize,
        first: String,
        second: String,
    },
    /// The record does not fit the 128 bit storage integer.
    #[error("record width {0} exceeds 128 bits")]
    RecordTooWide(usize),
}

/// Errors produced when reading or writing a [crate::record::Record].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Field is not declared at this level of the record.
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// Reserved fields are padding and cannot be read or written.
    #[error("field {0} is reserved")]
    ReadOnlyField(String),
    /// Value has the wrong host type for the field.
    #[error("field {field}: expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    /// Value does not fit in the field.
    #[error("field {field}: value {value} out of range")]
    OutOfRange { field: String, value: i128 },
    /// Integer seed does not fit the record width.
    #[error("integer {value} out of range for bit width {width}")]
    SeedOutOfRange { value: String, width: usize },
    /// Byte seed is longer than the record's byte length.
    #[error("{len} bytes too long for bit width {width}")]
    BytesTooLong { len: usize, width: usize },
    /// The selector value indexes a slot with no variant.
    #[error("field {field}: no variant defined for selector value {selector_value}")]
    MissingVariant { field: String, selector_value: u128 },
}
