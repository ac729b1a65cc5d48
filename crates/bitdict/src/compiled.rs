//! Compiled record types: a validated, frozen schema plus its variant table.

use std::{collections::BTreeMap, collections::HashMap, fmt, sync::Arc};

use crate::{
    bits::{self, MAX_RECORD_BITS},
    errors::SchemaError,
    field::{Field, FieldType},
    record::RecordRef,
    schema,
    validity::Valid,
    value::Scalar,
};

/// A validated field of a [RecordType].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CompiledField {
    pub name: String,
    pub start: usize,
    pub width: usize,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: CompiledKind,
    pub description: String,
    /// Index of the bitdict field this field selects the variant of, if any.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub selects: Option<usize>,
}

/// Normalized kind of a field, with its filled-in default and constraint.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum CompiledKind {
    Bool {
        default: bool,
        valid: Option<Valid>,
    },
    UInt {
        default: u64,
        valid: Option<Valid>,
    },
    Int {
        default: i64,
        valid: Option<Valid>,
    },
    Reserved,
    BitDict {
        /// Index of the selector field in the same schema.
        selector: usize,
        /// Variant record types indexed by selector value; `None` for null slots.
        #[cfg_attr(feature = "serde", serde(rename = "subtype"))]
        variants: Vec<Option<RecordType>>,
    },
}

impl CompiledField {
    /// One past the most significant bit of the field.
    pub fn end(&self) -> usize {
        self.start + self.width
    }

    pub fn ty(&self) -> FieldType {
        match self.kind {
            CompiledKind::Bool { .. } => FieldType::Bool,
            CompiledKind::UInt { .. } => FieldType::UInt,
            CompiledKind::Int { .. } => FieldType::Int,
            CompiledKind::Reserved => FieldType::Reserved,
            CompiledKind::BitDict { .. } => FieldType::BitDict,
        }
    }

    /// Reset value of the field. Reserved and bitdict fields have none.
    pub fn default_value(&self) -> Option<Scalar> {
        match self.kind {
            CompiledKind::Bool { default, .. } => Some(Scalar::Bool(default)),
            CompiledKind::UInt { default, .. } => Some(Scalar::UInt(default)),
            CompiledKind::Int { default, .. } => Some(Scalar::Int(default)),
            CompiledKind::Reserved | CompiledKind::BitDict { .. } => None,
        }
    }

    pub fn valid(&self) -> Option<&Valid> {
        match &self.kind {
            CompiledKind::Bool { valid, .. }
            | CompiledKind::UInt { valid, .. }
            | CompiledKind::Int { valid, .. } => valid.as_ref(),
            CompiledKind::Reserved | CompiledKind::BitDict { .. } => None,
        }
    }

    /// Variant table of a bitdict field.
    pub fn variants(&self) -> Option<&[Option<RecordType>]> {
        match &self.kind {
            CompiledKind::BitDict { variants, .. } => Some(variants),
            _ => None,
        }
    }
}

/// Predicate run by [RecordRef::verify].
pub type Verifier = Arc<dyn Fn(&RecordRef<'_>) -> bool + Send + Sync>;

#[derive(Clone)]
struct Layout {
    name: String,
    title: String,
    total_width: usize,
    fields: Vec<CompiledField>,
    index: HashMap<String, usize>,
}

/// An immutable record layout compiled from a schema. Cheap to clone and
/// shared by every [crate::record::Record] created from it.
///
/// Use [RecordType::compile] to build one from [Field]s, then
/// [RecordType::create] (or one of the `from_*` constructors) to make records.
#[derive(Clone)]
pub struct RecordType {
    layout: Arc<Layout>,
    verifier: Verifier,
}

impl RecordType {
    /// Compiles `fields` into a record type named `BitDict`.
    pub fn compile(fields: &[Field]) -> Result<Self, SchemaError> {
        Self::compile_named(fields, "BitDict", "BitDict")
    }

    /// Compiles `fields` with an explicit type name and documentation title.
    pub fn compile_named(
        fields: &[Field],
        name: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let fields = schema::validate(fields)?;

        let total_width = fields.iter().map(CompiledField::end).max().unwrap_or(0);
        if total_width > MAX_RECORD_BITS {
            return Err(SchemaError::RecordTooWide(total_width));
        }

        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        let name = name.into();
        tracing::debug!(
            record = %name,
            fields = fields.len(),
            total_width,
            "compiled record type"
        );

        Ok(RecordType {
            layout: Arc::new(Layout {
                name,
                title: title.into(),
                total_width,
                fields,
                index,
            }),
            verifier: Arc::new(|_| true),
        })
    }

    /// Compiles a JSON schema mapping. See [crate::json::schema_from_json].
    pub fn from_json(schema: &serde_json::Value) -> Result<Self, SchemaError> {
        Self::compile(&crate::json::schema_from_json(schema)?)
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn title(&self) -> &str {
        &self.layout.title
    }

    /// Number of bits spanned by the record: `max(start + width)`.
    pub fn total_width(&self) -> usize {
        self.layout.total_width
    }

    /// Length of the big-endian byte encoding.
    pub fn byte_len(&self) -> usize {
        bits::byte_len(self.layout.total_width)
    }

    /// The normalized schema in declaration order.
    pub fn fields(&self) -> &[CompiledField] {
        &self.layout.fields
    }

    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.index_of(name).map(|i| &self.layout.fields[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.layout.index.get(name).copied()
    }

    /// Bitdict field name to variant list.
    pub fn variant_table(&self) -> BTreeMap<&str, &[Option<RecordType>]> {
        self.layout
            .fields
            .iter()
            .filter_map(|f| f.variants().map(|v| (f.name.as_str(), v)))
            .collect()
    }

    /// Mutable access to the variant type selected by `index` in bitdict
    /// field `field`, e.g. to give it its own verifier. The layout is copied
    /// on write, so records created earlier keep the previous variant.
    pub fn variant_mut(&mut self, field: &str, index: usize) -> Option<&mut RecordType> {
        let position = self.index_of(field)?;
        let layout = Arc::make_mut(&mut self.layout);
        match &mut layout.fields[position].kind {
            CompiledKind::BitDict { variants, .. } => variants.get_mut(index)?.as_mut(),
            _ => None,
        }
    }

    /// Replaces the predicate run by `verify()`. Records created from this
    /// value (or its clones made afterwards) use the new predicate.
    pub fn set_verifier<F>(&mut self, verifier: F)
    where
        F: Fn(&RecordRef<'_>) -> bool + Send + Sync + 'static,
    {
        self.verifier = Arc::new(verifier);
    }

    pub fn with_verifier<F>(mut self, verifier: F) -> Self
    where
        F: Fn(&RecordRef<'_>) -> bool + Send + Sync + 'static,
    {
        self.set_verifier(verifier);
        self
    }

    pub(crate) fn verify(&self, record: &RecordRef<'_>) -> bool {
        (self.verifier)(record)
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.layout.name)
            .field("total_width", &self.layout.total_width)
            .field("fields", &self.layout.fields)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RecordType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("RecordType", 4)?;
        s.serialize_field("name", &self.layout.name)?;
        s.serialize_field("title", &self.layout.title)?;
        s.serialize_field("total_width", &self.layout.total_width)?;
        s.serialize_field("fields", &self.layout.fields)?;
        s.end()
    }
}
