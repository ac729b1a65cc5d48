//! Record instances: a packed integer plus lazily created variant sub-records.
//!
//! A [Record] owns an arena of nodes. Node 0 is the root; every other node is
//! a variant sub-record cached under `(bitdict field, selector value)` in its
//! parent node. Children keep a non-owning link `(parent, field)` back to the
//! node that created them, used only to push their integer into the parent's
//! bit range after a mutation. Cached variants are never evicted, so switching
//! a selector back to a previously visited value restores that variant's last
//! state.
//!
//! Reads go through [RecordRef], writes through [RecordMut]; both address one
//! node of the arena. [Record] forwards to the root node.

use std::{collections::BTreeMap, collections::HashMap, fmt};

use crate::{
    bits,
    compiled::{CompiledField, CompiledKind, RecordType},
    errors::AccessError,
    validity::{Inspection, Violation, is_valid},
    value::{Scalar, Value},
};

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Copy)]
struct ParentLink {
    node: NodeId,
    field: usize,
}

#[derive(Debug, Clone)]
struct Node {
    ty: RecordType,
    value: u128,
    /// `(field index, selector value)` -> cached variant node.
    variants: HashMap<(usize, usize), NodeId>,
    parent: Option<ParentLink>,
}

/// A record instance created from a [RecordType].
#[derive(Clone)]
pub struct Record {
    nodes: Vec<Node>,
}

/// Read access to a record or one of its variant sub-records.
#[derive(Clone, Copy)]
pub struct RecordRef<'a> {
    record: &'a Record,
    node: NodeId,
}

/// Write access to a record or one of its variant sub-records. Every
/// mutation is pushed up into the enclosing records.
pub struct RecordMut<'a> {
    record: &'a mut Record,
    node: NodeId,
}

/// A field read from a record.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Bool(bool),
    UInt(u64),
    Int(i64),
    /// The currently selected variant of a bitdict field.
    Record(RecordRef<'a>),
}

impl<'a> FieldValue<'a> {
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            FieldValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match *self {
            FieldValue::UInt(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            FieldValue::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<RecordRef<'a>> {
        match *self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Scalar view of the value; `None` for sub-records.
    pub fn scalar(&self) -> Option<Scalar> {
        match *self {
            FieldValue::Bool(b) => Some(Scalar::Bool(b)),
            FieldValue::UInt(u) => Some(Scalar::UInt(u)),
            FieldValue::Int(i) => Some(Scalar::Int(i)),
            FieldValue::Record(_) => None,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, AccessError> {
        match self {
            FieldValue::Record(r) => r.to_json(),
            other => Ok(other.scalar().map(Scalar::to_json).unwrap_or_default()),
        }
    }
}

impl PartialEq<bool> for FieldValue<'_> {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

impl PartialEq<i64> for FieldValue<'_> {
    fn eq(&self, other: &i64) -> bool {
        match *self {
            FieldValue::UInt(u) => u as i128 == *other as i128,
            FieldValue::Int(i) => i == *other,
            _ => false,
        }
    }
}

impl PartialEq<u64> for FieldValue<'_> {
    fn eq(&self, other: &u64) -> bool {
        match *self {
            FieldValue::UInt(u) => u == *other,
            FieldValue::Int(i) => i as i128 == *other as i128,
            _ => false,
        }
    }
}

impl RecordType {
    /// Creates a record holding every field's default, recursively.
    pub fn create(&self) -> Result<Record, AccessError> {
        let mut record = Record::empty(self);
        record.root_mut().reset()?;
        Ok(record)
    }

    /// Creates a record from an integer seed in `[-2^(n-1), 2^n)` where `n`
    /// is the total width. Negative seeds are stored as their `n`-bit two's
    /// complement pattern; use [RecordType::from_uint] to accept only
    /// non-negative seeds.
    pub fn from_int(&self, value: i128) -> Result<Record, AccessError> {
        let width = self.total_width();
        let in_range = match width {
            0 => value == 0,
            128.. => true,
            w => value >= -(1i128 << (w - 1)) && (w >= 127 || value < 1i128 << w),
        };
        if !in_range {
            return Err(AccessError::SeedOutOfRange {
                value: value.to_string(),
                width,
            });
        }

        self.from_uint(bits::twos_complement(value, width))
    }

    /// Creates a record from a non-negative integer below `2^n`.
    pub fn from_uint(&self, value: u128) -> Result<Record, AccessError> {
        let mut record = Record::empty(self);
        record.root_mut().set_int(value)?;
        Ok(record)
    }

    /// Creates a record from a big-endian byte sequence no longer than the
    /// record's byte length.
    pub fn from_bytes(&self, data: &[u8]) -> Result<Record, AccessError> {
        if data.len() > self.byte_len() {
            return Err(AccessError::BytesTooLong {
                len: data.len(),
                width: self.total_width(),
            });
        }

        self.from_uint(bits::from_bytes_be(data))
    }

    /// Creates a record from a field mapping. See [RecordMut::set_map].
    pub fn from_map(
        &self,
        data: &BTreeMap<String, Value>,
        strict: bool,
    ) -> Result<Record, AccessError> {
        let mut record = Record::empty(self);
        record.root_mut().set_map(data, strict)?;
        Ok(record)
    }

    /// Creates a record from a host value: `Null` for defaults, an integer, a
    /// byte sequence, or a field mapping.
    pub fn from_value(&self, seed: &Value) -> Result<Record, AccessError> {
        match seed {
            Value::Null => self.create(),
            Value::Bool(b) => self.from_int(*b as i128),
            Value::Int(i) => self.from_int(*i),
            Value::Bytes(data) => self.from_bytes(data),
            Value::Map(map) => self.from_map(map, false),
            other => Err(AccessError::TypeMismatch {
                field: self.name().to_string(),
                expected: "null, int, bytes or map",
                found: other.type_name(),
            }),
        }
    }
}

impl Record {
    fn empty(ty: &RecordType) -> Self {
        Record {
            nodes: vec![Node {
                ty: ty.clone(),
                value: 0,
                variants: HashMap::new(),
                parent: None,
            }],
        }
    }

    pub fn root(&self) -> RecordRef<'_> {
        RecordRef {
            record: self,
            node: ROOT,
        }
    }

    pub fn root_mut(&mut self) -> RecordMut<'_> {
        RecordMut {
            record: self,
            node: ROOT,
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.nodes[ROOT].ty
    }

    pub fn get(&self, name: &str) -> Result<FieldValue<'_>, AccessError> {
        self.root().get(name)
    }

    pub fn sub(&self, name: &str) -> Result<RecordRef<'_>, AccessError> {
        self.root().sub(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), AccessError> {
        self.root_mut().set(name, value)
    }

    pub fn sub_mut(&mut self, name: &str) -> Result<RecordMut<'_>, AccessError> {
        self.root_mut().into_sub(name)
    }

    pub fn reset(&mut self) -> Result<(), AccessError> {
        self.root_mut().reset()
    }

    pub fn clear(&mut self) -> Result<(), AccessError> {
        self.root_mut().clear()
    }

    pub fn set_int(&mut self, value: u128) -> Result<(), AccessError> {
        self.root_mut().set_int(value)
    }

    pub fn set_map(
        &mut self,
        data: &BTreeMap<String, Value>,
        strict: bool,
    ) -> Result<(), AccessError> {
        self.root_mut().set_map(data, strict)
    }

    pub fn update(&mut self, data: &BTreeMap<String, Value>) -> Result<(), AccessError> {
        self.root_mut().update(data)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.root().contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<(&str, FieldValue<'_>), AccessError>> {
        self.root().iter()
    }

    pub fn to_int(&self) -> u128 {
        self.nodes[ROOT].value
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.root().to_bytes()
    }

    pub fn to_json(&self) -> Result<serde_json::Value, AccessError> {
        self.root().to_json()
    }

    /// Total width in bits.
    pub fn len(&self) -> usize {
        self.record_type().total_width()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn valid(&self) -> bool {
        self.root().valid()
    }

    pub fn inspect(&self) -> Inspection {
        self.root().inspect()
    }

    pub fn verify(&self) -> bool {
        self.root().verify()
    }

    fn field(&self, node: NodeId, index: usize) -> &CompiledField {
        &self.nodes[node].ty.fields()[index]
    }

    fn lookup(&self, node: NodeId, name: &str) -> Result<usize, AccessError> {
        self.nodes[node]
            .ty
            .index_of(name)
            .ok_or_else(|| AccessError::UnknownField(name.to_string()))
    }

    /// Current selector value of the bitdict field at `index`.
    fn selection(&self, node: NodeId, index: usize) -> usize {
        let CompiledKind::BitDict { selector, .. } = self.field(node, index).kind else {
            return 0;
        };
        let selector = self.field(node, selector);
        bits::extract(self.nodes[node].value, selector.start, selector.width) as usize
    }

    fn missing_variant(&self, node: NodeId, index: usize, selection: usize) -> AccessError {
        AccessError::MissingVariant {
            field: self.field(node, index).name.clone(),
            selector_value: selection as u128,
        }
    }

    /// Cached sub-record of the currently selected variant.
    fn variant(&self, node: NodeId, index: usize) -> Result<NodeId, AccessError> {
        let selection = self.selection(node, index);
        self.nodes[node]
            .variants
            .get(&(index, selection))
            .copied()
            .ok_or_else(|| self.missing_variant(node, index, selection))
    }

    /// Cached-or-created sub-record for `selection`. A new sub-record starts
    /// from its defaults and is linked to its parent only afterwards, so its
    /// initial reset does not write into the parent.
    fn ensure_variant(
        &mut self,
        node: NodeId,
        index: usize,
        selection: usize,
    ) -> Result<NodeId, AccessError> {
        if let Some(&child) = self.nodes[node].variants.get(&(index, selection)) {
            return Ok(child);
        }

        let ty = self
            .field(node, index)
            .variants()
            .and_then(|v| v.get(selection))
            .and_then(Option::clone)
            .ok_or_else(|| self.missing_variant(node, index, selection))?;

        tracing::trace!(
            field = %self.field(node, index).name,
            selection,
            variant = %ty.name(),
            "instantiating variant"
        );

        let child = self.nodes.len();
        self.nodes.push(Node {
            ty,
            value: 0,
            variants: HashMap::new(),
            parent: None,
        });
        self.reset_node(child)?;
        self.nodes[child].parent = Some(ParentLink { node, field: index });
        self.nodes[node].variants.insert((index, selection), child);

        Ok(child)
    }

    fn get_field(&self, node: NodeId, index: usize) -> Result<FieldValue<'_>, AccessError> {
        let field = self.field(node, index);
        let raw = bits::extract(self.nodes[node].value, field.start, field.width);

        match field.kind {
            CompiledKind::Reserved => Err(AccessError::ReadOnlyField(field.name.clone())),
            CompiledKind::Bool { .. } => Ok(FieldValue::Bool(raw != 0)),
            CompiledKind::UInt { .. } => Ok(FieldValue::UInt(raw as u64)),
            CompiledKind::Int { .. } => {
                Ok(FieldValue::Int(bits::sign_extend(raw as u64, field.width)))
            }
            CompiledKind::BitDict { .. } => Ok(FieldValue::Record(RecordRef {
                record: self,
                node: self.variant(node, index)?,
            })),
        }
    }

    /// Checks `value` against a scalar field and returns its bit pattern.
    fn encode(field: &CompiledField, value: &Value) -> Result<u128, AccessError> {
        let mismatch = |expected| AccessError::TypeMismatch {
            field: field.name.clone(),
            expected,
            found: value.type_name(),
        };
        let out_of_range = |value| AccessError::OutOfRange {
            field: field.name.clone(),
            value,
        };

        match field.kind {
            CompiledKind::Bool { .. } => match value {
                Value::Bool(b) => Ok(*b as u128),
                Value::Int(i) => Ok((*i != 0) as u128),
                _ => Err(mismatch("bool")),
            },
            CompiledKind::UInt { .. } => {
                let v = value.as_int().ok_or_else(|| mismatch("int"))?;
                if v < 0 || v > bits::mask(field.width) as i128 {
                    return Err(out_of_range(v));
                }
                Ok(v as u128)
            }
            CompiledKind::Int { .. } => {
                let v = value.as_int().ok_or_else(|| mismatch("int"))?;
                let half = 1i128 << (field.width - 1);
                if v < -half || v >= half {
                    return Err(out_of_range(v));
                }
                Ok(bits::twos_complement(v, field.width))
            }
            CompiledKind::Reserved => Err(AccessError::ReadOnlyField(field.name.clone())),
            CompiledKind::BitDict { .. } => Err(mismatch("bitdict")),
        }
    }

    fn set_field(&mut self, node: NodeId, index: usize, value: &Value) -> Result<(), AccessError> {
        let field = self.field(node, index);
        let (start, width, selects) = (field.start, field.width, field.selects);

        let pattern = if matches!(field.kind, CompiledKind::BitDict { .. }) {
            let selection = self.selection(node, index);
            let child = self.ensure_variant(node, index, selection)?;
            self.assign_variant(child, index, node, value)?;
            self.nodes[child].value
        } else {
            Self::encode(self.field(node, index), value)?
        };

        if let Some(owner) = selects {
            // Snap the governed bitdict field to the newly selected variant
            // before the selector bits change.
            let child = self.ensure_variant(node, owner, pattern as usize)?;
            let target = self.field(node, owner);
            let (owner_start, owner_width) = (target.start, target.width);
            tracing::trace!(
                selector = %self.field(node, index).name,
                field = %target.name,
                selection = pattern as u64,
                "switching variant"
            );
            let child_value = self.nodes[child].value;
            let current = &mut self.nodes[node].value;
            *current = bits::splice(*current, owner_start, owner_width, child_value);
        }

        let current = &mut self.nodes[node].value;
        *current = bits::splice(*current, start, width, pattern);

        self.push_up(node);
        Ok(())
    }

    /// Applies a bitdict field assignment to its selected sub-record: an
    /// integer replaces the sub-record's value, a mapping bulk-sets it.
    fn assign_variant(
        &mut self,
        child: NodeId,
        index: usize,
        node: NodeId,
        value: &Value,
    ) -> Result<(), AccessError> {
        match value {
            Value::Map(map) => self.set_map_node(child, map, false),
            Value::Bool(_) | Value::Int(_) => {
                let v = value.as_int().unwrap_or_default();
                let width = self.nodes[child].ty.total_width();
                if v < 0 || v as u128 > bits::mask(width) {
                    return Err(AccessError::SeedOutOfRange {
                        value: v.to_string(),
                        width,
                    });
                }
                self.store_int(child, v as u128)
            }
            other => Err(AccessError::TypeMismatch {
                field: self.field(node, index).name.clone(),
                expected: "int or map",
                found: other.type_name(),
            }),
        }
    }

    /// Overwrites the parent's bit range for `node` with the node's value,
    /// one hop at a time until the root is reached.
    fn push_up(&mut self, node: NodeId) {
        let mut current = node;
        while let Some(link) = self.nodes[current].parent {
            let value = self.nodes[current].value;
            let field = self.field(link.node, link.field);
            let (start, width) = (field.start, field.width);

            let parent = &mut self.nodes[link.node].value;
            *parent = bits::splice(*parent, start, width, value);

            current = link.node;
        }
    }

    /// Stores `value` and re-derives every selected variant from its slice of
    /// the new value. Does not write into the parent.
    fn store_int(&mut self, node: NodeId, value: u128) -> Result<(), AccessError> {
        self.nodes[node].value = value;

        for index in 0..self.nodes[node].ty.fields().len() {
            let field = self.field(node, index);
            if !matches!(field.kind, CompiledKind::BitDict { .. }) {
                continue;
            }
            let slice = bits::extract(value, field.start, field.width);

            let selection = self.selection(node, index);
            // Unimplemented selections keep their raw bits; reading the field
            // reports the missing variant.
            let child = match self.ensure_variant(node, index, selection) {
                Ok(child) => child,
                Err(AccessError::MissingVariant { .. }) => continue,
                Err(e) => return Err(e),
            };
            let child_width = self.nodes[child].ty.total_width();
            self.store_int(child, slice & bits::mask(child_width))?;
        }

        Ok(())
    }

    fn reset_node(&mut self, node: NodeId) -> Result<(), AccessError> {
        for index in 0..self.nodes[node].ty.fields().len() {
            let field = self.field(node, index);
            match field.kind {
                CompiledKind::Reserved => {}
                CompiledKind::BitDict { .. } => {
                    let selection = self.selection(node, index);
                    match self.ensure_variant(node, index, selection) {
                        Ok(child) => self.reset_node(child)?,
                        // Resetting the selector snaps the field to a valid variant.
                        Err(AccessError::MissingVariant { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
                _ => {
                    if let Some(default) = field.default_value() {
                        self.set_field(node, index, &default.into())?;
                    }
                }
            }
        }

        Ok(())
    }

    fn set_map_node(
        &mut self,
        node: NodeId,
        data: &BTreeMap<String, Value>,
        strict: bool,
    ) -> Result<(), AccessError> {
        let count = self.nodes[node].ty.fields().len();

        if strict {
            for name in data.keys() {
                self.lookup(node, name)?;
            }
            for index in 0..count {
                if let Some(value) = data.get(&self.field(node, index).name) {
                    let value = value.clone();
                    self.set_field(node, index, &value)?;
                }
            }
            for index in 0..count {
                let field = self.field(node, index);
                if data.contains_key(&field.name) {
                    continue;
                }
                if let Some(default) = field.default_value() {
                    self.set_field(node, index, &default.into())?;
                }
            }
        } else {
            for index in 0..count {
                let field = self.field(node, index);
                let value = match (data.get(&field.name), field.default_value()) {
                    (Some(value), _) => value.clone(),
                    (None, Some(default)) => default.into(),
                    (None, None) => continue,
                };
                self.set_field(node, index, &value)?;
            }
        }

        Ok(())
    }

    fn inspect_node(&self, node: NodeId) -> Inspection {
        let mut invalid = Inspection::new();

        for (index, field) in self.nodes[node].ty.fields().iter().enumerate() {
            match field.kind {
                CompiledKind::Reserved => {}
                CompiledKind::BitDict { selector, .. } => {
                    let selector_field = self.field(node, selector);
                    let selection = self.selection(node, index);
                    let child = self.variant(node, index);

                    match child {
                        Ok(child) if is_valid(selector_field.valid(), selection as i128) => {
                            let nested = self.inspect_node(child);
                            if !nested.is_empty() {
                                invalid.insert(field.name.clone(), Violation::Nested(nested));
                            }
                        }
                        _ => {
                            let scalar = self.scalar(node, selector);
                            invalid.insert(selector_field.name.clone(), Violation::Value(scalar));
                        }
                    }
                }
                _ => {
                    let scalar = self.scalar(node, index);
                    if !is_valid(field.valid(), scalar.to_i128()) {
                        invalid.insert(field.name.clone(), Violation::Value(scalar));
                    }
                }
            }
        }

        invalid
    }

    fn valid_node(&self, node: NodeId) -> bool {
        self.nodes[node]
            .ty
            .fields()
            .iter()
            .enumerate()
            .all(|(index, field)| match field.kind {
                CompiledKind::Reserved => true,
                CompiledKind::BitDict { selector, .. } => {
                    let selection = self.selection(node, index) as i128;
                    is_valid(self.field(node, selector).valid(), selection)
                        && self
                            .variant(node, index)
                            .is_ok_and(|child| self.valid_node(child))
                }
                _ => is_valid(field.valid(), self.scalar(node, index).to_i128()),
            })
    }

    /// Scalar reading of a `bool`/`uint`/`int` field.
    fn scalar(&self, node: NodeId, index: usize) -> Scalar {
        let field = self.field(node, index);
        let raw = bits::extract(self.nodes[node].value, field.start, field.width);
        match field.kind {
            CompiledKind::Bool { .. } => Scalar::Bool(raw != 0),
            CompiledKind::Int { .. } => Scalar::Int(bits::sign_extend(raw as u64, field.width)),
            _ => Scalar::UInt(raw as u64),
        }
    }

    fn contains_node(&self, node: NodeId, name: &str) -> bool {
        let ty = &self.nodes[node].ty;
        if ty.index_of(name).is_some() {
            return true;
        }

        ty.fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| matches!(f.kind, CompiledKind::BitDict { .. }))
            .any(|(index, _)| {
                self.variant(node, index)
                    .is_ok_and(|child| self.contains_node(child, name))
            })
    }

    /// Readable fields in ascending start bit order.
    fn ordered_fields(&self, node: NodeId) -> Vec<usize> {
        let fields = self.nodes[node].ty.fields();
        let mut order: Vec<usize> = (0..fields.len())
            .filter(|&i| !matches!(fields[i].kind, CompiledKind::Reserved))
            .collect();
        order.sort_by_key(|&i| fields[i].start);
        order
    }
}

impl<'a> RecordRef<'a> {
    pub fn record_type(&self) -> &'a RecordType {
        &self.record.nodes[self.node].ty
    }

    /// Reads a field. Bitdict fields yield the currently selected variant.
    pub fn get(&self, name: &str) -> Result<FieldValue<'a>, AccessError> {
        let index = self.record.lookup(self.node, name)?;
        self.record.get_field(self.node, index)
    }

    /// Selected variant of a bitdict field.
    pub fn sub(&self, name: &str) -> Result<RecordRef<'a>, AccessError> {
        match self.get(name)? {
            FieldValue::Record(r) => Ok(r),
            other => Err(AccessError::TypeMismatch {
                field: name.to_string(),
                expected: "bitdict",
                found: match other {
                    FieldValue::Bool(_) => "bool",
                    FieldValue::UInt(_) => "uint",
                    _ => "int",
                },
            }),
        }
    }

    /// True if `name` is declared here or in the selected variant of any
    /// bitdict field, recursively.
    pub fn contains(&self, name: &str) -> bool {
        self.record.contains_node(self.node, name)
    }

    /// `(name, value)` for every non-reserved field, in ascending start bit order.
    pub fn iter(self) -> impl Iterator<Item = Result<(&'a str, FieldValue<'a>), AccessError>> {
        let record = self.record;
        let node = self.node;
        record.ordered_fields(node).into_iter().map(move |index| {
            let value = record.get_field(node, index)?;
            Ok((record.field(node, index).name.as_str(), value))
        })
    }

    pub fn to_int(&self) -> u128 {
        self.record.nodes[self.node].value
    }

    /// Big-endian encoding in `ceil(total_width / 8)` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        bits::to_bytes_be(self.to_int(), self.record_type().total_width())
    }

    /// Field mapping in descending start bit order, sub-records expanded.
    pub fn to_json(&self) -> Result<serde_json::Value, AccessError> {
        let mut fields: Vec<_> = self.iter().collect::<Result<_, _>>()?;
        fields.reverse();

        let mut map = serde_json::Map::with_capacity(fields.len());
        for (name, value) in fields {
            map.insert(name.to_string(), value.to_json()?);
        }
        Ok(serde_json::Value::Object(map))
    }

    pub fn len(&self) -> usize {
        self.record_type().total_width()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no field violates its `valid` constraint. A bitdict field
    /// is only descended into when its selector is valid.
    pub fn valid(&self) -> bool {
        self.record.valid_node(self.node)
    }

    /// Every constraint violation, nested under bitdict field names.
    pub fn inspect(&self) -> Inspection {
        self.record.inspect_node(self.node)
    }

    /// Runs the record type's verification predicate.
    pub fn verify(&self) -> bool {
        self.record_type().verify(self)
    }
}

impl fmt::Debug for RecordRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Ok(json) => write!(f, "{}({json})", self.record_type().name()),
            Err(e) => write!(f, "{}(<{e}>)", self.record_type().name()),
        }
    }
}

impl<'a> RecordMut<'a> {
    pub fn as_record(&self) -> RecordRef<'_> {
        RecordRef {
            record: &*self.record,
            node: self.node,
        }
    }

    pub fn get(&self, name: &str) -> Result<FieldValue<'_>, AccessError> {
        let index = self.record.lookup(self.node, name)?;
        self.record.get_field(self.node, index)
    }

    /// Assigns a field. A rejected scalar value leaves the record unchanged.
    ///
    /// Bitdict fields take an integer (the variant's new value) or a mapping
    /// (bulk-set of the variant). Assigning a selector switches its bitdict
    /// field to the newly selected variant.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), AccessError> {
        let index = self.record.lookup(self.node, name)?;
        self.record.set_field(self.node, index, &value.into())
    }

    /// Write access to the selected variant of a bitdict field.
    pub fn sub_mut(&mut self, name: &str) -> Result<RecordMut<'_>, AccessError> {
        let node = self.resolve_sub(name)?;
        Ok(RecordMut {
            record: self.record,
            node,
        })
    }

    /// Like [RecordMut::sub_mut], consuming this handle.
    pub fn into_sub(self, name: &str) -> Result<RecordMut<'a>, AccessError> {
        let node = self.resolve_sub(name)?;
        Ok(RecordMut {
            record: self.record,
            node,
        })
    }

    fn resolve_sub(&self, name: &str) -> Result<usize, AccessError> {
        let index = self.record.lookup(self.node, name)?;
        let field = self.record.field(self.node, index);
        if !matches!(field.kind, CompiledKind::BitDict { .. }) {
            return Err(AccessError::TypeMismatch {
                field: name.to_string(),
                expected: "bitdict",
                found: field.ty().as_str(),
            });
        }
        self.record.variant(self.node, index)
    }

    /// Sets every field to its default in declaration order. Bitdict fields
    /// reset their currently selected variant.
    pub fn reset(&mut self) -> Result<(), AccessError> {
        self.record.reset_node(self.node)
    }

    /// Sets the record to integer 0.
    pub fn clear(&mut self) -> Result<(), AccessError> {
        self.set_int(0)
    }

    /// Replaces the whole value. Every selected variant is re-derived from
    /// its slice of the new value after the value is stored.
    pub fn set_int(&mut self, value: u128) -> Result<(), AccessError> {
        let width = self.record.nodes[self.node].ty.total_width();
        if value > bits::mask(width) {
            return Err(AccessError::SeedOutOfRange {
                value: value.to_string(),
                width,
            });
        }

        self.record.store_int(self.node, value)?;
        self.record.push_up(self.node);
        Ok(())
    }

    /// Bulk-sets fields from a mapping, in declaration order. Fields missing
    /// from `data` are set to their default.
    ///
    /// With `strict`, every key must name a declared field. Otherwise unknown
    /// keys are ignored.
    ///
    /// Not transactional: a rejected value leaves earlier fields applied.
    pub fn set_map(
        &mut self,
        data: &BTreeMap<String, Value>,
        strict: bool,
    ) -> Result<(), AccessError> {
        self.record.set_map_node(self.node, data, strict)
    }

    /// Assigns only the fields named in `data`, in declaration order. Every
    /// key must name a declared field.
    ///
    /// Not transactional: a rejected value leaves earlier fields applied.
    pub fn update(&mut self, data: &BTreeMap<String, Value>) -> Result<(), AccessError> {
        let mut indices = data
            .iter()
            .map(|(name, value)| -> Result<_, AccessError> {
                Ok((self.record.lookup(self.node, name)?, value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        indices.sort_by_key(|(index, _)| *index);

        for (index, value) in indices {
            self.record.set_field(self.node, index, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Ok(json) => write!(f, "{json}"),
            Err(e) => write!(f, "<{e}>"),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.root(), f)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::field::Field;

    fn sample() -> RecordType {
        RecordType::compile(&[
            Field::bool("Constant", 7),
            Field::bool("Mode", 6),
            Field::reserved("Reserved", 4, 2),
            Field::bitdict(
                "SubValue",
                0,
                4,
                "Mode",
                vec![
                    Some(vec![
                        Field::uint("PropA", 0, 2),
                        Field::int("PropB", 2, 2).with_default(-1),
                    ]),
                    Some(vec![
                        Field::uint("PropC", 0, 3).with_default(1),
                        Field::bool("PropD", 3).with_default(true),
                    ]),
                ],
            ),
        ])
        .unwrap()
    }

    fn map(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_concrete_scenario() {
        let mut rec = sample().from_int(0x8C).unwrap();
        assert_eq!(rec.to_int(), 0x8C);
        assert_eq!(rec.get("Constant").unwrap(), true);
        assert_eq!(rec.get("Mode").unwrap(), false);
        assert_eq!(rec.sub("SubValue").unwrap().get("PropA").unwrap(), 0u64);
        assert_eq!(rec.sub("SubValue").unwrap().get("PropB").unwrap(), -1i64);
        assert_eq!(
            rec.get("Reserved").unwrap_err(),
            AccessError::ReadOnlyField("Reserved".to_string())
        );

        rec.set("Mode", true).unwrap();
        let sub = rec.sub("SubValue").unwrap();
        assert_eq!(sub.get("PropC").unwrap(), 1u64);
        assert_eq!(sub.get("PropD").unwrap(), true);
        assert_eq!(sub.to_int(), 9);
        assert_eq!(rec.to_int(), 0xC9);
    }

    #[test]
    fn test_variant_assignment() {
        let mut rec = sample().from_int(0x8C).unwrap();
        rec.set("Mode", true).unwrap();

        rec.sub_mut("SubValue").unwrap().set("PropC", 5).unwrap();
        assert_eq!(rec.to_int(), 0xCD);

        rec.set("SubValue", 3).unwrap();
        let sub = rec.sub("SubValue").unwrap();
        assert_eq!(sub.get("PropC").unwrap(), 3u64);
        assert_eq!(sub.get("PropD").unwrap(), false);
        assert_eq!(rec.to_int(), 0xC3);

        rec.set("SubValue", Value::map([("PropC", 6)])).unwrap();
        assert_eq!(rec.sub("SubValue").unwrap().get("PropD").unwrap(), true);
        assert_eq!(rec.to_int(), 0xCE);

        assert!(matches!(
            rec.set("SubValue", 16).unwrap_err(),
            AccessError::SeedOutOfRange { width: 4, .. }
        ));
        assert!(matches!(
            rec.set("SubValue", "x").unwrap_err(),
            AccessError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_switching_keeps_visited_variants() {
        let mut rec = sample().create().unwrap();
        assert_eq!(rec.to_int(), 0b1100);

        rec.sub_mut("SubValue").unwrap().set("PropA", 2).unwrap();
        assert_eq!(rec.to_int(), 0b1110);

        rec.set("Mode", true).unwrap();
        assert_eq!(rec.to_int(), 0x49);
        rec.sub_mut("SubValue").unwrap().set("PropC", 7).unwrap();

        rec.set("Mode", false).unwrap();
        assert_eq!(rec.sub("SubValue").unwrap().get("PropA").unwrap(), 2u64);
        assert_eq!(rec.to_int(), 0b1110);

        rec.set("Mode", true).unwrap();
        assert_eq!(rec.sub("SubValue").unwrap().get("PropC").unwrap(), 7u64);
        assert_eq!(rec.to_int(), 0x4F);
    }

    #[test]
    fn test_map_seed() {
        let seed = map(&[
            ("Constant", true.into()),
            ("Mode", false.into()),
            ("SubValue", Value::map([("PropA", 2), ("PropB", -1)])),
        ]);
        let rec = sample().from_map(&seed, false).unwrap();
        assert_eq!(rec.to_int(), 0b1000_1110);

        let rec = sample().from_value(&Value::Map(seed)).unwrap();
        assert_eq!(rec.to_int(), 0b1000_1110);
    }

    #[test]
    fn test_map_seed_unknown_keys() {
        let seed = map(&[("Bogus", 1.into())]);
        assert_eq!(sample().from_map(&seed, false).unwrap().to_int(), 0b1100);
        assert_eq!(
            sample().from_map(&seed, true).unwrap_err(),
            AccessError::UnknownField("Bogus".to_string())
        );
    }

    #[test]
    fn test_set_map_forces_defaults() {
        let mut rec = sample().from_int(0xC3).unwrap();
        rec.set_map(&map(&[("Constant", false.into())]), true)
            .unwrap();
        assert_eq!(rec.get("Constant").unwrap(), false);
        assert_eq!(rec.get("Mode").unwrap(), false);
        assert_eq!(rec.to_int() & 0xC0, 0);
    }

    #[test]
    fn test_bytes_seed() {
        let rec = sample().from_bytes(&[0x0C]).unwrap();
        assert_eq!(rec.to_int(), 0x0C);
        assert_eq!(rec.to_bytes(), vec![0x0C]);

        assert_eq!(
            sample().from_bytes(&[0x00, 0x0C]).unwrap_err(),
            AccessError::BytesTooLong { len: 2, width: 8 }
        );
        assert_eq!(sample().from_bytes(&[]).unwrap().to_int(), 0);
    }

    #[test]
    fn test_bytes_padding() {
        let ty = RecordType::compile(&[Field::uint("a", 0, 12)]).unwrap();
        let rec = ty.from_int(0xABC).unwrap();
        assert_eq!(rec.to_bytes(), vec![0x0A, 0xBC]);
        assert_eq!(ty.from_bytes(&[0x0A, 0xBC]).unwrap().to_int(), 0xABC);
    }

    #[test]
    fn test_int_seed_bounds() {
        let ty = sample();
        assert!(ty.from_int(255).is_ok());
        assert_eq!(ty.from_int(-128).unwrap().to_int(), 0x80);
        assert_eq!(
            ty.from_int(256).unwrap_err(),
            AccessError::SeedOutOfRange {
                value: "256".to_string(),
                width: 8
            }
        );
        assert!(ty.from_int(-129).is_err());
        assert!(ty.from_int(-256).is_err());
        assert!(ty.from_uint(256).is_err());
    }

    #[test]
    fn test_wide_int_seed_bounds() {
        let ty = RecordType::compile(&[Field::reserved("pad", 0, 128)]).unwrap();
        assert_eq!(ty.from_int(-1).unwrap().to_int(), u128::MAX);
        assert_eq!(ty.from_uint(u128::MAX).unwrap().to_int(), u128::MAX);

        let ty = RecordType::compile(&[Field::reserved("pad", 0, 127)]).unwrap();
        assert_eq!(ty.from_int(i128::MAX).unwrap().to_int(), i128::MAX as u128);
        assert!(ty.from_int(i128::MIN).is_err());

        let empty = RecordType::compile(&[]).unwrap();
        assert!(empty.from_int(0).unwrap().is_empty());
        assert!(empty.from_int(-1).is_err());
    }

    #[test]
    fn test_value_seed() {
        let ty = sample();
        assert_eq!(ty.from_value(&Value::Null).unwrap().to_int(), 0b1100);
        assert_eq!(ty.from_value(&0x8Ci64.into()).unwrap().to_int(), 0x8C);
        assert_eq!(ty.from_value(&vec![0x0Cu8].into()).unwrap().to_int(), 0x0C);
        assert!(matches!(
            ty.from_value(&1.5.into()).unwrap_err(),
            AccessError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_scalar_set_errors() {
        let mut rec = sample().create().unwrap();
        let before = rec.to_int();

        assert_eq!(
            rec.set("Constant", "yes").unwrap_err(),
            AccessError::TypeMismatch {
                field: "Constant".to_string(),
                expected: "bool",
                found: "text"
            }
        );
        assert_eq!(
            rec.set("Reserved", 0).unwrap_err(),
            AccessError::ReadOnlyField("Reserved".to_string())
        );
        assert_eq!(
            rec.set("Nope", 0).unwrap_err(),
            AccessError::UnknownField("Nope".to_string())
        );

        let mut sub = rec.sub_mut("SubValue").unwrap();
        assert_eq!(
            sub.set("PropA", 4).unwrap_err(),
            AccessError::OutOfRange {
                field: "PropA".to_string(),
                value: 4
            }
        );
        assert!(sub.set("PropA", -1).is_err());
        assert!(sub.set("PropB", -3).is_err());
        assert!(sub.set("PropB", 2).is_err());
        assert!(sub.set("PropA", 1.0).is_err());

        assert_eq!(rec.to_int(), before);
    }

    #[test]
    fn test_bool_coercion() {
        let mut rec = sample().create().unwrap();
        rec.set("Constant", 5).unwrap();
        assert_eq!(rec.get("Constant").unwrap(), true);
        rec.set("Constant", 0).unwrap();
        assert_eq!(rec.get("Constant").unwrap(), false);

        let mut sub = rec.sub_mut("SubValue").unwrap();
        sub.set("PropA", true).unwrap();
        assert_eq!(sub.get("PropA").unwrap().as_uint(), Some(1));
        assert_eq!(sub.as_record().to_int(), 0b1101);
        assert_eq!(
            rec.get("SubValue").unwrap().as_record().map(|r| r.to_int()),
            Some(0b1101)
        );
        assert_eq!(rec.get("Constant").unwrap().as_bool(), Some(false));
    }

    #[test]
    fn test_signed_field() {
        let ty = RecordType::compile(&[Field::int("v", 0, 4)]).unwrap();
        let mut rec = ty.create().unwrap();
        rec.set("v", -8).unwrap();
        assert_eq!(rec.to_int(), 0b1000);
        assert_eq!(rec.get("v").unwrap(), -8i64);
        rec.set("v", 7).unwrap();
        assert_eq!(rec.get("v").unwrap().as_int(), Some(7));
        assert!(rec.set("v", 8).is_err());
        assert!(rec.set("v", -9).is_err());
    }

    #[test]
    fn test_sub_on_scalar_field() {
        let rec = sample().create().unwrap();
        assert_eq!(
            rec.sub("Mode").unwrap_err(),
            AccessError::TypeMismatch {
                field: "Mode".to_string(),
                expected: "bitdict",
                found: "bool"
            }
        );
    }

    #[test]
    fn test_reset_and_clear() {
        let mut rec = sample().from_int(0xFF).unwrap();
        rec.reset().unwrap();
        assert_eq!(rec.get("Constant").unwrap(), false);
        assert_eq!(rec.get("Mode").unwrap(), false);
        assert_eq!(rec.sub("SubValue").unwrap().get("PropB").unwrap(), -1i64);
        // Reserved bits are left as they were.
        assert_eq!(rec.to_int(), 0b0011_1100);

        rec.clear().unwrap();
        assert_eq!(rec.to_int(), 0);
        assert_eq!(rec.sub("SubValue").unwrap().to_int(), 0);
    }

    #[test]
    fn test_set_int_rederives_variants() {
        let mut rec = sample().create().unwrap();
        rec.set_int(0x4A).unwrap();
        let sub = rec.sub("SubValue").unwrap();
        assert_eq!(sub.get("PropC").unwrap(), 2u64);
        assert_eq!(sub.get("PropD").unwrap(), true);

        assert!(rec.set_int(0x100).is_err());
        assert_eq!(rec.to_int(), 0x4A);
    }

    #[test]
    fn test_contains() {
        let mut rec = sample().create().unwrap();
        assert!(rec.contains("Constant"));
        assert!(rec.contains("Reserved"));
        assert!(rec.contains("PropA"));
        assert!(!rec.contains("PropC"));
        assert!(!rec.contains("Nope"));

        rec.set("Mode", true).unwrap();
        assert!(rec.contains("PropC"));
        assert!(!rec.contains("PropA"));
    }

    #[test]
    fn test_iteration_order() {
        let rec = sample().from_int(0x8C).unwrap();
        let names: Vec<&str> = rec.iter().map(|item| item.unwrap().0).collect();
        assert_eq!(names, vec!["SubValue", "Mode", "Constant"]);

        let sub = rec.sub("SubValue").unwrap();
        let fields: Vec<_> = sub.iter().map(Result::unwrap).collect();
        assert_eq!(fields[0].0, "PropA");
        assert_eq!(fields[1].1, -1i64);
    }

    #[test]
    fn test_to_json() {
        let rec = sample().from_int(0x8C).unwrap();
        assert_eq!(
            rec.to_json().unwrap(),
            serde_json::json!({
                "Constant": true,
                "Mode": false,
                "SubValue": {"PropA": 0, "PropB": -1}
            })
        );
        assert_eq!(
            rec.to_string(),
            r#"{"Constant":true,"Mode":false,"SubValue":{"PropB":-1,"PropA":0}}"#
        );
        assert_eq!(
            format!("{rec:?}"),
            r#"BitDict({"Constant":true,"Mode":false,"SubValue":{"PropB":-1,"PropA":0}})"#
        );
    }

    #[test]
    fn test_len() {
        let rec = sample().create().unwrap();
        assert_eq!(rec.len(), 8);
        assert!(!rec.is_empty());
        assert_eq!(rec.sub("SubValue").unwrap().len(), 4);
    }

    #[test]
    fn test_update() {
        let mut rec = sample().from_int(0x8C).unwrap();
        rec.update(&map(&[("Mode", true.into())])).unwrap();
        assert_eq!(rec.get("Constant").unwrap(), true);
        assert_eq!(rec.to_int(), 0xC9);

        assert_eq!(
            rec.update(&map(&[("Constant", false.into()), ("Bogus", 1.into())]))
                .unwrap_err(),
            AccessError::UnknownField("Bogus".to_string())
        );
        assert_eq!(rec.to_int(), 0xC9);
    }

    #[test]
    fn test_update_not_transactional() {
        let mut rec = sample().from_int(0x8C).unwrap();
        let err = rec
            .update(&map(&[("Constant", false.into()), ("Mode", "on".into())]))
            .unwrap_err();
        assert!(matches!(err, AccessError::TypeMismatch { .. }));
        // Constant precedes Mode in declaration order and stays applied.
        assert_eq!(rec.get("Constant").unwrap(), false);
        assert_eq!(rec.to_int(), 0x0C);
    }

    #[test]
    fn test_set_map_not_transactional() {
        let ty = RecordType::compile(&[Field::bool("A", 1), Field::uint("B", 0, 1)]).unwrap();
        let data = map(&[("A", true.into()), ("B", 5.into())]);

        for strict in [false, true] {
            let mut rec = ty.create().unwrap();
            assert_eq!(
                rec.set_map(&data, strict).unwrap_err(),
                AccessError::OutOfRange {
                    field: "B".to_string(),
                    value: 5
                }
            );
            // A precedes B in declaration order and stays applied.
            assert_eq!(rec.get("A").unwrap(), true);
            assert_eq!(rec.to_int(), 2);
        }

        assert!(ty.from_map(&data, false).is_err());
    }

    #[test]
    fn test_selector_declared_after_bitdict() {
        let ty = RecordType::compile(&[
            Field::bitdict(
                "Body",
                0,
                4,
                "Mode",
                vec![None, Some(vec![Field::uint("A", 0, 4).with_default(3)])],
            ),
            Field::bool("Mode", 4)
                .with_default(true)
                .with_valid_values([true]),
        ])
        .unwrap();

        let mut rec = ty.create().unwrap();
        assert_eq!(rec.to_int(), 0x13);
        assert_eq!(rec.sub("Body").unwrap().get("A").unwrap(), 3u64);
        assert!(rec.valid());

        rec.sub_mut("Body").unwrap().set("A", 9).unwrap();
        rec.reset().unwrap();
        assert_eq!(rec.to_int(), 0x13);
    }

    #[test]
    fn test_variant_verifier() {
        let mut ty = sample();
        let before = ty.create().unwrap();
        ty.variant_mut("SubValue", 1)
            .unwrap()
            .set_verifier(|r| r.get("PropC").is_ok_and(|v| v == 5u64));
        assert!(ty.variant_mut("SubValue", 2).is_none());
        assert!(ty.variant_mut("Mode", 0).is_none());

        let mut rec = ty.create().unwrap();
        rec.set("Mode", true).unwrap();
        assert!(!rec.sub("SubValue").unwrap().verify());
        rec.sub_mut("SubValue").unwrap().set("PropC", 5).unwrap();
        assert!(rec.sub("SubValue").unwrap().verify());
        assert!(rec.verify());

        // Records made before the change keep the old variant type.
        let mut before = before;
        before.set("Mode", true).unwrap();
        assert!(before.sub("SubValue").unwrap().verify());
    }

    fn validated() -> RecordType {
        RecordType::compile(&[
            Field::bool("Flag", 6).with_valid_values([1]),
            Field::uint("Mode", 4, 2).with_valid_values([0, 1]),
            Field::bitdict(
                "Body",
                0,
                4,
                "Mode",
                vec![
                    Some(vec![Field::uint("A", 0, 4).with_valid_ranges([vec![0, 10]])]),
                    Some(vec![
                        Field::bool("B", 0),
                        Field::uint("C", 1, 3).with_valid_values([0]),
                    ]),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_inspect() {
        let mut rec = validated().create().unwrap();
        assert!(!rec.valid());
        assert_eq!(
            rec.inspect(),
            Inspection::from([("Flag".to_string(), Violation::Value(Scalar::Bool(false)))])
        );

        rec.set("Flag", true).unwrap();
        assert!(rec.valid());
        assert!(rec.inspect().is_empty());

        rec.sub_mut("Body").unwrap().set("A", 12).unwrap();
        assert!(!rec.valid());
        assert_eq!(
            rec.inspect(),
            Inspection::from([(
                "Body".to_string(),
                Violation::Nested(Inspection::from([(
                    "A".to_string(),
                    Violation::Value(Scalar::UInt(12))
                )]))
            )])
        );
        assert_eq!(
            Violation::Nested(rec.inspect()).to_json(),
            serde_json::json!({"Body": {"A": 12}})
        );
    }

    #[test]
    fn test_inspect_invalid_selector() {
        let rec = validated().from_uint(0x60).unwrap();
        assert_eq!(
            rec.get("Body").unwrap_err(),
            AccessError::MissingVariant {
                field: "Body".to_string(),
                selector_value: 2
            }
        );
        assert!(!rec.valid());
        assert_eq!(
            rec.inspect(),
            Inspection::from([("Mode".to_string(), Violation::Value(Scalar::UInt(2)))])
        );
    }

    #[test]
    fn test_selector_to_missing_variant() {
        let mut rec = validated().create().unwrap();
        let before = rec.to_int();
        assert_eq!(
            rec.set("Mode", 3).unwrap_err(),
            AccessError::MissingVariant {
                field: "Body".to_string(),
                selector_value: 3
            }
        );
        assert_eq!(rec.to_int(), before);
    }

    #[test]
    fn test_verify() {
        let rec = sample().create().unwrap();
        assert!(rec.verify());

        let ty = sample().with_verifier(|r| r.get("Constant").is_ok_and(|v| v == true));
        let mut rec = ty.create().unwrap();
        assert!(!rec.verify());
        rec.set("Constant", true).unwrap();
        assert!(rec.verify());
    }

    fn nested() -> RecordType {
        RecordType::compile(&[
            Field::bool("Sel", 8),
            Field::bitdict(
                "Inner",
                0,
                8,
                "Sel",
                vec![
                    Some(vec![
                        Field::bool("ISel", 7),
                        Field::bitdict(
                            "Deep",
                            0,
                            4,
                            "ISel",
                            vec![
                                Some(vec![Field::uint("X", 0, 4)]),
                                Some(vec![Field::uint("Y", 0, 4).with_default(5)]),
                            ],
                        ),
                    ]),
                    Some(vec![Field::uint("Z", 0, 8)]),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_grandchild_push_up() {
        let mut rec = nested().create().unwrap();
        assert_eq!(rec.to_int(), 0);

        rec.sub_mut("Inner")
            .unwrap()
            .sub_mut("Deep")
            .unwrap()
            .set("X", 7)
            .unwrap();
        assert_eq!(rec.to_int(), 7);
        assert_eq!(rec.sub("Inner").unwrap().to_int(), 7);

        rec.sub_mut("Inner").unwrap().set("ISel", true).unwrap();
        assert_eq!(rec.to_int(), 0x85);

        rec.set("Sel", true).unwrap();
        assert_eq!(rec.to_int(), 0x100);

        rec.set("Sel", false).unwrap();
        assert_eq!(rec.to_int(), 0x85);
        assert_eq!(
            rec.to_json().unwrap(),
            serde_json::json!({"Sel": false, "Inner": {"ISel": true, "Deep": {"Y": 5}}})
        );
    }

    #[test]
    fn test_nested_set_int() {
        let rec = nested().from_uint(0x8A).unwrap();
        let deep = rec.sub("Inner").unwrap().sub("Deep").unwrap();
        assert_eq!(deep.get("Y").unwrap(), 10u64);
        assert!(rec.contains("Y"));
        assert!(!rec.contains("X"));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut rec = sample().create().unwrap();
        let copy = rec.clone();
        rec.set("Mode", true).unwrap();
        assert_eq!(copy.to_int(), 0b1100);
        assert_eq!(copy.sub("SubValue").unwrap().get("PropA").unwrap(), 0u64);
    }

    proptest! {
        #[test]
        fn prop_int_round_trip(value in 0u128..256) {
            prop_assert_eq!(sample().from_uint(value).unwrap().to_int(), value);
        }

        #[test]
        fn prop_negative_seed_wraps(value in -128i128..0) {
            prop_assert_eq!(sample().from_int(value).unwrap().to_int(), (value + 256) as u128);
        }

        #[test]
        fn prop_bytes_round_trip(value in 0u128..(1 << 20)) {
            let ty = RecordType::compile(&[Field::uint("a", 0, 20)]).unwrap();
            let bytes = ty.from_uint(value).unwrap().to_bytes();
            prop_assert_eq!(bytes.len(), 3);
            prop_assert_eq!(ty.from_bytes(&bytes).unwrap().to_int(), value);
        }

        #[test]
        fn prop_signed_field_round_trip(value in -64i64..64) {
            let ty = RecordType::compile(&[Field::int("v", 1, 7)]).unwrap();
            let mut rec = ty.create().unwrap();
            rec.set("v", value).unwrap();
            prop_assert_eq!(rec.get("v").unwrap().as_int(), Some(value));
        }
    }
}
