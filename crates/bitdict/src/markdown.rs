//! Markdown documentation tables for a compiled record type.
//!
//! Every record type gets one table, followed depth-first by the tables of
//! its variant types:
//!
//! ```text
//! ### BitDict
//!
//! | Name | Type | Bitfield | Default | Description |
//! |---|---|---|---|---|
//! | Body | bitdict | 3:0 | N/A | See 'Body' definition table(s). |
//! | Mode | uint | 5:4 | 0 | Valid values: {0, 1}. |
//! ```

use crate::{
    compiled::{CompiledField, CompiledKind, RecordType},
    validity::Valid,
};

/// Renders `ty` and all of its variant types as markdown tables. The `Type`
/// column is omitted unless `include_types` is set.
pub fn tables(ty: &RecordType, include_types: bool) -> Vec<String> {
    let mut out = Vec::new();
    collect(ty, include_types, &mut out);
    out
}

fn collect(ty: &RecordType, include_types: bool, out: &mut Vec<String>) {
    out.push(table(ty, include_types));

    for field in ty.fields() {
        for variant in field.variants().unwrap_or_default().iter().flatten() {
            collect(variant, include_types, out);
        }
    }
}

fn table(ty: &RecordType, include_types: bool) -> String {
    let mut s = format!("### {}\n\n", ty.title());
    if include_types {
        s.push_str("| Name | Type | Bitfield | Default | Description |\n");
        s.push_str("|---|---|---|---|---|\n");
    } else {
        s.push_str("| Name | Bitfield | Default | Description |\n");
        s.push_str("|---|---|---|---|\n");
    }

    let mut fields: Vec<&CompiledField> = ty.fields().iter().collect();
    fields.sort_by_key(|f| f.start);

    let mut rows = Vec::with_capacity(fields.len());
    let mut next_bit = 0;
    for field in fields {
        if field.start > next_bit {
            let bits = if field.start - next_bit > 1 {
                format!("{}-{}", next_bit, field.start - 1)
            } else {
                next_bit.to_string()
            };
            rows.push(row("Undefined", "N/A", &bits, "N/A", "N/A", include_types));
        }

        let default = field
            .default_value()
            .map_or_else(|| "N/A".to_string(), |d| d.to_string());
        rows.push(row(
            &field.name,
            field.ty().as_str(),
            &bitfield(field),
            &default,
            &describe(field),
            include_types,
        ));
        next_bit = next_bit.max(field.end());
    }

    s.push_str(&rows.join("\n"));
    s
}

fn row(name: &str, ty: &str, bits: &str, default: &str, desc: &str, types: bool) -> String {
    if types {
        format!("| {name} | {ty} | {bits} | {default} | {desc} |")
    } else {
        format!("| {name} | {bits} | {default} | {desc} |")
    }
}

fn bitfield(field: &CompiledField) -> String {
    if field.width > 1 {
        format!("{}:{}", field.end() - 1, field.start)
    } else {
        field.start.to_string()
    }
}

fn describe(field: &CompiledField) -> String {
    if let CompiledKind::BitDict { .. } = field.kind {
        return format!("See '{}' definition table(s).", field.name);
    }

    let mut parts = Vec::new();
    if !field.description.is_empty() {
        parts.push(field.description.clone());
    }
    if let Some(valid) = field.valid() {
        parts.extend(describe_valid(valid, matches!(field.kind, CompiledKind::Bool { .. })));
    }
    parts.join(" ")
}

fn describe_valid(valid: &Valid, is_bool: bool) -> Vec<String> {
    let mut parts = Vec::new();

    if let Some(values) = &valid.value {
        let list = values
            .iter()
            .map(|&v| match (is_bool, v) {
                (true, 0) => "false".to_string(),
                (true, _) => "true".to_string(),
                _ => v.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("Valid values: {{{list}}}."));
    }

    if let Some(ranges) = &valid.range {
        let list = ranges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("Valid ranges: [{list}]."));
    }

    parts
}
