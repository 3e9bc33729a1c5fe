//! Applying lookup tables to source values.

use itemrule_core::{BaseType, Cardinality, LookupTable, Scalar, Value};

/// Look `source` up in `table`, producing a value of `target_type`.
///
/// Match tables compare the source's key text against each entry in table
/// order. Interpolation tables pick the target of the lowest breakpoint the
/// source does not exceed; a source equal to a breakpoint selects it unless
/// that entry excludes its boundary. An absent, invalid or unmatched source
/// yields the table default, and a table without a default yields a typed
/// null.
pub fn apply_lookup_table(source: &Value, table: &LookupTable, target_type: BaseType) -> Value {
    let target = if source.is_missing() {
        None
    } else {
        match table {
            LookupTable::Match(t) => source
                .as_single()
                .and_then(Scalar::key_string)
                .and_then(|key| t.entries.iter().find(|e| e.source_value == key))
                .map(|e| e.target_value.as_str()),
            LookupTable::Interpolation(t) => source.as_f64().and_then(|x| {
                t.sorted_entries()
                    .into_iter()
                    .find(|e| {
                        if t.includes_boundary(e) {
                            x <= e.source_value
                        } else {
                            x < e.source_value
                        }
                    })
                    .map(|e| e.target_value.as_str())
            }),
        }
    };

    match target.or_else(|| table.default_value()) {
        Some(text) => coerce(text, target_type),
        None => Value::typed_null(target_type, Cardinality::Single),
    }
}

fn coerce(text: &str, target_type: BaseType) -> Value {
    match Scalar::parse(target_type, text) {
        Some(s) => Value::Single(s),
        None => Value::Invalid {
            message: format!("lookup target '{}' is not a valid {}", text, target_type),
            base_type: Some(target_type),
            cardinality: Some(Cardinality::Single),
        },
    }
}
