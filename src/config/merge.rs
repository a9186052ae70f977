use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use toml::Value;
use toml::map::{Entry, Map};

/// Deep-merge `addition` into `target`.
///
/// Tables merge recursively, `key+ = [...]` appends to an existing array, and a
/// `"null"` string (or an empty array/table) removes the key. Anything else
/// replaces the earlier value.
pub fn merge_tables(
    target: &mut Map<String, Value>,
    addition: Map<String, Value>,
    source_path: Option<&Path>,
) -> Result<()> {
    for (raw_key, value) in addition {
        if let Some(key) = raw_key.strip_suffix('+') {
            append(target, key, value, source_path)?;
            continue;
        }

        match value {
            Value::Table(table) => match target.entry(raw_key) {
                Entry::Occupied(mut occ) => {
                    if let Value::Table(existing) = occ.get_mut() {
                        merge_tables(existing, table, source_path)?;
                    } else {
                        occ.insert(Value::Table(table));
                    }
                }
                Entry::Vacant(vac) => {
                    vac.insert(Value::Table(table));
                }
            },
            other if is_null(&other) => {
                target.remove(&raw_key);
            }
            other => {
                target.insert(raw_key, other);
            }
        }
    }

    Ok(())
}

fn append(
    target: &mut Map<String, Value>,
    key: &str,
    value: Value,
    source_path: Option<&Path>,
) -> Result<()> {
    let Value::Array(items) = value else {
        return Err(eyre!("value for '{key}+' must be an array").wrap_err(origin(source_path)));
    };
    match target.entry(key.to_string()) {
        Entry::Occupied(mut occ) => {
            let Value::Array(existing) = occ.get_mut() else {
                return Err(eyre!("cannot append to non-array key '{key}'")
                    .wrap_err(origin(source_path)));
            };
            existing.extend(items);
        }
        Entry::Vacant(vac) => {
            vac.insert(Value::Array(items));
        }
    }
    Ok(())
}

fn origin(source_path: Option<&Path>) -> String {
    match source_path {
        Some(path) => format!("while merging {}", path.display()),
        None => "while merging configuration".to_string(),
    }
}

fn is_null(value: &Value) -> bool {
    match value {
        Value::String(s) => s.eq_ignore_ascii_case("null"),
        Value::Array(items) => items.is_empty(),
        Value::Table(table) => table.is_empty(),
        _ => false,
    }
}
