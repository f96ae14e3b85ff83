//! Upgrades persisted documents to the current schema.
//!
//! Migrations work on the raw JSON tree so that documents written before a
//! field existed (or with a different shape) can be normalised once, at load
//! time, before they are deserialised into the typed model.

use std::collections::HashMap;

use anyhow::Context as _;
use serde_json::{Map, Value, json};

use crate::formats::{DEFAULT_CATEGORIES, SCHEMA_VERSION};

type Migration = fn(&mut Map<String, Value>) -> anyhow::Result<()>;

/// `MIGRATIONS[n]` upgrades a version `n` document to version `n + 1`.
const MIGRATIONS: [Migration; SCHEMA_VERSION as usize] = [v0_to_v1];

pub fn stored_version(value: &Value) -> anyhow::Result<u32> {
    let Some(version) = value.get("schemaVersion").and_then(Value::as_u64) else {
        return Ok(0);
    };
    u32::try_from(version)
        .with_context(|| format!("document schema version {version} is out of range"))
}

pub fn upgrade(mut value: Value) -> anyhow::Result<Value> {
    let from = stored_version(&value)?;
    if from > SCHEMA_VERSION {
        anyhow::bail!(
            "document schema version {from} is newer than supported version {SCHEMA_VERSION}"
        );
    }

    let root = value
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("document root must be a JSON object"))?;

    for version in from..SCHEMA_VERSION {
        MIGRATIONS[version as usize](root)
            .with_context(|| format!("migrate schema v{version} -> v{}", version + 1))?;
        root.insert("schemaVersion".to_owned(), json!(version + 1));
        tracing::info!(from = version, to = version + 1, "migrated document schema");
    }

    Ok(value)
}

/// Fills a missing `language`; returns whether it had to.
pub fn ensure_language(value: &mut Value, default: &str) -> bool {
    let Some(root) = value.as_object_mut() else {
        return false;
    };
    let present = root
        .get("language")
        .and_then(Value::as_str)
        .is_some_and(|l| !l.trim().is_empty());
    if present {
        return false;
    }
    root.insert("language".to_owned(), json!(default));
    true
}

/// Documents written before versioning: string codex ids, plain string
/// section tags, and optional fields that were filled lazily by readers.
fn v0_to_v1(root: &mut Map<String, Value>) -> anyhow::Result<()> {
    root.entry("title").or_insert_with(|| json!(""));
    root.entry("acts").or_insert_with(|| json!([]));
    let codex = root.entry("codex").or_insert_with(|| {
        json!({ "categories": DEFAULT_CATEGORIES, "entries": [] })
    });
    let codex = codex
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("`codex` must be an object"))?;
    codex
        .entry("categories")
        .or_insert_with(|| json!(DEFAULT_CATEGORIES));
    let entries = codex
        .entry("entries")
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .ok_or_else(|| anyhow::anyhow!("`codex.entries` must be an array"))?;

    let mut names = HashMap::new();
    let mut pending = Vec::new();
    let mut max_id = 0u64;
    for (idx, entry) in entries.iter_mut().enumerate() {
        let entry = entry
            .as_object_mut()
            .ok_or_else(|| anyhow::anyhow!("codex entry {idx} must be an object"))?;
        entry.entry("tags").or_insert_with(|| json!([]));
        entry.entry("description").or_insert_with(|| json!(""));
        entry.entry("category").or_insert_with(|| json!(""));

        let id = match entry.get("id") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        match id {
            Some(id) => {
                max_id = max_id.max(id);
                entry.insert("id".to_owned(), json!(id));
            }
            None => pending.push(idx),
        }
    }
    for idx in pending {
        max_id += 1;
        if let Some(entry) = entries[idx].as_object_mut() {
            entry.insert("id".to_owned(), json!(max_id));
        }
    }
    for entry in entries.iter() {
        if let (Some(name), Some(id)) = (
            entry.get("name").and_then(Value::as_str),
            entry.get("id").and_then(Value::as_u64),
        ) {
            names.entry(name.to_owned()).or_insert(id);
        }
    }

    let acts = root
        .get_mut("acts")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| anyhow::anyhow!("`acts` must be an array"))?;
    for act in acts.iter_mut() {
        let Some(chapters) = act.get_mut("chapters").and_then(Value::as_array_mut) else {
            continue;
        };
        for chapter in chapters.iter_mut() {
            let Some(sections) = chapter.get_mut("sections").and_then(Value::as_array_mut)
            else {
                continue;
            };
            for section in sections.iter_mut() {
                let Some(section) = section.as_object_mut() else {
                    continue;
                };
                upgrade_section(section, &names);
            }
        }
    }

    Ok(())
}

fn upgrade_section(section: &mut Map<String, Value>, names: &HashMap<String, u64>) {
    if let Some(Value::Array(tags)) = section.get_mut("tags") {
        for tag in tags.iter_mut() {
            if let Value::String(label) = tag {
                let label = label.clone();
                *tag = match names.get(&label) {
                    Some(id) => json!({ "label": label, "entry": id }),
                    None => json!({ "label": label }),
                };
            }
        }
    }

    if let Some(Value::Object(settings)) = section.get_mut("settings") {
        let known = settings
            .get("pov")
            .and_then(Value::as_str)
            .is_some_and(|p| {
                matches!(
                    p,
                    "first-person"
                        | "second-person"
                        | "third-person"
                        | "third-person-limited"
                        | "third-person-omniscient"
                )
            });
        if !known {
            settings.insert("pov".to_owned(), json!("third-person"));
        }
        if !settings.get("narrator").is_some_and(Value::is_string) {
            settings.insert("narrator".to_owned(), json!(""));
        }
    }

    if let Some(Value::Array(notes)) = section.get_mut("notes") {
        notes.retain(Value::is_string);
    }
}
