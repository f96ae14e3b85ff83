use std::collections::BTreeMap;

use crate::formats::{Book, Codex, CodexEntry, CodexEntryId, IdSpaceExhausted, Tag};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodexError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("category already exists: {0}")]
    DuplicateCategory(String),
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("tag is not a codex entry name or codex tag: {0}")]
    UnknownTag(String),
    #[error(transparent)]
    Ids(#[from] IdSpaceExhausted),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryRemoval {
    Removed,
    /// Entries still referenced the category and the caller declined.
    Declined,
    NotFound,
}

#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub name: String,
    pub category: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl Codex {
    pub fn add_category(&mut self, name: &str) -> Result<String, CodexError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CodexError::EmptyName);
        }
        if self.categories.iter().any(|c| c == name) {
            return Err(CodexError::DuplicateCategory(name.to_owned()));
        }
        self.categories.push(name.to_owned());
        Ok(name.to_owned())
    }

    /// Removes the category string only. Entries that point at it keep the
    /// stale name; `confirm` is asked first when any exist.
    pub fn remove_category(
        &mut self,
        name: &str,
        confirm: impl FnOnce(&[&str]) -> bool,
    ) -> CategoryRemoval {
        let Some(index) = self.categories.iter().position(|c| c == name) else {
            return CategoryRemoval::NotFound;
        };

        let referencing = self
            .entries
            .iter()
            .filter(|e| e.category == name)
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>();
        if !referencing.is_empty() && !confirm(&referencing) {
            return CategoryRemoval::Declined;
        }

        self.categories.remove(index);
        CategoryRemoval::Removed
    }

    pub fn entry(&self, id: CodexEntryId) -> Option<&CodexEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a CodexEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Entries whose category is no longer listed.
    pub fn uncategorized(&self) -> impl Iterator<Item = &CodexEntry> {
        self.entries
            .iter()
            .filter(move |e| !self.categories.iter().any(|c| *c == e.category))
    }

    /// Case-insensitive substring match on name or description.
    pub fn search(&self, term: &str) -> Vec<&CodexEntry> {
        let term = term.to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&term)
                    || e.description.to_lowercase().contains(&term)
            })
            .collect()
    }

    /// Entry names plus entry tags, deduplicated and sorted case-insensitively.
    pub fn vocabulary(&self) -> Vec<String> {
        let mut words = BTreeMap::new();
        for entry in &self.entries {
            for word in std::iter::once(&entry.name).chain(entry.tags.iter()) {
                words
                    .entry(word.to_lowercase())
                    .or_insert_with(|| word.clone());
            }
        }
        words.into_values().collect()
    }

    /// Builds a section tag for `label`, linking it when it names an entry.
    pub fn resolve_tag(&self, label: &str) -> Option<Tag> {
        if let Some(entry) = self.entries.iter().find(|e| e.name == label) {
            return Some(Tag {
                label: entry.name.clone(),
                entry: Some(entry.id),
            });
        }
        if self.entries.iter().any(|e| e.tags.iter().any(|t| t == label)) {
            return Some(Tag::free(label));
        }
        None
    }

    fn ensure_category(&self, category: &str) -> Result<(), CodexError> {
        if self.categories.iter().any(|c| c == category) {
            Ok(())
        } else {
            Err(CodexError::UnknownCategory(category.to_owned()))
        }
    }
}

pub fn add_entry(book: &mut Book, entry: NewEntry) -> Result<CodexEntryId, CodexError> {
    let name = entry.name.trim();
    if name.is_empty() {
        return Err(CodexError::EmptyName);
    }
    book.codex.ensure_category(&entry.category)?;

    let id = book.ids.entry()?;
    book.codex.entries.push(CodexEntry {
        id,
        name: name.to_owned(),
        category: entry.category,
        description: entry.description,
        tags: clean_tags(entry.tags),
        created_at: Some(chrono::Utc::now()),
    });
    tracing::debug!(%id, name, "added codex entry");
    Ok(id)
}

/// Applies `patch`; a rename is pushed into every linked section tag.
pub fn update_entry(
    book: &mut Book,
    id: CodexEntryId,
    patch: EntryPatch,
) -> Result<bool, CodexError> {
    if let Some(category) = patch.category.as_deref() {
        book.codex.ensure_category(category)?;
    }
    let new_name = match patch.name.as_deref().map(str::trim) {
        Some("") => return Err(CodexError::EmptyName),
        Some(name) => Some(name.to_owned()),
        None => None,
    };

    let Some(entry) = book.codex.entries.iter_mut().find(|e| e.id == id) else {
        tracing::debug!(%id, "update codex entry: not found");
        return Ok(false);
    };

    if let Some(category) = patch.category {
        entry.category = category;
    }
    if let Some(description) = patch.description {
        entry.description = description;
    }
    if let Some(tags) = patch.tags {
        entry.tags = clean_tags(tags);
    }

    if let Some(name) = new_name
        && name != entry.name
    {
        entry.name = name.clone();
        let mut relabeled = 0usize;
        for section in book.sections_mut() {
            for tag in section.tags.iter_mut().filter(|t| t.entry == Some(id)) {
                tag.label = name.clone();
                relabeled += 1;
            }
        }
        tracing::debug!(%id, relabeled, "renamed codex entry");
    }

    Ok(true)
}

/// Removes the entry; linked section tags survive as free tags.
pub fn delete_entry(book: &mut Book, id: CodexEntryId) -> bool {
    let Some(index) = book.codex.entries.iter().position(|e| e.id == id) else {
        tracing::debug!(%id, "delete codex entry: not found");
        return false;
    };
    book.codex.entries.remove(index);

    for section in book.sections_mut() {
        for tag in section.tags.iter_mut().filter(|t| t.entry == Some(id)) {
            tag.entry = None;
        }
    }
    true
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_owned());
        }
    }
    out
}
