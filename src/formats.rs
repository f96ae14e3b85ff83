use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_LANGUAGE: &str = "pt-BR";
pub const DEFAULT_TITLE: &str = "Novo Livro";
pub const DEFAULT_CATEGORIES: [&str; 6] = ["Character", "Locals", "Plots", "Object", "Lore", "Other"];

macro_rules! id_type {
    ($name:ident, $repr:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

id_type!(ActId, u32);
id_type!(ChapterId, u32);
id_type!(SectionId, u32);
id_type!(CodexEntryId, u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub schema_version: u32,
    pub title: String,
    pub language: String,
    #[serde(default)]
    pub codex: Codex,
    #[serde(default)]
    pub acts: Vec<Act>,
    #[serde(default)]
    pub ids: IdCounters,
}

impl Book {
    pub fn empty() -> Self {
        Self::new(DEFAULT_TITLE, DEFAULT_LANGUAGE)
    }

    pub fn new(title: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            title: title.into(),
            language: language.into(),
            codex: Codex::default(),
            acts: Vec::new(),
            ids: IdCounters::default(),
        }
    }

    /// Raises the id counters above every id already present. Fails when an
    /// id already sits at the top of its range.
    pub fn reconcile_ids(&mut self) -> Result<(), IdSpaceExhausted> {
        let max_act = self.acts.iter().map(|a| a.id.0).max().unwrap_or(0);
        let chapters = self.acts.iter().flat_map(|a| &a.chapters);
        let max_chapter = chapters.clone().map(|c| c.id.0).max().unwrap_or(0);
        let max_section = chapters
            .flat_map(|c| &c.sections)
            .map(|s| s.id.0)
            .max()
            .unwrap_or(0);
        let max_entry = self.codex.entries.iter().map(|e| e.id.0).max().unwrap_or(0);

        let above = |max: u32, kind| max.checked_add(1).ok_or(IdSpaceExhausted(kind));
        self.ids.next_act = self.ids.next_act.max(above(max_act, "acts")?);
        self.ids.next_chapter = self.ids.next_chapter.max(above(max_chapter, "chapters")?);
        self.ids.next_section = self.ids.next_section.max(above(max_section, "sections")?);
        let next_entry = max_entry
            .checked_add(1)
            .ok_or(IdSpaceExhausted("codex entries"))?;
        self.ids.next_entry = self.ids.next_entry.max(next_entry);
        Ok(())
    }

    pub fn chapters(&self) -> impl Iterator<Item = (&Act, &Chapter)> {
        self.acts
            .iter()
            .flat_map(|act| act.chapters.iter().map(move |chapter| (act, chapter)))
    }

    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.acts
            .iter_mut()
            .flat_map(|a| a.chapters.iter_mut())
            .flat_map(|c| c.sections.iter_mut())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("id space exhausted for {0}")]
pub struct IdSpaceExhausted(pub &'static str);

/// Monotonic id allocation shared by every entity kind in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdCounters {
    pub next_act: u32,
    pub next_chapter: u32,
    pub next_section: u32,
    pub next_entry: u64,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self {
            next_act: 1,
            next_chapter: 1,
            next_section: 1,
            next_entry: 1,
        }
    }
}

impl IdCounters {
    pub fn act(&mut self) -> Result<ActId, IdSpaceExhausted> {
        let id = self.next_act;
        self.next_act = id.checked_add(1).ok_or(IdSpaceExhausted("acts"))?;
        Ok(ActId(id))
    }

    pub fn chapter(&mut self) -> Result<ChapterId, IdSpaceExhausted> {
        let id = self.next_chapter;
        self.next_chapter = id.checked_add(1).ok_or(IdSpaceExhausted("chapters"))?;
        Ok(ChapterId(id))
    }

    pub fn section(&mut self) -> Result<SectionId, IdSpaceExhausted> {
        let id = self.next_section;
        self.next_section = id.checked_add(1).ok_or(IdSpaceExhausted("sections"))?;
        Ok(SectionId(id))
    }

    pub fn entry(&mut self) -> Result<CodexEntryId, IdSpaceExhausted> {
        let id = self.next_entry;
        self.next_entry = id
            .checked_add(1)
            .ok_or(IdSpaceExhausted("codex entries"))?;
        Ok(CodexEntryId(id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Act {
    pub id: ActId,
    pub title: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: ChapterId,
    pub title: String,
    #[serde(default = "default_true")]
    pub numbering: bool,
    #[serde(default = "default_true")]
    pub visible_in_final: bool,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Chapter {
    pub fn new(id: ChapterId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            numbering: true,
            visible_in_final: true,
            sections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    /// HTML.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub settings: SectionSettings,
}

impl Section {
    pub fn new(id: SectionId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            summary: String::new(),
            content: String::new(),
            tags: Vec::new(),
            notes: Vec::new(),
            settings: SectionSettings::default(),
        }
    }

    pub fn has_tag(&self, label: &str) -> bool {
        self.tags.iter().any(|t| t.label == label)
    }

    pub fn tag_labels(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.label.as_str()).collect()
    }
}

/// A section label. `entry` links the label to a codex entry; `label` is the
/// cached display name and is rewritten when that entry is renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<CodexEntryId>,
}

impl Tag {
    pub fn free(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entry: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSettings {
    #[serde(default)]
    pub pov: Pov,
    #[serde(default)]
    pub narrator: String,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Pov {
    FirstPerson,
    SecondPerson,
    #[default]
    ThirdPerson,
    ThirdPersonLimited,
    ThirdPersonOmniscient,
}

impl Pov {
    pub fn phrase(self) -> &'static str {
        match self {
            Pov::FirstPerson => "first person (I/we)",
            Pov::SecondPerson => "second person (you)",
            Pov::ThirdPerson => "third person (he/she/they)",
            Pov::ThirdPersonLimited => "third person limited",
            Pov::ThirdPersonOmniscient => "third person omniscient",
        }
    }

    /// Points of view told through a specific character.
    pub fn needs_narrator(self) -> bool {
        matches!(self, Pov::FirstPerson | Pov::ThirdPersonLimited)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codex {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub entries: Vec<CodexEntry>,
}

impl Default for Codex {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|c| (*c).to_owned()).collect(),
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodexEntry {
    pub id: CodexEntryId,
    pub name: String,
    /// May name a category that no longer exists.
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}
