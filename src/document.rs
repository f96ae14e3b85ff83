use std::path::Path;

use anyhow::Context as _;

use crate::codex::{self, CategoryRemoval, CodexError, EntryPatch, NewEntry};
use crate::formats::{
    Act, ActId, Book, Chapter, ChapterId, CodexEntryId, Pov, Section, SectionId, Tag,
};
use crate::reorder::{self, MoveOutcome};
use crate::store::BookStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SavePolicy {
    /// Every applied mutation saves the whole book.
    #[default]
    EveryMutation,
    /// Mutations mark the book dirty; `flush` saves.
    Deferred,
}

#[derive(Debug, Clone, Default)]
pub struct ChapterPatch {
    pub title: Option<String>,
    pub numbering: Option<bool>,
    pub visible_in_final: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct SectionPatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub notes: Option<Vec<String>>,
    pub pov: Option<Pov>,
    pub narrator: Option<String>,
}

type Listener = Box<dyn FnMut(&Book) + Send>;

/// Owns the book. Every edit goes through here, gets persisted according to
/// the save policy, and is announced to subscribers.
pub struct Document {
    book: Book,
    store: Box<dyn BookStore>,
    policy: SavePolicy,
    dirty: bool,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("title", &self.book.title)
            .field("store", &self.store.location())
            .field("policy", &self.policy)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl Document {
    pub fn new(book: Book, store: Box<dyn BookStore>) -> Self {
        Self {
            book,
            store,
            policy: SavePolicy::default(),
            dirty: false,
            listeners: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: SavePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Book) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        match self.policy {
            SavePolicy::EveryMutation => self.save_now()?,
            SavePolicy::Deferred => self.dirty = true,
        }
        for listener in &mut self.listeners {
            listener(&self.book);
        }
        Ok(())
    }

    pub fn save_now(&mut self) -> anyhow::Result<()> {
        self.store.save(&self.book).context("save book")?;
        self.dirty = false;
        tracing::debug!(location = %self.store.location(), "saved book");
        Ok(())
    }

    /// Saves if there are unsaved edits; reports whether it did.
    pub fn flush(&mut self) -> anyhow::Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.save_now()?;
        Ok(true)
    }

    pub fn save_as(&mut self, path: &Path) -> anyhow::Result<()> {
        self.store.save_as(path, &self.book)?;
        self.dirty = false;
        Ok(())
    }

    /// Swaps in a whole new book, e.g. one pushed by the host process.
    pub fn replace_book(&mut self, mut book: Book) -> anyhow::Result<()> {
        book.reconcile_ids()?;
        self.book = book;
        self.commit()
    }

    // Lookups.

    pub fn find_act(&self, act_id: ActId) -> Option<&Act> {
        self.book.acts.iter().find(|a| a.id == act_id)
    }

    pub fn find_chapter(&self, act_id: ActId, chapter_id: ChapterId) -> Option<&Chapter> {
        self.find_act(act_id)?
            .chapters
            .iter()
            .find(|c| c.id == chapter_id)
    }

    pub fn find_section(
        &self,
        act_id: ActId,
        chapter_id: ChapterId,
        section_id: SectionId,
    ) -> Option<&Section> {
        self.find_chapter(act_id, chapter_id)?
            .sections
            .iter()
            .find(|s| s.id == section_id)
    }

    /// The act currently holding `chapter_id`.
    pub fn locate_chapter(&self, chapter_id: ChapterId) -> Option<ActId> {
        self.book
            .chapters()
            .find(|(_, c)| c.id == chapter_id)
            .map(|(a, _)| a.id)
    }

    fn act_mut(&mut self, act_id: ActId) -> Option<&mut Act> {
        self.book.acts.iter_mut().find(|a| a.id == act_id)
    }

    fn chapter_mut(&mut self, act_id: ActId, chapter_id: ChapterId) -> Option<&mut Chapter> {
        self.act_mut(act_id)?
            .chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
    }

    fn section_mut(
        &mut self,
        act_id: ActId,
        chapter_id: ChapterId,
        section_id: SectionId,
    ) -> Option<&mut Section> {
        self.chapter_mut(act_id, chapter_id)?
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
    }

    // Book.

    pub fn set_title(&mut self, title: &str) -> anyhow::Result<()> {
        self.book.title = title.to_owned();
        self.commit()
    }

    pub fn set_language(&mut self, language: &str) -> anyhow::Result<()> {
        self.book.language = language.to_owned();
        self.commit()
    }

    // Acts.

    pub fn add_act(&mut self, title: &str) -> anyhow::Result<ActId> {
        let id = self.book.ids.act()?;
        self.book.acts.push(Act {
            id,
            title: title.to_owned(),
            chapters: Vec::new(),
        });
        self.commit()?;
        Ok(id)
    }

    pub fn rename_act(&mut self, act_id: ActId, title: &str) -> anyhow::Result<bool> {
        let Some(act) = self.act_mut(act_id) else {
            tracing::debug!(%act_id, "rename act: not found");
            return Ok(false);
        };
        act.title = title.to_owned();
        self.commit()?;
        Ok(true)
    }

    pub fn delete_act(&mut self, act_id: ActId) -> anyhow::Result<bool> {
        let Some(index) = self.book.acts.iter().position(|a| a.id == act_id) else {
            tracing::debug!(%act_id, "delete act: not found");
            return Ok(false);
        };
        self.book.acts.remove(index);
        self.commit()?;
        Ok(true)
    }

    // Chapters.

    pub fn add_chapter(&mut self, act_id: ActId, title: &str) -> anyhow::Result<Option<ChapterId>> {
        if self.find_act(act_id).is_none() {
            tracing::debug!(%act_id, "add chapter: act not found");
            return Ok(None);
        }
        let id = self.book.ids.chapter()?;
        if let Some(act) = self.act_mut(act_id) {
            act.chapters.push(Chapter::new(id, title));
        }
        self.commit()?;
        Ok(Some(id))
    }

    pub fn update_chapter(
        &mut self,
        act_id: ActId,
        chapter_id: ChapterId,
        patch: ChapterPatch,
    ) -> anyhow::Result<bool> {
        let Some(chapter) = self.chapter_mut(act_id, chapter_id) else {
            tracing::debug!(%act_id, %chapter_id, "update chapter: not found");
            return Ok(false);
        };
        if let Some(title) = patch.title {
            chapter.title = title;
        }
        if let Some(numbering) = patch.numbering {
            chapter.numbering = numbering;
        }
        if let Some(visible) = patch.visible_in_final {
            chapter.visible_in_final = visible;
        }
        self.commit()?;
        Ok(true)
    }

    pub fn delete_chapter(&mut self, act_id: ActId, chapter_id: ChapterId) -> anyhow::Result<bool> {
        let Some(act) = self.act_mut(act_id) else {
            tracing::debug!(%act_id, "delete chapter: act not found");
            return Ok(false);
        };
        let Some(index) = act.chapters.iter().position(|c| c.id == chapter_id) else {
            tracing::debug!(%act_id, %chapter_id, "delete chapter: not found");
            return Ok(false);
        };
        act.chapters.remove(index);
        self.commit()?;
        Ok(true)
    }

    /// Drag-and-drop move; see [`reorder::move_chapter`]. Only a real move is
    /// persisted.
    pub fn move_chapter(
        &mut self,
        chapter_id: ChapterId,
        from_act: ActId,
        to_act: ActId,
        target_id: ChapterId,
    ) -> anyhow::Result<MoveOutcome> {
        let outcome =
            reorder::move_chapter(&mut self.book.acts, chapter_id, from_act, to_act, target_id);
        if outcome.is_moved() {
            self.commit()?;
        }
        Ok(outcome)
    }

    // Sections.

    pub fn add_section(
        &mut self,
        act_id: ActId,
        chapter_id: ChapterId,
        title: &str,
        summary: &str,
    ) -> anyhow::Result<Option<SectionId>> {
        if self.find_chapter(act_id, chapter_id).is_none() {
            tracing::debug!(%act_id, %chapter_id, "add section: chapter not found");
            return Ok(None);
        }
        let id = self.book.ids.section()?;
        if let Some(chapter) = self.chapter_mut(act_id, chapter_id) {
            let mut section = Section::new(id, title);
            section.summary = summary.to_owned();
            chapter.sections.push(section);
        }
        self.commit()?;
        Ok(Some(id))
    }

    pub fn update_section(
        &mut self,
        act_id: ActId,
        chapter_id: ChapterId,
        section_id: SectionId,
        patch: SectionPatch,
    ) -> anyhow::Result<bool> {
        let Some(section) = self.section_mut(act_id, chapter_id, section_id) else {
            tracing::debug!(%act_id, %chapter_id, %section_id, "update section: not found");
            return Ok(false);
        };
        if let Some(title) = patch.title {
            section.title = title;
        }
        if let Some(summary) = patch.summary {
            section.summary = summary;
        }
        if let Some(content) = patch.content {
            section.content = content;
        }
        if let Some(notes) = patch.notes {
            section.notes = notes;
        }
        if let Some(pov) = patch.pov {
            section.settings.pov = pov;
        }
        if let Some(narrator) = patch.narrator {
            section.settings.narrator = narrator;
        }
        self.commit()?;
        Ok(true)
    }

    pub fn delete_section(
        &mut self,
        act_id: ActId,
        chapter_id: ChapterId,
        section_id: SectionId,
    ) -> anyhow::Result<bool> {
        let Some(chapter) = self.chapter_mut(act_id, chapter_id) else {
            tracing::debug!(%act_id, %chapter_id, "delete section: chapter not found");
            return Ok(false);
        };
        let Some(index) = chapter.sections.iter().position(|s| s.id == section_id) else {
            tracing::debug!(%act_id, %chapter_id, %section_id, "delete section: not found");
            return Ok(false);
        };
        chapter.sections.remove(index);
        self.commit()?;
        Ok(true)
    }

    pub fn add_section_note(
        &mut self,
        act_id: ActId,
        chapter_id: ChapterId,
        section_id: SectionId,
        note: &str,
    ) -> anyhow::Result<bool> {
        let Some(section) = self.section_mut(act_id, chapter_id, section_id) else {
            tracing::debug!(%act_id, %chapter_id, %section_id, "add note: section not found");
            return Ok(false);
        };
        section.notes.push(note.trim().to_owned());
        self.commit()?;
        Ok(true)
    }

    /// Replaces the section's tags. Labels must come from the codex
    /// vocabulary unless `allow_free` is set.
    pub fn set_section_tags(
        &mut self,
        act_id: ActId,
        chapter_id: ChapterId,
        section_id: SectionId,
        labels: &[String],
        allow_free: bool,
    ) -> anyhow::Result<bool> {
        let mut tags: Vec<Tag> = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.trim();
            if label.is_empty() || tags.iter().any(|t| t.label == label) {
                continue;
            }
            let tag = match self.book.codex.resolve_tag(label) {
                Some(tag) => tag,
                None if allow_free => Tag::free(label),
                None => return Err(CodexError::UnknownTag(label.to_owned()).into()),
            };
            tags.push(tag);
        }

        let Some(section) = self.section_mut(act_id, chapter_id, section_id) else {
            tracing::debug!(%act_id, %chapter_id, %section_id, "set tags: section not found");
            return Ok(false);
        };
        section.tags = tags;
        self.commit()?;
        Ok(true)
    }

    // Codex.

    pub fn add_category(&mut self, name: &str) -> anyhow::Result<String> {
        let name = self.book.codex.add_category(name)?;
        self.commit()?;
        Ok(name)
    }

    pub fn remove_category(
        &mut self,
        name: &str,
        confirm: impl FnOnce(&[&str]) -> bool,
    ) -> anyhow::Result<CategoryRemoval> {
        let outcome = self.book.codex.remove_category(name, confirm);
        if outcome == CategoryRemoval::Removed {
            self.commit()?;
        }
        Ok(outcome)
    }

    pub fn add_codex_entry(&mut self, entry: NewEntry) -> anyhow::Result<CodexEntryId> {
        let id = codex::add_entry(&mut self.book, entry)?;
        self.commit()?;
        Ok(id)
    }

    pub fn update_codex_entry(
        &mut self,
        id: CodexEntryId,
        patch: EntryPatch,
    ) -> anyhow::Result<bool> {
        if !codex::update_entry(&mut self.book, id, patch)? {
            return Ok(false);
        }
        self.commit()?;
        Ok(true)
    }

    pub fn delete_codex_entry(&mut self, id: CodexEntryId) -> anyhow::Result<bool> {
        if !codex::delete_entry(&mut self.book, id) {
            return Ok(false);
        }
        self.commit()?;
        Ok(true)
    }
}
