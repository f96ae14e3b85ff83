//! Tag filter over the book structure.
//!
//! A chapter stays visible when at least one of its sections carries every
//! active tag; an act stays visible when at least one of its chapters does.
//! With no active tags everything is visible.

use std::collections::{BTreeSet, HashSet};

use crate::cli::{BookArgs, FilterArgs};
use crate::edit;
use crate::formats::{ActId, Book, ChapterId, Section};
use crate::outline;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    active: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterView {
    pub visible_acts: HashSet<ActId>,
    pub visible_chapters: HashSet<ChapterId>,
}

impl FilterView {
    pub fn is_act_visible(&self, id: ActId) -> bool {
        self.visible_acts.contains(&id)
    }

    pub fn is_chapter_visible(&self, id: ChapterId) -> bool {
        self.visible_chapters.contains(&id)
    }
}

impl TagFilter {
    pub fn from_tags(tags: impl IntoIterator<Item = String>) -> Self {
        let mut filter = Self::default();
        for tag in tags {
            filter.add(&tag);
        }
        filter
    }

    pub fn add(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        !tag.is_empty() && self.active.insert(tag.to_owned())
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        self.active.remove(tag)
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.active.contains(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(String::as_str)
    }

    pub fn section_matches(&self, section: &Section) -> bool {
        self.active.iter().all(|tag| section.has_tag(tag))
    }

    pub fn apply(&self, book: &Book) -> FilterView {
        let mut view = FilterView::default();
        for act in &book.acts {
            for chapter in &act.chapters {
                let visible =
                    self.is_empty() || chapter.sections.iter().any(|s| self.section_matches(s));
                if visible {
                    view.visible_chapters.insert(chapter.id);
                    view.visible_acts.insert(act.id);
                }
            }
            if self.is_empty() {
                view.visible_acts.insert(act.id);
            }
        }
        view
    }
}

/// Vocabulary words containing `query` (case-insensitive) that are not
/// already active. A blank query suggests nothing.
pub fn autocomplete<'a>(vocabulary: &'a [String], query: &str, active: &TagFilter) -> Vec<&'a str> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    vocabulary
        .iter()
        .filter(|word| word.to_lowercase().contains(&query) && !active.contains(word))
        .map(String::as_str)
        .collect()
}

pub fn run(book_args: &BookArgs, args: FilterArgs) -> anyhow::Result<()> {
    let doc = edit::open_document(book_args)?;
    let book = doc.book();
    let filter = TagFilter::from_tags(args.tag);

    if let Some(query) = args.complete.as_deref() {
        let vocabulary = book.codex.vocabulary();
        for word in autocomplete(&vocabulary, query, &filter) {
            println!("{word}");
        }
        return Ok(());
    }

    let view = filter.apply(book);
    tracing::debug!(
        tags = ?filter.tags().collect::<Vec<_>>(),
        acts = view.visible_acts.len(),
        chapters = view.visible_chapters.len(),
        "applied tag filter"
    );
    print!("{}", outline::render_outline(book, Some(&view)));
    Ok(())
}
