//! Command handlers for structural edits.

use anyhow::Context as _;

use crate::cli::{
    ActCommand, BookArgs, CategoryCommand, ChapterCommand, CodexCommand, EntryCommand, InitArgs,
    SectionCommand,
};
use crate::codex::{CategoryRemoval, EntryPatch, NewEntry};
use crate::document::{ChapterPatch, Document, SectionPatch};
use crate::formats::{Book, DEFAULT_LANGUAGE, DEFAULT_TITLE};
use crate::reorder::{MoveOutcome, Unchanged};
use crate::store::{self, BookStore, FileStore, LocalStorage};

fn open_store(args: &BookArgs) -> Box<dyn BookStore> {
    match &args.storage_dir {
        Some(dir) => Box::new(LocalStorage::new(dir)),
        None => Box::new(FileStore::new(&args.book)),
    }
}

pub fn open_document(args: &BookArgs) -> anyhow::Result<Document> {
    let mut store = open_store(args);
    let loaded = store::load_book(store.as_mut(), args.bundled.as_deref())?;
    tracing::debug!(location = %store.location(), source = ?loaded.source, "opened book");
    Ok(Document::new(loaded.book, store))
}

pub fn init(book_args: &BookArgs, args: InitArgs) -> anyhow::Result<()> {
    let mut store = open_store(book_args);
    if !args.force && store.load().context("check existing book")?.is_some() {
        anyhow::bail!("book already exists: {} (use --force)", store.location());
    }
    let book = Book::new(
        args.title.as_deref().unwrap_or(DEFAULT_TITLE),
        args.language.as_deref().unwrap_or(DEFAULT_LANGUAGE),
    );
    store.save(&book)?;
    tracing::info!(location = %store.location(), title = %book.title, "created book");
    Ok(())
}

fn found(applied: bool, what: impl FnOnce() -> String) -> anyhow::Result<()> {
    if applied {
        Ok(())
    } else {
        anyhow::bail!("{} not found", what())
    }
}

pub fn act(book_args: &BookArgs, command: ActCommand) -> anyhow::Result<()> {
    let mut doc = open_document(book_args)?;
    match command {
        ActCommand::Add { title } => {
            let id = doc.add_act(&title)?;
            println!("{id}");
        }
        ActCommand::Rename { act, title } => {
            found(doc.rename_act(act, &title)?, || format!("act {act}"))?;
        }
        ActCommand::Delete { act } => {
            found(doc.delete_act(act)?, || format!("act {act}"))?;
        }
    }
    Ok(())
}

pub fn chapter(book_args: &BookArgs, command: ChapterCommand) -> anyhow::Result<()> {
    let mut doc = open_document(book_args)?;
    match command {
        ChapterCommand::Add { act, title } => {
            let id = doc
                .add_chapter(act, &title)?
                .ok_or_else(|| anyhow::anyhow!("act {act} not found"))?;
            println!("{id}");
        }
        ChapterCommand::Update {
            act,
            chapter,
            title,
            numbering,
            visible_in_final,
        } => {
            let patch = ChapterPatch {
                title,
                numbering,
                visible_in_final,
            };
            found(doc.update_chapter(act, chapter, patch)?, || {
                format!("chapter {chapter} in act {act}")
            })?;
        }
        ChapterCommand::Delete { act, chapter } => {
            found(doc.delete_chapter(act, chapter)?, || {
                format!("chapter {chapter} in act {act}")
            })?;
        }
        ChapterCommand::Move {
            chapter,
            target,
            from_act,
            to_act,
        } => {
            let from_act = from_act
                .or_else(|| doc.locate_chapter(chapter))
                .ok_or_else(|| anyhow::anyhow!("chapter {chapter} not found"))?;
            let to_act = to_act
                .or_else(|| doc.locate_chapter(target))
                .ok_or_else(|| anyhow::anyhow!("chapter {target} not found"))?;
            match doc.move_chapter(chapter, from_act, to_act, target)? {
                MoveOutcome::Moved { act, index } => {
                    tracing::info!(%chapter, %act, index, "chapter moved");
                }
                MoveOutcome::Unchanged(Unchanged::SelfDrop) => {
                    tracing::info!(%chapter, "dropped on itself; nothing to do");
                }
                MoveOutcome::Unchanged(Unchanged::NotFound) => {
                    anyhow::bail!("move chapter {chapter}: act or chapter not found");
                }
            }
        }
    }
    Ok(())
}

pub fn section(book_args: &BookArgs, command: SectionCommand) -> anyhow::Result<()> {
    let mut doc = open_document(book_args)?;
    match command {
        SectionCommand::Add {
            act,
            chapter,
            title,
            summary,
        } => {
            let id = doc
                .add_section(act, chapter, &title, &summary)?
                .ok_or_else(|| anyhow::anyhow!("chapter {chapter} in act {act} not found"))?;
            println!("{id}");
        }
        SectionCommand::Update {
            at,
            title,
            summary,
            content,
            content_file,
            pov,
            narrator,
        } => {
            let content = match content_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("read content: {}", path.display()))?,
                ),
                None => content,
            };
            let patch = SectionPatch {
                title,
                summary,
                content,
                notes: None,
                pov,
                narrator,
            };
            found(
                doc.update_section(at.act, at.chapter, at.section, patch)?,
                || format!("section {}", at.section),
            )?;
        }
        SectionCommand::Delete { at } => {
            found(
                doc.delete_section(at.act, at.chapter, at.section)?,
                || format!("section {}", at.section),
            )?;
        }
        SectionCommand::Note { at, text } => {
            if text.trim().is_empty() {
                anyhow::bail!("note must not be empty");
            }
            found(
                doc.add_section_note(at.act, at.chapter, at.section, &text)?,
                || format!("section {}", at.section),
            )?;
        }
        SectionCommand::Tag {
            at,
            tags,
            allow_free_tags,
        } => {
            found(
                doc.set_section_tags(at.act, at.chapter, at.section, &tags, allow_free_tags)?,
                || format!("section {}", at.section),
            )?;
        }
    }
    Ok(())
}

pub fn codex(book_args: &BookArgs, command: CodexCommand) -> anyhow::Result<()> {
    let mut doc = open_document(book_args)?;
    match command {
        CodexCommand::Category { command } => category(&mut doc, command)?,
        CodexCommand::Entry { command } => entry(&mut doc, command)?,
        CodexCommand::Vocabulary => {
            for word in doc.book().codex.vocabulary() {
                println!("{word}");
            }
        }
    }
    Ok(())
}

fn category(doc: &mut Document, command: CategoryCommand) -> anyhow::Result<()> {
    match command {
        CategoryCommand::Add { name } => {
            let name = doc.add_category(&name)?;
            tracing::info!(%name, "category added");
        }
        CategoryCommand::Remove { name, yes } => {
            let mut in_use = Vec::new();
            let outcome = doc.remove_category(&name, |entries| {
                in_use = entries.iter().map(|e| (*e).to_owned()).collect();
                yes
            })?;
            match outcome {
                CategoryRemoval::Removed => {
                    if !in_use.is_empty() {
                        tracing::warn!(%name, entries = ?in_use, "entries keep the removed category");
                    }
                }
                CategoryRemoval::Declined => anyhow::bail!(
                    "category {name} is used by: {} (use --yes to remove it anyway)",
                    in_use.join(", ")
                ),
                CategoryRemoval::NotFound => anyhow::bail!("category {name} not found"),
            }
        }
        CategoryCommand::List => {
            let codex = &doc.book().codex;
            for category in &codex.categories {
                println!("{category}\t{}", codex.entries_in(category).count());
            }
            let orphans = codex.uncategorized().count();
            if orphans > 0 {
                println!("(uncategorized)\t{orphans}");
            }
        }
    }
    Ok(())
}

fn entry(doc: &mut Document, command: EntryCommand) -> anyhow::Result<()> {
    match command {
        EntryCommand::Add {
            name,
            category,
            description,
            tag,
        } => {
            let id = doc.add_codex_entry(NewEntry {
                name,
                category,
                description,
                tags: tag,
            })?;
            println!("{id}");
        }
        EntryCommand::Update {
            id,
            name,
            category,
            description,
            tag,
            clear_tags,
        } => {
            let tags = if clear_tags {
                Some(Vec::new())
            } else if tag.is_empty() {
                None
            } else {
                Some(tag)
            };
            let patch = EntryPatch {
                name,
                category,
                description,
                tags,
            };
            found(doc.update_codex_entry(id, patch)?, || format!("codex entry {id}"))?;
        }
        EntryCommand::Delete { id } => {
            found(doc.delete_codex_entry(id)?, || format!("codex entry {id}"))?;
        }
        EntryCommand::List { category, search } => {
            let codex = &doc.book().codex;
            let entries = match (&category, &search) {
                (_, Some(term)) => codex.search(term),
                (Some(category), None) => codex.entries_in(category).collect(),
                (None, None) => codex.entries.iter().collect(),
            };
            for entry in entries {
                if category.as_ref().is_some_and(|c| *c != entry.category) {
                    continue;
                }
                let tags = if entry.tags.is_empty() {
                    String::new()
                } else {
                    format!("\t#{}", entry.tags.join(" #"))
                };
                println!("{}\t{}\t{}{tags}", entry.id, entry.category, entry.name);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::formats::{ActId, ChapterId};

    fn args(dir: &Path) -> BookArgs {
        BookArgs {
            book: dir.join("book.json"),
            storage_dir: None,
            bundled: None,
        }
    }

    fn chapter_order(args: &BookArgs, act: ActId) -> anyhow::Result<Vec<ChapterId>> {
        let doc = open_document(args)?;
        let act = doc
            .find_act(act)
            .ok_or_else(|| anyhow::anyhow!("act {act} missing"))?;
        Ok(act.chapters.iter().map(|c| c.id).collect())
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let args = args(temp.path());
        let init_args = |title: &str, force| InitArgs {
            title: Some(title.to_owned()),
            language: None,
            force,
        };

        init(&args, init_args("First", false))?;
        assert!(init(&args, init_args("Second", false)).is_err());
        assert_eq!(open_document(&args)?.book().title, "First");

        init(&args, init_args("Second", true))?;
        let doc = open_document(&args)?;
        assert_eq!(doc.book().title, "Second");
        assert_eq!(doc.book().language, DEFAULT_LANGUAGE);
        Ok(())
    }

    #[test]
    fn move_looks_up_acts_when_omitted() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let args = args(temp.path());
        act(&args, ActCommand::Add { title: "One".to_owned() })?;
        let act_id = open_document(&args)?.book().acts[0].id;
        for title in ["a", "b", "c"] {
            chapter(
                &args,
                ChapterCommand::Add {
                    act: act_id,
                    title: title.to_owned(),
                },
            )?;
        }
        let before = chapter_order(&args, act_id)?;

        chapter(
            &args,
            ChapterCommand::Move {
                chapter: before[0],
                target: before[2],
                from_act: None,
                to_act: None,
            },
        )?;

        assert_eq!(
            chapter_order(&args, act_id)?,
            vec![before[1], before[2], before[0]]
        );
        Ok(())
    }

    #[test]
    fn missing_targets_are_errors() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let args = args(temp.path());

        let err = act(&args, ActCommand::Delete { act: ActId(7) })
            .err()
            .ok_or_else(|| anyhow::anyhow!("delete of a missing act succeeded"))?;
        assert_eq!(err.to_string(), "act 7 not found");

        assert!(
            chapter(
                &args,
                ChapterCommand::Add {
                    act: ActId(7),
                    title: "x".to_owned(),
                },
            )
            .is_err()
        );
        Ok(())
    }

    #[test]
    fn removing_a_used_category_needs_yes() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let args = args(temp.path());
        codex(
            &args,
            CodexCommand::Entry {
                command: EntryCommand::Add {
                    name: "Mira".to_owned(),
                    category: "Character".to_owned(),
                    description: String::new(),
                    tag: Vec::new(),
                },
            },
        )?;

        let remove = |yes| CodexCommand::Category {
            command: CategoryCommand::Remove {
                name: "Character".to_owned(),
                yes,
            },
        };
        let err = codex(&args, remove(false))
            .err()
            .ok_or_else(|| anyhow::anyhow!("declined removal succeeded"))?;
        assert!(err.to_string().contains("Mira"));
        assert!(
            open_document(&args)?
                .book()
                .codex
                .categories
                .iter()
                .any(|c| c == "Character")
        );

        codex(&args, remove(true))?;
        let doc = open_document(&args)?;
        assert!(!doc.book().codex.categories.iter().any(|c| c == "Character"));
        assert_eq!(doc.book().codex.entries[0].category, "Character");
        Ok(())
    }
}
