use std::collections::HashMap;
use std::fmt::Write as _;

use crate::cli::ShowArgs;
use crate::edit;
use crate::filter::{FilterView, TagFilter};
use crate::formats::{Book, ChapterId};

/// Book-wide chapter numbers. Chapters with numbering turned off get no
/// number and do not advance the count.
pub fn chapter_numbers(book: &Book) -> HashMap<ChapterId, u32> {
    let mut next = 0u32;
    book.chapters()
        .filter(|(_, chapter)| chapter.numbering)
        .map(|(_, chapter)| {
            next += 1;
            (chapter.id, next)
        })
        .collect()
}

pub fn chapter_heading(number: Option<u32>, title: &str) -> String {
    match number {
        Some(number) => format!("Chapter {number}: {title}"),
        None => title.to_owned(),
    }
}

pub fn render_outline(book: &Book, view: Option<&FilterView>) -> String {
    let numbers = chapter_numbers(book);
    let mut out = String::new();
    let _ = writeln!(out, "{} [{}]", book.title, book.language);

    for act in &book.acts {
        if view.is_some_and(|v| !v.is_act_visible(act.id)) {
            continue;
        }
        let _ = writeln!(out, "Act {}: {}", act.id, act.title);
        for chapter in &act.chapters {
            if view.is_some_and(|v| !v.is_chapter_visible(chapter.id)) {
                continue;
            }
            let mut flags = Vec::new();
            if !chapter.visible_in_final {
                flags.push("hidden");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };
            let _ = writeln!(
                out,
                "  [{}] {}{flags}",
                chapter.id,
                chapter_heading(numbers.get(&chapter.id).copied(), &chapter.title)
            );
            for section in &chapter.sections {
                let _ = write!(out, "    [{}] {}", section.id, section.title);
                if !section.tags.is_empty() {
                    let _ = write!(out, " #{}", section.tag_labels().join(" #"));
                }
                out.push('\n');
                if !section.summary.trim().is_empty() {
                    let _ = writeln!(out, "        {}", section.summary.trim());
                }
            }
        }
    }
    out
}

pub fn show(book: &Book, args: &ShowArgs) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(book)?);
        return Ok(());
    }
    let filter = TagFilter::from_tags(args.tag.iter().cloned());
    let view = (!filter.is_empty()).then(|| filter.apply(book));
    print!("{}", render_outline(book, view.as_ref()));
    Ok(())
}

pub fn run(book_args: &crate::cli::BookArgs, args: ShowArgs) -> anyhow::Result<()> {
    let doc = edit::open_document(book_args)?;
    show(doc.book(), &args)
}
