use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;

use crate::cli::{BookArgs, ExportArgs};
use crate::edit;
use crate::formats::Book;
use crate::outline;

/// The manuscript as Markdown. Chapters hidden from the final book are left
/// out unless `include_hidden` is set; chapter numbers match the outline.
pub fn render_markdown(book: &Book, include_hidden: bool) -> String {
    let numbers = outline::chapter_numbers(book);
    let mut out = format!("# {}\n", book.title.trim());

    for (act_idx, act) in book.acts.iter().enumerate() {
        let chapters = act
            .chapters
            .iter()
            .filter(|c| include_hidden || c.visible_in_final)
            .collect::<Vec<_>>();
        if chapters.is_empty() {
            continue;
        }

        let act_title = if act.title.trim().is_empty() {
            format!("Act {}", act_idx + 1)
        } else {
            act.title.trim().to_owned()
        };
        out.push_str(&format!("\n## {act_title}\n"));

        for chapter in chapters {
            let heading =
                outline::chapter_heading(numbers.get(&chapter.id).copied(), chapter.title.trim());
            out.push_str(&format!("\n### {heading}\n"));

            for section in &chapter.sections {
                if !section.title.trim().is_empty() {
                    out.push_str(&format!("\n#### {}\n", section.title.trim()));
                }
                let body = html2md::parse_html(&section.content);
                let body = body.trim();
                if !body.is_empty() {
                    out.push('\n');
                    out.push_str(body);
                    out.push('\n');
                }
            }
        }
    }
    out
}

pub fn run(book_args: &BookArgs, args: ExportArgs) -> anyhow::Result<()> {
    let doc = edit::open_document(book_args)?;
    let markdown = render_markdown(doc.book(), args.include_hidden);

    if args.out == Path::new("-") {
        print!("{markdown}");
        return Ok(());
    }

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export output dir: {}", parent.display()))?;
    }
    write_output(&args.out, &markdown, args.force)?;
    tracing::info!(out = %args.out.display(), "exported manuscript");
    Ok(())
}

fn write_output(out: &Path, contents: &str, force: bool) -> anyhow::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(out)
        .with_context(|| format!("open output: {}", out.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("write output: {}", out.display()))?;
    file.flush()
        .with_context(|| format!("flush output: {}", out.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{Act, ActId, Chapter, ChapterId, Section, SectionId};

    fn book() -> Book {
        let mut opening = Chapter::new(ChapterId(1), "Arrival");
        let mut section = Section::new(SectionId(1), "Dawn");
        section.content = "<p>The ship <em>landed</em>.</p><p>Nobody came.</p>".to_owned();
        opening.sections.push(section);

        let mut notes = Chapter::new(ChapterId(2), "Research notes");
        notes.visible_in_final = false;
        notes.sections.push(Section::new(SectionId(2), "Scratch"));

        let mut book = Book::new("Saga", "en-US");
        book.acts.push(Act {
            id: ActId(1),
            title: String::new(),
            chapters: vec![opening, notes],
        });
        book.acts.push(Act {
            id: ActId(2),
            title: "Empty".to_owned(),
            chapters: Vec::new(),
        });
        book
    }

    #[test]
    fn manuscript_skips_hidden_chapters_and_empty_acts() {
        let markdown = render_markdown(&book(), false);

        assert!(markdown.starts_with("# Saga\n\n## Act 1\n\n### Chapter 1: Arrival\n\n#### Dawn\n"));
        assert!(markdown.contains("landed"));
        assert!(markdown.contains("Nobody came."));
        assert!(!markdown.contains("Research notes"));
        assert!(!markdown.contains("## Empty"));
    }

    #[test]
    fn hidden_chapters_can_be_included() {
        let markdown = render_markdown(&book(), true);
        assert!(markdown.contains("### Chapter 2: Research notes\n\n#### Scratch\n"));
    }

    #[test]
    fn existing_output_requires_force() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let out = temp.path().join("book.md");
        write_output(&out, "one", false)?;
        assert!(write_output(&out, "two", false).is_err());
        write_output(&out, "three", true)?;
        assert_eq!(std::fs::read_to_string(&out)?, "three");
        Ok(())
    }
}
