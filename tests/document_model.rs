use storyloom::codex::{CategoryRemoval, NewEntry};
use storyloom::document::{ChapterPatch, Document};
use storyloom::filter::TagFilter;
use storyloom::formats::{ActId, Book, ChapterId};
use storyloom::outline;
use storyloom::reorder::{MoveOutcome, Unchanged};
use storyloom::store::{self, BookStore as _, FileStore};

struct Fixture {
    _temp: tempfile::TempDir,
    path: std::path::PathBuf,
    doc: Document,
}

fn fixture() -> anyhow::Result<Fixture> {
    let temp = tempfile::TempDir::new()?;
    let path = temp.path().join("book.json");
    let doc = Document::new(
        Book::new("Saga", "en-US"),
        Box::new(FileStore::new(&path)),
    );
    Ok(Fixture {
        _temp: temp,
        path,
        doc,
    })
}

fn add_chapters(doc: &mut Document, act: ActId, titles: &[&str]) -> anyhow::Result<Vec<ChapterId>> {
    titles
        .iter()
        .map(|title| {
            doc.add_chapter(act, title)?
                .ok_or_else(|| anyhow::anyhow!("act {act} missing"))
        })
        .collect()
}

fn order(doc: &Document, act: ActId) -> Vec<ChapterId> {
    doc.find_act(act)
        .map(|a| a.chapters.iter().map(|c| c.id).collect())
        .unwrap_or_default()
}

fn order_of(book: &Book, act: ActId) -> Vec<ChapterId> {
    book.acts
        .iter()
        .find(|a| a.id == act)
        .map(|a| a.chapters.iter().map(|c| c.id).collect())
        .unwrap_or_default()
}

fn saved(path: &std::path::Path) -> anyhow::Result<Book> {
    store::read_book_file(path)?.ok_or_else(|| anyhow::anyhow!("nothing saved"))
}

#[test]
fn same_act_moves_follow_drag_direction() -> anyhow::Result<()> {
    let Fixture { doc: mut d, path, _temp } = fixture()?;
    let act = d.add_act("One")?;
    let [x, y, z] = add_chapters(&mut d, act, &["X", "Y", "Z"])?[..] else {
        anyhow::bail!("expected three chapters");
    };

    d.move_chapter(x, act, act, z)?;
    assert_eq!(order(&d, act), vec![y, z, x]);

    d.move_chapter(x, act, act, y)?;
    assert_eq!(order(&d, act), vec![x, y, z]);

    d.move_chapter(z, act, act, x)?;
    assert_eq!(order(&d, act), vec![z, x, y]);
    assert_eq!(order_of(&saved(&path)?, act), vec![z, x, y]);
    Ok(())
}

#[test]
fn cross_act_move_lands_after_target_exactly_once() -> anyhow::Result<()> {
    let Fixture { doc: mut d, path, _temp } = fixture()?;
    let first = d.add_act("One")?;
    let second = d.add_act("Two")?;
    let [x, y] = add_chapters(&mut d, first, &["X", "Y"])?[..] else {
        anyhow::bail!("expected two chapters");
    };
    let [p, q] = add_chapters(&mut d, second, &["P", "Q"])?[..] else {
        anyhow::bail!("expected two chapters");
    };
    d.update_chapter(
        first,
        y,
        ChapterPatch {
            title: Some("Y renamed".to_owned()),
            ..ChapterPatch::default()
        },
    )?;

    let outcome = d.move_chapter(y, first, second, p)?;
    assert_eq!(
        outcome,
        MoveOutcome::Moved {
            act: second,
            index: 1
        }
    );

    let book = saved(&path)?;
    assert_eq!(order_of(&book, first), vec![x]);
    assert_eq!(order_of(&book, second), vec![p, y, q]);
    let moved = d
        .find_chapter(second, y)
        .ok_or_else(|| anyhow::anyhow!("moved chapter missing"))?;
    assert_eq!(moved.title, "Y renamed");
    Ok(())
}

#[test]
fn self_drop_and_stale_ids_change_nothing() -> anyhow::Result<()> {
    let Fixture { doc: mut d, path, _temp } = fixture()?;
    let act = d.add_act("One")?;
    let ids = add_chapters(&mut d, act, &["X", "Y", "Z"])?;
    let before = saved(&path)?;

    assert_eq!(
        d.move_chapter(ids[1], act, act, ids[1])?,
        MoveOutcome::Unchanged(Unchanged::SelfDrop)
    );
    assert_eq!(
        d.move_chapter(ids[1], act, ActId(99), ids[0])?,
        MoveOutcome::Unchanged(Unchanged::NotFound)
    );
    assert_eq!(
        d.move_chapter(ChapterId(99), act, act, ids[0])?,
        MoveOutcome::Unchanged(Unchanged::NotFound)
    );

    assert_eq!(d.book(), &before);
    assert_eq!(saved(&path)?, before);
    Ok(())
}

#[test]
fn chapter_numbers_skip_unnumbered_chapters_across_acts() -> anyhow::Result<()> {
    let Fixture { doc: mut d, _temp, .. } = fixture()?;
    let first = d.add_act("One")?;
    let second = d.add_act("Two")?;
    let [c1, c2] = add_chapters(&mut d, first, &["c1", "c2"])?[..] else {
        anyhow::bail!("expected two chapters");
    };
    let [c3] = add_chapters(&mut d, second, &["c3"])?[..] else {
        anyhow::bail!("expected one chapter");
    };
    d.update_chapter(
        first,
        c2,
        ChapterPatch {
            numbering: Some(false),
            ..ChapterPatch::default()
        },
    )?;

    let numbers = outline::chapter_numbers(d.book());
    assert_eq!(numbers.get(&c1), Some(&1));
    assert_eq!(numbers.get(&c2), None);
    assert_eq!(numbers.get(&c3), Some(&2));
    Ok(())
}

#[test]
fn saved_document_reparses_to_the_same_structure() -> anyhow::Result<()> {
    let Fixture { doc: mut d, path, _temp } = fixture()?;
    let act = d.add_act("One")?;
    let [chapter] = add_chapters(&mut d, act, &["Arrival"])?[..] else {
        anyhow::bail!("expected one chapter");
    };
    let section = d
        .add_section(act, chapter, "Dawn", "The ship lands")?
        .ok_or_else(|| anyhow::anyhow!("section not added"))?;
    d.add_codex_entry(NewEntry {
        name: "Mira".to_owned(),
        category: "Character".to_owned(),
        description: "Pilot".to_owned(),
        tags: vec!["crew".to_owned()],
    })?;
    d.set_section_tags(act, chapter, section, &["Mira".to_owned()], false)?;
    d.add_section_note(act, chapter, section, "check the timeline")?;

    let raw = std::fs::read_to_string(&path)?;
    let loaded = saved(&path)?;
    assert_eq!(&loaded, d.book());

    let resaved = serde_json::to_value(&loaded)?;
    let original: serde_json::Value = serde_json::from_str(&raw)?;
    assert_eq!(resaved, original);
    Ok(())
}

#[test]
fn removing_a_used_category_leaves_entries_dangling() -> anyhow::Result<()> {
    let Fixture { doc: mut d, path, _temp } = fixture()?;
    let id = d.add_codex_entry(NewEntry {
        name: "Harbor".to_owned(),
        category: "Locals".to_owned(),
        ..NewEntry::default()
    })?;

    let outcome = d.remove_category("Locals", |entries| entries == ["Harbor"])?;
    assert_eq!(outcome, CategoryRemoval::Removed);

    let book = saved(&path)?;
    assert!(!book.codex.categories.iter().any(|c| c == "Locals"));
    let entry = book
        .codex
        .entry(id)
        .ok_or_else(|| anyhow::anyhow!("entry missing"))?;
    assert_eq!(entry.category, "Locals");
    assert_eq!(book.codex.uncategorized().count(), 1);
    Ok(())
}

#[test]
fn tag_filter_requires_every_active_tag() -> anyhow::Result<()> {
    let Fixture { doc: mut d, _temp, .. } = fixture()?;
    let act = d.add_act("One")?;
    let [night_battle, day_battle] = add_chapters(&mut d, act, &["Night", "Day"])?[..] else {
        anyhow::bail!("expected two chapters");
    };
    let tags = |labels: &[&str]| labels.iter().map(|l| (*l).to_owned()).collect::<Vec<_>>();
    for (chapter, labels) in [
        (night_battle, tags(&["battle", "night"])),
        (day_battle, tags(&["battle"])),
    ] {
        let section = d
            .add_section(act, chapter, "S", "")?
            .ok_or_else(|| anyhow::anyhow!("section not added"))?;
        d.set_section_tags(act, chapter, section, &labels, true)?;
    }

    let filter = TagFilter::from_tags(["battle".to_owned(), "night".to_owned()]);
    let view = filter.apply(d.book());
    assert!(view.is_chapter_visible(night_battle));
    assert!(!view.is_chapter_visible(day_battle));
    assert!(view.is_act_visible(act));
    Ok(())
}

#[test]
fn file_store_reports_its_location() {
    let store = FileStore::new("/tmp/storyloom-book.json");
    assert_eq!(store.location(), "/tmp/storyloom-book.json");
}
