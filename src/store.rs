use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::{Book, DEFAULT_LANGUAGE};
use crate::migrate;

/// Key under which the browser-embedded mode keeps the document.
pub const STORAGE_KEY: &str = "novelWriterData";

pub trait BookStore: Send {
    fn load(&self) -> anyhow::Result<Option<Book>>;
    fn save(&mut self, book: &Book) -> anyhow::Result<()>;

    fn save_as(&mut self, path: &Path, _book: &Book) -> anyhow::Result<()> {
        anyhow::bail!(
            "save as {} is not supported by {}",
            path.display(),
            self.location()
        )
    }

    /// Human-readable location, used in logs and IPC replies.
    fn location(&self) -> String;
}

/// Desktop mode: one JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BookStore for FileStore {
    fn load(&self) -> anyhow::Result<Option<Book>> {
        read_book_file(&self.path)
    }

    fn save(&mut self, book: &Book) -> anyhow::Result<()> {
        write_json_atomic(&self.path, book)
            .with_context(|| format!("save book: {}", self.path.display()))
    }

    fn save_as(&mut self, path: &Path, book: &Book) -> anyhow::Result<()> {
        write_json_atomic(path, book)
            .with_context(|| format!("save book as: {}", path.display()))?;
        tracing::info!(from = %self.path.display(), to = %path.display(), "book file changed");
        self.path = path.to_path_buf();
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Browser-embedded mode: a directory of `<key>.json` items standing in for
/// local storage.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.item_path(key);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(anyhow::Error::new(err).context(format!("read item: {}", path.display())))
            }
        }
    }

    pub fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        write_atomic(&self.item_path(key), value.as_bytes())
            .with_context(|| format!("write storage item: {key}"))
    }

    pub fn remove_item(&self, key: &str) -> anyhow::Result<bool> {
        match std::fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(anyhow::Error::new(err).context(format!("remove item: {key}"))),
        }
    }
}

impl BookStore for LocalStorage {
    fn load(&self) -> anyhow::Result<Option<Book>> {
        let Some(raw) = self.get_item(STORAGE_KEY)? else {
            return Ok(None);
        };
        let (book, language_defaulted) =
            parse_book(&raw).with_context(|| format!("parse {STORAGE_KEY}"))?;
        if language_defaulted {
            let raw = serde_json::to_string(&book).context("serialize book")?;
            self.set_item(STORAGE_KEY, &raw)
                .context("save defaulted language")?;
        }
        Ok(Some(book))
    }

    fn save(&mut self, book: &Book) -> anyhow::Result<()> {
        let raw = serde_json::to_string(book).context("serialize book")?;
        self.set_item(STORAGE_KEY, &raw)
    }

    fn location(&self) -> String {
        self.item_path(STORAGE_KEY).display().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Store,
    Bundled,
    Empty,
}

#[derive(Debug)]
pub struct LoadedBook {
    pub book: Book,
    pub source: LoadSource,
}

/// Reads the store if it has a document, else the bundled file, else starts
/// from an empty book. A document without a language gets the default one
/// and is saved straight away.
pub fn load_book(store: &mut dyn BookStore, bundled: Option<&Path>) -> anyhow::Result<LoadedBook> {
    if let Some(book) = store.load().context("load from store")? {
        tracing::info!(location = %store.location(), "loaded book");
        return Ok(LoadedBook {
            book,
            source: LoadSource::Store,
        });
    }

    if let Some(bundled) = bundled {
        match std::fs::read_to_string(bundled) {
            Ok(raw) => {
                let (book, language_defaulted) = parse_book(&raw)
                    .with_context(|| format!("parse bundled book: {}", bundled.display()))?;
                if language_defaulted {
                    store.save(&book).context("save defaulted language")?;
                }
                tracing::info!(bundled = %bundled.display(), "loaded bundled book");
                return Ok(LoadedBook {
                    book,
                    source: LoadSource::Bundled,
                });
            }
            Err(err) => {
                tracing::warn!(bundled = %bundled.display(), error = %err, "bundled book unavailable");
            }
        }
    }

    tracing::info!("starting from an empty book");
    Ok(LoadedBook {
        book: Book::empty(),
        source: LoadSource::Empty,
    })
}

/// Parses, migrates and normalises a document. The flag reports whether the
/// language had to be defaulted.
pub fn parse_book(raw: &str) -> anyhow::Result<(Book, bool)> {
    let value: serde_json::Value = serde_json::from_str(raw).context("parse book json")?;
    book_from_value(value)
}

pub fn book_from_value(value: serde_json::Value) -> anyhow::Result<(Book, bool)> {
    let mut value = migrate::upgrade(value)?;
    let language_defaulted = migrate::ensure_language(&mut value, DEFAULT_LANGUAGE);
    let mut book: Book = serde_json::from_value(value).context("deserialize book")?;
    book.reconcile_ids().context("reconcile ids")?;
    Ok((book, language_defaulted))
}

pub fn read_book_file(path: &Path) -> anyhow::Result<Option<Book>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(anyhow::Error::new(err).context(format!("read book: {}", path.display())));
        }
    };
    let (book, language_defaulted) =
        parse_book(&raw).with_context(|| format!("parse book: {}", path.display()))?;
    if language_defaulted {
        write_json_atomic(path, &book).context("save defaulted language")?;
    }
    Ok(Some(book))
}

pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    write_atomic(path, &data)
}

/// Writes to a temp file next to `path`, then renames it over `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in: {}", parent.display()))?;
    tmp.write_all(data).context("write temp file")?;
    tmp.as_file().sync_all().context("sync temp file")?;
    tmp.persist(path)
        .map_err(|err| anyhow::Error::new(err.error))
        .with_context(|| format!("rename temp file to: {}", path.display()))?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{Act, ActId};

    #[test]
    fn file_store_round_trips_and_leaves_no_temp_files() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("book.json");
        let mut store = FileStore::new(&path);

        let mut book = Book::new("Saga", "en-US");
        book.acts.push(Act {
            id: ActId(1),
            title: "Beginning".to_owned(),
            chapters: Vec::new(),
        });
        book.reconcile_ids()?;
        store.save(&book)?;

        let loaded = store.load()?.expect("saved book");
        assert_eq!(loaded, book);

        let names = std::fs::read_dir(temp.path())?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(names, vec!["book.json".to_owned()]);
        Ok(())
    }

    #[test]
    fn missing_language_is_defaulted_and_persisted() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("book.json");
        std::fs::write(&path, r#"{"title": "Untitled", "acts": []}"#)?;

        let book = read_book_file(&path)?.expect("book");
        assert_eq!(book.language, "pt-BR");

        let on_disk: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(on_disk["language"], "pt-BR");
        assert_eq!(on_disk["schemaVersion"], 1);
        Ok(())
    }

    #[test]
    fn local_storage_persists_defaulted_language() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let mut storage = LocalStorage::new(temp.path());
        storage.set_item(STORAGE_KEY, r#"{"schemaVersion":1,"title":"T","acts":[]}"#)?;

        let loaded = load_book(&mut storage, None)?;
        assert_eq!(loaded.source, LoadSource::Store);
        assert_eq!(loaded.book.language, "pt-BR");

        let raw = storage.get_item(STORAGE_KEY)?.expect("stored item");
        let stored: serde_json::Value = serde_json::from_str(&raw)?;
        assert_eq!(stored["language"], "pt-BR");
        Ok(())
    }

    #[test]
    fn maximal_ids_are_rejected_instead_of_wrapping() {
        let raw = format!(
            r#"{{"schemaVersion":1,"title":"T","acts":[{{"id":{},"title":"A","chapters":[]}}]}}"#,
            u32::MAX
        );
        let err = parse_book(&raw).unwrap_err();
        assert!(format!("{err:#}").contains("id space exhausted for acts"));
    }

    #[test]
    fn load_chain_prefers_store_then_bundled_then_empty() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let bundled = temp.path().join("bundled.json");
        std::fs::write(&bundled, r#"{"title": "Bundled", "acts": []}"#)?;

        let mut storage = LocalStorage::new(temp.path().join("storage"));
        let loaded = load_book(&mut storage, Some(&bundled))?;
        assert_eq!(loaded.source, LoadSource::Bundled);
        assert_eq!(loaded.book.title, "Bundled");
        // The language default was written to storage immediately.
        assert!(storage.get_item(STORAGE_KEY)?.is_some());

        let loaded = load_book(&mut storage, Some(&bundled))?;
        assert_eq!(loaded.source, LoadSource::Store);

        assert!(storage.remove_item(STORAGE_KEY)?);
        let loaded = load_book(&mut storage, Some(&temp.path().join("missing.json")))?;
        assert_eq!(loaded.source, LoadSource::Empty);
        assert_eq!(loaded.book, Book::empty());
        Ok(())
    }

    #[test]
    fn save_as_switches_the_target_file() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let mut store = FileStore::new(temp.path().join("a.json"));
        let book = Book::empty();
        store.save_as(&temp.path().join("nested").join("b.json"), &book)?;
        assert!(store.path().ends_with("nested/b.json"));
        assert!(!temp.path().join("a.json").exists());

        let mut storage = LocalStorage::new(temp.path().join("storage"));
        assert!(storage.save_as(&temp.path().join("c.json"), &book).is_err());
        Ok(())
    }
}
