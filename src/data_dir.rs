use std::path::{Path, PathBuf};

use crate::{
    doc_id::DocId,
    error::{Error, Result},
};

/// Name of the hidden directory holding the index store inside the root.
pub const STORE_DIR: &str = ".paperdex";

/// Name of the bibliographic entry artifact in a document directory.
pub const BIBTEX_FILE: &str = "bibtex";

/// Name of the tags artifact in a document directory (one tag per line).
pub const TAGS_FILE: &str = "tags";

/// The document root: one directory per docid plus the hidden store.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the document root from, in order of priority:
    /// 1. An explicit path (from --root)
    /// 2. The PAPERDEX_ROOT environment variable
    /// 3. The XDG data directory (~/.local/share/paperdex/docs)
    ///
    /// Nothing is created; whether the root holds a store is decided when
    /// the database is opened.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("PAPERDEX_ROOT") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("paperdex")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
                .join("docs")
        };

        Ok(Self { root })
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    pub fn tantivy_dir(&self) -> PathBuf {
        self.store_dir().join("tantivy")
    }

    pub fn config_db(&self) -> PathBuf {
        self.store_dir().join("config.redb")
    }

    pub fn is_initialized(&self) -> bool {
        self.store_dir().is_dir()
    }

    /// Fail with [`Error::Uninitialized`] unless the store directory exists.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::Uninitialized(self.root.clone()))
        }
    }

    pub fn doc_dir(&self, docid: DocId) -> PathBuf {
        self.root.join(docid.dir_name())
    }

    fn create_doc_dir(&self, docid: DocId) -> Result<PathBuf> {
        let dir = self.doc_dir(docid);
        std::fs::create_dir_all(&dir)
            .map_err(|_| Error::DataDir(dir.clone()))?;
        Ok(dir)
    }

    /// Rewrite the tags artifact. An empty tag set removes the file.
    pub fn write_tags<'a>(
        &self,
        docid: DocId,
        tags: impl IntoIterator<Item = &'a String>,
    ) -> Result<()> {
        let dir = self.create_doc_dir(docid)?;
        let path = dir.join(TAGS_FILE);
        let mut tags: Vec<&String> = tags.into_iter().collect();
        tags.sort();
        tags.dedup();

        if tags.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            return Ok(());
        }

        let mut content = String::new();
        for tag in tags {
            content.push_str(tag);
            content.push('\n');
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn write_bibtex(&self, docid: DocId, bibtex: &str) -> Result<()> {
        let dir = self.create_doc_dir(docid)?;
        std::fs::write(dir.join(BIBTEX_FILE), bibtex)?;
        Ok(())
    }

    /// Copy a content file into the document directory, keeping its name.
    ///
    /// Returns the reference stored in the index: the path relative to the
    /// root (`0000000042/paper.pdf`).
    pub fn import_file(&self, docid: DocId, source: &Path) -> Result<String> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::Config(format!("invalid file name: {}", source.display()))
            })?;
        if name == BIBTEX_FILE || name == TAGS_FILE || name.starts_with('.') {
            return Err(Error::Config(format!(
                "reserved file name: {name}"
            )));
        }

        let dir = self.create_doc_dir(docid)?;
        let target = dir.join(name);
        if target != source {
            std::fs::copy(source, &target)?;
        }
        Ok(format!("{}/{name}", docid.dir_name()))
    }

    /// Remove a document directory and everything in it. Missing
    /// directories are not an error.
    pub fn remove_doc_dir(&self, docid: DocId) -> Result<()> {
        let dir = self.doc_dir(docid);
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.store_dir(), tmp.path().join(".paperdex"));
        assert_eq!(
            dir.config_db(),
            tmp.path().join(".paperdex").join("config.redb")
        );
        assert!(!dir.is_initialized());
    }

    #[test]
    fn doc_dir_uses_padded_name() {
        let dir = DataDir::at("/docs");
        assert_eq!(
            dir.doc_dir(DocId::new(3)),
            PathBuf::from("/docs/0000000003")
        );
    }

    #[test]
    fn write_tags_sorted_one_per_line() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::at(tmp.path());
        let tags = vec!["foo".to_string(), "bar".to_string()];
        dir.write_tags(DocId::new(1), &tags).unwrap();

        let content =
            std::fs::read_to_string(dir.doc_dir(DocId::new(1)).join(TAGS_FILE))
                .unwrap();
        assert_eq!(content, "bar\nfoo\n");

        dir.write_tags(DocId::new(1), &Vec::new()).unwrap();
        assert!(!dir.doc_dir(DocId::new(1)).join(TAGS_FILE).exists());
    }

    #[test]
    fn import_file_returns_relative_reference() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("paper.txt");
        std::fs::write(&src, "text").unwrap();

        let dir = DataDir::at(tmp.path().join("root"));
        let reference = dir.import_file(DocId::new(5), &src).unwrap();
        assert_eq!(reference, "0000000005/paper.txt");
        assert!(dir.root().join(&reference).is_file());
    }

    #[test]
    fn import_rejects_reserved_names() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("tags");
        std::fs::write(&src, "x").unwrap();

        let dir = DataDir::at(tmp.path().join("root"));
        assert!(dir.import_file(DocId::new(1), &src).is_err());
    }

    #[test]
    fn remove_missing_doc_dir_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::at(tmp.path());
        dir.remove_doc_dir(DocId::new(99)).unwrap();
    }
}
