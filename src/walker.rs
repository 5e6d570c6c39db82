use std::path::{Path, PathBuf};

use crate::{
    data_dir::{BIBTEX_FILE, DataDir, TAGS_FILE},
    doc_id::DocId,
    error::{Error, Result},
};

/// A document directory found under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDir {
    pub docid: DocId,
    pub path: PathBuf,
    /// Artifact files in the directory, sorted by name.
    pub files: Vec<PathBuf>,
}

impl DocumentDir {
    pub fn bibtex(&self) -> Option<&Path> {
        self.named(BIBTEX_FILE)
    }

    pub fn tags(&self) -> Option<&Path> {
        self.named(TAGS_FILE)
    }

    /// Everything that is neither the bibtex nor the tags artifact.
    pub fn content_files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path).filter(|path| {
            !matches!(
                path.file_name().and_then(|n| n.to_str()),
                Some(BIBTEX_FILE | TAGS_FILE)
            )
        })
    }

    fn named(&self, name: &str) -> Option<&Path> {
        self.files
            .iter()
            .find(|path| path.file_name().is_some_and(|n| n == name))
            .map(PathBuf::as_path)
    }
}

/// List the document directories directly under `root`, in ascending
/// docid order.
///
/// Only directories whose name is a decimal docid count; the store
/// directory and anything else is ignored. Hidden files inside a
/// document directory are skipped.
pub fn discover_document_dirs(root: &Path) -> Result<Vec<DocumentDir>> {
    let mut results = Vec::new();

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(docid) = name.to_str().and_then(DocId::from_dir_name) else {
            continue;
        };
        if !entry.path().is_dir() {
            continue;
        }

        let files = list_files(&entry.path())?;
        results.push(DocumentDir {
            docid,
            path: entry.path(),
            files,
        });
    }

    results.sort_by_key(|dir| dir.docid);
    Ok(results)
}

/// Rename document directories to the zero-padded name every writer uses.
///
/// A docid claimed by more than one directory is left untouched and
/// returned as a conflict, as is a directory that cannot be renamed.
pub fn canonicalize_dirs(
    data_dir: &DataDir,
    dirs: Vec<DocumentDir>,
) -> (Vec<DocumentDir>, Vec<(DocId, Error)>) {
    let mut canonical = Vec::with_capacity(dirs.len());
    let mut conflicts = Vec::new();

    for group in dirs.chunk_by(|a, b| a.docid == b.docid) {
        let dir = &group[0];
        if group.len() > 1 {
            conflicts.push((
                dir.docid,
                Error::DirConflict {
                    docid: dir.docid.get(),
                    paths: group.iter().map(|d| d.path.clone()).collect(),
                },
            ));
            continue;
        }

        let target = data_dir.doc_dir(dir.docid);
        if dir.path == target {
            canonical.push(dir.clone());
            continue;
        }

        let renamed = std::fs::rename(&dir.path, &target)
            .map_err(Error::from)
            .and_then(|()| list_files(&target));
        match renamed {
            Ok(files) => {
                tracing::info!(
                    from = %dir.path.display(),
                    to = %target.display(),
                    "renamed document directory"
                );
                canonical.push(DocumentDir {
                    docid: dir.docid,
                    path: target,
                    files,
                });
            }
            Err(e) => conflicts.push((dir.docid, e)),
        }
    }

    (canonical, conflicts)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        // Follows symlinks; broken links are skipped.
        if entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mkdoc(root: &Path, name: &str, files: &[&str]) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for file in files {
            std::fs::write(dir.join(file), "x").unwrap();
        }
    }

    #[test]
    fn numeric_order_not_lexical() {
        let tmp = tempfile::tempdir().unwrap();
        mkdoc(tmp.path(), "10", &[]);
        mkdoc(tmp.path(), "9", &[]);
        mkdoc(tmp.path(), "0000000002", &[]);

        let dirs = discover_document_dirs(tmp.path()).unwrap();
        let ids: Vec<u64> = dirs.iter().map(|d| d.docid.get()).collect();
        assert_eq!(ids, vec![2, 9, 10]);
    }

    #[test]
    fn skips_non_numeric_and_plain_files() {
        let tmp = tempfile::tempdir().unwrap();
        mkdoc(tmp.path(), ".paperdex", &["meta.json"]);
        mkdoc(tmp.path(), "notes", &[]);
        mkdoc(tmp.path(), "1", &[]);
        std::fs::write(tmp.path().join("2"), "not a directory").unwrap();

        let dirs = discover_document_dirs(tmp.path()).unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].docid, DocId::new(1));
    }

    #[test]
    fn classifies_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        mkdoc(tmp.path(), "1", &["bibtex", "tags", "paper.txt", ".swp"]);

        let dirs = discover_document_dirs(tmp.path()).unwrap();
        let dir = &dirs[0];
        assert_eq!(dir.files.len(), 3);
        assert!(dir.bibtex().is_some());
        assert!(dir.tags().is_some());

        let content: Vec<_> = dir.content_files().collect();
        assert_eq!(content, vec![dir.path.join("paper.txt").as_path()]);
    }

    #[test]
    fn short_names_are_renamed_to_padded() {
        let tmp = tempfile::tempdir().unwrap();
        mkdoc(tmp.path(), "7", &["tags"]);
        mkdoc(tmp.path(), "0000000008", &["tags"]);

        let data_dir = DataDir::at(tmp.path());
        let dirs = discover_document_dirs(tmp.path()).unwrap();
        let (dirs, conflicts) = canonicalize_dirs(&data_dir, dirs);

        assert!(conflicts.is_empty());
        assert_eq!(dirs[0].path, data_dir.doc_dir(DocId::new(7)));
        assert_eq!(dirs[0].tags(), Some(dirs[0].path.join("tags").as_path()));
        assert!(!tmp.path().join("7").exists());
        assert_eq!(dirs[1].path, data_dir.doc_dir(DocId::new(8)));
    }

    #[test]
    fn two_directories_for_one_docid_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        mkdoc(tmp.path(), "3", &["tags"]);
        mkdoc(tmp.path(), "0000000003", &["tags"]);
        mkdoc(tmp.path(), "4", &["tags"]);

        let data_dir = DataDir::at(tmp.path());
        let dirs = discover_document_dirs(tmp.path()).unwrap();
        let (dirs, conflicts) = canonicalize_dirs(&data_dir, dirs);

        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].docid, DocId::new(4));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].0, DocId::new(3));
        assert!(matches!(
            &conflicts[0].1,
            Error::DirConflict { docid: 3, paths } if paths.len() == 2
        ));
        assert!(tmp.path().join("3").is_dir());
    }

    #[test]
    fn empty_root() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_document_dirs(tmp.path()).unwrap().is_empty());
    }
}
