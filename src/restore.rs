//! Rebuild the index from the per-document directories under the root.
//!
//! Every document directory is re-read from scratch and its record
//! replaces whatever the index held for that docid, so restoring twice
//! yields the same store as restoring once.

use rayon::prelude::*;

use crate::{
    bibtex::BibParser,
    database::Database,
    doc_id::DocId,
    error::{Error, Result},
    extract::TextExtractor,
    indexer::{DocumentBuilder, Indexer},
    source::SourceCatalog,
    walker::{self, DocumentDir},
};

/// Outcome of a restore run.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<DocId>,
    /// Directories without any artifact.
    pub skipped: Vec<DocId>,
    pub failed: Vec<(DocId, Error)>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fail with [`Error::RestoreIncomplete`] if any document failed.
    pub fn ensure_clean(&self) -> Result<()> {
        if self.is_clean() {
            Ok(())
        } else {
            Err(Error::RestoreIncomplete(self.failed.len()))
        }
    }
}

/// Read a document directory back into the fields it was indexed from.
///
/// Returns `None` for a directory holding no artifacts.
pub fn load_document(
    dir: &DocumentDir,
    extractor: &dyn TextExtractor,
    bib_parser: &dyn BibParser,
    catalog: &SourceCatalog,
) -> Result<Option<DocumentBuilder>> {
    if dir.files.is_empty() {
        return Ok(None);
    }

    let mut fields = DocumentBuilder::new();

    if let Some(path) = dir.bibtex() {
        let entry = bib_parser.parse(&std::fs::read_to_string(path)?)?;
        fields.set_bib_entry(&entry, catalog);
    }

    if let Some(path) = dir.tags() {
        let text = std::fs::read_to_string(path)?;
        fields.add_tags(text.lines().filter(|line| !line.trim().is_empty()));
    }

    let dir_name = dir
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.docid.dir_name());
    for path in dir.content_files() {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let text = extractor.extract(&std::fs::read(path)?)?;
        fields
            .add_file(format!("{dir_name}/{name}"), extractor.content_type())
            .add_text(&text);
    }

    Ok(Some(fields))
}

/// Restore every document directory under the database root.
///
/// Directories are first renamed to their zero-padded name. Artifacts
/// are read in parallel; records are written one at a time in ascending
/// docid order. A document that fails to load or store is reported and
/// the run moves on to the next one.
pub fn restore(
    db: &mut Database,
    extractor: &dyn TextExtractor,
    bib_parser: &dyn BibParser,
) -> Result<RestoreReport> {
    if !db.is_writable() {
        return Err(Error::ReadOnly);
    }

    let dirs = walker::discover_document_dirs(db.root().root())?;
    tracing::info!(documents = dirs.len(), "restoring");

    let mut report = RestoreReport::default();
    let (dirs, conflicts) = walker::canonicalize_dirs(db.root(), dirs);
    for (docid, e) in conflicts {
        tracing::warn!(doc = %docid, error = %e, "restore failed");
        report.failed.push((docid, e));
    }

    // IndexWriter is not shared across threads, so only reading fans out.
    let catalog = db.catalog().clone();
    let loaded: Vec<(DocId, Result<Option<DocumentBuilder>>)> = dirs
        .par_iter()
        .map(|dir| {
            (dir.docid, load_document(dir, extractor, bib_parser, &catalog))
        })
        .collect();

    let total = loaded.len();
    for (n, (docid, fields)) in loaded.into_iter().enumerate() {
        let stored = fields.and_then(|fields| match fields {
            Some(fields) => {
                let record = Indexer::new(db.schema()).index(docid, &fields)?;
                db.upsert(&record).map(|()| true)
            }
            None => Ok(false),
        });

        match stored {
            Ok(true) => {
                tracing::info!(doc = %docid, "{}/{total} restored", n + 1);
                report.restored.push(docid);
            }
            Ok(false) => {
                tracing::warn!(doc = %docid, "empty document directory");
                report.skipped.push(docid);
            }
            Err(e) => {
                tracing::warn!(doc = %docid, error = %e, "restore failed");
                report.failed.push((docid, e));
            }
        }
    }

    tracing::info!(
        restored = report.restored.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "restore finished"
    );
    Ok(report)
}
