use std::{
    collections::BTreeSet,
    ops::Bound,
    path::{Path, PathBuf},
};

use crate::{
    doc_id::DocId,
    schema::{TermSchema, prefix},
    source::SourceId,
};

/// A stored document, as read back from the index.
///
/// Read-only: edits go through [`DocumentBuilder`](crate::DocumentBuilder)
/// and a fresh upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub docid: DocId,
    /// Boolean terms, each the prefix followed by the value.
    pub terms: BTreeSet<String>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<u64>,
    pub body: String,
}

impl Document {
    /// Values of all terms carrying `prefix`, in sorted order.
    pub fn term_iter<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.terms
            .range::<str, _>((
                Bound::Included(prefix),
                Bound::Unbounded,
            ))
            .take_while(move |term| term.starts_with(prefix))
            .map(move |term| &term[prefix.len()..])
    }

    pub fn tags(&self) -> Vec<&str> {
        self.term_iter(prefix::TAG).collect()
    }

    pub fn key(&self) -> Option<&str> {
        self.term_iter(prefix::KEY).next()
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        let mut sids = Vec::new();
        for source in self.term_iter(prefix::SOURCE) {
            let sprefix = TermSchema::source_prefix(source);
            for id in self.term_iter(&sprefix) {
                sids.push(SourceId::new(source, id));
            }
        }
        sids
    }

    /// File references, relative to the document root.
    pub fn files(&self) -> Vec<&str> {
        self.term_iter(prefix::FILE).collect()
    }

    pub fn full_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.files().into_iter().map(|f| root.join(f)).collect()
    }

    pub fn content_types(&self) -> Vec<&str> {
        self.term_iter(prefix::TYPE).collect()
    }

    /// The short handle used on the command line, `id:N`.
    pub fn docstr(&self) -> String {
        self.docid.to_string()
    }

    /// One-line summary: `id:N [sources] {key} (tags) "title"`.
    pub fn summary(&self) -> String {
        let sources: Vec<String> =
            self.source_ids().iter().map(ToString::to_string).collect();
        format!(
            "{} [{}] {{{}}} ({}) \"{}\"",
            self.docstr(),
            sources.join(" "),
            self.key().unwrap_or(""),
            self.tags().join(" "),
            self.title.as_deref().unwrap_or(""),
        )
    }
}
