//! Turns a document's structured fields into the record that gets stored.
//!
//! Boolean fields become `prefix + value` terms, emitted verbatim.
//! Free-text fields are carried as text and stemmed by the index analyzer.
//! Every sync regenerates the whole record from a [`DocumentBuilder`];
//! nothing is diffed against what was stored before.

use std::collections::BTreeSet;

use crate::{
    bibtex::BibEntry,
    doc_id::DocId,
    document::Document,
    error::{Error, Result},
    schema::{Term, TermSchema, prefix},
    source::{SourceCatalog, SourceId},
};

/// The complete field set of a document, prior to indexing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentBuilder {
    pub key: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<u64>,
    pub tags: BTreeSet<String>,
    pub sources: BTreeSet<SourceId>,
    /// File references relative to the document root.
    pub files: BTreeSet<String>,
    pub content_types: BTreeSet<String>,
    pub body: String,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the field set of a stored document, so that an edit can be
    /// re-synced as a full record.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            key: doc.key().map(String::from),
            title: doc.title.clone(),
            authors: doc.authors.clone(),
            year: doc.year,
            tags: doc.tags().into_iter().map(String::from).collect(),
            sources: doc.source_ids().into_iter().collect(),
            files: doc.files().into_iter().map(String::from).collect(),
            content_types: doc
                .content_types()
                .into_iter()
                .map(String::from)
                .collect(),
            body: doc.body.clone(),
        }
    }

    pub fn set_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.key = Some(key.into());
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = Some(title.into());
        self
    }

    pub fn set_authors(&mut self, authors: Vec<String>) -> &mut Self {
        self.authors = authors;
        self
    }

    pub fn set_year(&mut self, year: u64) -> &mut Self {
        self.year = Some(year);
        self
    }

    /// Add tags. Blank tags are ignored.
    pub fn add_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() {
                self.tags.insert(tag.to_string());
            }
        }
        self
    }

    pub fn remove_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            self.tags.remove(tag.as_ref().trim());
        }
        self
    }

    pub fn add_source(&mut self, sid: SourceId) -> &mut Self {
        self.sources.insert(sid);
        self
    }

    pub fn add_file(
        &mut self,
        reference: impl Into<String>,
        content_type: impl Into<String>,
    ) -> &mut Self {
        self.files.insert(reference.into());
        self.content_types.insert(content_type.into());
        self
    }

    /// Append extracted text to the body.
    pub fn add_text(&mut self, text: &str) -> &mut Self {
        if !self.body.is_empty() {
            self.body.push('\n');
        }
        self.body.push_str(text);
        self
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> &mut Self {
        self.body = body.into();
        self
    }

    /// Take key, title, authors, year and source ids from a bibliographic
    /// entry. Fields the entry lacks keep their current value.
    pub fn set_bib_entry(
        &mut self,
        entry: &BibEntry,
        catalog: &SourceCatalog,
    ) -> &mut Self {
        self.key = Some(entry.key.clone());
        if let Some(title) = entry.title() {
            self.title = Some(title.to_string());
        }
        let authors = entry.authors();
        if !authors.is_empty() {
            self.authors = authors;
        }
        if let Some(year) = entry.year() {
            self.year = Some(year);
        }
        self.sources.extend(catalog.scan_bib_entry(entry));
        self
    }
}

/// What gets written to the index for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub docid: DocId,
    pub terms: BTreeSet<Term>,
    pub year: Option<u64>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub body: String,
}

/// Term generation against a fixed schema.
#[derive(Debug, Clone, Copy)]
pub struct Indexer<'a> {
    schema: &'a TermSchema,
}

impl<'a> Indexer<'a> {
    pub fn new(schema: &'a TermSchema) -> Self {
        Self { schema }
    }

    /// Produce the full record for `docid` from `fields`.
    ///
    /// Fails if a source id names a source without a registered prefix.
    pub fn index(
        &self,
        docid: DocId,
        fields: &DocumentBuilder,
    ) -> Result<DocumentRecord> {
        let mut terms = BTreeSet::new();
        let mut push = |prefix: &str, value: &str| {
            let value = value.trim();
            if !value.is_empty() {
                terms.insert(Term::new(prefix, value));
            }
        };

        push(prefix::ID, &docid.get().to_string());
        if let Some(key) = &fields.key {
            push(prefix::KEY, key);
        }
        if let Some(year) = fields.year {
            push(prefix::YEAR, &year.to_string());
        }
        for tag in &fields.tags {
            push(prefix::TAG, tag);
        }
        for file in &fields.files {
            push(prefix::FILE, file);
        }
        for content_type in &fields.content_types {
            push(prefix::TYPE, content_type);
        }
        for sid in &fields.sources {
            let expected = TermSchema::source_prefix(&sid.source);
            let sprefix = self
                .schema
                .resolve(&sid.source)
                .filter(|def| def.prefix == expected)
                .map(|def| def.prefix.as_str())
                .ok_or_else(|| {
                    Error::Source(format!(
                        "unregistered source: {}",
                        sid.source
                    ))
                })?;
            push(prefix::SOURCE, &sid.source);
            push(sprefix, &sid.id);
        }

        Ok(DocumentRecord {
            docid,
            terms,
            year: fields.year,
            title: fields.title.clone(),
            authors: fields.authors.clone(),
            body: fields.body.clone(),
        })
    }
}
