//! The document store: one index, one schema, at most one writer.

use std::collections::BTreeSet;

use tantivy::{
    IndexWriter,
    collector::{Count, TopDocs},
    query::TermQuery,
    schema::IndexRecordOption,
};

use crate::{
    data_dir::DataDir,
    doc_id::DocId,
    document::Document,
    error::{Error, Result},
    indexer::{DocumentBuilder, DocumentRecord, Indexer},
    query::{Query, QueryCompiler, QueryParser},
    ranking::{SortOrder, Weighting},
    schema::{TermSchema, prefix},
    search::MatchSet,
    similar::{self, SimilarDocuments},
    source::{SourceCatalog, SourceId},
    tantivy_index::SearchIndex,
};

/// How [`Database::open`] treats the root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Take the writer lock.
    pub writable: bool,
    /// Create the store if the root has none.
    pub create: bool,
    /// Create the store even if the root already holds other files.
    pub force: bool,
}

impl OpenOptions {
    pub fn read_only() -> Self {
        Self::default()
    }

    pub fn writable() -> Self {
        Self {
            writable: true,
            ..Self::default()
        }
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// An open document store.
///
/// Readers see the snapshot taken at open (or the last [`reopen`]). A
/// writable handle holds the index writer for its whole lifetime, so a
/// second writable open of the same root fails with [`Error::Lock`].
///
/// [`reopen`]: Database::reopen
pub struct Database {
    root: DataDir,
    index: SearchIndex,
    writer: Option<IndexWriter>,
    schema: TermSchema,
    catalog: SourceCatalog,
    weighting: Weighting,
}

impl Database {
    pub fn open(
        root: &DataDir,
        options: OpenOptions,
        catalog: SourceCatalog,
    ) -> Result<Self> {
        let store = root.store_dir();
        if !store.is_dir() {
            if options.create {
                if root.root().exists()
                    && std::fs::read_dir(root.root())?.next().is_some()
                    && !options.force
                {
                    return Err(Error::Initialization(format!(
                        "uninitialized root is not empty: {}",
                        root.root().display()
                    )));
                }
                std::fs::create_dir_all(&store)
                    .map_err(|_| Error::DataDir(store.clone()))?;
                tracing::info!(
                    root = %root.root().display(),
                    "created store"
                );
            } else if root.root().exists() {
                return Err(Error::Initialization(format!(
                    "root has no index store: {}",
                    root.root().display()
                )));
            } else {
                return Err(Error::Uninitialized(root.root().to_path_buf()));
            }
        }

        let index = SearchIndex::open(&root.tantivy_dir(), options.create)?;
        let writer = if options.writable {
            Some(index.writer()?)
        } else {
            None
        };

        Ok(Self {
            root: root.clone(),
            index,
            writer,
            schema: TermSchema::build(&catalog),
            catalog,
            weighting: Weighting::default(),
        })
    }

    pub fn root(&self) -> &DataDir {
        &self.root
    }

    pub fn schema(&self) -> &TermSchema {
        &self.schema
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    pub fn set_weighting(&mut self, weighting: Weighting) {
        self.weighting = weighting;
    }

    /// Pick up commits made since this handle's snapshot.
    pub fn reopen(&mut self) -> Result<()> {
        self.index.reload()
    }

    /// Next unused docid. Ids of deleted documents are never handed out
    /// again.
    pub fn generate_docid(&self) -> Result<DocId> {
        Ok(DocId::new(self.index.last_docid()? + 1))
    }

    /// Highest docid ever allocated.
    pub fn max_docid(&self) -> Result<DocId> {
        Ok(DocId::new(self.index.last_docid()?))
    }

    pub fn doc_count(&self) -> u64 {
        self.index.searcher().num_docs()
    }

    /// Replace whatever is stored under `record.docid` with `record`.
    ///
    /// All or nothing: on failure the pending operations are rolled back
    /// and the previous record stays in place.
    pub fn upsert(&mut self, record: &DocumentRecord) -> Result<()> {
        let last_docid = self.index.last_docid()?.max(record.docid.get());
        let index = &self.index;
        let writer = self.writer.as_mut().ok_or(Error::ReadOnly)?;

        let applied = (|| {
            writer.delete_term(index.docid_term(record.docid));
            writer.add_document(index.to_tantivy(record))?;
            SearchIndex::commit(writer, last_docid)
        })();
        if let Err(e) = applied {
            writer.rollback()?;
            return Err(e);
        }

        tracing::debug!(doc = %record.docid, "upserted");
        self.index.reload()
    }

    /// Index `fields` for `docid`, store the record, then write its tags
    /// artifact. A failed store leaves the artifact untouched.
    pub fn sync(
        &mut self,
        docid: DocId,
        fields: &DocumentBuilder,
    ) -> Result<DocumentRecord> {
        let record = Indexer::new(&self.schema).index(docid, fields)?;
        self.upsert(&record)?;
        self.root.write_tags(docid, &fields.tags)?;
        Ok(record)
    }

    /// Remove every term and facet of `docid`. Deleting an absent
    /// document is not an error.
    pub fn delete(&mut self, docid: DocId) -> Result<()> {
        let last_docid = self.index.last_docid()?;
        let index = &self.index;
        let writer = self.writer.as_mut().ok_or(Error::ReadOnly)?;

        writer.delete_term(index.docid_term(docid));
        if let Err(e) = SearchIndex::commit(writer, last_docid) {
            writer.rollback()?;
            return Err(e);
        }

        tracing::debug!(doc = %docid, "deleted");
        self.index.reload()
    }

    pub fn exists(&self, docid: DocId) -> Result<bool> {
        let query = TermQuery::new(
            self.index.docid_term(docid),
            IndexRecordOption::Basic,
        );
        Ok(self.index.searcher().search(&query, &Count)? > 0)
    }

    pub fn get(&self, docid: DocId) -> Result<Option<Document>> {
        let term = self.index.docid_term(docid);
        self.lookup(term, &docid.to_string())
    }

    /// The one document carrying `prefix + value`.
    ///
    /// More than one match is a broken store and fails with
    /// [`Error::Consistency`].
    pub fn lookup_by_unique_term(
        &self,
        prefix: &str,
        value: &str,
    ) -> Result<Option<Document>> {
        let text = format!("{prefix}{value}");
        let term =
            tantivy::Term::from_field_text(self.index.fields().terms, &text);
        self.lookup(term, &text)
    }

    fn lookup(
        &self,
        term: tantivy::Term,
        label: &str,
    ) -> Result<Option<Document>> {
        let searcher = self.index.searcher();
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top = searcher.search(&query, &TopDocs::with_limit(2))?;

        let mut docs = Vec::with_capacity(top.len());
        for (_, address) in top {
            let stored = searcher.doc(address)?;
            docs.push(self.index.to_document(&stored)?);
        }

        match docs.len() {
            0 | 1 => Ok(docs.pop()),
            _ => {
                let mut docids: Vec<u64> =
                    docs.iter().map(|d| d.docid.get()).collect();
                docids.sort_unstable();
                Err(Error::Consistency {
                    term: label.to_string(),
                    docids,
                })
            }
        }
    }

    pub fn doc_for_key(&self, key: &str) -> Result<Option<Document>> {
        self.lookup_by_unique_term(prefix::KEY, key)
    }

    pub fn doc_for_source(&self, sid: &SourceId) -> Result<Option<Document>> {
        let Some(sprefix) = self.schema.prefix_for(&sid.source) else {
            return Ok(None);
        };
        self.lookup_by_unique_term(sprefix, &sid.id)
    }

    /// Look up by file reference (`0000000042/paper.pdf`).
    pub fn doc_for_path(&self, reference: &str) -> Result<Option<Document>> {
        self.lookup_by_unique_term(prefix::FILE, reference)
    }

    pub fn parse_query(&self, input: &str) -> Result<Query> {
        QueryParser::new(&self.schema).parse(input)
    }

    /// Evaluate a query string. `limit` 0 returns every match.
    pub fn search(
        &self,
        input: &str,
        sort: SortOrder,
        limit: usize,
    ) -> Result<MatchSet<'_>> {
        let query = self.parse_query(input)?;
        let compiled =
            QueryCompiler::new(&self.index, self.weighting).compile(&query)?;
        MatchSet::execute(&self.index, compiled.as_ref(), sort, limit)
    }

    pub fn count(&self, input: &str) -> Result<usize> {
        let query = self.parse_query(input)?;
        let compiled =
            QueryCompiler::new(&self.index, self.weighting).compile(&query)?;
        MatchSet::count(&self.index, compiled.as_ref())
    }

    pub fn find_similar(&self, text: &str) -> Result<SimilarDocuments<'_>> {
        similar::find_similar(&self.index, text)
    }

    /// Every live term starting with `prefix`, sorted, prefix included.
    pub fn term_iter_prefix(
        &self,
        prefix: &str,
    ) -> Result<impl Iterator<Item = String> + use<>> {
        let searcher = self.index.searcher();
        let field = self.index.fields().terms;

        let mut candidates = BTreeSet::new();
        for segment in searcher.segment_readers() {
            let inverted = segment.inverted_index(field)?;
            let mut stream =
                inverted.terms().range().ge(prefix.as_bytes()).into_stream()?;
            while stream.advance() {
                let Ok(text) = std::str::from_utf8(stream.key()) else {
                    continue;
                };
                if !text.starts_with(prefix) {
                    break;
                }
                candidates.insert(text.to_string());
            }
        }

        // The term dictionary keeps terms of deleted documents until the
        // next merge.
        let mut live = Vec::with_capacity(candidates.len());
        for text in candidates {
            let query = TermQuery::new(
                tantivy::Term::from_field_text(field, &text),
                IndexRecordOption::Basic,
            );
            if searcher.search(&query, &Count)? > 0 {
                live.push(text);
            }
        }
        Ok(live.into_iter())
    }

    /// Values of a boolean field across all documents, sorted.
    pub fn term_iter(
        &self,
        field: &str,
    ) -> Result<impl Iterator<Item = String> + use<>> {
        let fprefix = self
            .schema
            .prefix_for(field)
            .ok_or_else(|| Error::NotFound {
                kind: "field",
                name: field.to_string(),
            })?
            .to_string();
        let values = self
            .term_iter_prefix(&fprefix)?
            .map(move |term| term[fprefix.len()..].to_string());
        Ok(values)
    }

    pub fn tags(&self) -> Result<impl Iterator<Item = String> + use<>> {
        self.term_iter("tag")
    }

    /// Every source id in the store, grouped by source name.
    pub fn source_ids(&self) -> Result<Vec<SourceId>> {
        let mut sids = Vec::new();
        for name in self.catalog.names() {
            for id in self.term_iter(name)? {
                sids.push(SourceId::new(name, id));
            }
        }
        Ok(sids)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("root", &self.root.root())
            .field("writable", &self.is_writable())
            .finish_non_exhaustive()
    }
}
