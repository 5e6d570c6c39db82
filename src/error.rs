use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// No index store where one was expected. Recoverable by creating one.
    #[error("index store not found: {0}")]
    Uninitialized(PathBuf),

    /// The target location exists but is not a usable store.
    #[error("{0}")]
    Initialization(String),

    #[error("index store is locked by another writer ({0})")]
    Lock(String),

    #[error("index store changed during a read; reopen and retry")]
    Modified,

    #[error("query syntax error near '{fragment}': {reason}")]
    QuerySyntax { fragment: String, reason: String },

    #[error("consistency violation: term '{term}' matches documents {docids:?}")]
    Consistency { term: String, docids: Vec<u64> },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("{what} already indexed as id:{docid}")]
    Duplicate { what: String, docid: u64 },

    #[error("index store was opened read-only")]
    ReadOnly,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("directory could not be created: {0}")]
    DataDir(PathBuf),

    #[error("restore incomplete: {0} document(s) failed")]
    RestoreIncomplete(usize),

    #[error("id:{docid} has more than one document directory: {paths:?}")]
    DirConflict { docid: u64, paths: Vec<PathBuf> },
}

impl Error {
    pub(crate) fn syntax(
        fragment: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::QuerySyntax {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }
}
