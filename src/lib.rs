//! paperdex - a personal document index with tags, external source ids
//! and full-text search.
//!
//! Each document lives in its own numbered directory under a root,
//! alongside its bibtex entry, its tags and its content files. A
//! [tantivy](https://github.com/quickwit-oss/tantivy) index inside the
//! root's hidden store directory makes them searchable by a small query
//! language of free text, `field:value` filters and year ranges.
//!
//! # Quick start
//!
//! ```no_run
//! use paperdex::{
//!     DataDir, Database, DocumentBuilder, OpenOptions, SortOrder,
//!     SourceCatalog,
//! };
//!
//! let root = DataDir::resolve(None).unwrap();
//! let mut db = Database::open(
//!     &root,
//!     OpenOptions::writable().create(true),
//!     SourceCatalog::builtin(),
//! )
//! .unwrap();
//!
//! let docid = db.generate_docid().unwrap();
//! let mut fields = DocumentBuilder::new();
//! fields.set_title("On Things").set_year(2001).add_tags(["new"]);
//! db.sync(docid, &fields).unwrap();
//!
//! for m in db.search("tag:new year:2000..", SortOrder::Year, 0).unwrap() {
//!     println!("{}", m.unwrap().document.summary());
//! }
//! ```

pub mod bibtex;
pub mod cli;
pub mod config_db;
pub mod data_dir;
pub mod database;
pub mod doc_id;
pub mod document;
pub mod error;
pub mod extract;
pub mod indexer;
pub mod query;
pub mod ranking;
pub mod restore;
pub mod schema;
pub mod search;
pub mod similar;
pub mod source;
pub mod tantivy_index;
pub mod walker;

pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use database::{Database, OpenOptions};
pub use doc_id::DocId;
pub use document::Document;
pub use error::{Error, Result};
pub use indexer::DocumentBuilder;
pub use ranking::SortOrder;
pub use source::{SourceCatalog, SourceId};
pub use tantivy_index::SearchIndex;
