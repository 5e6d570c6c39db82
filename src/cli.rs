use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::{ranking::SortOrder, search::OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "paperdex",
    about = "Personal document index with tags, sources and full-text search"
)]
pub struct Cli {
    /// Override the document root directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a document, or add a file or source to an existing one
    Add(AddArgs),
    /// Add or remove tags on every matching document
    Tag(TagArgs),
    /// Delete matching documents and their files
    Delete(DeleteArgs),
    /// Search for documents
    Search(SearchArgs),
    /// List the tags of matching documents (all documents by default)
    Tags(QueryArgs),
    /// Print the bibtex of matching documents, oldest first
    Bibtex(QueryArgs),
    /// Print the number of matching documents
    Count(QueryArgs),
    /// Find documents that look like the given file
    Similar(SimilarArgs),
    /// Copy the files of matching documents into a directory
    Export(ExportArgs),
    /// Rebuild the index from the document directories
    Restore,
    /// Index store utilities
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Manage external sources
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

/// Search terms; joined with spaces into one query string.
#[derive(Debug, Clone, Parser)]
pub struct QueryArgs {
    /// Query terms ('*' or '+' matches everything)
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    pub query: Vec<String>,
}

impl QueryArgs {
    /// The query string, or `*` when no terms were given.
    pub fn query_or_all(&self) -> String {
        if self.query.is_empty() {
            "*".to_string()
        } else {
            self.query.join(" ")
        }
    }
}

// -- Add --

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// File to index
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Source ID ('SOURCE:ID' or URL), or path to a bibtex file
    #[arg(short, long, value_name = "SID")]
    pub source: Option<String>,

    /// Initial tags, comma separated
    #[arg(short, long, value_name = "TAG[,TAG...]")]
    pub tags: Option<String>,

    /// Add even if a similar document is already indexed
    #[arg(long)]
    pub force: bool,

    /// Existing document to update (must match exactly one)
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    pub query: Vec<String>,
}

// -- Tag --

#[derive(Debug, Parser)]
pub struct TagArgs {
    /// Comma-separated tag operations: '+tag' adds, '-tag' removes, a bare
    /// tag adds
    #[arg(allow_hyphen_values = true, value_name = "[OP]TAG[,[OP]TAG...]")]
    pub tags: String,

    /// Documents to tag
    #[arg(
        required = true,
        allow_hyphen_values = true,
        trailing_var_arg = true
    )]
    pub query: Vec<String>,
}

/// A single tag edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOp {
    Add(String),
    Remove(String),
}

impl TagArgs {
    pub fn operations(&self) -> Vec<TagOp> {
        parse_tag_ops(&self.tags)
    }
}

pub fn parse_tag_ops(ops: &str) -> Vec<TagOp> {
    ops.split(',')
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .filter_map(|op| {
            let (remove, tag) = if let Some(tag) = op.strip_prefix('-') {
                (true, tag)
            } else {
                (false, op.strip_prefix('+').unwrap_or(op))
            };
            if tag.is_empty() {
                return None;
            }
            Some(if remove {
                TagOp::Remove(tag.to_string())
            } else {
                TagOp::Add(tag.to_string())
            })
        })
        .collect()
}

// -- Delete --

#[derive(Debug, Parser)]
pub struct DeleteArgs {
    /// Do not prompt for confirmation
    #[arg(long)]
    pub force: bool,

    /// Documents to delete
    #[arg(
        required = true,
        allow_hyphen_values = true,
        trailing_var_arg = true
    )]
    pub query: Vec<String>,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// What to print for each match
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
    pub output: OutputFormat,

    /// Sort by relevance or publication year
    #[arg(short, long, value_enum, default_value_t = SortOrder::Relevance)]
    pub sort: SortOrder,

    /// Maximum number of results (0 is no limit)
    #[arg(short, long, default_value = "0")]
    pub limit: usize,

    /// Query terms
    #[arg(
        required = true,
        allow_hyphen_values = true,
        trailing_var_arg = true
    )]
    pub query: Vec<String>,
}

// -- Similar --

#[derive(Debug, Parser)]
pub struct SimilarArgs {
    /// File whose text is compared against the index
    pub file: PathBuf,
}

// -- Export --

#[derive(Debug, Parser)]
pub struct ExportArgs {
    /// Directory to copy files into (created if missing)
    pub dir: PathBuf,

    /// Documents to export
    #[arg(
        required = true,
        allow_hyphen_values = true,
        trailing_var_arg = true
    )]
    pub query: Vec<String>,
}

// -- Db --

#[derive(Debug, Subcommand)]
pub enum DbAction {
    /// Print index terms, optionally only those with a prefix
    Dump {
        /// Only terms starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,

        #[command(flatten)]
        query: QueryArgs,
    },
    /// Print the highest docid allocated so far
    Maxid,
}

// -- Source --

#[derive(Debug, Subcommand)]
pub enum SourceAction {
    /// List known sources
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the item URL for a source ID
    Url {
        /// 'SOURCE:ID' or URL
        sid: String,
    },
    /// Define a source, or replace an existing definition
    Add {
        /// Source name, used as the query field name
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Home page of the source
        #[arg(long)]
        url: Option<String>,
        /// Item URL template, '{id}' is replaced by the identifier
        #[arg(long)]
        url_format: Option<String>,
        /// Regex matching item URLs; group 1 is the identifier
        #[arg(long)]
        url_regex: Option<String>,
        /// Regex finding identifiers in document text; group 1 is the
        /// identifier
        #[arg(long)]
        scan_regex: Option<String>,
    },
    /// Remove a user-defined source
    Remove {
        name: String,
    },
    /// Print the source IDs mentioned in a file
    Scan {
        file: PathBuf,
    },
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "paperdex",
            &mut std::io::stdout(),
        );
    }
}
