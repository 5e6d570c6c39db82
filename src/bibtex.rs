//! Minimal bibliographic entry handling.
//!
//! Only the fields the index cares about are interpreted; everything else
//! is carried through untouched so the entry can be written back out.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// One bibliographic entry: `@type{key, field = value, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibEntry {
    pub entry_type: String,
    pub key: String,
    /// Field names are lower-cased; values have braces stripped and
    /// whitespace collapsed.
    pub fields: BTreeMap<String, String>,
}

impl BibEntry {
    pub fn new(entry_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.fields.insert(name.into().to_lowercase(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").filter(|t| !t.is_empty())
    }

    pub fn authors(&self) -> Vec<String> {
        self.get("author")
            .map(|authors| {
                authors
                    .split(" and ")
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `year` field, if it is a plain number.
    pub fn year(&self) -> Option<u64> {
        self.get("year").and_then(|y| y.trim().parse().ok())
    }

    /// Canonical rendering, as stored in a document directory.
    pub fn to_bibtex(&self) -> String {
        let mut out = format!("@{}{{{}", self.entry_type, self.key);
        for (name, value) in &self.fields {
            out.push_str(&format!(",\n  {name} = {{{value}}}"));
        }
        out.push_str("\n}\n");
        out
    }
}

/// Parses the text of a bibliographic entry file.
pub trait BibParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<BibEntry>;
}

/// A small BibTeX reader handling a single entry with braced, quoted or
/// bare values. No string macros, no `#` concatenation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleBibtex;

impl BibParser for SimpleBibtex {
    fn parse(&self, text: &str) -> Result<BibEntry> {
        Reader::new(text).entry()
    }
}

struct Reader<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> Result<()> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!("expected '{want}', found '{c}'"))),
            None => Err(self.error(format!("expected '{want}', found end"))),
        }
    }

    fn error(&self, msg: String) -> Error {
        Error::Parse(format!("bibtex at byte {}: {msg}", self.pos))
    }

    fn ident(&mut self) -> &'a str {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !"{}(),=\"#@".contains(c))
        {
            self.bump();
        }
        &self.text[start..self.pos]
    }

    fn entry(&mut self) -> Result<BibEntry> {
        let at = self
            .rest()
            .find('@')
            .ok_or_else(|| Error::Parse("no bibtex entry found".into()))?;
        self.pos += at + 1;

        let entry_type = self.ident().to_lowercase();
        if entry_type.is_empty() {
            return Err(self.error("missing entry type".into()));
        }
        self.skip_ws();
        let close = match self.bump() {
            Some('{') => '}',
            Some('(') => ')',
            _ => return Err(self.error("expected '{' after entry type".into())),
        };

        let key = self.ident().to_string();
        if key.is_empty() {
            return Err(self.error("missing citation key".into()));
        }
        let mut entry = BibEntry::new(entry_type, key);

        loop {
            self.skip_ws();
            match self.bump() {
                Some(',') => {}
                Some(c) if c == close => return Ok(entry),
                Some(c) => {
                    return Err(self.error(format!("unexpected '{c}'")));
                }
                None => return Err(self.error("unterminated entry".into())),
            }

            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(entry);
            }

            let name = self.ident().to_lowercase();
            if name.is_empty() {
                return Err(self.error("missing field name".into()));
            }
            self.expect('=')?;
            let value = self.value()?;
            entry.fields.insert(name, collapse_whitespace(&value));
        }
    }

    fn value(&mut self) -> Result<String> {
        self.skip_ws();
        match self.peek() {
            Some('{') => {
                self.bump();
                self.braced()
            }
            Some('"') => {
                self.bump();
                self.quoted()
            }
            Some(_) => {
                let bare = self.ident();
                if bare.is_empty() {
                    Err(self.error("missing field value".into()))
                } else {
                    Ok(bare.to_string())
                }
            }
            None => Err(self.error("missing field value".into())),
        }
    }

    /// Reads up to the matching close brace; nested braces are dropped.
    fn braced(&mut self) -> Result<String> {
        let mut depth = 1usize;
        let mut out = String::new();
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                }
                _ => out.push(c),
            }
        }
        Err(self.error("unbalanced braces".into()))
    }

    fn quoted(&mut self) -> Result<String> {
        let mut depth = 0usize;
        let mut out = String::new();
        while let Some(c) = self.bump() {
            match c {
                '"' if depth == 0 => return Ok(out),
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => out.push(c),
            }
        }
        Err(self.error("unterminated quoted value".into()))
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
