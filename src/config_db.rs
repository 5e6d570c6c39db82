use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{error::Result, source::SourceDefinition};

/// User-defined sources, keyed by name, stored as JSON.
const SOURCES: TableDefinition<&str, &str> = TableDefinition::new("sources");

/// Persistent configuration living next to the index store.
///
/// Holds the user's additions to the source catalog. The catalog is read
/// once per process and handed to the database as plain data, so this
/// handle does not need to stay open while the index is in use.
pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(SOURCES)?;
        txn.commit()?;

        Ok(Self { db })
    }

    pub fn set_source(&self, source: &SourceDefinition) -> Result<()> {
        let json = serde_json::to_string(source)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SOURCES)?;
            table.insert(source.name.as_str(), json.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_source(&self, name: &str) -> Result<Option<SourceDefinition>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SOURCES)?;
        match table.get(name)? {
            Some(v) => Ok(Some(serde_json::from_str(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn remove_source(&self, name: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SOURCES)?;
            table.remove(name)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_sources(&self) -> Result<Vec<SourceDefinition>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SOURCES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            result.push(serde_json::from_str(v.value())?);
        }
        Ok(result)
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, ConfigDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = ConfigDb::open(&tmp.path().join("config.redb")).unwrap();
        (tmp, db)
    }

    fn pubmed() -> SourceDefinition {
        SourceDefinition {
            name: "pubmed".to_string(),
            description: "PubMed citations".to_string(),
            url_format: Some("https://pubmed.ncbi.nlm.nih.gov/{id}".into()),
            scan_regex: Some(r"PMID:\s*([0-9]+)".into()),
            ..SourceDefinition::default()
        }
    }

    #[test]
    fn sources_crud() {
        let (_tmp, db) = test_db();

        assert!(db.list_sources().unwrap().is_empty());
        assert_eq!(db.get_source("pubmed").unwrap(), None);

        db.set_source(&pubmed()).unwrap();
        assert_eq!(db.get_source("pubmed").unwrap(), Some(pubmed()));
        assert_eq!(db.list_sources().unwrap().len(), 1);

        assert!(db.remove_source("pubmed").unwrap());
        assert!(!db.remove_source("pubmed").unwrap());
        assert_eq!(db.get_source("pubmed").unwrap(), None);
    }

    #[test]
    fn reopen_preserves_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.redb");

        {
            let db = ConfigDb::open(&path).unwrap();
            db.set_source(&pubmed()).unwrap();
        }

        {
            let db = ConfigDb::open(&path).unwrap();
            assert_eq!(db.get_source("pubmed").unwrap(), Some(pubmed()));
        }
    }
}
