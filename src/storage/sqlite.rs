//! SQLite storage backend

use super::traits::{select_identity_match, OpenStore, PhenotypeStore, StorageError, StorageResult};
use crate::phenotype::{name_key, IssueNumber, Phenotype, PhenotypeId, Status};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const PHENOTYPE_COLUMNS: &str = "id, issue_number, name, description, synonyms_json, parents_json, \
     hpo_id, status, created_at, modified_at";

/// SQLite-backed phenotype store
///
/// Phenotypes live in one table; every case-folded name (canonical name and
/// synonyms) is indexed in `phenotype_names` so identity lookups never scan.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Raw column values of one `phenotypes` row
struct PhenotypeRow {
    id: String,
    issue_number: Option<String>,
    name: String,
    description: String,
    synonyms_json: String,
    parents_json: String,
    hpo_id: Option<String>,
    status: String,
    created_at: String,
    modified_at: String,
}

impl PhenotypeRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            issue_number: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            synonyms_json: row.get(4)?,
            parents_json: row.get(5)?,
            hpo_id: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
            modified_at: row.get(9)?,
        })
    }

    fn into_phenotype(self) -> StorageResult<Phenotype> {
        let synonyms: Vec<String> = serde_json::from_str(&self.synonyms_json)?;
        let parents: Vec<String> = serde_json::from_str(&self.parents_json)?;
        let status: Status = self.status.parse()?;

        let mut phenotype = Phenotype::new(&self.name, self.description);
        phenotype.add_all_synonyms(&synonyms);
        phenotype.parents.extend(parents);
        phenotype.restore_status(status);
        phenotype.id = Some(PhenotypeId::from_string(self.id));
        phenotype.issue_number = self.issue_number.map(IssueNumber::new);
        phenotype.hpo_id = self.hpo_id;
        phenotype.created_at = Some(parse_timestamp(&self.created_at)?);
        phenotype.modified_at = Some(parse_timestamp(&self.modified_at)?);
        Ok(phenotype)
    }
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(e.to_string()))
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS phenotypes (
                id TEXT PRIMARY KEY,
                issue_number TEXT UNIQUE,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                -- Description folded like name keys, for text search
                description_key TEXT NOT NULL,
                synonyms_json TEXT NOT NULL,
                parents_json TEXT NOT NULL,
                hpo_id TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            );

            -- One row per case-folded name, for identity lookups
            CREATE TABLE IF NOT EXISTS phenotype_names (
                phenotype_id TEXT NOT NULL,
                name_key TEXT NOT NULL,
                PRIMARY KEY (phenotype_id, name_key),
                FOREIGN KEY (phenotype_id) REFERENCES phenotypes(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_phenotype_names_key
                ON phenotype_names(name_key);

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn query_phenotypes(
        conn: &Connection,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> StorageResult<Vec<Phenotype>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, PhenotypeRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(PhenotypeRow::into_phenotype).collect()
    }

    fn query_one(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> StorageResult<Option<Phenotype>> {
        let conn = self.conn()?;
        let row = conn.query_row(sql, args, PhenotypeRow::read).optional()?;
        row.map(PhenotypeRow::into_phenotype).transpose()
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl PhenotypeStore for SqliteStore {
    fn save_phenotype(&self, phenotype: &Phenotype) -> StorageResult<Phenotype> {
        let now = Utc::now();
        let mut stored = phenotype.clone();
        let id = stored.id.get_or_insert_with(PhenotypeId::generate).clone();
        let created_at = *stored.created_at.get_or_insert(now);
        stored.modified_at = Some(now);

        let synonyms_json = serde_json::to_string(stored.synonyms())?;
        let parents_json = serde_json::to_string(&stored.parents)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(number) = &stored.issue_number {
            let owner: Option<String> = tx
                .query_row(
                    "SELECT id FROM phenotypes WHERE issue_number = ?1",
                    params![number.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if owner.is_some_and(|owner| owner != id.as_str()) {
                return Err(StorageError::DuplicateIssue(number.clone()));
            }
        }

        tx.execute(
            r#"
            INSERT INTO phenotypes (id, issue_number, name, description, description_key,
                                    synonyms_json, parents_json, hpo_id, status, created_at,
                                    modified_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                issue_number = excluded.issue_number,
                name = excluded.name,
                description = excluded.description,
                description_key = excluded.description_key,
                synonyms_json = excluded.synonyms_json,
                parents_json = excluded.parents_json,
                hpo_id = excluded.hpo_id,
                status = excluded.status,
                modified_at = excluded.modified_at
            "#,
            params![
                id.as_str(),
                stored.issue_number.as_ref().map(IssueNumber::as_str),
                stored.name(),
                stored.description,
                name_key(&stored.description),
                synonyms_json,
                parents_json,
                stored.hpo_id,
                stored.status().as_str(),
                created_at.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "DELETE FROM phenotype_names WHERE phenotype_id = ?1",
            params![id.as_str()],
        )?;
        for key in stored.name_keys() {
            tx.execute(
                "INSERT INTO phenotype_names (phenotype_id, name_key) VALUES (?1, ?2)",
                params![id.as_str(), key],
            )?;
        }

        tx.commit()?;
        Ok(stored)
    }

    fn delete_phenotype(&self, phenotype: &Phenotype) -> StorageResult<bool> {
        let Some(id) = &phenotype.id else {
            return Ok(false);
        };
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM phenotypes WHERE id = ?1", params![id.as_str()])?;
        Ok(rows > 0)
    }

    fn get_phenotype_by_id(&self, id: &PhenotypeId) -> StorageResult<Option<Phenotype>> {
        self.query_one(
            &format!("SELECT {} FROM phenotypes WHERE id = ?1", PHENOTYPE_COLUMNS),
            params![id.as_str()],
        )
    }

    fn get_phenotype(&self, candidate: &Phenotype) -> StorageResult<Option<Phenotype>> {
        let keys = candidate.name_keys();
        if keys.is_empty() && candidate.id.is_none() {
            return Ok(None);
        }

        // ?1 is the candidate's own id, the rest are its name keys
        let mut args: Vec<Option<String>> = vec![candidate.id.as_ref().map(|id| id.to_string())];
        let placeholders = (2..keys.len() + 2)
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        args.extend(keys.into_iter().map(Some));

        let sql = format!(
            "SELECT {} FROM phenotypes WHERE id = ?1 OR id IN \
             (SELECT phenotype_id FROM phenotype_names WHERE name_key IN ({}))",
            PHENOTYPE_COLUMNS, placeholders
        );

        let conn = self.conn()?;
        let matches = Self::query_phenotypes(&conn, &sql, params_from_iter(args.iter()))?;
        Ok(select_identity_match(candidate, matches))
    }

    fn get_phenotype_by_issue(&self, number: &IssueNumber) -> StorageResult<Option<Phenotype>> {
        self.query_one(
            &format!("SELECT {} FROM phenotypes WHERE issue_number = ?1", PHENOTYPE_COLUMNS),
            params![number.as_str()],
        )
    }

    fn search_phenotypes(&self, text: &str) -> StorageResult<Vec<Phenotype>> {
        let needle = name_key(text);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM phenotypes WHERE id IN \
             (SELECT phenotype_id FROM phenotype_names WHERE instr(name_key, ?1) > 0) \
             OR instr(description_key, ?1) > 0 \
             ORDER BY name, id",
            PHENOTYPE_COLUMNS
        );
        let conn = self.conn()?;
        Self::query_phenotypes(&conn, &sql, params![needle])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn create_test_phenotype(name: &str, synonyms: &[&str]) -> Phenotype {
        let mut pt = Phenotype::new(name, format!("{} description", name));
        pt.add_all_synonyms(synonyms);
        pt
    }

    #[test]
    fn test_save_assigns_id_and_timestamps() {
        let store = create_test_store();
        let saved = store
            .save_phenotype(&create_test_phenotype("Microcephaly", &[]))
            .unwrap();

        let id = saved.id.clone().unwrap();
        assert!(id.as_str().starts_with(crate::phenotype::LOCAL_ID_PREFIX));
        assert!(saved.created_at.is_some());
        assert!(saved.modified_at.is_some());

        let loaded = store.get_phenotype_by_id(&id).unwrap().unwrap();
        assert_eq!(loaded.name(), "Microcephaly");
        assert_eq!(loaded.description, "Microcephaly description");
        assert_eq!(loaded.status(), Status::Unsubmitted);
        assert_eq!(loaded.created_at, saved.created_at);
    }

    #[test]
    fn test_save_updates_existing_row() {
        let store = create_test_store();
        let mut saved = store
            .save_phenotype(&create_test_phenotype("Microcephaly", &[]))
            .unwrap();
        let created = saved.created_at;

        saved.add_synonym("Small head");
        saved.issue_number = Some(IssueNumber::from(3));
        saved.advance_status(Status::Submitted).unwrap();
        let updated = store.save_phenotype(&saved).unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.created_at, created);

        let loaded = store.get_phenotype_by_id(saved.id.as_ref().unwrap()).unwrap().unwrap();
        assert!(loaded.synonyms().contains("Small head"));
        assert_eq!(loaded.status(), Status::Submitted);
        assert_eq!(loaded.issue_number, Some(IssueNumber::from(3)));
    }

    #[test]
    fn test_missing_id_is_none() {
        let store = create_test_store();
        let missing = store
            .get_phenotype_by_id(&PhenotypeId::from_string("NONHPO_missing"))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_identity_lookup_by_synonym() {
        let store = create_test_store();
        store
            .save_phenotype(&create_test_phenotype("Microcephaly", &[]))
            .unwrap();

        let candidate = create_test_phenotype("Small head", &["microcephaly"]);
        let found = store.get_phenotype(&candidate).unwrap().unwrap();
        assert_eq!(found.name(), "Microcephaly");

        let unrelated = create_test_phenotype("Macrocephaly", &["Large head"]);
        assert!(store.get_phenotype(&unrelated).unwrap().is_none());
    }

    #[test]
    fn test_identity_lookup_follows_renamed_synonyms() {
        let store = create_test_store();
        let mut saved = store
            .save_phenotype(&create_test_phenotype("Microcephaly", &["Small head"]))
            .unwrap();
        saved.remove_synonym("Small head");
        store.save_phenotype(&saved).unwrap();

        let candidate = create_test_phenotype("Small head", &[]);
        assert!(store.get_phenotype(&candidate).unwrap().is_none());
    }

    #[test]
    fn test_lookup_by_issue_number() {
        let store = create_test_store();
        let mut pt = create_test_phenotype("Microcephaly", &[]);
        pt.issue_number = Some(IssueNumber::from(17));
        store.save_phenotype(&pt).unwrap();

        let found = store.get_phenotype_by_issue(&IssueNumber::from(17)).unwrap();
        assert_eq!(found.unwrap().name(), "Microcephaly");
        assert!(store
            .get_phenotype_by_issue(&IssueNumber::from(18))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_issue_number_cannot_be_shared() {
        let store = create_test_store();
        let mut a = create_test_phenotype("Microcephaly", &[]);
        a.issue_number = Some(IssueNumber::from(5));
        store.save_phenotype(&a).unwrap();

        let mut b = create_test_phenotype("Macrocephaly", &[]);
        b.issue_number = Some(IssueNumber::from(5));
        let err = store.save_phenotype(&b).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateIssue(_)));
    }

    #[test]
    fn test_delete_removes_name_index() {
        let store = create_test_store();
        let saved = store
            .save_phenotype(&create_test_phenotype("Microcephaly", &["Small head"]))
            .unwrap();

        assert!(store.delete_phenotype(&saved).unwrap());
        assert!(!store.delete_phenotype(&saved).unwrap());
        assert!(!store
            .delete_phenotype(&create_test_phenotype("Unsaved", &[]))
            .unwrap());

        let candidate = create_test_phenotype("Small head", &[]);
        assert!(store.get_phenotype(&candidate).unwrap().is_none());

        let conn = store.conn().unwrap();
        let names: i64 = conn
            .query_row("SELECT COUNT(*) FROM phenotype_names", [], |row| row.get(0))
            .unwrap();
        assert_eq!(names, 0);
    }

    #[test]
    fn test_search_matches_names_and_description() {
        let store = create_test_store();
        store
            .save_phenotype(&create_test_phenotype("Microcephaly", &["Small head"]))
            .unwrap();
        store
            .save_phenotype(&create_test_phenotype("Macrocephaly", &["Large head"]))
            .unwrap();
        store
            .save_phenotype(&Phenotype::new("Brachydactyly", "Short fingers"))
            .unwrap();

        let heads: Vec<_> = store
            .search_phenotypes("HEAD")
            .unwrap()
            .into_iter()
            .map(|pt| pt.name().to_string())
            .collect();
        assert_eq!(heads, vec!["Macrocephaly", "Microcephaly"]);

        let fingers = store.search_phenotypes("fingers").unwrap();
        assert_eq!(fingers.len(), 1);

        assert!(store.search_phenotypes("   ").unwrap().is_empty());
        assert!(store.search_phenotypes("kidney").unwrap().is_empty());
    }

    #[test]
    fn test_search_folds_non_ascii_descriptions() {
        let store = create_test_store();
        store
            .save_phenotype(&Phenotype::new("Anemia", "Ödem der  Beine"))
            .unwrap();

        assert_eq!(store.search_phenotypes("ödem").unwrap().len(), 1);
        assert_eq!(store.search_phenotypes("ÖDEM DER BEINE").unwrap().len(), 1);
    }

    #[test]
    fn test_name_survives_round_trip() {
        let store = create_test_store();
        let saved = store
            .save_phenotype(&create_test_phenotype("ßchädel", &["ßpitz"]))
            .unwrap();

        let loaded = store.get_phenotype_by_id(saved.id.as_ref().unwrap()).unwrap().unwrap();
        assert_eq!(loaded.name(), saved.name());
        assert_eq!(loaded.synonyms(), saved.synonyms());
    }

    #[test]
    fn test_reopen_on_disk_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("phenotypes.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            let saved = store
                .save_phenotype(&create_test_phenotype("Microcephaly", &["Small head"]))
                .unwrap();
            saved.id.unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.get_phenotype_by_id(&id).unwrap().unwrap();
        assert!(loaded.synonyms().contains("Small head"));
    }

    #[test]
    fn test_wal_mode_enabled_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("wal.db")).unwrap();
        let conn = store.conn().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
