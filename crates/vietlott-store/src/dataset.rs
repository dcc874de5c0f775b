//! Append-only draw dataset persisted as JSONL.
//!
//! The file is read once before a crawl and rewritten once after it. Writes go to a
//! temporary file in the same directory which then replaces the dataset, so
//! readers never observe a partially written file. Two writers on the same
//! file are not coordinated; callers must not crawl one game concurrently.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use vietlott_core::{DrawRecord, GameDescriptor, sort_draws};

use crate::StoreError;

/// JSONL dataset of one game.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
}

/// What a merge changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records in the dataset before the merge.
    pub existing: usize,
    /// Records whose id was not stored yet, in dataset order.
    pub added: Vec<DrawRecord>,
    /// Records in the dataset after the merge.
    pub total: usize,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/<game>.jsonl`
    pub fn for_game(data_dir: &Path, game: &GameDescriptor) -> Self {
        Self::new(data_dir.join(game.dataset_file_name()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored record. A missing file is an empty dataset.
    pub fn load(&self) -> Result<Vec<DrawRecord>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no dataset yet");
                return Ok(Vec::new());
            }
            Err(source) => return Err(self.io_error(source)),
        };

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| self.io_error(source))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| StoreError::Decode {
                path: self.path.clone(),
                line: idx + 1,
                source,
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Replace the dataset with `records`, one compact JSON object per line.
    pub fn write(&self, records: &[DrawRecord]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|source| self.io_error(source))?;

        let tmp = NamedTempFile::new_in(&dir).map_err(|source| self.io_error(source))?;
        {
            let mut out = BufWriter::new(tmp.as_file());
            for record in records {
                serde_json::to_writer(&mut out, record)?;
                out.write_all(b"\n").map_err(|source| self.io_error(source))?;
            }
            out.flush().map_err(|source| self.io_error(source))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|source| self.io_error(source))?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    /// Merge freshly fetched records into `stored` and persist the result.
    ///
    /// `stored` is what [`load`](Self::load) returned before fetching began.
    /// The dataset is rewritten even when nothing is new.
    pub fn merge(
        &self,
        stored: Vec<DrawRecord>,
        fresh: Vec<DrawRecord>,
    ) -> Result<MergeOutcome, StoreError> {
        let existing = stored.len();
        if let (Some(first), Some(last)) = (stored.first(), stored.last()) {
            info!(
                min_date = %first.date,
                max_date = %last.date,
                records = existing,
                "current dataset"
            );
        }

        let (merged, added) = merge_records(stored, fresh);
        self.write(&merged)?;
        info!(
            path = %self.path.display(),
            added = added.len(),
            total = merged.len(),
            "wrote dataset"
        );

        Ok(MergeOutcome {
            existing,
            added,
            total: merged.len(),
        })
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Union `stored` with the records of `fresh` whose id is not stored yet.
///
/// The id is the only dedup key: a stored record always wins over a fresh
/// one, and among fresh duplicates the first occurrence wins. Returns the
/// merged dataset sorted by `(date, id)` and the newly added records.
pub fn merge_records(
    stored: Vec<DrawRecord>,
    fresh: Vec<DrawRecord>,
) -> (Vec<DrawRecord>, Vec<DrawRecord>) {
    let mut seen: HashSet<String> = stored.iter().map(|r| r.id.clone()).collect();
    let mut added: Vec<DrawRecord> = fresh
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    sort_draws(&mut added);

    let mut merged = stored;
    merged.extend(added.iter().cloned());
    sort_draws(&mut merged);
    (merged, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vietlott_core::is_sorted;

    fn rec(date: &str, id: &str, result: &[u32], page: i64) -> DrawRecord {
        DrawRecord {
            date: date.into(),
            id: id.into(),
            result: result.to_vec(),
            page,
            process_time: "2024-05-01T10:00:00.000000".into(),
        }
    }

    fn store(tmp: &TempDir) -> DatasetStore {
        DatasetStore::new(tmp.path().join("power_655.jsonl"))
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(store(&tmp).load().unwrap().is_empty());
    }

    #[test]
    fn write_then_load_preserves_records() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let records = vec![
            rec("2024-04-30", "01050", &[1, 2, 3, 4, 5, 6, 7], 0),
            rec("2024-05-02", "01051", &[8, 9, 10, 11, 12, 13, 14], 0),
        ];
        store.write(&records).unwrap();
        assert_eq!(store.load().unwrap(), records);

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
        assert!(content.starts_with(r#"{"date":"2024-04-30","id":"01050","#));
    }

    #[test]
    fn write_creates_missing_directories() {
        let tmp = TempDir::new().unwrap();
        let store = DatasetStore::new(tmp.path().join("data").join("max3d.jsonl"));
        store.write(&[rec("2024-05-02", "1", &[123], 0)]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn stored_record_wins_on_duplicate_id() {
        let stored = vec![rec("2024-05-02", "01051", &[1, 2, 3], 3)];
        let fresh = vec![
            rec("2024-05-02", "01051", &[9, 9, 9], 0),
            rec("2024-05-04", "01052", &[4, 5, 6], 0),
        ];
        let (merged, added) = merge_records(stored, fresh);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].result, [1, 2, 3]);
        assert_eq!(merged[0].page, 3);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, "01052");
    }

    #[test]
    fn duplicate_ids_within_fresh_batch_collapse() {
        let fresh = vec![
            rec("2024-05-02", "01051", &[1, 2, 3], 0),
            rec("2024-05-02", "01051", &[7, 8, 9], 1),
        ];
        let (merged, added) = merge_records(Vec::new(), fresh);
        assert_eq!(merged.len(), 1);
        assert_eq!(added.len(), 1);
        assert_eq!(merged[0].page, 0);
    }

    #[test]
    fn merged_dataset_is_sorted() {
        let stored = vec![
            rec("2024-05-04", "01052", &[1], 0),
            rec("2024-05-09", "01054", &[1], 0),
        ];
        let fresh = vec![
            rec("2024-05-07", "01053", &[1], 0),
            rec("2024-05-01", "01050", &[1], 1),
        ];
        let (merged, _) = merge_records(stored, fresh);
        assert!(is_sorted(&merged));
        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["01050", "01052", "01053", "01054"]);
    }

    #[test]
    fn merge_is_idempotent_on_disk() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let fresh = vec![
            rec("2024-05-04", "01052", &[1, 2], 0),
            rec("2024-05-02", "01051", &[3, 4], 0),
        ];

        let first = store.merge(store.load().unwrap(), fresh.clone()).unwrap();
        assert_eq!(first.existing, 0);
        assert_eq!(first.added.len(), 2);
        let bytes_after_first = std::fs::read(store.path()).unwrap();

        let second = store.merge(store.load().unwrap(), fresh).unwrap();
        assert_eq!(second.existing, 2);
        assert!(second.added.is_empty());
        assert_eq!(second.total, 2);
        assert_eq!(std::fs::read(store.path()).unwrap(), bytes_after_first);
    }

    #[test]
    fn empty_fresh_batch_rewrites_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let records = vec![rec("2024-05-02", "01051", &[3, 4], 0)];
        store.write(&records).unwrap();

        let outcome = store.merge(store.load().unwrap(), Vec::new()).unwrap();
        assert!(outcome.added.is_empty());
        assert_eq!(store.load().unwrap(), records);
    }

    #[test]
    fn corrupt_line_is_reported_with_line_number() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        std::fs::write(
            store.path(),
            "{\"date\":\"2024-05-02\",\"id\":\"1\",\"result\":[1],\"page\":0,\"process_time\":\"t\"}\n{oops\n",
        )
        .unwrap();
        match store.load().unwrap_err() {
            StoreError::Decode { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_lines_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        std::fs::write(
            store.path(),
            "\n{\"date\":\"2024-05-02\",\"id\":\"1\",\"result\":[1],\"page\":0,\"process_time\":\"t\"}\n\n",
        )
        .unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
