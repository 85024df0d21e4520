//! SQLite-backed task store.
//!
//! This module is the bridge between the in-memory task list and the local
//! database file: `Store` holds the connection and implements the
//! load-all/save-all persistence cycle, `StoreWriter` serializes save
//! requests behind the UI event loop on a single background thread.

use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::error;
use rusqlite::{params, params_from_iter, Connection};
use thiserror::Error;

use crate::task::Task;

/// Complete DDL for the task database.
///
/// One logical table keyed by the auto-assigned id, plus a non-unique
/// secondary index on task text. `IF NOT EXISTS` throughout, so applying it
/// on every open is idempotent.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    text      TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_tasks_text ON tasks(text);
";

pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by store open and persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// SQLite-backed task store.
///
/// All access goes through an internal `Mutex<Connection>`, so inserts from
/// the UI thread and saves from the writer thread never interleave.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file at `path` and apply the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::bootstrap(conn)
    }

    /// Open an in-memory database.
    ///
    /// Used as the fallback when the on-disk store cannot be opened; the
    /// session then runs with full persistence semantics but loses its
    /// contents at exit.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch every persisted task, in id order.
    ///
    /// Ids are issued monotonically, so id order is insertion order.
    pub fn load_all(&self) -> StoreResult<Vec<Task>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, text, completed FROM tasks ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Task {
                id: Some(row.get(0)?),
                text: row.get(1)?,
                completed: row.get::<_, i64>(2)? != 0,
            })
        })?;

        let mut tasks = Vec::new();
        for task in rows {
            tasks.push(task?);
        }
        Ok(tasks)
    }

    /// Persist a task for the first time and return its store-issued id.
    pub fn insert(&self, task: &Task) -> StoreResult<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO tasks (text, completed) VALUES (?1, ?2)",
            params![task.text, task.completed],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Overwrite the persisted list with `tasks` in one transaction.
    ///
    /// Every task that carries an id is upserted by id; rows whose id does
    /// not appear in `tasks` are deleted, so the store converges to the
    /// in-memory list after every cycle. Tasks without an id are skipped:
    /// they have never reached the store, and inserting them here would
    /// hand out ids the in-memory list never learns about.
    pub fn save_all(&self, tasks: &[Task]) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare(
                "INSERT INTO tasks (id, text, completed) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     text = excluded.text,
                     completed = excluded.completed",
            )?;
            for task in tasks {
                if let Some(id) = task.id {
                    upsert.execute(params![id, task.text, task.completed])?;
                }
            }
        }

        let ids: Vec<i64> = tasks.iter().filter_map(|t| t.id).collect();
        if ids.is_empty() {
            tx.execute("DELETE FROM tasks", [])?;
        } else {
            let placeholders = vec!["?"; ids.len()].join(", ");
            tx.execute(
                &format!("DELETE FROM tasks WHERE id NOT IN ({placeholders})"),
                params_from_iter(ids.iter()),
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

/// Single-writer persistence queue.
///
/// Mutations hand a cloned snapshot of the list to `queue_save` and continue
/// immediately; the background thread applies snapshots in order, collapsing
/// a backlog down to the newest one. Write failures are logged and swallowed
/// per the store failure policy. Dropping the writer drains the queue before
/// returning, so the final state always reaches the store.
pub struct StoreWriter {
    tx: Option<Sender<Vec<Task>>>,
    handle: Option<JoinHandle<()>>,
}

impl StoreWriter {
    /// Spawn the writer thread over `store`.
    pub fn spawn(store: Arc<Store>) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<Task>>();
        let handle = thread::spawn(move || {
            while let Ok(mut snapshot) = rx.recv() {
                // Only the newest queued snapshot matters; earlier ones are
                // superseded whole-state replacements.
                while let Ok(newer) = rx.try_recv() {
                    snapshot = newer;
                }
                if let Err(err) = store.save_all(&snapshot) {
                    error!("failed to persist {} task(s): {err}", snapshot.len());
                }
            }
        });
        StoreWriter {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Queue one persistence cycle for `snapshot`. Never blocks.
    pub fn queue_save(&self, snapshot: Vec<Task>) {
        if let Some(tx) = &self.tx {
            if tx.send(snapshot).is_err() {
                error!("store writer is gone; dropping save request");
            }
        }
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain what is queued and exit.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("store writer thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(texts: &[&str]) -> (Store, Vec<Task>) {
        let store = Store::open_in_memory().expect("in-memory store");
        let mut tasks = Vec::new();
        for text in texts {
            let mut task = Task::new(*text);
            task.id = Some(store.insert(&task).expect("insert"));
            tasks.push(task);
        }
        (store, tasks)
    }

    #[test]
    fn insert_issues_monotonic_ids_in_insertion_order() {
        let (store, tasks) = store_with(&["Buy milk", "Walk dog", "Buy milk"]);
        let ids: Vec<i64> = tasks.iter().map(|t| t.id.unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        // Duplicate text is fine; only ids are unique.
        let loaded = store.load_all().expect("load_all");
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn save_all_overwrites_only_the_targeted_task() {
        let (store, mut tasks) = store_with(&["Buy milk", "Walk dog"]);
        tasks[1].completed = true;
        store.save_all(&tasks).expect("save_all");

        tasks[0].text = "Buy oat milk".to_string();
        store.save_all(&tasks).expect("save_all");

        let loaded = store.load_all().expect("load_all");
        assert_eq!(loaded[0].text, "Buy oat milk");
        assert!(!loaded[0].completed);
        assert_eq!(loaded[1].text, "Walk dog");
        assert!(loaded[1].completed);
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn save_all_removes_rows_missing_from_the_list() {
        let (store, mut tasks) = store_with(&["one", "two", "three"]);
        let removed = tasks.remove(1);
        store.save_all(&tasks).expect("save_all");

        let loaded = store.load_all().expect("load_all");
        assert_eq!(loaded, tasks);
        assert!(loaded.iter().all(|t| t.id != removed.id));
    }

    #[test]
    fn save_all_of_empty_list_clears_the_store() {
        let (store, _tasks) = store_with(&["one", "two"]);
        store.save_all(&[]).expect("save_all");
        assert!(store.load_all().expect("load_all").is_empty());
    }

    #[test]
    fn save_all_is_idempotent() {
        let (store, tasks) = store_with(&["one", "two"]);
        store.save_all(&tasks).expect("save_all");
        store.save_all(&tasks).expect("save_all");
        assert_eq!(store.load_all().expect("load_all"), tasks);
    }

    #[test]
    fn save_all_skips_tasks_without_an_id() {
        let (store, mut tasks) = store_with(&["persisted"]);
        tasks.push(Task::new("never reached the store"));
        store.save_all(&tasks).expect("save_all");

        let loaded = store.load_all().expect("load_all");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "persisted");
    }

    #[test]
    fn persisted_list_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tasks.db");

        let mut tasks = Vec::new();
        {
            let store = Store::open(&path).expect("open");
            for text in ["Buy oat milk", "Walk dog"] {
                let mut task = Task::new(text);
                task.id = Some(store.insert(&task).expect("insert"));
                tasks.push(task);
            }
            tasks[1].completed = true;
            store.save_all(&tasks).expect("save_all");
        }

        let reopened = Store::open(&path).expect("reopen");
        assert_eq!(reopened.load_all().expect("load_all"), tasks);
    }

    #[test]
    fn open_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("tasks.db");
        let store = Store::open(&path).expect("open");
        assert!(store.load_all().expect("load_all").is_empty());
        assert!(path.exists());
    }

    #[test]
    fn writer_applies_the_newest_snapshot_before_drop() {
        let store = Arc::new(Store::open_in_memory().expect("in-memory store"));
        let mut task = Task::new("queued");
        task.id = Some(store.insert(&task).expect("insert"));

        let writer = StoreWriter::spawn(Arc::clone(&store));
        task.completed = true;
        writer.queue_save(vec![task.clone()]);
        task.text = "queued, then edited".to_string();
        writer.queue_save(vec![task.clone()]);
        drop(writer);

        assert_eq!(store.load_all().expect("load_all"), vec![task]);
    }
}
