use std::path::PathBuf;

use parley_db::Database;

/// A database file under the system temp dir, removed on drop together with
/// its WAL side files.
pub struct TempDbFile {
    pub path: PathBuf,
}

impl TempDbFile {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("parley-test-{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub fn open(&self) -> Database {
        Database::open_with_readers(&self.path, 2).unwrap()
    }
}

impl Drop for TempDbFile {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub fn user(db: &Database, name: &str) -> String {
    db.create_or_get_user(name).unwrap().id
}
