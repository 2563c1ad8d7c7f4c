use std::collections::HashMap;

use log::debug;

use crate::error::StorageError;

/// Synchronous string-keyed storage, the chat's counterpart of `localStorage`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One chat's keys, kept in a tree of its own inside the shared sled database.
/// Every write is flushed before the call returns.
#[derive(Clone)]
pub struct SledStore {
    tree: sled::Tree,
}

impl SledStore {
    pub fn open(db: &sled::Db, name: &str) -> Result<Self, StorageError> {
        let tree = db.open_tree(name)?;
        debug!("Opened store {} with {} keys", name, tree.len());
        Ok(Self { tree })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.tree.flush()?;
        Ok(())
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes.to_vec())?)),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.tree.insert(key.as_bytes(), value.into_bytes())?;
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.tree.remove(key.as_bytes())?.is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_set_get_remove() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("quiz_score").unwrap(), None);
        store.set("quiz_score", "3".to_string()).unwrap();
        assert_eq!(store.get("quiz_score").unwrap().as_deref(), Some("3"));
        store.remove("quiz_score").unwrap();
        assert_eq!(store.get("quiz_score").unwrap(), None);
        store.remove("quiz_score").unwrap();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn sled_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions");

        {
            let db = sled::open(&path).unwrap();
            let mut store = SledStore::open(&db, "chat:42").unwrap();
            store.set("quiz_category", "science".to_string()).unwrap();
            store.set("quiz_score", "5".to_string()).unwrap();
            store.remove("quiz_score").unwrap();
        }

        let db = sled::open(&path).unwrap();
        let reopened = SledStore::open(&db, "chat:42").unwrap();
        assert_eq!(reopened.get("quiz_category").unwrap().as_deref(), Some("science"));
        assert_eq!(reopened.get("quiz_score").unwrap(), None);
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn chats_do_not_share_keys() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let mut first = SledStore::open(&db, "chat:1").unwrap();
        let second = SledStore::open(&db, "chat:2").unwrap();

        first.set("quiz_category", "history".to_string()).unwrap();
        assert_eq!(second.get("quiz_category").unwrap(), None);
        assert_eq!(
            SledStore::open(&db, "chat:1")
                .unwrap()
                .get("quiz_category")
                .unwrap()
                .as_deref(),
            Some("history")
        );
    }

    #[test]
    fn non_utf8_value_is_an_error() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledStore::open(&db, "chat:7").unwrap();
        store.tree.insert("quiz_score", vec![0xffu8, 0xfe]).unwrap();
        assert!(matches!(store.get("quiz_score"), Err(StorageError::Utf8(_))));
    }
}
