//! WriteSet - Transaction overlay of item images
//!
//! TigerStyle: DynamoDB transactions are a single `TransactWriteItems` call,
//! so actions are folded into one final image per primary key first. Later
//! actions read the images left by earlier ones.
//!
//! ```text
//! create k1 ─▶ { k1: Put(new) }
//! inc k1    ─▶ { k1: Put(new + delta) }
//! delete k1 ─▶ { }                     (never existed: nothing to write)
//! ```
//!
//! Items read from the table remember the copy that was read. The commit
//! guards their writes with equality on every attribute of that copy, so a
//! concurrent change cancels the whole unit instead of being overwritten.

use serde_json::Value;

use crate::condition;
use crate::error::{StoreError, StoreResult};
use crate::record::{Conditions, Record};

/// Final write for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Write the full item.
    Put {
        /// Full item image
        item: Record,
        /// Table copy the image was computed from; the item must still equal it
        expected: Option<Record>,
    },
    /// Remove the item with this key.
    Delete {
        /// Key attributes only
        key: Record,
        /// Table copy that was read; the item must still equal it
        expected: Record,
    },
}

#[derive(Debug, Clone)]
struct WriteEntry {
    key: Vec<Value>,
    image: Option<Record>,
    read: Option<Record>,
}

/// Staged images keyed by primary key, in first-touched order.
#[derive(Debug, Clone)]
pub struct WriteSet {
    key_attributes: Vec<String>,
    entries: Vec<WriteEntry>,
}

impl WriteSet {
    /// Empty write set.
    ///
    /// # Panics
    /// Panics if `key_attributes` is empty.
    #[must_use]
    pub fn new(key_attributes: Vec<String>) -> Self {
        assert!(!key_attributes.is_empty(), "key schema cannot be empty");
        Self {
            key_attributes,
            entries: Vec::new(),
        }
    }

    /// Primary key values of a record.
    ///
    /// # Errors
    /// Returns `Validation` if a key attribute is missing or null.
    pub fn key_of(&self, record: &Record) -> StoreResult<Vec<Value>> {
        self.key_attributes
            .iter()
            .map(|attribute| match record.get(attribute) {
                Some(value) if !value.is_null() => Ok(value.clone()),
                _ => Err(StoreError::validation(format!(
                    "item is missing key attribute '{attribute}'"
                ))),
            })
            .collect()
    }

    fn position(&self, key: &[Value]) -> Option<usize> {
        self.entries.iter().position(|e| {
            e.key.len() == key.len()
                && e.key.iter().zip(key).all(|(a, b)| condition::values_equal(a, b))
        })
    }

    fn stage(&mut self, key: Vec<Value>, image: Option<Record>, read: Option<Record>) {
        match self.position(&key) {
            Some(i) => self.entries[i].image = image,
            None => self.entries.push(WriteEntry { key, image, read }),
        }
    }

    /// Stage an unconditional put.
    ///
    /// # Errors
    /// Returns `Validation` if the item lacks a key attribute.
    pub fn stage_put(&mut self, item: Record) -> StoreResult<()> {
        let key = self.key_of(&item)?;
        self.stage(key, Some(item), None);
        Ok(())
    }

    /// Stage a new image for a record returned by [`WriteSet::resolve`].
    ///
    /// # Errors
    /// Returns `Validation` if the image changes or lacks a key attribute.
    pub fn stage_image(&mut self, original: &Record, image: Record, existed: bool) -> StoreResult<()> {
        let key = self.key_of(original)?;
        let new_key = self.key_of(&image)?;
        if !key.iter().zip(&new_key).all(|(a, b)| condition::values_equal(a, b)) {
            return Err(StoreError::validation("key attributes cannot be modified"));
        }
        self.stage(key, Some(image), existed.then(|| original.clone()));
        Ok(())
    }

    /// Stage removal of a record returned by [`WriteSet::resolve`].
    ///
    /// # Errors
    /// Returns `Validation` if the record lacks a key attribute.
    pub fn stage_delete(&mut self, original: &Record, existed: bool) -> StoreResult<()> {
        let key = self.key_of(original)?;
        self.stage(key, None, existed.then(|| original.clone()));
        Ok(())
    }

    /// Current view of the records matching `conditions`: `loaded` items
    /// from the table with staged images taking precedence, plus staged
    /// items the table does not know yet. Each record comes with whether it
    /// was read from the table.
    #[must_use]
    pub fn resolve(&self, loaded: Vec<Record>, conditions: &Conditions) -> Vec<(Record, bool)> {
        let mut seen = Vec::new();
        let mut matched = Vec::new();

        for record in loaded {
            let Ok(key) = self.key_of(&record) else {
                continue;
            };
            match self.position(&key) {
                Some(i) => {
                    seen.push(i);
                    let entry = &self.entries[i];
                    if let Some(image) = &entry.image {
                        if condition::matches(image, conditions) {
                            matched.push((image.clone(), true));
                        }
                    }
                }
                None => {
                    if condition::matches(&record, conditions) {
                        matched.push((record, true));
                    }
                }
            }
        }

        for (i, entry) in self.entries.iter().enumerate() {
            if seen.contains(&i) {
                continue;
            }
            if let Some(image) = &entry.image {
                if condition::matches(image, conditions) {
                    matched.push((image.clone(), entry.read.is_some()));
                }
            }
        }
        matched
    }

    /// Final writes. Items created and deleted inside the set vanish.
    #[must_use]
    pub fn ops(&self) -> Vec<WriteOp> {
        self.entries
            .iter()
            .filter_map(|entry| match (&entry.image, &entry.read) {
                (Some(item), read) => Some(WriteOp::Put {
                    item: item.clone(),
                    expected: read.clone(),
                }),
                (None, Some(read)) => Some(WriteOp::Delete {
                    key: self
                        .key_attributes
                        .iter()
                        .cloned()
                        .zip(entry.key.iter().cloned())
                        .collect(),
                    expected: read.clone(),
                }),
                (None, None) => None,
            })
            .collect()
    }
}
