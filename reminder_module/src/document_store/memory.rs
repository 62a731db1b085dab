use std::sync::Mutex;

use mongodb::bson::{oid::ObjectId, Bson, Document};

use super::{DocumentStore, StoreError, UpdateOutcome};

/// In-process stand-in for a MongoDB collection.
///
/// Filters match on top-level field equality; updates support `$set`,
/// `$setOnInsert` and `$unset`.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    docs: Mutex<Vec<Document>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Document>>, StoreError> {
        self.docs.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl DocumentStore for MemoryCollection {
    fn find_one(&self, filter: Document) -> Result<Option<Document>, StoreError> {
        let docs = self.lock()?;
        Ok(docs.iter().find(|doc| matches_filter(doc, &filter)).cloned())
    }

    fn find(&self, filter: Document) -> Result<Vec<Document>, StoreError> {
        let docs = self.lock()?;
        Ok(docs
            .iter()
            .filter(|doc| matches_filter(doc, &filter))
            .cloned()
            .collect())
    }

    fn insert_one(&self, mut doc: Document) -> Result<Bson, StoreError> {
        let mut docs = self.lock()?;
        let id = match doc.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                doc.insert("_id", id.clone());
                id
            }
        };
        if docs.iter().any(|existing| existing.get("_id") == Some(&id)) {
            return Err(StoreError::DuplicateKey(id.to_string()));
        }
        docs.push(doc);
        Ok(id)
    }

    fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        validate_update(&update)?;
        let mut docs = self.lock()?;
        if let Some(doc) = docs.iter_mut().find(|doc| matches_filter(doc, &filter)) {
            let before = doc.clone();
            apply_update(doc, &update, false);
            return Ok(UpdateOutcome {
                matched: 1,
                modified: u64::from(before != *doc),
                upserted_id: None,
            });
        }
        if !upsert {
            return Ok(UpdateOutcome::default());
        }

        let mut doc = Document::new();
        for (key, value) in filter.iter() {
            if !key.starts_with('$') {
                doc.insert(key.clone(), value.clone());
            }
        }
        apply_update(&mut doc, &update, true);
        let id = match doc.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                doc.insert("_id", id.clone());
                id
            }
        };
        docs.push(doc);
        Ok(UpdateOutcome {
            matched: 0,
            modified: 0,
            upserted_id: Some(id),
        })
    }

    fn delete_one(&self, filter: Document) -> Result<u64, StoreError> {
        let mut docs = self.lock()?;
        match docs.iter().position(|doc| matches_filter(doc, &filter)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| doc.get(key) == Some(expected))
}

fn validate_update(update: &Document) -> Result<(), StoreError> {
    for (operator, value) in update.iter() {
        match operator.as_str() {
            "$set" | "$setOnInsert" | "$unset" => {
                if !matches!(value, Bson::Document(_)) {
                    return Err(StoreError::UnsupportedUpdate(format!(
                        "{} expects a document",
                        operator
                    )));
                }
            }
            other => return Err(StoreError::UnsupportedUpdate(other.to_string())),
        }
    }
    Ok(())
}

fn apply_update(doc: &mut Document, update: &Document, inserting: bool) {
    for (operator, value) in update.iter() {
        let Bson::Document(fields) = value else {
            continue;
        };
        match operator.as_str() {
            "$set" => {
                for (key, value) in fields.iter() {
                    doc.insert(key.clone(), value.clone());
                }
            }
            "$setOnInsert" if inserting => {
                for (key, value) in fields.iter() {
                    doc.insert(key.clone(), value.clone());
                }
            }
            "$unset" => {
                for key in fields.keys() {
                    doc.remove(key);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn insert_assigns_object_id_and_rejects_duplicates() {
        let collection = MemoryCollection::new();
        let id = collection
            .insert_one(doc! { "task": "write report" })
            .expect("insert");
        assert!(matches!(id, Bson::ObjectId(_)));

        let err = collection
            .insert_one(doc! { "_id": id.clone(), "task": "dup" })
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn update_with_upsert_creates_document_from_filter() {
        let collection = MemoryCollection::new();
        let outcome = collection
            .update_one(
                doc! { "user_id": "u1", "task_id": "t1" },
                doc! { "$set": { "calendar_url": "https://example" } },
                true,
            )
            .expect("upsert");
        assert!(outcome.upserted_id.is_some());

        let stored = collection
            .find_one(doc! { "user_id": "u1", "task_id": "t1" })
            .expect("find")
            .expect("stored");
        assert_eq!(stored.get_str("calendar_url").unwrap(), "https://example");

        let outcome = collection
            .update_one(
                doc! { "user_id": "u1", "task_id": "t1" },
                doc! { "$set": { "calendar_url": "https://other" } },
                true,
            )
            .expect("update");
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.modified, 1);
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn update_without_upsert_leaves_collection_untouched() {
        let collection = MemoryCollection::new();
        let outcome = collection
            .update_one(doc! { "_id": "missing" }, doc! { "$set": { "a": 1 } }, false)
            .expect("update");
        assert_eq!(outcome, UpdateOutcome::default());
        assert!(collection.is_empty());
    }

    #[test]
    fn unsupported_operators_are_rejected() {
        let collection = MemoryCollection::new();
        let err = collection
            .update_one(doc! {}, doc! { "$inc": { "a": 1 } }, false)
            .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedUpdate(_)));
    }

    #[test]
    fn delete_removes_first_match() {
        let collection = MemoryCollection::new();
        collection.insert_one(doc! { "user_id": "u1" }).unwrap();
        collection.insert_one(doc! { "user_id": "u1" }).unwrap();
        assert_eq!(collection.delete_one(doc! { "user_id": "u1" }).unwrap(), 1);
        assert_eq!(collection.find(doc! { "user_id": "u1" }).unwrap().len(), 1);
        assert_eq!(collection.delete_one(doc! { "user_id": "u2" }).unwrap(), 0);
    }
}
