use mongodb::bson::{doc, Bson, Document};
use mongodb::options::UpdateOptions;
use mongodb::sync::{Client, Collection, Database};

use super::{DocumentStore, StoreError, UpdateOutcome};

const SERVER_SELECTION_TIMEOUT_MS: u64 = 5000;

pub struct MongoCollection {
    inner: Collection<Document>,
}

impl MongoCollection {
    pub fn new(db: &Database, name: &str) -> Self {
        Self {
            inner: db.collection::<Document>(name),
        }
    }
}

impl DocumentStore for MongoCollection {
    fn find_one(&self, filter: Document) -> Result<Option<Document>, StoreError> {
        Ok(self.inner.find_one(filter, None)?)
    }

    fn find(&self, filter: Document) -> Result<Vec<Document>, StoreError> {
        let cursor = self.inner.find(filter, None)?;
        let mut docs = Vec::new();
        for doc in cursor {
            docs.push(doc?);
        }
        Ok(docs)
    }

    fn insert_one(&self, doc: Document) -> Result<Bson, StoreError> {
        Ok(self.inner.insert_one(doc, None)?.inserted_id)
    }

    fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let options = UpdateOptions::builder().upsert(upsert).build();
        let result = self.inner.update_one(filter, update, options)?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    fn delete_one(&self, filter: Document) -> Result<u64, StoreError> {
        Ok(self.inner.delete_one(filter, None)?.deleted_count)
    }
}

/// Opens `db_name` and pings the server so an unreachable deployment is
/// reported here rather than on the first write.
pub fn connect_database(uri: &str, db_name: &str) -> Result<Database, StoreError> {
    let client = Client::with_uri_str(with_selection_timeout(uri))?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)?;
    Ok(client.database(db_name))
}

/// Appends `serverSelectionTimeoutMS` unless the URI sets it. A URI without a
/// path gets the `/` the driver requires before the options.
fn with_selection_timeout(uri: &str) -> String {
    if uri.contains("serverSelectionTimeoutMS") {
        return uri.to_string();
    }
    let hosts_start = uri.find("://").map(|index| index + 3).unwrap_or(0);
    let hosts_end = uri[hosts_start..]
        .find(|c: char| c == '/' || c == '?')
        .map(|index| hosts_start + index)
        .unwrap_or(uri.len());
    let (hosts, rest) = uri.split_at(hosts_end);
    let rest = if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    };
    let separator = match rest.find('?') {
        None => "?",
        Some(index) if index + 1 == rest.len() || rest.ends_with('&') => "",
        Some(_) => "&",
    };
    format!(
        "{}{}{}serverSelectionTimeoutMS={}",
        hosts, rest, separator, SERVER_SELECTION_TIMEOUT_MS
    )
}

#[cfg(test)]
mod tests {
    use super::with_selection_timeout;

    #[test]
    fn selection_timeout_is_appended_once() {
        assert_eq!(
            with_selection_timeout("mongodb://localhost:27017/"),
            "mongodb://localhost:27017/?serverSelectionTimeoutMS=5000"
        );
        assert_eq!(
            with_selection_timeout("mongodb://host/?retryWrites=true"),
            "mongodb://host/?retryWrites=true&serverSelectionTimeoutMS=5000"
        );
        assert_eq!(
            with_selection_timeout("mongodb://user:pw@db1:27017,db2:27017/tasks"),
            "mongodb://user:pw@db1:27017,db2:27017/tasks?serverSelectionTimeoutMS=5000"
        );
        assert_eq!(
            with_selection_timeout("mongodb://host/?serverSelectionTimeoutMS=100"),
            "mongodb://host/?serverSelectionTimeoutMS=100"
        );
    }

    #[test]
    fn uri_without_path_gets_delimiting_slash() {
        assert_eq!(
            with_selection_timeout("mongodb://localhost:27017"),
            "mongodb://localhost:27017/?serverSelectionTimeoutMS=5000"
        );
        assert_eq!(
            with_selection_timeout("mongodb://localhost:27017?retryWrites=true"),
            "mongodb://localhost:27017/?retryWrites=true&serverSelectionTimeoutMS=5000"
        );
    }

    #[test]
    fn rewritten_uris_are_accepted_by_the_driver() {
        for uri in [
            "mongodb://localhost:27017",
            "mongodb://localhost:27017/",
            "mongodb://localhost:27017?retryWrites=true",
            "mongodb://localhost:27017/tasks",
        ] {
            let rewritten = with_selection_timeout(uri);
            assert!(
                mongodb::sync::Client::with_uri_str(&rewritten).is_ok(),
                "driver rejected {}",
                rewritten
            );
        }
    }
}
