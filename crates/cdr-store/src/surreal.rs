//! SurrealDB CDR store.

use crate::error::StoreError;
use crate::store::CdrStore;
use async_trait::async_trait;
use cdr_core::{Cdr, CdrId, LookupField, ServiceType};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::sql::{Id, Thing};

/// Table holding one counter record per CDR table.
const SEQUENCE_TABLE: &str = "cdr_sequence";

const SELECT_FIELDS: &str =
    "SELECT record::id(id) AS id, anum, bnum, service_type, usage, start_date_time";

/// Stores CDRs as records `<table>:<n>` with numeric ids.
///
/// Ids come from a counter record in `cdr_sequence`, so they keep growing
/// across sessions and a replayed record never reuses an old id.
pub struct SurrealStore {
    client: surrealdb::Surreal<Any>,
    table: String,
}

#[derive(Debug, Serialize)]
struct CdrRow {
    anum: String,
    bnum: Option<String>,
    service_type: ServiceType,
    usage: f64,
    start_date_time: String,
}

impl From<&Cdr> for CdrRow {
    fn from(record: &Cdr) -> Self {
        Self {
            anum: record.anum.clone(),
            bnum: record.bnum.clone(),
            service_type: record.service_type,
            usage: record.usage,
            start_date_time: record.start_date_time.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StoredRow {
    id: CdrId,
    anum: String,
    #[serde(default)]
    bnum: Option<String>,
    service_type: ServiceType,
    usage: f64,
    start_date_time: String,
}

impl From<StoredRow> for Cdr {
    fn from(row: StoredRow) -> Self {
        Cdr::new(
            row.anum,
            row.bnum,
            row.service_type,
            row.usage,
            row.start_date_time,
        )
        .with_id(row.id)
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

impl SurrealStore {
    pub fn new(client: surrealdb::Surreal<Any>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn to_thing(&self, id: CdrId) -> Thing {
        Thing::from((self.table.as_str(), Id::Number(id)))
    }

    /// Reserve `count` consecutive ids and return the first one.
    async fn reserve_ids(&self, count: usize) -> Result<CdrId, StoreError> {
        let count = CdrId::try_from(count)
            .map_err(|_| StoreError::Backend(format!("cannot reserve {count} ids")))?;
        let mut response = self
            .client
            .query("UPSERT type::thing($sequence, $table) SET value = (value ?? 0) + $count RETURN VALUE value")
            .bind(("sequence", SEQUENCE_TABLE))
            .bind(("table", self.table.clone()))
            .bind(("count", count))
            .await?;
        let last: Vec<CdrId> = response.take(0)?;
        let last = last
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Sequence(self.table.clone()))?;
        Ok(last - count + 1)
    }

    async fn select(&self, filter: Option<(String, String)>) -> Result<Vec<Cdr>, StoreError> {
        let mut query = format!("{SELECT_FIELDS} FROM type::table($table)");
        if let Some((clause, _)) = &filter {
            query.push_str(" WHERE ");
            query.push_str(clause);
        }
        let mut request = self.client.query(query).bind(("table", self.table.clone()));
        if let Some((_, value)) = filter {
            request = request.bind(("value", value));
        }
        let mut response = request.await?;
        let rows: Vec<StoredRow> = response.take(0)?;
        let mut records: Vec<Cdr> = rows.into_iter().map(Cdr::from).collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }
}

#[async_trait]
impl CdrStore for SurrealStore {
    async fn save(&self, record: Cdr) -> Result<Cdr, StoreError> {
        record.validate()?;
        let (verb, id) = match record.id {
            Some(id) => ("UPSERT", id),
            None => ("CREATE", self.reserve_ids(1).await?),
        };
        self.client
            .query(format!("{verb} $record_id CONTENT $content"))
            .bind(("record_id", self.to_thing(id)))
            .bind(("content", CdrRow::from(&record)))
            .await?
            .check()?;
        Ok(record.with_id(id))
    }

    async fn save_all(&self, records: &[Cdr]) -> Result<Vec<Cdr>, StoreError> {
        for record in records {
            record.validate()?;
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let fresh = records.iter().filter(|r| r.id.is_none()).count();

        // Ids burnt by a failed transaction are not handed out again.
        let mut next_id = if fresh > 0 {
            self.reserve_ids(fresh).await?
        } else {
            0
        };

        let mut statements = String::from("BEGIN TRANSACTION;\n");
        let mut stored = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let (verb, id) = match record.id {
                Some(id) => ("UPSERT", id),
                None => {
                    let id = next_id;
                    next_id += 1;
                    ("CREATE", id)
                }
            };
            statements.push_str(&format!("{verb} $record_{i} CONTENT $content_{i};\n"));
            stored.push(record.clone().with_id(id));
        }
        statements.push_str("COMMIT TRANSACTION;");

        let mut query = self.client.query(statements);
        for (i, record) in stored.iter().enumerate() {
            let id = record.id.unwrap_or_default();
            query = query
                .bind((format!("record_{i}"), self.to_thing(id)))
                .bind((format!("content_{i}"), CdrRow::from(record)));
        }
        query.await?.check()?;

        tracing::debug!(
            "Committed {} CDRs to SurrealDB table '{}'",
            stored.len(),
            self.table
        );
        Ok(stored)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        // Committed transactions are already durable.
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Cdr>, StoreError> {
        self.select(None).await
    }

    async fn find_by_field(
        &self,
        field: LookupField,
        value: &str,
    ) -> Result<Vec<Cdr>, StoreError> {
        let clause = match field {
            LookupField::ServiceType => {
                "string::lowercase(service_type) = string::lowercase($value)".to_string()
            }
            other => format!("{} = $value", other.column()),
        };
        self.select(Some((clause, value.to_string()))).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let mut response = self
            .client
            .query("SELECT count() FROM type::table($table) GROUP ALL")
            .bind(("table", self.table.clone()))
            .await?;
        let rows: Vec<CountRow> = response.take(0)?;
        Ok(rows.first().map_or(0, |row| row.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn mem_store() -> SurrealStore {
        let client = surrealdb::engine::any::connect("mem://").await.unwrap();
        client.use_ns("test").use_db("test").await.unwrap();
        SurrealStore::new(client, "cdrs")
    }

    fn record(anum: &str, bnum: Option<&str>, service_type: ServiceType) -> Cdr {
        Cdr::new(
            anum,
            bnum.map(str::to_string),
            service_type,
            42.0,
            "2024-03-01T12:00:00",
        )
    }

    #[tokio::test]
    async fn test_save_assigns_increasing_ids() {
        let store = mem_store().await;
        let first = store
            .save(record("+201001", Some("+201002"), ServiceType::Call))
            .await
            .unwrap();
        let second = store
            .save(record("+201001", Some("+201002"), ServiceType::Call))
            .await
            .unwrap();

        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_save_all_and_read_back() {
        let store = mem_store().await;
        let batch = vec![
            record("+201001", None, ServiceType::Data),
            record("+201003", Some("+201004"), ServiceType::Sms),
        ];
        let stored = store.save_all(&batch).await.unwrap();
        assert_eq!(stored.len(), 2);

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].bnum, None);
        assert_eq!(all[1].bnum.as_deref(), Some("+201004"));
        assert_eq!(all[0].id, stored[0].id);
    }

    #[tokio::test]
    async fn test_find_by_field() {
        let store = mem_store().await;
        store
            .save_all(&[
                record("+201001", None, ServiceType::Data),
                record("+201002", Some("+201001"), ServiceType::Sms),
            ])
            .await
            .unwrap();

        let sms = store
            .find_by_field(LookupField::ServiceType, "SMS")
            .await
            .unwrap();
        assert_eq!(sms.len(), 1);

        let called = store
            .find_by_field(LookupField::Bnum, "+201001")
            .await
            .unwrap();
        assert_eq!(called.len(), 1);
        assert_eq!(called[0].anum, "+201002");
    }

    #[tokio::test]
    async fn test_invalid_record_not_written() {
        let store = mem_store().await;
        let err = store
            .save_all(&[
                record("+201001", None, ServiceType::Data),
                record("", None, ServiceType::Data),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
        assert!(store.find_all().await.unwrap().is_empty());
    }
}
