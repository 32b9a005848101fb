//! SQLite implementation of [`CachePartitionStore`].
//!
//! Partitions are rows in `partitions`; entries cascade-delete with their
//! partition, so reclaiming a stale generation is a single DELETE.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::store::{CachePartitionStore, MatchOptions, PartitionInfo};
use crate::Error;
use crate::http::{ProxyResponse, RequestKey};

/// A row ready to be written, with everything serialized up front so the
/// closure passed to the connection thread owns its data.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    url_no_search: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(key: &RequestKey, response: &ProxyResponse) -> Result<Self, Error> {
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize headers: {e}")))?;
        Ok(Self {
            key_hash: key.hash(),
            method: key.method.as_str().to_string(),
            url: key.url.to_string(),
            url_no_search: key.url_without_search(),
            status: response.status,
            headers_json,
            body: response.body.clone(),
        })
    }
}

fn ensure_partition(conn: &rusqlite::Connection, partition: &str, now: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO partitions (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        params![partition, now],
    )?;
    Ok(())
}

fn partition_exists(conn: &rusqlite::Connection, partition: &str) -> Result<bool, Error> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
        params![partition],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

fn upsert_entry(conn: &rusqlite::Connection, partition: &str, row: &EntryRow, now: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO entries (
            partition, key_hash, method, url, url_no_search, status, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(partition, key_hash) DO UPDATE SET
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            partition,
            &row.key_hash,
            &row.method,
            &row.url,
            &row.url_no_search,
            row.status,
            &row.headers_json,
            &row.body,
            now,
        ],
    )?;
    Ok(())
}

fn decode_response(status: u16, headers_json: &str, body: Vec<u8>) -> Result<ProxyResponse, Error> {
    let headers: BTreeMap<String, String> =
        serde_json::from_str(headers_json).map_err(|e| Error::CorruptEntry(format!("headers_json: {e}")))?;
    Ok(ProxyResponse { status, headers, body })
}

#[async_trait]
impl CachePartitionStore for CacheDb {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        let partition = partition.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> { ensure_partition(conn, &partition, &now) })
            .await
            .map_err(Error::from)
    }

    async fn partitions(&self) -> Result<Vec<PartitionInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PartitionInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT p.name, COUNT(e.key_hash)
                    FROM partitions p LEFT JOIN entries e ON e.partition = p.name
                    GROUP BY p.name ORDER BY p.created_at ASC, p.name ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(PartitionInfo { name: row.get(0)?, entries: row.get::<_, i64>(1)? as u64 })
                })?;
                let collected = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(collected)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(
        &self, partition: &str, key: &RequestKey, options: MatchOptions,
    ) -> Result<Option<ProxyResponse>, Error> {
        let partition = partition.to_string();
        let method = key.method.as_str().to_string();
        let (sql, lookup) = if options.ignore_search {
            (
                "SELECT status, headers_json, body FROM entries
                WHERE partition = ?1 AND method = ?2 AND url_no_search = ?3
                ORDER BY rowid ASC LIMIT 1",
                key.url_without_search(),
            )
        } else {
            (
                "SELECT status, headers_json, body FROM entries
                WHERE partition = ?1 AND method = ?2 AND key_hash = ?3",
                key.hash(),
            )
        };

        self.conn
            .call(move |conn| -> Result<Option<ProxyResponse>, Error> {
                let mut stmt = conn.prepare(sql)?;
                let result = stmt.query_row(params![partition, method, lookup], |row| {
                    Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?))
                });

                match result {
                    Ok((status, headers_json, body)) => decode_response(status, &headers_json, body).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, partition: &str, key: &RequestKey, response: &ProxyResponse) -> Result<(), Error> {
        let partition = partition.to_string();
        let row = EntryRow::new(key, response)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                if !partition_exists(conn, &partition)? {
                    return Err(Error::CacheMiss(format!("partition {partition} does not exist")));
                }
                upsert_entry(conn, &partition, &row, &now)
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, partition: &str, entries: &[(RequestKey, ProxyResponse)]) -> Result<(), Error> {
        let partition = partition.to_string();
        let rows = entries
            .iter()
            .map(|(key, response)| EntryRow::new(key, response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_partition(&tx, &partition, &now)?;
                for row in &rows {
                    upsert_entry(&tx, &partition, row, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE partition = ?1 ORDER BY rowid ASC")?;
                let rows = stmt.query_map(params![partition], |row| row.get::<_, String>(0))?;
                let collected = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(collected)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, partition: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![partition])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
