//! Store and entry operations on the SQLite database.
//!
//! Implements [`CacheStorage`] for [`CacheDb`] plus a few inspection
//! helpers used by hosts.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::hash::compute_request_key;
use super::storage::CacheStorage;
use crate::Error;
use crate::exchange::{Request, Response};

/// A stored response snapshot with its request identity.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    pub cache_name: String,
    pub request_key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    /// Header pairs in their original order, values as raw bytes.
    #[serde(skip)]
    pub headers: Vec<(String, Vec<u8>)>,
    #[serde(skip)]
    pub body: Vec<u8>,
    pub body_len: usize,
    pub stored_at: String,
}

impl CacheEntry {
    /// Rebuild the response this entry was written from.
    pub fn to_response(&self) -> Result<Response, Error> {
        let status = StatusCode::from_u16(self.status).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            let value = HeaderValue::from_bytes(value).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            headers.append(name, value);
        }
        Ok(Response { status, headers, body: Bytes::from(self.body.clone()) })
    }
}

/// Header values may carry obs-text bytes, so they are stored base64-encoded.
fn encode_headers(headers: &HeaderMap) -> Result<String, Error> {
    let pairs: Vec<(&str, String)> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), STANDARD.encode(value.as_bytes())))
        .collect();
    Ok(serde_json::to_string(&pairs)?)
}

fn decode_headers(json: &str) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let pairs: Vec<(String, String)> = serde_json::from_str(json)?;
    pairs
        .into_iter()
        .map(|(name, value)| {
            let value = STANDARD.decode(value).map_err(|e| Error::CorruptEntry(format!("header {name}: {e}")))?;
            Ok((name, value))
        })
        .collect()
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(CacheEntry, String)> {
    let body: Vec<u8> = row.get(6)?;
    Ok((
        CacheEntry {
            cache_name: row.get(0)?,
            request_key: row.get(1)?,
            method: row.get(2)?,
            url: row.get(3)?,
            status: row.get(4)?,
            headers: Vec::new(),
            body_len: body.len(),
            body,
            stored_at: row.get(7)?,
        },
        row.get(5)?,
    ))
}

const SELECT_ENTRY: &str = "SELECT cache_name, request_key, method, url, status, headers_json, body, stored_at
     FROM entries WHERE cache_name = ?1 AND request_key = ?2";

impl CacheDb {
    /// Fetch a raw entry by store name and request identity.
    pub async fn get_entry(&self, name: &str, method: &str, url: &str) -> Result<Option<CacheEntry>, Error> {
        let name = name.to_string();
        let key = compute_request_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let result = conn.query_row(SELECT_ENTRY, params![name, key], row_to_entry);
                match result {
                    Ok((mut entry, headers_json)) => {
                        entry.headers = decode_headers(&headers_json)?;
                        Ok(Some(entry))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held by a store.
    pub async fn count_entries(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE cache_name = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a store, sorted.
    pub async fn list_urls(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE cache_name = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let name = name.to_string();
        let method = request.method.as_str().to_string();
        let url = request.key_url();
        let key = compute_request_key(&method, &url);
        let status = response.status.as_u16();
        let headers_json = encode_headers(&response.headers)?;
        let body = response.body.to_vec();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![&name, &now],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                    cache_name, request_key, method, url, status, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(cache_name, request_key) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![&name, &key, &method, &url, status, &headers_json, &body, &now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, Error> {
        let entry = self.get_entry(name, request.method.as_str(), &request.key_url()).await?;
        entry.map(|e| e.to_response()).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header;
    use url::Url;

    fn request(path: &str) -> Request {
        Request::get(Url::parse("https://app.test").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn test_put_and_match_round_trip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = Response::ok("<h1>hi</h1>")
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html"))
            .with_header(header::SET_COOKIE, HeaderValue::from_static("a=1"))
            .with_header(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        db.put("shell-v1", &request("/index.html"), &response).await.unwrap();

        let cached = db.match_request("shell-v1", &request("/index.html")).await.unwrap().unwrap();
        assert_eq!(cached, response);
        assert_eq!(cached.headers.get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[tokio::test]
    async fn test_non_ascii_header_bytes_survive() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let disposition = HeaderValue::from_bytes(b"attachment; filename=\"r\xe9sum\xe9.pdf\"").unwrap();
        let response = Response::ok(vec![0x25, 0x50, 0x44, 0x46])
            .with_header(header::CONTENT_DISPOSITION, disposition.clone());

        db.put("shell-v1", &request("/assets/report-1a2b3c4d.pdf"), &response).await.unwrap();

        let cached = db.match_request("shell-v1", &request("/assets/report-1a2b3c4d.pdf")).await.unwrap().unwrap();
        assert_eq!(cached.headers.get(header::CONTENT_DISPOSITION).unwrap().as_bytes(), disposition.as_bytes());
        assert_eq!(cached, response);

        let entry = db.get_entry("shell-v1", "GET", "https://app.test/assets/report-1a2b3c4d.pdf").await.unwrap().unwrap();
        assert_eq!(entry.headers, vec![("content-disposition".to_string(), disposition.as_bytes().to_vec())]);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open("shell-v1").await.unwrap();
        assert!(db.match_request("shell-v1", &request("/nope")).await.unwrap().is_none());
        assert!(db.match_request("shell-v0", &request("/nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("s", &request("/a.css"), &Response::ok("old")).await.unwrap();
        db.put("s", &request("/a.css"), &Response::ok("new")).await.unwrap();

        let cached = db.match_request("s", &request("/a.css")).await.unwrap().unwrap();
        assert_eq!(cached.body, Bytes::from_static(b"new"));
        assert_eq!(db.count_entries("s").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fragment_ignored_for_identity() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("s", &request("/page#one"), &Response::ok("x")).await.unwrap();
        assert!(db.match_request("s", &request("/page#two")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_keys_open_and_delete_cascade() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open("shell-v1").await.unwrap();
        db.put("shell-v2", &request("/a.css"), &Response::ok("x")).await.unwrap();
        db.open("shell-v1").await.unwrap();

        assert_eq!(db.keys().await.unwrap(), vec!["shell-v1", "shell-v2"]);
        assert!(db.has("shell-v2").await.unwrap());

        assert!(db.delete("shell-v2").await.unwrap());
        assert!(!db.delete("shell-v2").await.unwrap());
        assert!(!db.has("shell-v2").await.unwrap());
        assert_eq!(db.count_entries("shell-v2").await.unwrap(), 0);
        assert_eq!(db.keys().await.unwrap(), vec!["shell-v1"]);
    }

    #[tokio::test]
    async fn test_list_urls() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("s", &request("/b.svg"), &Response::ok("b")).await.unwrap();
        db.put("s", &request("/a.json"), &Response::ok("a")).await.unwrap();
        assert_eq!(db.list_urls("s").await.unwrap(), vec!["https://app.test/a.json", "https://app.test/b.svg"]);
    }
}
