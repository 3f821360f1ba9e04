use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::models::CachedResponse;

#[derive(sqlx::FromRow)]
struct CachedRow {
    status: i64,
    headers: serde_json::Value,
    body: Vec<u8>,
}

impl From<CachedRow> for CachedResponse {
    fn from(row: CachedRow) -> Self {
        let headers = row
            .headers
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        CachedResponse {
            status: u16::try_from(row.status).unwrap_or(200),
            headers,
            body: row.body.into(),
        }
    }
}

pub async fn find(
    pool: &SqlitePool,
    cache_name: &str,
    method: &str,
    url: &str,
) -> Result<Option<CachedResponse>, StoreError> {
    let row = sqlx::query_as::<_, CachedRow>(
        "SELECT status, headers, body FROM cached_responses
         WHERE cache_name = ?1 AND method = ?2 AND url = ?3",
    )
    .bind(cache_name)
    .bind(method)
    .bind(url)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(CachedResponse::from))
}

pub async fn put(
    pool: &SqlitePool,
    cache_name: &str,
    method: &str,
    url: &str,
    response: &CachedResponse,
) -> Result<(), StoreError> {
    let headers: serde_json::Map<String, serde_json::Value> = response
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), serde_json::Value::String(v.clone())))
        .collect();
    let headers = serde_json::Value::Object(headers);

    sqlx::query(
        "INSERT INTO cached_responses (cache_name, method, url, status, headers, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (cache_name, method, url) DO UPDATE SET
             status = excluded.status,
             headers = excluded.headers,
             body = excluded.body",
    )
    .bind(cache_name)
    .bind(method)
    .bind(url)
    .bind(i64::from(response.status))
    .bind(&headers)
    .bind(response.body.as_ref())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(
    pool: &SqlitePool,
    cache_name: &str,
    method: &str,
    url: &str,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "DELETE FROM cached_responses WHERE cache_name = ?1 AND method = ?2 AND url = ?3",
    )
    .bind(cache_name)
    .bind(method)
    .bind(url)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Drop every entry whose namespace is not one of `keep`. Returns the number of rows removed.
pub async fn purge_except(pool: &SqlitePool, keep: &[&str]) -> Result<u64, StoreError> {
    let names: Vec<String> = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT cache_name FROM cached_responses",
    )
    .fetch_all(pool)
    .await?;

    let mut removed = 0;
    for name in names.iter().filter(|n| !keep.contains(&n.as_str())) {
        tracing::info!("Deleting old cache: {name}");
        let result = sqlx::query("DELETE FROM cached_responses WHERE cache_name = ?1")
            .bind(name)
            .execute(pool)
            .await?;
        removed += result.rows_affected();
    }
    Ok(removed)
}
