//! Search history store. Records are write-once: saved on successful
//! completion of a run, listed newest-first, loaded or deleted by id,
//! never updated. Callers treat every failure here as non-fatal.

use anyhow::Result;
use chrono::NaiveDateTime;
use sqlx::{postgres::PgPool, Row};

use crate::models::{format_created_at, Lead, SearchQuery, SearchRecord, SearchSummary};

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_history (
            id SERIAL PRIMARY KEY,
            keyword VARCHAR(255) NOT NULL,
            city VARCHAR(255) NOT NULL,
            country VARCHAR(255) NOT NULL,
            leads_count INTEGER NOT NULL DEFAULT 0,
            leads_data TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Persists a completed search and returns the new record id.
pub async fn save_search(pool: &PgPool, query: &SearchQuery, leads: &[Lead]) -> Result<i32> {
    let leads_json = serde_json::to_string(leads)?;
    let row = sqlx::query(
        "INSERT INTO search_history (keyword, city, country, leads_count, leads_data) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(&query.keyword)
    .bind(&query.city)
    .bind(&query.country)
    .bind(leads.len() as i32)
    .bind(&leads_json)
    .fetch_one(pool)
    .await?;
    Ok(row.get::<i32, _>("id"))
}

/// Recent searches, newest first, without the lead payload.
pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<SearchSummary>> {
    let rows = sqlx::query(
        "SELECT id, keyword, city, country, leads_count, created_at \
         FROM search_history ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| SearchSummary {
            id: row.get("id"),
            keyword: row.get("keyword"),
            city: row.get("city"),
            country: row.get("country"),
            leads_count: row.get("leads_count"),
            created_at: row
                .get::<Option<NaiveDateTime>, _>("created_at")
                .map(format_created_at)
                .unwrap_or_default(),
        })
        .collect())
}

/// Loads a stored search with its leads, or None when the id is unknown.
/// A corrupt lead blob reads as an empty list rather than an error.
pub async fn load_search(pool: &PgPool, id: i32) -> Result<Option<SearchRecord>> {
    let row = sqlx::query(
        "SELECT id, keyword, city, country, leads_count, leads_data, created_at \
         FROM search_history WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let leads = row
            .get::<Option<String>, _>("leads_data")
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default();
        SearchRecord {
            id: row.get("id"),
            keyword: row.get("keyword"),
            city: row.get("city"),
            country: row.get("country"),
            leads_count: row.get("leads_count"),
            leads,
            created_at: row
                .get::<Option<NaiveDateTime>, _>("created_at")
                .map(format_created_at)
                .unwrap_or_default(),
        }
    }))
}

/// Deletes a stored search; true when a row was actually removed.
pub async fn delete_search(pool: &PgPool, id: i32) -> Result<bool> {
    let result = sqlx::query("DELETE FROM search_history WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
