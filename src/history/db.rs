use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};
use uuid::Uuid;

use super::models::{ConversationRecord, StoreError, UserProfile};
use crate::auth::Identity;

fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Timestamp(ts.to_string()))
}

/// Write one prompt/response pair for `identity`. The timestamp is
/// assigned by the database.
pub async fn insert_record(
    db: &Connection,
    identity: &str,
    prompt: &str,
    response: &str,
) -> Result<String, StoreError> {
    let id = Uuid::new_v4().to_string();
    let record_id = id.clone();
    let user_id = identity.to_owned();
    let prompt = prompt.to_owned();
    let response = response.to_owned();

    db.call(move |conn| {
        let mut stmt = conn.prepare(
            "INSERT INTO prompt (id, user_id, prompt, response) VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![record_id, user_id, prompt, response])?;
        Ok(())
    })
    .await?;

    Ok(id)
}

/// Most recent records for `identity`, newest first. Rows written in
/// the same millisecond come back in reverse insertion order.
pub async fn find_recent_records(
    db: &Connection,
    identity: &str,
    limit: usize,
) -> Result<Vec<ConversationRecord>, StoreError> {
    let user_id = identity.to_owned();
    let rows = db
        .call(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, user_id, prompt, response, created_at
                FROM prompt
                WHERE user_id = ?1
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?2
                "#,
            )?;
            let rows = stmt
                .query_map(params![user_id, limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?;

    rows.into_iter()
        .map(|(id, identity, prompt, response, created_at)| -> Result<_, StoreError> {
            Ok(ConversationRecord {
                id,
                identity,
                prompt,
                response,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .collect()
}

pub async fn count_records(db: &Connection, identity: &str) -> Result<i64, StoreError> {
    let user_id = identity.to_owned();
    let count = db
        .call(move |conn| {
            let mut stmt = conn.prepare("SELECT COUNT(*) FROM prompt WHERE user_id = ?1")?;
            let count: i64 = stmt.query_row([user_id], |row| row.get(0))?;
            Ok(count)
        })
        .await?;
    Ok(count)
}

/// Create the profile on first sign in, otherwise bump
/// `last_login`. Returns `true` when the profile was created.
pub async fn upsert_user(db: &Connection, identity: &Identity) -> Result<bool, StoreError> {
    let Identity {
        id,
        display_name,
        email,
    } = identity.clone();

    let created = db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO user (id, display_name, email) VALUES (?1, ?2, ?3)",
                params![id, display_name, email],
            )?;
            if inserted == 0 {
                tx.execute(
                    "UPDATE user SET last_login = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
                    [&id],
                )?;
            }
            tx.commit()?;
            Ok(inserted > 0)
        })
        .await?;

    Ok(created)
}

pub async fn find_user(db: &Connection, id: &str) -> Result<Option<UserProfile>, StoreError> {
    let user_id = id.to_owned();
    let user = db
        .call(move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, display_name, email, created_at, last_login FROM user WHERE id = ?1",
                    [user_id],
                    |row| {
                        Ok(UserProfile {
                            id: row.get(0)?,
                            display_name: row.get(1)?,
                            email: row.get(2)?,
                            created_at: row.get(3)?,
                            last_login: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await?;
    Ok(user)
}
