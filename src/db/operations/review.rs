use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::operations::{format_date, format_timestamp, parse_date, parse_timestamp};
use crate::db::{StoreError, StoreResult};
use crate::types::{ReviewCard, MIN_EASE_FACTOR};

const CARD_COLUMNS: &str = r#""id","learner_id","source_ref","question","answer","repetitions",
    "ease_factor","interval_days","next_review_date","version","created_at","updated_at""#;

pub async fn get_review_card(pool: &SqlitePool, card_id: &str) -> StoreResult<Option<ReviewCard>> {
    let sql = format!(r#"SELECT {CARD_COLUMNS} FROM "review_cards" WHERE "id" = ? LIMIT 1"#);
    let row = sqlx::query(&sql).bind(card_id).fetch_optional(pool).await?;
    row.as_ref().map(map_card_row).transpose()
}

pub async fn list_review_cards(pool: &SqlitePool, learner_id: &str) -> StoreResult<Vec<ReviewCard>> {
    let sql = format!(
        r#"SELECT {CARD_COLUMNS} FROM "review_cards"
           WHERE "learner_id" = ?
           ORDER BY "created_at" ASC, "id" ASC"#
    );
    let rows = sqlx::query(&sql).bind(learner_id).fetch_all(pool).await?;
    rows.iter().map(map_card_row).collect()
}

pub async fn list_due_review_cards(
    pool: &SqlitePool,
    learner_id: &str,
    on: NaiveDate,
    limit: i64,
) -> StoreResult<Vec<ReviewCard>> {
    let sql = format!(
        r#"SELECT {CARD_COLUMNS} FROM "review_cards"
           WHERE "learner_id" = ? AND "next_review_date" <= ?
           ORDER BY "next_review_date" ASC, "created_at" ASC
           LIMIT ?"#
    );
    let rows = sqlx::query(&sql)
        .bind(learner_id)
        .bind(format_date(on))
        .bind(limit)
        .fetch_all(pool)
        .await?;
    rows.iter().map(map_card_row).collect()
}

pub async fn insert_review_card(pool: &SqlitePool, card: &ReviewCard) -> StoreResult<()> {
    let sql = format!(
        r#"INSERT INTO "review_cards" ({CARD_COLUMNS})
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
    );
    sqlx::query(&sql)
        .bind(&card.id)
        .bind(&card.learner_id)
        .bind(&card.source_ref)
        .bind(&card.question)
        .bind(&card.answer)
        .bind(i64::from(card.repetitions))
        .bind(card.ease_factor)
        .bind(i64::from(card.interval_days))
        .bind(format_date(card.next_review_date))
        .bind(card.version)
        .bind(format_timestamp(&card.created_at))
        .bind(format_timestamp(&card.updated_at))
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_review_card(
    pool: &SqlitePool,
    card: &ReviewCard,
    expected_version: i64,
) -> StoreResult<()> {
    let result = sqlx::query(
        r#"UPDATE "review_cards"
           SET "repetitions" = ?, "ease_factor" = ?, "interval_days" = ?,
               "next_review_date" = ?, "version" = ?, "updated_at" = ?
           WHERE "id" = ? AND "version" = ?"#,
    )
    .bind(i64::from(card.repetitions))
    .bind(card.ease_factor)
    .bind(i64::from(card.interval_days))
    .bind(format_date(card.next_review_date))
    .bind(card.version)
    .bind(format_timestamp(&card.updated_at))
    .bind(&card.id)
    .bind(expected_version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::conflict("review_card", &card.id));
    }
    Ok(())
}

fn map_card_row(row: &SqliteRow) -> StoreResult<ReviewCard> {
    let repetitions: i64 = row.try_get("repetitions")?;
    let interval_days: i64 = row.try_get("interval_days")?;
    let ease_factor: f64 = row.try_get("ease_factor")?;
    if ease_factor < MIN_EASE_FACTOR {
        return Err(StoreError::Corrupt(format!("ease_factor={ease_factor}")));
    }
    let next_review_date: String = row.try_get("next_review_date")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ReviewCard {
        id: row.try_get("id")?,
        learner_id: row.try_get("learner_id")?,
        source_ref: row.try_get("source_ref")?,
        question: row.try_get("question")?,
        answer: row.try_get("answer")?,
        repetitions: u32::try_from(repetitions)
            .map_err(|_| StoreError::Corrupt(format!("repetitions={repetitions}")))?,
        ease_factor,
        interval_days: u32::try_from(interval_days)
            .map_err(|_| StoreError::Corrupt(format!("interval_days={interval_days}")))?,
        next_review_date: parse_date("next_review_date", &next_review_date)?,
        version: row.try_get("version")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}
