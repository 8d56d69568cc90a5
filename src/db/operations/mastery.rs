use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::operations::{format_timestamp, is_unique_violation, parse_timestamp};
use crate::db::{StoreError, StoreResult};
use crate::types::{clamp_score, ConceptMastery, MasteryStatus};

pub async fn get_concept_mastery(
    pool: &SqlitePool,
    learner_id: &str,
    concept_id: &str,
) -> StoreResult<Option<ConceptMastery>> {
    let row = sqlx::query(
        r#"SELECT "learner_id","concept_id","mastery_score","status","version","created_at","last_updated"
           FROM "concept_mastery"
           WHERE "learner_id" = ? AND "concept_id" = ?
           LIMIT 1"#,
    )
    .bind(learner_id)
    .bind(concept_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(map_mastery_row).transpose()
}

pub async fn list_concept_mastery(
    pool: &SqlitePool,
    learner_id: &str,
) -> StoreResult<Vec<ConceptMastery>> {
    let rows = sqlx::query(
        r#"SELECT "learner_id","concept_id","mastery_score","status","version","created_at","last_updated"
           FROM "concept_mastery"
           WHERE "learner_id" = ?
           ORDER BY "concept_id" ASC"#,
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_mastery_row).collect()
}

pub async fn insert_concept_mastery(pool: &SqlitePool, record: &ConceptMastery) -> StoreResult<()> {
    let result = sqlx::query(
        r#"INSERT INTO "concept_mastery"
           ("learner_id","concept_id","mastery_score","status","version","created_at","last_updated")
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&record.learner_id)
    .bind(&record.concept_id)
    .bind(i64::from(record.mastery_score))
    .bind(record.status.as_str())
    .bind(record.version)
    .bind(format_timestamp(&record.created_at))
    .bind(format_timestamp(&record.last_updated))
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => Err(StoreError::conflict(
            "concept_mastery",
            format!("{}/{}", record.learner_id, record.concept_id),
        )),
        Err(err) => Err(err.into()),
    }
}

pub async fn update_concept_mastery(
    pool: &SqlitePool,
    record: &ConceptMastery,
    expected_version: i64,
) -> StoreResult<()> {
    let result = sqlx::query(
        r#"UPDATE "concept_mastery"
           SET "mastery_score" = ?, "status" = ?, "version" = ?, "last_updated" = ?
           WHERE "learner_id" = ? AND "concept_id" = ? AND "version" = ?"#,
    )
    .bind(i64::from(record.mastery_score))
    .bind(record.status.as_str())
    .bind(record.version)
    .bind(format_timestamp(&record.last_updated))
    .bind(&record.learner_id)
    .bind(&record.concept_id)
    .bind(expected_version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::conflict(
            "concept_mastery",
            format!("{}/{}", record.learner_id, record.concept_id),
        ));
    }
    Ok(())
}

fn map_mastery_row(row: &SqliteRow) -> StoreResult<ConceptMastery> {
    let score: i64 = row.try_get("mastery_score")?;
    if clamp_score(score) as i64 != score {
        return Err(StoreError::Corrupt(format!("mastery_score={score}")));
    }
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let last_updated: String = row.try_get("last_updated")?;

    Ok(ConceptMastery {
        learner_id: row.try_get("learner_id")?,
        concept_id: row.try_get("concept_id")?,
        mastery_score: score as u8,
        status: MasteryStatus::parse(&status).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        version: row.try_get("version")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        last_updated: parse_timestamp("last_updated", &last_updated)?,
    })
}
