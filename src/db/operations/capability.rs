use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::operations::{format_timestamp, parse_timestamp};
use crate::db::{StoreError, StoreResult};
use crate::types::{Assessment, AssessmentType, Axis, AxisScores, CapabilityVector, AXIS_COUNT};

const VECTOR_COLUMNS: &str = r#""id","assessment_id","learner_id","created_at",
    "axis1_geo","axis1_alg","axis1_ana","axis2_opt","axis2_piv","axis2_dia",
    "axis3_con","axis3_pro","axis3_ret","axis4_acc","axis4_gri""#;

pub async fn get_latest_vector(
    pool: &SqlitePool,
    learner_id: &str,
) -> StoreResult<Option<CapabilityVector>> {
    let sql = format!(
        r#"SELECT {VECTOR_COLUMNS} FROM "capability_vectors"
           WHERE "learner_id" = ?
           ORDER BY "created_at" DESC, "seq" DESC
           LIMIT 1"#
    );
    let row = sqlx::query(&sql)
        .bind(learner_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(map_vector_row).transpose()
}

pub async fn get_vector_history(
    pool: &SqlitePool,
    learner_id: &str,
) -> StoreResult<Vec<CapabilityVector>> {
    let sql = format!(
        r#"SELECT {VECTOR_COLUMNS} FROM "capability_vectors"
           WHERE "learner_id" = ?
           ORDER BY "created_at" ASC, "seq" ASC"#
    );
    let rows = sqlx::query(&sql).bind(learner_id).fetch_all(pool).await?;
    rows.iter().map(map_vector_row).collect()
}

pub async fn get_first_vector_since(
    pool: &SqlitePool,
    learner_id: &str,
    since: DateTime<Utc>,
) -> StoreResult<Option<CapabilityVector>> {
    let sql = format!(
        r#"SELECT {VECTOR_COLUMNS} FROM "capability_vectors"
           WHERE "learner_id" = ? AND "created_at" >= ?
           ORDER BY "created_at" ASC, "seq" ASC
           LIMIT 1"#
    );
    let row = sqlx::query(&sql)
        .bind(learner_id)
        .bind(format_timestamp(&since))
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(map_vector_row).transpose()
}

pub async fn get_assessment(
    pool: &SqlitePool,
    assessment_id: &str,
) -> StoreResult<Option<Assessment>> {
    let row = sqlx::query(
        r#"SELECT "id","learner_id","assessment_type","source_ref","notes",
                  "model_version","reason_code","created_at"
           FROM "assessments" WHERE "id" = ? LIMIT 1"#,
    )
    .bind(assessment_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(map_assessment_row).transpose()
}

/// Writes the assessment first so the transaction holds the write lock before
/// the parent check reads the learner's latest vector.
pub async fn insert_assessment_with_vector(
    pool: &SqlitePool,
    assessment: &Assessment,
    vector: &CapabilityVector,
    expected_parent: Option<&str>,
) -> StoreResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"INSERT INTO "assessments"
           ("id","learner_id","assessment_type","source_ref","notes","model_version","reason_code","created_at")
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&assessment.id)
    .bind(&assessment.learner_id)
    .bind(assessment.assessment_type.as_str())
    .bind(&assessment.source_ref)
    .bind(&assessment.notes)
    .bind(&assessment.model_version)
    .bind(&assessment.reason_code)
    .bind(format_timestamp(&assessment.created_at))
    .execute(&mut *tx)
    .await?;

    let current_parent: Option<String> = sqlx::query_scalar(
        r#"SELECT "id" FROM "capability_vectors"
           WHERE "learner_id" = ?
           ORDER BY "created_at" DESC, "seq" DESC
           LIMIT 1"#,
    )
    .bind(&vector.learner_id)
    .fetch_optional(&mut *tx)
    .await?;

    if current_parent.as_deref() != expected_parent {
        tx.rollback().await?;
        return Err(StoreError::conflict("capability_vector", &vector.learner_id));
    }

    let sql = format!(
        r#"INSERT INTO "capability_vectors" ({VECTOR_COLUMNS})
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
    );
    let mut query = sqlx::query(&sql)
        .bind(&vector.id)
        .bind(&vector.assessment_id)
        .bind(&vector.learner_id)
        .bind(format_timestamp(&vector.created_at));
    for (_, value) in vector.scores.iter() {
        query = query.bind(i64::from(value));
    }
    query.execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(())
}

fn map_vector_row(row: &SqliteRow) -> StoreResult<CapabilityVector> {
    let mut values = [0i64; AXIS_COUNT];
    for axis in Axis::ALL {
        values[axis.index()] = row.try_get(axis.key())?;
    }
    let scores = AxisScores::try_new(values).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let created_at: String = row.try_get("created_at")?;

    Ok(CapabilityVector {
        id: row.try_get("id")?,
        assessment_id: row.try_get("assessment_id")?,
        learner_id: row.try_get("learner_id")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        scores,
    })
}

fn map_assessment_row(row: &SqliteRow) -> StoreResult<Assessment> {
    let assessment_type: String = row.try_get("assessment_type")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Assessment {
        id: row.try_get("id")?,
        learner_id: row.try_get("learner_id")?,
        assessment_type: AssessmentType::parse(&assessment_type)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        source_ref: row.try_get("source_ref")?,
        notes: row.try_get("notes")?,
        model_version: row.try_get("model_version")?,
        reason_code: row.try_get("reason_code")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}
