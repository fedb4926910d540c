use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::models::job::{Job, JobId, JobStatus, SubTaskFailure};
use crate::models::store::{ImageResult, Store};

fn parse_status(raw: &str) -> Result<JobStatus, sqlx::Error> {
    JobStatus::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: Box::new(e),
    })
}

fn job_from_row(row: &sqlx::postgres::PgRow) -> Result<Job, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Job {
        id: row.try_get("id")?,
        status: parse_status(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a new job in the `ongoing` state
pub async fn create_job(pool: &PgPool) -> Result<Job, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO jobs (status)
        VALUES ($1)
        RETURNING id, status, created_at, updated_at
        "#,
    )
    .bind(JobStatus::Ongoing.to_string())
    .fetch_one(pool)
    .await?;

    job_from_row(&row)
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: JobId) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, status, created_at, updated_at
        FROM jobs
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

pub async fn job_exists(pool: &PgPool, job_id: JobId) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM jobs WHERE id = $1) AS present")
        .bind(job_id)
        .fetch_one(pool)
        .await?;

    row.try_get("present")
}

/// Update job status
pub async fn update_job_status(
    pool: &PgPool,
    job_id: JobId,
    status: JobStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE jobs
        SET status = $1,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(status.to_string())
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record why a visit failed
pub async fn insert_job_failure(
    pool: &PgPool,
    job_id: JobId,
    failure: &SubTaskFailure,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO job_failures (job_id, store_id, error_message)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(job_id)
    .bind(&failure.store_id)
    .bind(&failure.error)
    .execute(pool)
    .await?;

    Ok(())
}

/// Failures for a job, in insertion order
pub async fn get_job_failures(
    pool: &PgPool,
    job_id: JobId,
) -> Result<Vec<SubTaskFailure>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT store_id, error_message
        FROM job_failures
        WHERE job_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(SubTaskFailure {
                store_id: r.try_get("store_id")?,
                error: r.try_get("error_message")?,
            })
        })
        .collect()
}

pub async fn insert_image_result(pool: &PgPool, result: &ImageResult) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO images (job_id, url, perimeter, store_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(result.job_id)
    .bind(&result.image_url)
    .bind(result.perimeter)
    .bind(&result.store_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_store(pool: &PgPool, store_id: &str) -> Result<Option<Store>, sqlx::Error> {
    sqlx::query_as::<_, Store>(
        r#"
        SELECT store_id, store_name, area_code
        FROM stores
        WHERE store_id = $1
        "#,
    )
    .bind(store_id)
    .fetch_optional(pool)
    .await
}

pub async fn store_exists(pool: &PgPool, store_id: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM stores WHERE store_id = $1) AS present")
        .bind(store_id)
        .fetch_one(pool)
        .await?;

    row.try_get("present")
}

/// Insert or refresh a store row
pub async fn upsert_store(pool: &PgPool, store: &Store) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stores (store_id, store_name, area_code)
        VALUES ($1, $2, $3)
        ON CONFLICT (store_id) DO UPDATE
        SET store_name = EXCLUDED.store_name,
            area_code = EXCLUDED.area_code
        "#,
    )
    .bind(&store.store_id)
    .bind(&store.store_name)
    .bind(&store.area_code)
    .execute(pool)
    .await?;

    Ok(())
}
