use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS job_postings (
        id              BIGSERIAL PRIMARY KEY,
        title           VARCHAR(255) NOT NULL,
        raw_text        TEXT NOT NULL,
        parsed_keywords TEXT[] NOT NULL DEFAULT '{}',
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS candidate_profiles (
        id               BIGSERIAL PRIMARY KEY,
        email            TEXT NOT NULL,
        first_name       TEXT NOT NULL DEFAULT '',
        last_name        TEXT NOT NULL DEFAULT '',
        applied_to       BIGINT NOT NULL REFERENCES job_postings(id) ON DELETE CASCADE,
        resume_filename  TEXT,
        resume_key       TEXT,
        video_key        TEXT,
        resume_text      TEXT NOT NULL DEFAULT '',
        video_transcript TEXT,
        lexical_score    DOUBLE PRECISION,
        semantic_score   DOUBLE PRECISION,
        external_score   DOUBLE PRECISION,
        local_score      DOUBLE PRECISION,
        keyword_boost    DOUBLE PRECISION,
        matched_keywords TEXT[] NOT NULL DEFAULT '{}',
        final_score      DOUBLE PRECISION,
        missing_skills   TEXT[] NOT NULL DEFAULT '{}',
        feedback         TEXT NOT NULL DEFAULT '',
        verdict          TEXT NOT NULL DEFAULT 'Unknown',
        scoring_mode     TEXT,
        external_status  TEXT,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (email, applied_to)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_candidate_profiles_applied_to \
     ON candidate_profiles (applied_to)",
];

/// Creates the tables if they do not exist yet. Safe to run on every start.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to apply schema")?;
    }
    info!("Database schema is up to date");
    Ok(())
}
