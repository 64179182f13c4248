//! Candidate submission: archive documents, derive text, score, then merge
//! into or create the (email, job) record.
//!
//! Scoring reads nothing from the candidate record, so it runs before the
//! critical section. The critical section is one transaction that:
//! 1. takes a transaction-scoped advisory lock on `email:job_id`
//! 2. reads the existing row `FOR UPDATE`
//! 3. merges caller fields and writes every derived field in one statement
//!
//! Two concurrent submissions for the same key therefore serialize: one takes
//! the create branch, the other updates that row. Readers never see new
//! resume text next to stale scores.
//!
//! Archived uploads follow the record: objects a save replaced are deleted
//! after commit, and objects from a submission that failed to save are
//! deleted before the error is returned. Deletion is best effort.

use std::sync::Arc;

use bytes::Bytes;
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Postgres, Row};
use tracing::{info, warn};

use crate::candidates::merge::{merge, normalize_email, CallerFields};
use crate::candidates::queries::fetch_candidate;
use crate::documents::extract_text;
use crate::documents::transcribe::{transcribe_upload, Transcriber};
use crate::errors::AppError;
use crate::jobs::service::get_job;
use crate::models::candidate::CandidateRow;
use crate::models::job::JobPostingRow;
use crate::screening::pipeline::{ScoreCard, ScoringPipeline};
use crate::storage::{DocumentStore, RESUME_PREFIX, VIDEO_PREFIX};

/// One uploaded file from the submission form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct Submission {
    /// As sent; normalized before any lookup.
    pub email: String,
    pub applied_to: i64,
    pub fields: CallerFields,
    pub resume: Upload,
    pub video: Option<Upload>,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub record: CandidateRow,
    pub created: bool,
    /// Object keys the previous version of the record pointed at and this
    /// save no longer does.
    pub replaced_keys: Vec<String>,
}

/// Every pipeline-owned column, written together.
#[derive(Debug, Clone)]
pub struct DerivedFields {
    pub resume_filename: Option<String>,
    pub resume_key: Option<String>,
    pub video_key: Option<String>,
    pub resume_text: String,
    pub video_transcript: Option<String>,
    pub card: ScoreCard,
}

#[derive(Clone)]
pub struct CandidateRecordManager {
    db: PgPool,
    store: Arc<dyn DocumentStore>,
    pipeline: Arc<ScoringPipeline>,
    transcriber: Arc<dyn Transcriber>,
}

impl CandidateRecordManager {
    pub fn new(
        db: PgPool,
        store: Arc<dyn DocumentStore>,
        pipeline: Arc<ScoringPipeline>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            db,
            store,
            pipeline,
            transcriber,
        }
    }

    /// Scores a submission and upserts the (email, job) record.
    ///
    /// Only input defects and infrastructure failures outside the pipeline
    /// are errors; scoring itself always yields a complete card.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitOutcome, AppError> {
        let email = normalize_email(&submission.email)?;
        if submission.resume.bytes.is_empty() {
            return Err(AppError::Validation("resume file is empty".to_string()));
        }
        let job = get_job(&self.db, submission.applied_to)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::Validation(format!(
                    "applied_to refers to unknown job {}",
                    submission.applied_to
                )),
                other => other,
            })?;

        let resume_key = self.archive(RESUME_PREFIX, &submission.resume).await?;
        let video_key = match &submission.video {
            Some(video) => match self.archive(VIDEO_PREFIX, video).await {
                Ok(key) => Some(key),
                Err(e) => {
                    self.discard(&[resume_key]).await;
                    return Err(e);
                }
            },
            None => None,
        };
        let uploaded: Vec<String> = std::iter::once(resume_key.clone())
            .chain(video_key.clone())
            .collect();

        match self
            .derive_and_save(&email, &job, submission, resume_key, video_key)
            .await
        {
            Ok(outcome) => {
                self.discard(&outcome.replaced_keys).await;
                Ok(outcome)
            }
            Err(e) => {
                self.discard(&uploaded).await;
                Err(e)
            }
        }
    }

    async fn archive(&self, prefix: &str, upload: &Upload) -> Result<String, AppError> {
        self.store
            .put(
                prefix,
                &upload.filename,
                upload.content_type.as_deref(),
                upload.bytes.clone(),
            )
            .await
    }

    async fn discard(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.store.delete(key).await {
                warn!("Could not delete archived object {key}: {e}");
            }
        }
    }

    /// Extraction, transcription, scoring and the single save.
    async fn derive_and_save(
        &self,
        email: &str,
        job: &JobPostingRow,
        submission: Submission,
        resume_key: String,
        video_key: Option<String>,
    ) -> Result<SubmitOutcome, AppError> {
        let resume = submission.resume;
        let resume_filename = resume.filename.clone();
        let resume_text =
            tokio::task::spawn_blocking(move || extract_text(&resume.filename, &resume.bytes))
                .await
                .map_err(|e| {
                    AppError::Internal(anyhow::anyhow!(
                        "spawn_blocking failed in resume extraction: {e}"
                    ))
                })?;

        let video_transcript = match &submission.video {
            Some(video) => Some(
                transcribe_upload(self.transcriber.as_ref(), &video.filename, &video.bytes)
                    .await,
            ),
            None => None,
        };

        let combined = combine_texts(&resume_text, video_transcript.as_deref());
        if combined.trim().is_empty() {
            warn!(
                "No text could be derived from the submission for {email}; \
                 scoring with neutral defaults"
            );
        }
        let card = self
            .pipeline
            .score(&job.raw_text, &job.parsed_keywords, &combined)
            .await;

        let derived = DerivedFields {
            resume_filename: Some(resume_filename),
            resume_key: Some(resume_key),
            video_key,
            resume_text,
            video_transcript,
            card,
        };
        upsert_candidate(&self.db, email, job.id, &submission.fields, &derived).await
    }
}

/// Resume text followed by the transcript, separated by a blank line.
pub fn combine_texts(resume_text: &str, transcript: Option<&str>) -> String {
    match transcript.map(str::trim).filter(|t| !t.is_empty()) {
        Some(transcript) => format!("{}\n\n{}", resume_text.trim_end(), transcript),
        None => resume_text.to_string(),
    }
}

fn lock_key(email: &str, job_id: i64) -> String {
    format!("{email}:{job_id}")
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Binds the pipeline-owned columns in `DERIVED_COLUMNS` order.
fn bind_derived<'q>(query: PgQuery<'q>, derived: &'q DerivedFields) -> PgQuery<'q> {
    let card = &derived.card;
    query
        .bind(&derived.resume_filename)
        .bind(&derived.resume_key)
        .bind(&derived.video_key)
        .bind(&derived.resume_text)
        .bind(&derived.video_transcript)
        .bind(card.lexical_score)
        .bind(card.semantic_score)
        .bind(card.external_score)
        .bind(card.local_score)
        .bind(card.keyword_boost)
        .bind(&card.matched_keywords)
        .bind(card.final_score)
        .bind(&card.missing_skills)
        .bind(&card.feedback)
        .bind(card.verdict.as_str())
        .bind(card.mode.as_str())
        .bind(card.external_status.map(|s| s.as_str()))
}

const INSERT_CANDIDATE: &str = r#"
    INSERT INTO candidate_profiles (
        email, applied_to, first_name, last_name,
        resume_filename, resume_key, video_key, resume_text, video_transcript,
        lexical_score, semantic_score, external_score, local_score, keyword_boost,
        matched_keywords, final_score, missing_skills, feedback, verdict,
        scoring_mode, external_status
    )
    VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
        $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
    )
    RETURNING id
"#;

const UPDATE_CANDIDATE: &str = r#"
    UPDATE candidate_profiles SET
        first_name = $1, last_name = $2,
        resume_filename = $3, resume_key = $4, video_key = $5,
        resume_text = $6, video_transcript = $7,
        lexical_score = $8, semantic_score = $9, external_score = $10,
        local_score = $11, keyword_boost = $12, matched_keywords = $13,
        final_score = $14, missing_skills = $15, feedback = $16, verdict = $17,
        scoring_mode = $18, external_status = $19,
        updated_at = NOW()
    WHERE id = $20
"#;

/// Merge-or-create for one (email, job) key inside a single transaction.
pub async fn upsert_candidate(
    pool: &PgPool,
    email: &str,
    job_id: i64,
    fields: &CallerFields,
    derived: &DerivedFields,
) -> Result<SubmitOutcome, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(lock_key(email, job_id))
        .execute(&mut *tx)
        .await?;

    let existing = sqlx::query_as::<_, CandidateRow>(
        "SELECT * FROM candidate_profiles WHERE email = $1 AND applied_to = $2 FOR UPDATE",
    )
    .bind(email)
    .bind(job_id)
    .fetch_optional(&mut *tx)
    .await?;

    let resolved = merge(existing.as_ref(), fields);
    let replaced_keys = existing
        .as_ref()
        .map(|row| superseded_keys(row, derived))
        .unwrap_or_default();

    let (candidate_id, created) = match existing {
        Some(row) => {
            let query = sqlx::query(UPDATE_CANDIDATE)
                .bind(&resolved.first_name)
                .bind(&resolved.last_name);
            bind_derived(query, derived)
                .bind(row.id)
                .execute(&mut *tx)
                .await?;
            (row.id, false)
        }
        None => {
            let query = sqlx::query(INSERT_CANDIDATE)
                .bind(email)
                .bind(job_id)
                .bind(&resolved.first_name)
                .bind(&resolved.last_name);
            let inserted = bind_derived(query, derived).fetch_one(&mut *tx).await?;
            (inserted.try_get::<i64, _>("id")?, true)
        }
    };

    let record = fetch_candidate(&mut *tx, candidate_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Candidate {candidate_id} vanished during upsert"))
        })?;
    tx.commit().await?;

    info!(
        "{} candidate {} ({}) for job {}: final={:?} verdict={}",
        if created { "Created" } else { "Updated" },
        candidate_id,
        email,
        job_id,
        record.final_score,
        record.verdict
    );
    Ok(SubmitOutcome {
        record,
        created,
        replaced_keys,
    })
}

/// Keys on the stored row that the new derived fields drop.
fn superseded_keys(row: &CandidateRow, derived: &DerivedFields) -> Vec<String> {
    [
        (&row.resume_key, &derived.resume_key),
        (&row.video_key, &derived.video_key),
    ]
    .into_iter()
    .filter_map(|(old, new)| match old {
        Some(old) if Some(old) != new.as_ref() => Some(old.clone()),
        _ => None,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::db::{create_pool, migrate};
    use crate::jobs::service::create_job;
    use crate::llm_client::{LlmClient, DEFAULT_API_BASE, DEFAULT_MODEL};
    use crate::screening::aggregate::{AggregationMode, ScoreAggregator, Verdict};
    use crate::screening::embedding::HashEmbedder;
    use crate::screening::external::{AnalysisStatus, LlmAnalyzer};
    use crate::screening::semantic::SemanticMatcher;
    use crate::storage::object_key;

    /// Keeps objects in memory and records every delete.
    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentStore for MemoryStore {
        async fn put(
            &self,
            prefix: &str,
            filename: &str,
            _content_type: Option<&str>,
            _bytes: Bytes,
        ) -> Result<String, AppError> {
            let key = object_key(prefix, filename);
            self.objects.lock().unwrap().push(key.clone());
            Ok(key)
        }

        async fn delete(&self, key: &str) -> Result<(), AppError> {
            self.objects.lock().unwrap().retain(|k| k != key);
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    struct FixedTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _media_path: &Path) -> String {
            self.0.to_string()
        }
    }

    fn offline_pipeline() -> Arc<ScoringPipeline> {
        let llm = LlmClient::new(
            None,
            DEFAULT_API_BASE.to_string(),
            DEFAULT_MODEL.to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        Arc::new(ScoringPipeline::new(
            SemanticMatcher::new(Arc::new(HashEmbedder::default())),
            Arc::new(LlmAnalyzer::new(llm)),
            ScoreAggregator::new(AggregationMode::FourSignal, 5.0, 20),
        ))
    }

    fn text_upload(filename: &str, text: &str) -> Upload {
        Upload {
            filename: filename.to_string(),
            content_type: Some("text/plain".to_string()),
            bytes: Bytes::from(text.to_string()),
        }
    }

    #[test]
    fn test_superseded_keys_lists_dropped_objects() {
        let mut old = derived("old", 10.0);
        old.video_key = Some("videos/a-intro.mp4".to_string());
        let row = CandidateRow {
            id: 1,
            email: "ada@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            applied_to: 1,
            applied_to_title: None,
            resume_filename: old.resume_filename.clone(),
            resume_key: old.resume_key.clone(),
            video_key: old.video_key.clone(),
            resume_text: old.resume_text.clone(),
            video_transcript: None,
            lexical_score: None,
            semantic_score: None,
            external_score: None,
            local_score: None,
            keyword_boost: None,
            matched_keywords: vec![],
            final_score: None,
            missing_skills: vec![],
            feedback: String::new(),
            verdict: "Unknown".to_string(),
            scoring_mode: None,
            external_status: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let new = derived("new", 20.0);
        let dropped = superseded_keys(&row, &new);
        assert_eq!(
            dropped,
            vec![
                old.resume_key.clone().unwrap(),
                "videos/a-intro.mp4".to_string()
            ]
        );

        let mut same = derived("same", 20.0);
        same.resume_key = old.resume_key.clone();
        same.video_key = old.video_key.clone();
        assert!(superseded_keys(&row, &same).is_empty());
    }

    #[test]
    fn test_combine_without_transcript() {
        assert_eq!(combine_texts("resume", None), "resume");
        assert_eq!(combine_texts("resume", Some("   ")), "resume");
    }

    #[test]
    fn test_combine_appends_transcript() {
        assert_eq!(
            combine_texts("Python developer\n", Some(" I love Kafka ")),
            "Python developer\n\nI love Kafka"
        );
    }

    #[test]
    fn test_lock_key_scopes_email_and_job() {
        assert_eq!(lock_key("ada@example.com", 7), "ada@example.com:7");
        assert_ne!(lock_key("ada@example.com", 7), lock_key("ada@example.com", 8));
    }

    fn derived(resume_text: &str, final_score: f64) -> DerivedFields {
        DerivedFields {
            resume_filename: Some("cv.txt".to_string()),
            resume_key: Some(format!("resumes/{}-cv.txt", Uuid::new_v4())),
            video_key: None,
            resume_text: resume_text.to_string(),
            video_transcript: None,
            card: ScoreCard {
                mode: AggregationMode::FourSignal,
                lexical_score: final_score,
                semantic_score: 50.0,
                external_score: None,
                local_score: Some(50.0),
                keyword_boost: 5.0,
                matched_keywords: vec!["python".to_string()],
                final_score: Some(final_score),
                missing_skills: vec!["docker".to_string()],
                feedback: format!("feedback for {resume_text}"),
                verdict: Verdict::from_score(Some(final_score)),
                external_status: Some(AnalysisStatus::LocalFallback),
            },
        }
    }

    async fn test_pool() -> PgPool {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let pool = create_pool(&url).await.unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    async fn count_for(pool: &PgPool, email: &str, job_id: i64) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM candidate_profiles WHERE email = $1 AND applied_to = $2",
        )
        .bind(email)
        .bind(job_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn test_resubmission_overwrites_single_record() {
        let pool = test_pool().await;
        let job = create_job(&pool, "Backend", "Python, SQL, Docker").await.unwrap();
        let email = format!("{}@example.com", Uuid::new_v4());

        let first = upsert_candidate(
            &pool,
            &email,
            job.id,
            &CallerFields {
                first_name: Some("Ada".to_string()),
                last_name: None,
            },
            &derived("first resume", 40.0),
        )
        .await
        .unwrap();
        assert!(first.created);
        assert_eq!(first.record.applied_to_title.as_deref(), Some("Backend"));

        let second = upsert_candidate(
            &pool,
            &email,
            job.id,
            &CallerFields::default(),
            &derived("second resume", 90.0),
        )
        .await
        .unwrap();
        assert!(!second.created);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.first_name, "Ada");
        assert_eq!(second.record.resume_text, "second resume");
        assert_eq!(second.record.final_score, Some(90.0));
        assert_eq!(second.record.keyword_boost, Some(5.0));
        assert_eq!(second.record.verdict, "High");
        assert_eq!(second.record.feedback, "feedback for second resume");

        assert_eq!(count_for(&pool, &email, job.id).await, 1);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn test_concurrent_submissions_create_once() {
        let pool = test_pool().await;
        let job = create_job(&pool, "Data", "SQL, Spark").await.unwrap();
        let email = format!("{}@example.com", Uuid::new_v4());
        let a = derived("a", 30.0);
        let b = derived("b", 60.0);
        let fields = CallerFields::default();

        let (ra, rb) = tokio::join!(
            upsert_candidate(&pool, &email, job.id, &fields, &a),
            upsert_candidate(&pool, &email, job.id, &fields, &b)
        );
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert!(ra.created ^ rb.created);
        assert_eq!(ra.record.id, rb.record.id);
        assert_eq!(count_for(&pool, &email, job.id).await, 1);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn test_submit_resubmission_rescores_and_replaces_documents() {
        let pool = test_pool().await;
        let job = create_job(&pool, "Backend", "Python, SQL, Docker").await.unwrap();
        let email = format!("{}@example.com", Uuid::new_v4());
        let store = Arc::new(MemoryStore::default());
        let pipeline = offline_pipeline();
        let manager = CandidateRecordManager::new(
            pool.clone(),
            store.clone(),
            pipeline.clone(),
            Arc::new(FixedTranscriber("I also ship everything with Docker")),
        );

        let first = manager
            .submit(Submission {
                email: format!("  {}  ", email.to_uppercase()),
                applied_to: job.id,
                fields: CallerFields {
                    first_name: Some("Ada".to_string()),
                    last_name: None,
                },
                resume: text_upload("cv.txt", "Python developer"),
                video: Some(text_upload("intro.mp4", "binary video")),
            })
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(first.record.email, email);
        assert_eq!(first.record.resume_text, "Python developer");
        assert_eq!(
            first.record.video_transcript.as_deref(),
            Some("I also ship everything with Docker")
        );
        assert!(first.record.video_key.is_some());
        // Transcript text takes part in scoring: only SQL is missing.
        assert_eq!(first.record.lexical_score, Some(66.67));
        assert_eq!(first.record.missing_skills, vec!["sql"]);

        let second = manager
            .submit(Submission {
                email: email.clone(),
                applied_to: job.id,
                fields: CallerFields::default(),
                resume: text_upload("cv-v2.txt", "SQL and Python expert"),
                video: None,
            })
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.first_name, "Ada");
        assert_eq!(second.record.resume_filename.as_deref(), Some("cv-v2.txt"));
        assert_eq!(second.record.resume_text, "SQL and Python expert");
        assert_eq!(second.record.video_transcript, None);
        assert_eq!(second.record.video_key, None);

        let expected = pipeline
            .score(&job.raw_text, &job.parsed_keywords, "SQL and Python expert")
            .await;
        assert_eq!(second.record.keyword_boost, Some(expected.keyword_boost));
        assert_eq!(second.record.final_score, expected.final_score);
        assert_eq!(second.record.missing_skills, vec!["docker"]);
        assert_eq!(count_for(&pool, &email, job.id).await, 1);

        let deleted = store.deleted.lock().unwrap().clone();
        assert_eq!(
            deleted,
            vec![
                first.record.resume_key.clone().unwrap(),
                first.record.video_key.clone().unwrap()
            ]
        );
        assert_eq!(
            *store.objects.lock().unwrap(),
            vec![second.record.resume_key.clone().unwrap()]
        );
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn test_submit_to_unknown_job_stores_nothing() {
        let pool = test_pool().await;
        let store = Arc::new(MemoryStore::default());
        let manager = CandidateRecordManager::new(
            pool,
            store.clone(),
            offline_pipeline(),
            Arc::new(FixedTranscriber("")),
        );

        let err = manager
            .submit(Submission {
                email: "ada@example.com".to_string(),
                applied_to: i64::MAX,
                fields: CallerFields::default(),
                resume: text_upload("cv.txt", "Python"),
                video: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.objects.lock().unwrap().is_empty());
    }
}
