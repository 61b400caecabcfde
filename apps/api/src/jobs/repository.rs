use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{CreateJobRequest, JobRow, JobStatus, SkillCount, UpdateJobRequest};
use crate::pagination::Page;
use crate::scraping::ScrapedJob;

/// Filters for a user's tracked jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<String>,
    pub search: Option<String>,
    pub skills: Option<Vec<String>>,
}

/// Filters for scraped postings.
#[derive(Debug, Clone, Default)]
pub struct ScrapedFilter {
    pub search_query: Option<String>,
    pub min_relevance: Option<f64>,
    pub skills: Option<Vec<String>>,
    pub applied: Option<bool>,
}

/// Outcome of persisting one batch of scraped postings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistSummary {
    #[serde(rename = "new")]
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

enum Upserted {
    Inserted,
    Updated,
}

/// Escapes LIKE wildcards and wraps the term for a contains match.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

// ────────────────────────────────────────────────────────────────────────────
// Tracked jobs
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_jobs(
    db: &PgPool,
    user_id: Uuid,
    filter: &JobFilter,
    page: Page,
) -> Result<(Vec<JobRow>, i64), AppError> {
    let pattern = filter.search.as_deref().map(like_pattern);

    let jobs: Vec<JobRow> = sqlx::query_as(
        r#"
        SELECT * FROM jobs
        WHERE user_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR title ILIKE $3 OR company ILIKE $3 OR description ILIKE $3)
          AND ($4::text[] IS NULL OR skills && $4)
        ORDER BY created_at DESC
        OFFSET $5 LIMIT $6
        "#,
    )
    .bind(user_id)
    .bind(filter.status.as_deref())
    .bind(pattern.as_deref())
    .bind(filter.skills.as_deref())
    .bind(page.skip)
    .bind(page.limit)
    .fetch_all(db)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM jobs
        WHERE user_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR title ILIKE $3 OR company ILIKE $3 OR description ILIKE $3)
          AND ($4::text[] IS NULL OR skills && $4)
        "#,
    )
    .bind(user_id)
    .bind(filter.status.as_deref())
    .bind(pattern.as_deref())
    .bind(filter.skills.as_deref())
    .fetch_one(db)
    .await?;

    Ok((jobs, total))
}

pub async fn get_job(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<JobRow, AppError> {
    sqlx::query_as("SELECT * FROM jobs WHERE id = $1 AND (user_id = $2 OR user_id IS NULL)")
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

pub async fn get_job_by_url(
    db: &PgPool,
    user_id: Uuid,
    url: &str,
) -> Result<Option<JobRow>, AppError> {
    let job = sqlx::query_as("SELECT * FROM jobs WHERE url = $1 AND user_id = $2 LIMIT 1")
        .bind(url)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(job)
}

pub async fn create_job(
    db: &PgPool,
    user_id: Uuid,
    req: &CreateJobRequest,
    status: JobStatus,
) -> Result<JobRow, AppError> {
    let job = sqlx::query_as(
        r#"
        INSERT INTO jobs
            (user_id, title, company, description, url, status, notes, location,
             salary_range, salary_min, salary_max, skills, date_applied)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                COALESCE($13, CASE WHEN $6 = 'Applied' THEN now() END))
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(req.title.trim())
    .bind(req.company.trim())
    .bind(req.description.as_deref())
    .bind(req.url.as_deref())
    .bind(status.as_str())
    .bind(req.notes.as_deref())
    .bind(req.location.as_deref())
    .bind(req.salary_range.as_deref())
    .bind(req.salary_min)
    .bind(req.salary_max)
    .bind(&req.skills)
    .bind(req.date_applied)
    .fetch_one(db)
    .await?;
    Ok(job)
}

/// Partial update; absent fields keep their stored values.
pub async fn update_job(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    req: &UpdateJobRequest,
    status: Option<JobStatus>,
) -> Result<JobRow, AppError> {
    sqlx::query_as(
        r#"
        UPDATE jobs SET
            title        = COALESCE($3, title),
            company      = COALESCE($4, company),
            description  = COALESCE($5, description),
            url          = COALESCE($6, url),
            status       = COALESCE($7, status),
            notes        = COALESCE($8, notes),
            location     = COALESCE($9, location),
            salary_range = COALESCE($10, salary_range),
            salary_min   = COALESCE($11, salary_min),
            salary_max   = COALESCE($12, salary_max),
            skills       = COALESCE($13, skills),
            date_applied = COALESCE($14, date_applied,
                                    CASE WHEN $7 = 'Applied' THEN now() END),
            updated_at   = now()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(req.title.as_deref().map(str::trim))
    .bind(req.company.as_deref().map(str::trim))
    .bind(req.description.as_deref())
    .bind(req.url.as_deref())
    .bind(status.map(|s| s.as_str()))
    .bind(req.notes.as_deref())
    .bind(req.location.as_deref())
    .bind(req.salary_range.as_deref())
    .bind(req.salary_min)
    .bind(req.salary_max)
    .bind(req.skills.as_deref())
    .bind(req.date_applied)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

pub async fn delete_job(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Job {id} not found")));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Scraped postings
// ────────────────────────────────────────────────────────────────────────────

/// Scraped postings visible to `user_id`: their own plus unowned ones from
/// the periodic scrape, most relevant first.
pub async fn list_scraped(
    db: &PgPool,
    user_id: Uuid,
    filter: &ScrapedFilter,
    page: Page,
) -> Result<(Vec<JobRow>, i64), AppError> {
    let pattern = filter.search_query.as_deref().map(like_pattern);

    let jobs: Vec<JobRow> = sqlx::query_as(
        r#"
        SELECT * FROM jobs
        WHERE is_scraped
          AND (user_id = $1 OR user_id IS NULL)
          AND ($2::text IS NULL OR search_query ILIKE $2)
          AND ($3::float8 IS NULL OR relevance_score >= $3)
          AND ($4::text[] IS NULL OR skills && $4)
          AND ($5::bool IS NULL OR (status = 'Applied') = $5)
        ORDER BY relevance_score DESC NULLS LAST, created_at DESC
        OFFSET $6 LIMIT $7
        "#,
    )
    .bind(user_id)
    .bind(pattern.as_deref())
    .bind(filter.min_relevance)
    .bind(filter.skills.as_deref())
    .bind(filter.applied)
    .bind(page.skip)
    .bind(page.limit)
    .fetch_all(db)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM jobs
        WHERE is_scraped
          AND (user_id = $1 OR user_id IS NULL)
          AND ($2::text IS NULL OR search_query ILIKE $2)
          AND ($3::float8 IS NULL OR relevance_score >= $3)
          AND ($4::text[] IS NULL OR skills && $4)
          AND ($5::bool IS NULL OR (status = 'Applied') = $5)
        "#,
    )
    .bind(user_id)
    .bind(pattern.as_deref())
    .bind(filter.min_relevance)
    .bind(filter.skills.as_deref())
    .bind(filter.applied)
    .fetch_one(db)
    .await?;

    Ok((jobs, total))
}

/// Most frequent skills across the jobs `user_id` can see.
pub async fn skill_counts(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<SkillCount>, AppError> {
    let counts = sqlx::query_as(
        r#"
        SELECT skill, COUNT(*) AS count
        FROM jobs, unnest(skills) AS skill
        WHERE user_id = $1 OR (is_scraped AND user_id IS NULL)
        GROUP BY skill
        ORDER BY count DESC, skill ASC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(counts)
}

/// Upserts each posting in its own transaction. A failing row is rolled back
/// and counted; the rest of the batch still lands.
pub async fn save_scraped_jobs(
    db: &PgPool,
    owner: Option<Uuid>,
    search_term: &str,
    jobs: &[ScrapedJob],
) -> PersistSummary {
    let mut summary = PersistSummary::default();

    for job in jobs {
        let result = async {
            let mut tx = db.begin().await?;
            let outcome = upsert_scraped(&mut tx, owner, search_term, job).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(outcome)
        }
        .await;

        match result {
            Ok(Upserted::Inserted) => summary.inserted += 1,
            Ok(Upserted::Updated) => summary.updated += 1,
            Err(e) => {
                warn!("Failed to save scraped job '{}' ({}): {e}", job.title, job.url);
                summary.failed += 1;
            }
        }
    }

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        failed = summary.failed,
        "Saved scraped jobs for '{search_term}'"
    );
    summary
}

async fn upsert_scraped(
    conn: &mut PgConnection,
    owner: Option<Uuid>,
    search_term: &str,
    job: &ScrapedJob,
) -> Result<Upserted, sqlx::Error> {
    let existing: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM jobs
        WHERE user_id IS NOT DISTINCT FROM $1
          AND ((NULLIF($2, '') IS NOT NULL AND url = $2)
               OR (lower(title) = lower($3) AND lower(company) = lower($4)))
        ORDER BY (url = $2) DESC NULLS LAST
        LIMIT 1
        "#,
    )
    .bind(owner)
    .bind(job.url.as_str())
    .bind(job.title.trim())
    .bind(job.company.trim())
    .fetch_optional(&mut *conn)
    .await?;

    let url = (!job.url.is_empty()).then_some(job.url.as_str());

    if let Some((id,)) = existing {
        sqlx::query(
            r#"
            UPDATE jobs SET
                title           = $2,
                company         = $3,
                location        = $4,
                description     = COALESCE($5, description),
                url             = COALESCE($6, url),
                relevance_score = $7,
                skills          = $8,
                is_scraped      = TRUE,
                search_query    = $9,
                source          = $10,
                date_posted     = $11,
                salary_min      = COALESCE($12, salary_min),
                salary_max      = COALESCE($13, salary_max),
                updated_at      = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(job.title.trim())
        .bind(job.company.trim())
        .bind(job.location.as_str())
        .bind(job.description.as_deref())
        .bind(url)
        .bind(job.relevance_score)
        .bind(&job.skills)
        .bind(search_term)
        .bind(job.source.as_str())
        .bind(job.date_posted.as_str())
        .bind(job.salary_min)
        .bind(job.salary_max)
        .execute(&mut *conn)
        .await?;
        return Ok(Upserted::Updated);
    }

    sqlx::query(
        r#"
        INSERT INTO jobs
            (user_id, title, company, location, description, url, status, notes,
             relevance_score, skills, is_scraped, search_query, source, date_posted,
             salary_min, salary_max)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(owner)
    .bind(job.title.trim())
    .bind(job.company.trim())
    .bind(job.location.as_str())
    .bind(job.description.as_deref())
    .bind(url)
    .bind(JobStatus::Found.as_str())
    .bind(format!("Found on {} via search for '{search_term}'", job.source))
    .bind(job.relevance_score)
    .bind(&job.skills)
    .bind(search_term)
    .bind(job.source.as_str())
    .bind(job.date_posted.as_str())
    .bind(job.salary_min)
    .bind(job.salary_max)
    .execute(&mut *conn)
    .await?;
    Ok(Upserted::Inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" rust "), "%rust%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }

    #[test]
    fn test_persist_summary_serializes_inserted_as_new() {
        let summary = PersistSummary {
            inserted: 3,
            updated: 2,
            failed: 1,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["new"], 3);
    }

    fn scraped(title: &str, company: &str, url: &str, relevance: f64) -> ScrapedJob {
        ScrapedJob {
            title: title.into(),
            company: company.into(),
            location: "Sydney".into(),
            date_posted: "today".into(),
            url: url.into(),
            source: "linkedin".into(),
            relevance_score: relevance,
            skills: vec!["rust".into()],
            ..Default::default()
        }
    }

    async fn stored(pool: &PgPool) -> Vec<(String, String, String, Option<String>)> {
        sqlx::query_as(
            "SELECT title, company, status, url FROM jobs WHERE is_scraped ORDER BY title",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_save_scraped_inserts_as_found(pool: PgPool) {
        let jobs = vec![
            scraped("Rust Engineer", "Ferrous", "https://x.test/1", 0.8),
            scraped("Go Engineer", "Gopher", "", 0.4),
        ];
        let summary = save_scraped_jobs(&pool, None, "engineer", &jobs).await;
        assert_eq!(
            summary,
            PersistSummary {
                inserted: 2,
                updated: 0,
                failed: 0
            }
        );

        let rows = stored(&pool).await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|(_, _, status, _)| status == "Found"));
        assert_eq!(rows[0].3, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_save_scraped_updates_on_url_match(pool: PgPool) {
        let first = [scraped("Rust Engineer", "Ferrous", "https://x.test/1", 0.5)];
        save_scraped_jobs(&pool, None, "rust", &first).await;

        let renamed = [scraped("Senior Rust Engineer", "Ferrous Systems", "https://x.test/1", 0.9)];
        let summary = save_scraped_jobs(&pool, None, "rust", &renamed).await;
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.inserted, 0);

        let rows = stored(&pool).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "Senior Rust Engineer");
        assert_eq!(rows[0].1, "Ferrous Systems");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_save_scraped_updates_on_title_company_match(pool: PgPool) {
        let first = [scraped("Rust Engineer", "Ferrous", "", 0.5)];
        save_scraped_jobs(&pool, None, "rust", &first).await;

        let again = [scraped("RUST ENGINEER", "ferrous", "https://x.test/9", 0.7)];
        let summary = save_scraped_jobs(&pool, None, "rust", &again).await;
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.inserted, 0);

        let rows = stored(&pool).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].3.as_deref(), Some("https://x.test/9"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_save_scraped_failing_row_is_counted_not_fatal(pool: PgPool) {
        let jobs = vec![
            scraped("Rust Engineer", "Ferrous", "https://x.test/1", 0.8),
            scraped("Broken Posting", "Nowhere", "https://x.test/2", 1.5),
            scraped("Go Engineer", "Gopher", "https://x.test/3", 0.4),
        ];
        let summary = save_scraped_jobs(&pool, None, "engineer", &jobs).await;
        assert_eq!(
            summary,
            PersistSummary {
                inserted: 2,
                updated: 0,
                failed: 1
            }
        );

        let titles: Vec<String> = stored(&pool).await.into_iter().map(|r| r.0).collect();
        assert_eq!(titles, vec!["Go Engineer", "Rust Engineer"]);
    }
}
