use std::collections::HashMap;

use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::catalog::{custom_video, thumbnail_for, CatalogEntry, CatalogVideo, StaticCatalog};
use crate::models::{
    AssignmentRecord, Enrollment, ParticipantRole, RiskToggleState, Score, Tier, VideoCandidate,
};
use crate::overview::StudentScores;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let enrollments = vec![
        ("101", "1", "Morgan Reyes", ParticipantRole::Instructor, None),
        ("101", "7", "Avery Lee", ParticipantRole::Student, Some("82.4")),
        ("101", "8", "Jules Moreno", ParticipantRole::Student, Some("64.0")),
        ("101", "9", "Kiara Patel", ParticipantRole::Student, Some("N/A")),
    ];

    for (course_id, user_id, name, role, current_score) in enrollments {
        sqlx::query(
            r#"
            INSERT INTO course_risk.enrollments
            (id, course_id, user_id, full_name, enrollment_type, current_score)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (course_id, user_id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                enrollment_type = EXCLUDED.enrollment_type,
                current_score = EXCLUDED.current_score
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(user_id)
        .bind(name)
        .bind(role.enrollment_type())
        .bind(current_score)
        .execute(pool)
        .await?;
    }

    let assignments = vec![
        ("7", ["18", "17", "N/A", "19", "20"]),
        ("8", ["9", "10", "12", "15", "17"]),
        ("9", ["14", "Error", "N/A", "N/A", "N/A"]),
    ];

    for (user_id, scores) in assignments {
        for (position, score) in scores.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO course_risk.assignments
                (id, course_id, user_id, name, score, points_possible, position, source_key)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind("101")
            .bind(user_id)
            .bind(format!("Homework {}", position + 1))
            .bind(*score)
            .bind(20.0_f64)
            .bind(position as i32)
            .bind(format!("seed-101-{user_id}-{position}"))
            .execute(pool)
            .await?;
        }
    }

    let support_videos = vec![
        ("high", "How to recover a failing grade", "Thomas Frank", "https://www.youtube.com/watch?v=IlU-zDU6aQ0"),
        ("high", "Study less, study smart", "Marty Lobdell", "https://www.youtube.com/watch?v=IlU-zDU6aQ1"),
        ("medium", "Active recall in practice", "Ali Abdaal", "https://www.youtube.com/watch?v=ukLnPbIffxE"),
        ("low", "Staying ahead of the syllabus", "Study Hall", "https://www.youtube.com/watch?v=kI5ZMhCkhpg"),
    ];

    for (position, (tier, title, channel, link)) in support_videos.into_iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO course_risk.support_videos
            (id, tier, title, channel, link, topic, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (link) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tier)
        .bind(title)
        .bind(channel)
        .bind(link)
        .bind("study skills")
        .bind(position as i32)
        .execute(pool)
        .await?;
    }

    let assessment_videos = vec![
        ("8", "Quiz 1", "Limits", "Limits intro", Some("https://www.youtube.com/watch?v=riXcZT2ICjA")),
        ("8", "Quiz 2", "Chain rule", "Chain rule", Some("https://www.youtube.com/watch?v=H-ybCx8gt-8")),
        ("8", "Quiz 2", "Implicit differentiation", "Implicit differentiation", None),
    ];

    for (position, (user_id, quiz, topic, title, link)) in
        assessment_videos.into_iter().enumerate()
    {
        sqlx::query(
            r#"
            INSERT INTO course_risk.assessment_videos
            (id, course_id, user_id, quiz_name, topic, title, channel, link, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (course_id, user_id, quiz_name, topic) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind("101")
        .bind(user_id)
        .bind(quiz)
        .bind(topic)
        .bind(title)
        .bind("Khan Academy")
        .bind(link)
        .bind(position as i32)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_enrollment(
    pool: &PgPool,
    course_id: &str,
    user_id: &str,
) -> anyhow::Result<Option<Enrollment>> {
    let row = sqlx::query(
        "SELECT user_id, full_name, enrollment_type, current_score \
         FROM course_risk.enrollments WHERE course_id = $1 AND user_id = $2",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| enrollment_from_row(&row)))
}

pub async fn fetch_students(pool: &PgPool, course_id: &str) -> anyhow::Result<Vec<Enrollment>> {
    let rows = sqlx::query(
        "SELECT user_id, full_name, enrollment_type, current_score \
         FROM course_risk.enrollments \
         WHERE course_id = $1 AND enrollment_type = $2 \
         ORDER BY full_name",
    )
    .bind(course_id)
    .bind(ParticipantRole::Student.enrollment_type())
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(enrollment_from_row).collect())
}

fn enrollment_from_row(row: &sqlx::postgres::PgRow) -> Enrollment {
    let enrollment_type: String = row.get("enrollment_type");
    Enrollment {
        user_id: row.get("user_id"),
        full_name: row.get("full_name"),
        role: ParticipantRole::from_enrollment(&enrollment_type),
        current_score: row.get("current_score"),
    }
}

pub async fn fetch_assignments(
    pool: &PgPool,
    course_id: &str,
    user_id: &str,
) -> anyhow::Result<Vec<AssignmentRecord>> {
    let rows = sqlx::query(
        "SELECT name, score, points_possible FROM course_risk.assignments \
         WHERE course_id = $1 AND user_id = $2 \
         ORDER BY position, name",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut assignments = Vec::new();
    for row in rows {
        let score: String = row.get("score");
        assignments.push(AssignmentRecord {
            name: row.get("name"),
            score: Score::parse(&score),
            points_possible: row.get("points_possible"),
        });
    }

    Ok(assignments)
}

/// One joined enrollment/assignment row of the gradebook query.
#[derive(Debug, Clone)]
pub struct GradebookRow {
    pub user_id: String,
    pub full_name: String,
    pub score: Option<String>,
    pub points_possible: Option<f64>,
}

/// Per-student percentage scores for the instructor overview.
pub async fn fetch_gradebook(pool: &PgPool, course_id: &str) -> anyhow::Result<Vec<StudentScores>> {
    let rows = sqlx::query(
        "SELECT e.user_id, e.full_name, a.score, a.points_possible \
         FROM course_risk.enrollments e \
         LEFT JOIN course_risk.assignments a \
           ON a.course_id = e.course_id AND a.user_id = e.user_id \
         WHERE e.course_id = $1 AND e.enrollment_type = $2 \
         ORDER BY e.full_name, e.user_id, a.position",
    )
    .bind(course_id)
    .bind(ParticipantRole::Student.enrollment_type())
    .fetch_all(pool)
    .await?;

    let rows = rows
        .into_iter()
        .map(|row| GradebookRow {
            user_id: row.get("user_id"),
            full_name: row.get("full_name"),
            score: row.get("score"),
            points_possible: row.get("points_possible"),
        })
        .collect();

    Ok(group_gradebook(rows))
}

/// Groups gradebook rows per student, keeping the query order.
pub fn group_gradebook(rows: Vec<GradebookRow>) -> Vec<StudentScores> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut gradebook: Vec<StudentScores> = Vec::new();

    for row in rows {
        let index = *positions.entry(row.user_id).or_insert_with(|| {
            gradebook.push(StudentScores {
                name: row.full_name,
                scores: Vec::new(),
            });
            gradebook.len() - 1
        });

        if let (Some(raw), Some(points_possible)) = (row.score, row.points_possible) {
            let record = AssignmentRecord {
                name: String::new(),
                score: Score::parse(&raw),
                points_possible,
            };
            gradebook[index]
                .scores
                .push(record.percentage().map_or(Score::NotAvailable, Score::Points));
        }
    }

    gradebook
}

pub async fn fetch_toggle(
    pool: &PgPool,
    course_id: &str,
) -> anyhow::Result<Option<RiskToggleState>> {
    let row = sqlx::query(
        "SELECT course_id, toggle_risk FROM course_risk.course_settings WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| RiskToggleState {
        course_id: row.get("course_id"),
        enabled: row.get("toggle_risk"),
    }))
}

pub async fn set_toggle(pool: &PgPool, course_id: &str, enabled: bool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO course_risk.course_settings (course_id, toggle_risk, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (course_id) DO UPDATE
        SET toggle_risk = EXCLUDED.toggle_risk, updated_at = NOW()
        "#,
    )
    .bind(course_id)
    .bind(enabled)
    .execute(pool)
    .await?;
    Ok(())
}

/// Loads support and assessment videos for one student into memory.
pub async fn fetch_catalog(
    pool: &PgPool,
    course_id: &str,
    user_id: &str,
) -> anyhow::Result<StaticCatalog> {
    let mut catalog = StaticCatalog::default();

    let support_rows = sqlx::query(
        "SELECT tier, title, channel, link, thumbnail, topic \
         FROM course_risk.support_videos ORDER BY position, title",
    )
    .fetch_all(pool)
    .await?;

    for row in support_rows {
        let tier: String = row.get("tier");
        let Some(tier) = Tier::parse(&tier) else {
            tracing::warn!(%tier, "ignoring support video with unknown tier");
            continue;
        };
        catalog
            .support_videos
            .entry(tier)
            .or_default()
            .push(VideoCandidate {
                title: row.get("title"),
                channel: row.get("channel"),
                url: row.get("link"),
                thumbnail_url: row.get("thumbnail"),
                topic: row.get("topic"),
                quiz_name: None,
            });
    }

    let assessment_rows = sqlx::query(
        "SELECT quiz_name, topic, title, channel, link, thumbnail \
         FROM course_risk.assessment_videos \
         WHERE course_id = $1 AND (user_id = $2 OR user_id IS NULL) \
         ORDER BY position",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    for row in assessment_rows {
        catalog.assessment_videos.push(CatalogEntry {
            quiz_name: row.get("quiz_name"),
            topic: row.get("topic"),
            video: Some(CatalogVideo {
                title: row.get("title"),
                channel: row.get("channel"),
                link: row.get("link"),
                thumbnail: row.get("thumbnail"),
            }),
        });
    }

    Ok(catalog)
}

/// Question a curated video is attached to.
#[derive(Debug, Clone)]
pub struct QuestionKey<'a> {
    pub course_id: &'a str,
    pub quiz_name: &'a str,
    pub question_id: &'a str,
}

/// Attaches an instructor-chosen video to a quiz question for the whole
/// course. Adding to a question that already has one replaces it.
pub async fn add_video(
    pool: &PgPool,
    key: &QuestionKey<'_>,
    topic: &str,
    title: Option<&str>,
    link: &str,
) -> anyhow::Result<()> {
    if link.trim().is_empty() {
        anyhow::bail!("video link must not be empty");
    }
    let video = custom_video(title, link);

    sqlx::query(
        r#"
        INSERT INTO course_risk.assessment_videos
        (id, course_id, user_id, quiz_name, question_id, topic, title, channel, link, thumbnail, position)
        VALUES (
            $1, $2, NULL, $3, $4, $5, $6, $7, $8, $9,
            (SELECT COALESCE(MAX(position) + 1, 0)
             FROM course_risk.assessment_videos WHERE course_id = $2)
        )
        ON CONFLICT (course_id, quiz_name, question_id) WHERE question_id IS NOT NULL
        DO UPDATE SET topic = EXCLUDED.topic,
                      title = EXCLUDED.title,
                      channel = EXCLUDED.channel,
                      link = EXCLUDED.link,
                      thumbnail = EXCLUDED.thumbnail
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(key.course_id)
    .bind(key.quiz_name)
    .bind(key.question_id)
    .bind(topic.trim())
    .bind(&video.title)
    .bind(&video.channel)
    .bind(&video.link)
    .bind(&video.thumbnail)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_video(pool: &PgPool, key: &QuestionKey<'_>) -> anyhow::Result<()> {
    let result = sqlx::query(
        "DELETE FROM course_risk.assessment_videos \
         WHERE course_id = $1 AND quiz_name = $2 AND question_id = $3",
    )
    .bind(key.course_id)
    .bind(key.quiz_name)
    .bind(key.question_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        anyhow::bail!(
            "no video attached to question {} of {} in course {}",
            key.question_id,
            key.quiz_name,
            key.course_id
        );
    }
    Ok(())
}

/// Points a curated video at a new link and refreshes its thumbnail.
pub async fn set_video_link(
    pool: &PgPool,
    key: &QuestionKey<'_>,
    link: &str,
) -> anyhow::Result<()> {
    let link = link.trim();
    if link.is_empty() {
        anyhow::bail!("video link must not be empty");
    }

    let result = sqlx::query(
        "UPDATE course_risk.assessment_videos SET link = $4, thumbnail = $5 \
         WHERE course_id = $1 AND quiz_name = $2 AND question_id = $3",
    )
    .bind(key.course_id)
    .bind(key.quiz_name)
    .bind(key.question_id)
    .bind(link)
    .bind(thumbnail_for(link))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        anyhow::bail!(
            "no video attached to question {} of {} in course {}",
            key.question_id,
            key.quiz_name,
            key.course_id
        );
    }
    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        course_id: String,
        user_id: String,
        full_name: String,
        assignment: String,
        score: String,
        points_possible: f64,
        position: i32,
        current_score: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        sqlx::query(
            r#"
            INSERT INTO course_risk.enrollments
            (id, course_id, user_id, full_name, enrollment_type, current_score)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (course_id, user_id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                current_score = COALESCE(EXCLUDED.current_score, course_risk.enrollments.current_score)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.course_id)
        .bind(&row.user_id)
        .bind(&row.full_name)
        .bind(ParticipantRole::Student.enrollment_type())
        .bind(row.current_score.as_deref().filter(|s| !s.trim().is_empty()))
        .execute(pool)
        .await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO course_risk.assignments
            (id, course_id, user_id, name, score, points_possible, position, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.course_id)
        .bind(&row.user_id)
        .bind(&row.assignment)
        .bind(row.score.trim())
        .bind(row.points_possible)
        .bind(row.position)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
