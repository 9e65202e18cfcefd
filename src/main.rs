use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod catalog;
mod config;
mod db;
mod models;
mod overview;
mod recommend;
mod report;
mod risk;
mod series;
mod toggle;
mod trend;
mod watched;

use catalog::StaticCatalog;
use config::Settings;
use models::{AssignmentRecord, ParticipantRole, Recommendation, RiskLevel, RiskToggleState, Tier};
use risk::StudentRiskReport;
use watched::{FileStore, WatchedVideos};

#[derive(Parser)]
#[command(name = "course-risk")]
#[command(about = "Risk assessment and video recommendations for course participants", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo course
    Seed,
    /// Import assignment scores from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Assess one student's risk level
    Assess {
        #[arg(long)]
        course: String,
        #[arg(long)]
        user: String,
        /// JSON array of assignment records to use instead of the database
        #[arg(long)]
        assignments: Option<PathBuf>,
        /// Current course grade, overrides the enrollment record
        #[arg(long)]
        grade: Option<String>,
        /// Course settings payload, e.g. '{"toggle_risk": false}'
        #[arg(long)]
        toggle_payload: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Recommend videos for one student
    Recommend {
        #[arg(long)]
        course: String,
        #[arg(long)]
        user: String,
        /// Only show videos for this quiz
        #[arg(long)]
        quiz: Option<String>,
        /// Weak topics to match; all topics when omitted
        #[arg(long = "topic")]
        topics: Vec<String>,
        /// Risk tier for the support video; computed from grades when omitted
        #[arg(long)]
        tier: Option<String>,
        /// Refresh counter for the support video pick
        #[arg(long, default_value_t = 0)]
        refresh: usize,
        /// JSON catalog to use instead of the database
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Flip the watched flag of a video
    Watch {
        #[arg(long)]
        course: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        video: String,
    },
    /// Enable or disable risk levels for a course
    Toggle {
        #[arg(long)]
        course: String,
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,
    },
    /// Attach a video to a quiz question for every student in a course
    AddVideo {
        #[arg(long)]
        course: String,
        #[arg(long)]
        quiz: String,
        #[arg(long)]
        question: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        link: String,
    },
    /// Remove the video attached to a quiz question
    RemoveVideo {
        #[arg(long)]
        course: String,
        #[arg(long)]
        quiz: String,
        #[arg(long)]
        question: String,
    },
    /// Change the link of the video attached to a quiz question
    SetVideoLink {
        #[arg(long)]
        course: String,
        #[arg(long)]
        quiz: String,
        #[arg(long)]
        question: String,
        #[arg(long)]
        link: String,
    },
    /// Summarize a class for instructors
    Overview {
        #[arg(long)]
        course: String,
    },
    /// Show the view matching the participant's enrollment
    View {
        #[arg(long)]
        course: String,
        #[arg(long)]
        user: String,
    },
    /// Generate a markdown report for a course
    Report {
        #[arg(long)]
        course: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(settings.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect(&settings).await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect(&settings).await?).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&connect(&settings).await?, &csv).await?;
            println!("Inserted {inserted} assignments from {}.", csv.display());
        }
        Commands::Assess {
            course,
            user,
            assignments,
            grade,
            toggle_payload,
            json,
        } => {
            let (report, toggle_state) = match assignments {
                Some(path) => {
                    let records = read_assignments(&path)?;
                    let current = grade.as_deref().and_then(risk::parse_current_score);
                    let toggle_state = toggle_payload
                        .as_deref()
                        .and_then(|body| toggle::parse_toggle_payload(&course, body));
                    (risk::assess_student(&records, current), toggle_state)
                }
                None => {
                    let pool = connect(&settings).await?;
                    let report = assess_from_db(&pool, &course, &user, grade.as_deref()).await?;
                    let toggle_state = match toggle_payload {
                        Some(body) => toggle::parse_toggle_payload(&course, &body),
                        None => load_toggle(&pool, &course).await,
                    };
                    (report, toggle_state)
                }
            };
            print_assessment(&report, toggle_state.as_ref(), json)?;
        }
        Commands::Recommend {
            course,
            user,
            quiz,
            topics,
            tier,
            refresh,
            catalog,
            json,
        } => {
            let pool = match (&catalog, &tier) {
                (Some(_), Some(_)) => None,
                _ => Some(connect(&settings).await?),
            };
            let level = match tier.as_deref() {
                Some(text) => tier_to_level(
                    Tier::parse(text).with_context(|| format!("unknown risk tier {text:?}"))?,
                ),
                None => {
                    let pool = pool.as_ref().context("database required to compute risk")?;
                    assess_from_db(pool, &course, &user, None)
                        .await?
                        .assessment
                        .risk_level
                }
            };
            let catalog = match catalog {
                Some(path) => StaticCatalog::from_json_file(&path)?,
                None => match pool.as_ref() {
                    Some(pool) => load_catalog(pool, &course, &user).await,
                    None => StaticCatalog::default(),
                },
            };

            let store = FileStore::open(&settings.state_path)?;
            let watched = WatchedVideos::load(&store, Some(&user), Some(&course));
            let support = recommend::select_for_risk(&catalog, level, refresh);
            let mut videos = recommend::filter_by_quiz(
                recommend::select_for_topics(&topics, &catalog),
                quiz.as_deref(),
            );
            recommend::sort_unwatched_first(&mut videos, &watched);

            if json {
                let payload = serde_json::json!({
                    "risk_level": level,
                    "support_video": support,
                    "recommended_videos": videos,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_recommendations(level, support.as_ref(), &videos, &watched);
            }
        }
        Commands::Watch {
            course,
            user,
            video,
        } => {
            let mut store = FileStore::open(&settings.state_path)?;
            let mut watched = WatchedVideos::load(&store, Some(&user), Some(&course));
            let now_watched = watched.toggle(&video);
            watched.save(&mut store)?;
            info!(%course, %user, %video, now_watched, "watched flag updated");
            println!(
                "Video {video} marked as {}.",
                if now_watched { "watched" } else { "unwatched" }
            );
        }
        Commands::Toggle { course, enabled } => {
            db::set_toggle(&connect(&settings).await?, &course, enabled).await?;
            println!(
                "Risk analysis {} for course {course}.",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        Commands::AddVideo {
            course,
            quiz,
            question,
            topic,
            title,
            link,
        } => {
            let key = db::QuestionKey {
                course_id: &course,
                quiz_name: &quiz,
                question_id: &question,
            };
            db::add_video(&connect(&settings).await?, &key, &topic, title.as_deref(), &link)
                .await
                .with_context(|| format!("failed to add video to question {question}"))?;
            println!("Video added to question {question} of {quiz}.");
        }
        Commands::RemoveVideo {
            course,
            quiz,
            question,
        } => {
            let key = db::QuestionKey {
                course_id: &course,
                quiz_name: &quiz,
                question_id: &question,
            };
            db::remove_video(&connect(&settings).await?, &key)
                .await
                .with_context(|| format!("failed to remove video from question {question}"))?;
            println!("Video removed from question {question} of {quiz}.");
        }
        Commands::SetVideoLink {
            course,
            quiz,
            question,
            link,
        } => {
            let key = db::QuestionKey {
                course_id: &course,
                quiz_name: &quiz,
                question_id: &question,
            };
            db::set_video_link(&connect(&settings).await?, &key, &link)
                .await
                .with_context(|| format!("failed to update video link for question {question}"))?;
            println!("Video link updated for question {question} of {quiz}.");
        }
        Commands::Overview { course } => {
            let pool = connect(&settings).await?;
            print_overview(&pool, &course).await?;
        }
        Commands::View { course, user } => {
            let pool = connect(&settings).await?;
            let enrollment = db::fetch_enrollment(&pool, &course, &user)
                .await?
                .with_context(|| format!("user {user} is not enrolled in course {course}"))?;

            match enrollment.role {
                Some(ParticipantRole::Instructor) => print_overview(&pool, &course).await?,
                Some(ParticipantRole::Student) => {
                    println!("{} ({})", enrollment.full_name, enrollment.user_id);
                    let report = assess_from_db(&pool, &course, &user, None).await?;
                    let toggle_state = load_toggle(&pool, &course).await;
                    print_assessment(&report, toggle_state.as_ref(), false)?;

                    let catalog = load_catalog(&pool, &course, &user).await;
                    let store = FileStore::open(&settings.state_path)?;
                    let watched = WatchedVideos::load(&store, Some(&user), Some(&course));
                    let level = report.assessment.risk_level;
                    let support = recommend::select_for_risk(&catalog, level, 0);
                    let mut videos = recommend::select_for_topics(&[], &catalog);
                    recommend::sort_unwatched_first(&mut videos, &watched);
                    print_recommendations(level, support.as_ref(), &videos, &watched);
                }
                None => println!("No view available for this enrollment type."),
            }
        }
        Commands::Report { course, out } => {
            let pool = connect(&settings).await?;
            let toggle_state = load_toggle(&pool, &course).await;
            let gradebook = db::fetch_gradebook(&pool, &course).await?;
            let overview = overview::class_overview(&gradebook);

            let mut students = Vec::new();
            for enrollment in db::fetch_students(&pool, &course).await? {
                let records = db::fetch_assignments(&pool, &course, &enrollment.user_id).await?;
                let current = enrollment
                    .current_score
                    .as_deref()
                    .and_then(risk::parse_current_score);
                students.push(report::StudentSummary {
                    name: enrollment.full_name,
                    assessment: risk::assess_student(&records, current).assessment,
                });
            }

            let report = report::build_report(
                &course,
                chrono::Utc::now().date_naive(),
                toggle::is_risk_visible(toggle_state.as_ref()),
                &students,
                &overview,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn read_assignments(path: &std::path::Path) -> anyhow::Result<Vec<AssignmentRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse assignments in {}", path.display()))
}

async fn assess_from_db(
    pool: &PgPool,
    course: &str,
    user: &str,
    grade_override: Option<&str>,
) -> anyhow::Result<StudentRiskReport> {
    let records = db::fetch_assignments(pool, course, user).await?;
    let grade = match grade_override {
        Some(grade) => Some(grade.to_string()),
        None => db::fetch_enrollment(pool, course, user)
            .await?
            .and_then(|enrollment| enrollment.current_score),
    };
    let current = grade.as_deref().and_then(risk::parse_current_score);
    Ok(risk::assess_student(&records, current))
}

/// Toggle state for a course; lookup failures leave risk visible.
async fn load_toggle(pool: &PgPool, course: &str) -> Option<RiskToggleState> {
    match db::fetch_toggle(pool, course).await {
        Ok(state) => state,
        Err(err) => {
            warn!(%course, error = %err, "risk toggle unavailable, defaulting to enabled");
            None
        }
    }
}

async fn load_catalog(pool: &PgPool, course: &str, user: &str) -> StaticCatalog {
    match db::fetch_catalog(pool, course, user).await {
        Ok(catalog) => catalog,
        Err(err) => {
            warn!(%course, %user, error = %err, "video catalog unavailable");
            StaticCatalog::default()
        }
    }
}

fn tier_to_level(tier: Tier) -> RiskLevel {
    match tier {
        Tier::Low => RiskLevel::Low,
        Tier::Medium => RiskLevel::Medium,
        Tier::High => RiskLevel::High,
    }
}

fn print_assessment(
    report: &StudentRiskReport,
    toggle_state: Option<&RiskToggleState>,
    json: bool,
) -> anyhow::Result<()> {
    let visible = toggle::is_risk_visible(toggle_state);

    if json {
        let payload = serde_json::json!({
            "risk_visible": visible,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if !visible {
        println!("Risk analysis is disabled for this course.");
        return Ok(());
    }

    match report.assessment.risk_index {
        Some(index) => println!(
            "Risk level: {} (index {:.1})",
            report.assessment.risk_level, index
        ),
        None => println!(
            "Risk level: {} (current grade unavailable)",
            report.assessment.risk_level
        ),
    }
    if let Some(inputs) = report.inputs {
        println!(
            "- recent performance {:.1}, current grade {:.1}, growth trend {:.1} (slope {:.2}, {} samples)",
            inputs.rps,
            inputs.cgs,
            inputs.gts,
            report.trend.slope,
            report.series.len()
        );
    }
    Ok(())
}

fn print_recommendations(
    level: RiskLevel,
    support: Option<&Recommendation>,
    videos: &[Recommendation],
    watched: &WatchedVideos,
) {
    match support {
        Some(rec) => println!(
            "Support video for {level}: {} ({}) {}",
            rec.video.title, rec.video.channel, rec.video.url
        ),
        None => println!("No support video for {level}."),
    }

    if videos.is_empty() {
        println!("No recommended videos.");
        return;
    }

    println!("Recommended videos:");
    for rec in videos {
        let mark = if watched.is_watched(&rec.video.video_id()) {
            "x"
        } else {
            " "
        };
        println!(
            "- [{mark}] {} ({}) {}: {}",
            rec.video.title,
            rec.video.quiz_name.as_deref().unwrap_or("general"),
            rec.reason,
            rec.video.url
        );
    }
}

async fn print_overview(pool: &PgPool, course: &str) -> anyhow::Result<()> {
    let gradebook = db::fetch_gradebook(pool, course).await?;
    if gradebook.is_empty() {
        println!("No students enrolled in course {course}.");
        return Ok(());
    }

    let overview = overview::class_overview(&gradebook);
    println!("Class overview for course {course}:");
    println!("- average score {:.1}", overview.average_score);
    println!(
        "- {} high, {} medium, {} low",
        overview.high_risk, overview.medium_risk, overview.low_risk
    );
    for student in &gradebook {
        let average = overview::average_score(&student.scores);
        println!(
            "  {} avg {:.1} ({})",
            student.name,
            average,
            overview::risk_factor(average)
        );
    }
    Ok(())
}
