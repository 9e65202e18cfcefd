use tracing::{debug, warn};

use crate::catalog::{thumbnail_for, CatalogEntry, VideoCatalog};
use crate::models::{Recommendation, RiskLevel, VideoCandidate};
use crate::watched::WatchedVideos;

/// Support video for the student's risk tier, or `None` when the catalog has
/// nothing to offer. Pass a higher `attempt` to refresh the pick.
pub fn select_for_risk(
    catalog: &impl VideoCatalog,
    level: RiskLevel,
    attempt: usize,
) -> Option<Recommendation> {
    let tier = level.tier();
    match catalog.support_video(tier, attempt) {
        Ok(Some(video)) => Some(Recommendation {
            reason: format!("Support for {tier} risk students"),
            video,
        }),
        Ok(None) => {
            debug!(%tier, attempt, "no support video for tier");
            None
        }
        Err(err) => {
            warn!(%tier, %err, "support video lookup failed");
            None
        }
    }
}

/// Videos matching the student's weak topics, in catalog order.
///
/// An empty `topics` slice keeps every entry. Entries without a usable video
/// link are skipped.
pub fn select_for_topics(topics: &[String], catalog: &impl VideoCatalog) -> Vec<Recommendation> {
    let entries = match catalog.assessment_videos() {
        Ok(entries) => entries,
        Err(err) => {
            warn!(%err, "assessment video lookup failed");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter(|entry| topic_matches(topics, entry.topic.as_deref()))
        .filter_map(to_recommendation)
        .collect()
}

fn topic_matches(topics: &[String], topic: Option<&str>) -> bool {
    if topics.is_empty() {
        return true;
    }
    let Some(topic) = topic else {
        return false;
    };
    topics
        .iter()
        .any(|wanted| wanted.trim().eq_ignore_ascii_case(topic.trim()))
}

fn to_recommendation(entry: CatalogEntry) -> Option<Recommendation> {
    let CatalogEntry {
        quiz_name,
        topic,
        video,
    } = entry;
    let Some(video) = video else {
        debug!(?quiz_name, "catalog entry has no video");
        return None;
    };
    let Some(link) = video.link.filter(|link| !link.trim().is_empty()) else {
        debug!(title = %video.title, "skipping catalog video without link");
        return None;
    };

    let Some(topic) = topic
        .filter(|topic| !topic.trim().is_empty())
        .or_else(|| quiz_name.clone())
    else {
        debug!(title = %video.title, "skipping catalog video without topic");
        return None;
    };
    let thumbnail_url = video.thumbnail.or_else(|| thumbnail_for(&link));
    Some(Recommendation {
        reason: format!("Learn about {topic}"),
        video: VideoCandidate {
            title: video.title,
            channel: video.channel,
            url: link,
            thumbnail_url,
            topic,
            quiz_name,
        },
    })
}

/// Keeps only the recommendations for one quiz; `None` keeps everything.
pub fn filter_by_quiz(recommendations: Vec<Recommendation>, quiz: Option<&str>) -> Vec<Recommendation> {
    match quiz {
        None => recommendations,
        Some(quiz) => recommendations
            .into_iter()
            .filter(|rec| rec.video.quiz_name.as_deref() == Some(quiz))
            .collect(),
    }
}

/// Stable sort putting unwatched videos first.
pub fn sort_unwatched_first(recommendations: &mut [Recommendation], watched: &WatchedVideos) {
    recommendations.sort_by_key(|rec| watched.is_watched(&rec.video.video_id()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, CatalogVideo, StaticCatalog};
    use crate::models::Tier;
    use crate::watched::{KeyValueStore, MemoryStore};

    struct BrokenCatalog;

    impl VideoCatalog for BrokenCatalog {
        fn support_video(
            &self,
            _tier: Tier,
            _attempt: usize,
        ) -> Result<Option<VideoCandidate>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }

        fn assessment_videos(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
            Err(CatalogError::Malformed("unexpected payload".to_string()))
        }
    }

    fn entry(quiz: &str, topic: &str, link: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            quiz_name: Some(quiz.to_string()),
            topic: Some(topic.to_string()),
            video: Some(CatalogVideo {
                title: format!("{topic} explained"),
                channel: "Khan Academy".to_string(),
                link: link.map(str::to_string),
                thumbnail: None,
            }),
        }
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog {
            assessment_videos: vec![
                entry("Quiz 1", "Limits", Some("https://www.youtube.com/watch?v=AAAAAAAAAAA")),
                entry("Quiz 1", "Derivatives", None),
                entry("Quiz 2", "Integrals", Some("https://www.youtube.com/watch?v=CCCCCCCCCCC")),
                CatalogEntry {
                    quiz_name: Some("Quiz 2".to_string()),
                    topic: Some("Series".to_string()),
                    video: None,
                },
            ],
            ..StaticCatalog::default()
        }
    }

    #[test]
    fn null_links_are_skipped_without_failing() {
        let recs = select_for_topics(&[], &catalog());
        let titles: Vec<&str> = recs.iter().map(|r| r.video.title.as_str()).collect();
        assert_eq!(titles, vec!["Limits explained", "Integrals explained"]);
        assert_eq!(recs[0].reason, "Learn about Limits");
        assert_eq!(
            recs[0].video.thumbnail_url.as_deref(),
            Some("https://img.youtube.com/vi/AAAAAAAAAAA/hqdefault.jpg")
        );
    }

    #[test]
    fn topics_match_case_insensitively() {
        let recs = select_for_topics(&["integrals".to_string()], &catalog());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].video.quiz_name.as_deref(), Some("Quiz 2"));

        let none = select_for_topics(&["Derivatives".to_string()], &catalog());
        assert!(none.is_empty());
    }

    #[test]
    fn catalog_failures_become_empty_results() {
        assert!(select_for_topics(&[], &BrokenCatalog).is_empty());
        assert!(select_for_risk(&BrokenCatalog, RiskLevel::High, 0).is_none());
    }

    #[test]
    fn risk_level_selects_by_tier() {
        let mut catalog = StaticCatalog::default();
        catalog.support_videos.insert(
            Tier::Medium,
            vec![VideoCandidate {
                title: "Catching up".to_string(),
                channel: "Study Hall".to_string(),
                url: "https://www.youtube.com/watch?v=BBBBBBBBBBB".to_string(),
                thumbnail_url: None,
                topic: "study skills".to_string(),
                quiz_name: None,
            }],
        );

        let rec = select_for_risk(&catalog, RiskLevel::Medium, 0).unwrap();
        assert_eq!(rec.video.title, "Catching up");
        assert_eq!(rec.reason, "Support for medium risk students");
        assert!(select_for_risk(&catalog, RiskLevel::Low, 0).is_none());
    }

    #[test]
    fn missing_topic_falls_back_to_quiz_or_is_skipped() {
        let untitled = |quiz: Option<&str>, link: &str| CatalogEntry {
            quiz_name: quiz.map(str::to_string),
            topic: None,
            video: Some(CatalogVideo {
                title: "Review session".to_string(),
                channel: "Khan Academy".to_string(),
                link: Some(link.to_string()),
                thumbnail: None,
            }),
        };
        let catalog = StaticCatalog {
            assessment_videos: vec![
                untitled(Some("Quiz 3"), "https://www.youtube.com/watch?v=DDDDDDDDDDD"),
                untitled(None, "https://www.youtube.com/watch?v=EEEEEEEEEEE"),
            ],
            ..StaticCatalog::default()
        };

        let recs = select_for_topics(&[], &catalog);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].reason, "Learn about Quiz 3");
    }

    #[test]
    fn quiz_filter_keeps_selected_quiz() {
        let recs = select_for_topics(&[], &catalog());
        assert_eq!(filter_by_quiz(recs.clone(), Some("Quiz 2")).len(), 1);
        assert_eq!(filter_by_quiz(recs, None).len(), 2);
    }

    #[test]
    fn unwatched_videos_sort_first_and_stay_stable() {
        let rec = |id: &str| Recommendation {
            video: VideoCandidate {
                title: id.to_string(),
                channel: String::new(),
                url: format!("https://www.youtube.com/watch?v={id}"),
                thumbnail_url: None,
                topic: String::new(),
                quiz_name: None,
            },
            reason: String::new(),
        };

        let mut store = MemoryStore::default();
        store
            .set("watchedVideos_7_101", r#"{"B":true}"#.to_string())
            .unwrap();
        let watched = WatchedVideos::load(&store, Some("7"), Some("101"));

        let mut recs = vec![rec("A"), rec("B"), rec("C")];
        sort_unwatched_first(&mut recs, &watched);
        let order: Vec<&str> = recs.iter().map(|r| r.video.title.as_str()).collect();
        assert_eq!(order, vec!["A", "C", "B"]);
    }

    #[test]
    fn watched_short_links_sort_last() {
        let rec = |title: &str, url: &str| Recommendation {
            video: VideoCandidate {
                title: title.to_string(),
                channel: String::new(),
                url: url.to_string(),
                thumbnail_url: None,
                topic: String::new(),
                quiz_name: None,
            },
            reason: String::new(),
        };

        let mut store = MemoryStore::default();
        store
            .set("watchedVideos_7_101", r#"{"dQw4w9WgXcQ":true}"#.to_string())
            .unwrap();
        let watched = WatchedVideos::load(&store, Some("7"), Some("101"));

        let mut recs = vec![
            rec("A", "https://youtu.be/dQw4w9WgXcQ"),
            rec("B", "https://youtu.be/AAAAAAAAAAA"),
        ];
        sort_unwatched_first(&mut recs, &watched);
        let order: Vec<&str> = recs.iter().map(|r| r.video.title.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
    }
}
