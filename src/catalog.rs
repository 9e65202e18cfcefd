use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Tier, VideoCandidate};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("catalog returned malformed data: {0}")]
    Malformed(String),
}

/// Video attached to a quiz question; `link` may be missing in stored rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogVideo {
    pub title: String,
    #[serde(default)]
    pub channel: String,
    pub link: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub quiz_name: Option<String>,
    pub topic: Option<String>,
    pub video: Option<CatalogVideo>,
}

/// Source of recommendable videos.
pub trait VideoCatalog {
    /// One support video for a tier. `attempt` counts refreshes so a catalog
    /// can hand out a different candidate each time.
    fn support_video(&self, tier: Tier, attempt: usize)
        -> Result<Option<VideoCandidate>, CatalogError>;

    /// Quiz-keyed videos for the current student.
    fn assessment_videos(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}

/// Catalog held in memory, filled from the database or a JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub support_videos: HashMap<Tier, Vec<VideoCandidate>>,
    #[serde(default)]
    pub assessment_videos: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| CatalogError::Unavailable(format!("{}: {err}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|err| CatalogError::Malformed(format!("{}: {err}", path.display())))
    }
}

impl VideoCatalog for StaticCatalog {
    fn support_video(
        &self,
        tier: Tier,
        attempt: usize,
    ) -> Result<Option<VideoCandidate>, CatalogError> {
        Ok(self
            .support_videos
            .get(&tier)
            .filter(|videos| !videos.is_empty())
            .map(|videos| videos[attempt % videos.len()].clone()))
    }

    fn assessment_videos(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.assessment_videos.clone())
    }
}

/// Extracts the 11 character video id from the usual YouTube link shapes.
pub fn youtube_id(link: &str) -> Option<&str> {
    const MARKERS: [&str; 5] = ["youtu.be/", "embed/", "watch?v=", "&v=", "v/"];

    MARKERS.iter().find_map(|marker| {
        let start = link.find(marker)? + marker.len();
        let rest = &link[start..];
        let end = rest.find(['#', '&', '?']).unwrap_or(rest.len());
        let id = &rest[..end];
        (id.len() == 11).then_some(id)
    })
}

pub fn thumbnail_for(link: &str) -> Option<String> {
    youtube_id(link).map(|id| format!("https://img.youtube.com/vi/{id}/hqdefault.jpg"))
}

pub const CUSTOM_CHANNEL: &str = "Custom Added";

/// Video an instructor attaches to a quiz question by hand.
pub fn custom_video(title: Option<&str>, link: &str) -> CatalogVideo {
    let link = link.trim();
    CatalogVideo {
        title: title
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or("Custom Video")
            .to_string(),
        channel: CUSTOM_CHANNEL.to_string(),
        link: Some(link.to_string()),
        thumbnail: thumbnail_for(link),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_ids_from_common_links() {
        assert_eq!(
            youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(youtube_id("https://youtu.be/dQw4w9WgXcQ?t=3"), Some("dQw4w9WgXcQ"));
        assert_eq!(
            youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(youtube_id("https://example.com/video/123"), None);
    }

    #[test]
    fn thumbnail_uses_high_quality_still() {
        assert_eq!(
            thumbnail_for("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
    }

    #[test]
    fn custom_videos_get_channel_and_thumbnail() {
        let video = custom_video(None, " https://youtu.be/dQw4w9WgXcQ ");
        assert_eq!(video.title, "Custom Video");
        assert_eq!(video.channel, "Custom Added");
        assert_eq!(video.link.as_deref(), Some("https://youtu.be/dQw4w9WgXcQ"));
        assert_eq!(
            video.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );

        let other = custom_video(Some("Chain rule recap"), "https://example.com/lecture");
        assert_eq!(other.title, "Chain rule recap");
        assert_eq!(other.thumbnail, None);
    }

    #[test]
    fn support_videos_rotate_with_attempts() {
        let video = |title: &str| VideoCandidate {
            title: title.to_string(),
            channel: "Study Hall".to_string(),
            url: format!("https://www.youtube.com/watch?v={title}"),
            thumbnail_url: None,
            topic: "study skills".to_string(),
            quiz_name: None,
        };
        let mut catalog = StaticCatalog::default();
        catalog
            .support_videos
            .insert(Tier::High, vec![video("first"), video("second")]);

        let first = catalog.support_video(Tier::High, 0).unwrap().unwrap();
        let second = catalog.support_video(Tier::High, 1).unwrap().unwrap();
        let wrapped = catalog.support_video(Tier::High, 2).unwrap().unwrap();
        assert_eq!(first.title, "first");
        assert_eq!(second.title, "second");
        assert_eq!(wrapped.title, "first");
        assert!(catalog.support_video(Tier::Low, 0).unwrap().is_none());
    }

    #[test]
    fn missing_or_broken_catalog_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = StaticCatalog::from_json_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(CatalogError::Unavailable(_))));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "[not a catalog").unwrap();
        let parsed = StaticCatalog::from_json_file(&broken);
        assert!(matches!(parsed, Err(CatalogError::Malformed(_))));
    }

    #[test]
    fn catalog_document_parses() {
        let json = r#"{
            "support_videos": {
                "medium": [{
                    "title": "Time management",
                    "channel": "Study Hall",
                    "url": "https://www.youtube.com/watch?v=aaaaaaaaaaa",
                    "thumbnail_url": null,
                    "topic": "habits",
                    "quiz_name": null
                }]
            },
            "assessment_videos": [
                {"quiz_name": "Quiz 1", "topic": "limits",
                 "video": {"title": "Limits", "channel": "Calc", "link": null}}
            ]
        }"#;
        let catalog: StaticCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.support_videos[&Tier::Medium].len(), 1);
        assert_eq!(catalog.assessment_videos[0].video.as_ref().unwrap().link, None);
    }
}
