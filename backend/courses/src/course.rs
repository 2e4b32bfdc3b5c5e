use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::DomainError,
    ids::{CourseId, SectionId, UserId, VideoId},
    user::Caller,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: VideoId,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    #[serde(default)]
    pub videos: Vec<Video>,
}

/// Both layouts flatten to the same ordered video list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum CourseContent {
    Sectioned { sections: Vec<Section> },
    Flat { videos: Vec<Video> },
}

impl Default for CourseContent {
    fn default() -> Self {
        Self::Flat { videos: Vec::new() }
    }
}

impl CourseContent {
    pub fn videos(&self) -> Vec<&Video> {
        match self {
            Self::Sectioned { sections } => sections.iter().flat_map(|s| s.videos.iter()).collect(),
            Self::Flat { videos } => videos.iter().collect(),
        }
    }

    pub fn video_count(&self) -> usize {
        match self {
            Self::Sectioned { sections } => sections.iter().map(|s| s.videos.len()).sum(),
            Self::Flat { videos } => videos.len(),
        }
    }

    fn videos_mut(&mut self, section: Option<SectionId>) -> Result<&mut Vec<Video>, DomainError> {
        match (self, section) {
            (Self::Sectioned { sections }, Some(section_id)) => sections
                .iter_mut()
                .find(|s| s.id == section_id)
                .map(|s| &mut s.videos)
                .ok_or_else(|| DomainError::not_found("section")),
            (Self::Flat { .. }, Some(_)) => Err(DomainError::not_found("section")),
            (Self::Sectioned { .. }, None) => Err(DomainError::invalid(
                "course is organized in sections, address videos through their section",
            )),
            (Self::Flat { videos }, None) => Ok(videos),
        }
    }

    fn sections_mut(&mut self) -> Result<&mut Vec<Section>, DomainError> {
        if let Self::Flat { videos } = self {
            if !videos.is_empty() {
                return Err(DomainError::invalid(
                    "course uses a flat video list and has no sections",
                ));
            }
            *self = Self::Sectioned {
                sections: Vec::new(),
            };
        }

        match self {
            Self::Sectioned { sections } => Ok(sections),
            Self::Flat { .. } => Err(DomainError::invalid("course has no sections")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Hours.
    pub duration: f64,
    pub instructor: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content: CourseContent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInput {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub duration_seconds: u32,
}

impl VideoInput {
    fn build(self) -> Result<Video, DomainError> {
        require_text("video title", &self.title)?;
        require_text("video url", &self.url)?;

        Ok(Video {
            id: VideoId::new(),
            title: self.title.trim().to_string(),
            url: self.url.trim().to_string(),
            duration_seconds: self.duration_seconds,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionInput {
    pub title: String,
    #[serde(default)]
    pub videos: Vec<VideoInput>,
}

impl SectionInput {
    fn build(self) -> Result<Section, DomainError> {
        require_text("section title", &self.title)?;

        Ok(Section {
            id: SectionId::new(),
            title: self.title.trim().to_string(),
            videos: self
                .videos
                .into_iter()
                .map(VideoInput::build)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub sections: Option<Vec<SectionInput>>,
    #[serde(default)]
    pub videos: Option<Vec<VideoInput>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionUpdate {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub url: Option<String>,
    pub duration_seconds: Option<u32>,
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::invalid(format!("{field} is required")));
    }

    Ok(())
}

fn check_duration(duration: f64) -> Result<f64, DomainError> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(DomainError::invalid(
            "duration must be a non-negative number of hours",
        ));
    }

    Ok(duration)
}

impl Course {
    pub fn create(
        owner: UserId,
        payload: NewCourse,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        require_text("title", &payload.title)?;
        require_text("description", &payload.description)?;
        let duration = check_duration(payload.duration)?;

        let content = match (payload.sections, payload.videos) {
            (Some(_), Some(_)) => {
                return Err(DomainError::invalid(
                    "a course has either sections or a flat video list, not both",
                ));
            }
            (Some(sections), None) => CourseContent::Sectioned {
                sections: sections
                    .into_iter()
                    .map(SectionInput::build)
                    .collect::<Result<_, _>>()?,
            },
            (None, Some(videos)) => CourseContent::Flat {
                videos: videos
                    .into_iter()
                    .map(VideoInput::build)
                    .collect::<Result<_, _>>()?,
            },
            (None, None) => CourseContent::default(),
        };

        Ok(Self {
            id: CourseId::new(),
            title: payload.title.trim().to_string(),
            description: payload.description.trim().to_string(),
            category: payload.category.trim().to_string(),
            thumbnail: payload.thumbnail,
            duration,
            instructor: owner,
            created_at: now,
            content,
        })
    }

    pub fn is_administered_by(&self, caller: &Caller) -> bool {
        caller.is_admin() || caller.id == self.instructor
    }

    pub fn authorize(&self, caller: &Caller) -> Result<(), DomainError> {
        if self.is_administered_by(caller) {
            Ok(())
        } else {
            Err(DomainError::forbidden(
                "only the course instructor or an admin can modify this course",
            ))
        }
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.category.eq_ignore_ascii_case(category.trim())
    }

    pub fn apply_update(&mut self, update: CourseUpdate) -> Result<(), DomainError> {
        if let Some(title) = update.title {
            require_text("title", &title)?;
            self.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            require_text("description", &description)?;
            self.description = description.trim().to_string();
        }
        if let Some(duration) = update.duration {
            self.duration = check_duration(duration)?;
        }
        if let Some(category) = update.category {
            self.category = category.trim().to_string();
        }
        if let Some(thumbnail) = update.thumbnail {
            self.thumbnail = Some(thumbnail).filter(|t| !t.trim().is_empty());
        }

        Ok(())
    }

    pub fn add_section(&mut self, input: SectionInput) -> Result<SectionId, DomainError> {
        let section = input.build()?;
        let id = section.id;
        self.content.sections_mut()?.push(section);

        Ok(id)
    }

    pub fn update_section(
        &mut self,
        section_id: SectionId,
        update: SectionUpdate,
    ) -> Result<(), DomainError> {
        let section = self.section_mut(section_id)?;
        if let Some(title) = update.title {
            require_text("section title", &title)?;
            section.title = title.trim().to_string();
        }

        Ok(())
    }

    pub fn delete_section(&mut self, section_id: SectionId) -> Result<(), DomainError> {
        let CourseContent::Sectioned { sections } = &mut self.content else {
            return Err(DomainError::not_found("section"));
        };
        let position = sections
            .iter()
            .position(|s| s.id == section_id)
            .ok_or_else(|| DomainError::not_found("section"))?;
        sections.remove(position);

        Ok(())
    }

    /// `section` of `None` addresses the flat video list.
    pub fn add_video(
        &mut self,
        section: Option<SectionId>,
        input: VideoInput,
    ) -> Result<VideoId, DomainError> {
        let video = input.build()?;
        let id = video.id;
        self.content.videos_mut(section)?.push(video);

        Ok(id)
    }

    pub fn update_video(
        &mut self,
        section: Option<SectionId>,
        video_id: VideoId,
        update: VideoUpdate,
    ) -> Result<(), DomainError> {
        let video = self
            .content
            .videos_mut(section)?
            .iter_mut()
            .find(|v| v.id == video_id)
            .ok_or_else(|| DomainError::not_found("video"))?;

        if let Some(title) = update.title {
            require_text("video title", &title)?;
            video.title = title.trim().to_string();
        }
        if let Some(url) = update.url {
            require_text("video url", &url)?;
            video.url = url.trim().to_string();
        }
        if let Some(duration_seconds) = update.duration_seconds {
            video.duration_seconds = duration_seconds;
        }

        Ok(())
    }

    pub fn delete_video(
        &mut self,
        section: Option<SectionId>,
        video_id: VideoId,
    ) -> Result<(), DomainError> {
        let videos = self.content.videos_mut(section)?;
        let position = videos
            .iter()
            .position(|v| v.id == video_id)
            .ok_or_else(|| DomainError::not_found("video"))?;
        videos.remove(position);

        Ok(())
    }

    fn section_mut(&mut self, section_id: SectionId) -> Result<&mut Section, DomainError> {
        match &mut self.content {
            CourseContent::Sectioned { sections } => sections
                .iter_mut()
                .find(|s| s.id == section_id)
                .ok_or_else(|| DomainError::not_found("section")),
            CourseContent::Flat { .. } => Err(DomainError::not_found("section")),
        }
    }
}
