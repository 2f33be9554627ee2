//! Editable portfolio draft and the save/upload flow around it.

use std::path::Path;

use folio_api::models::portfolio::{
    CertificateRef, EducationEntry, ExperienceEntry, PersonalInfo, Portfolio, ProjectEntry,
};
use folio_api::uploads::{content_type_for, ALLOWED_CONTENT_TYPES, DEFAULT_MAX_UPLOAD_BYTES};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::ClientError;

pub const INVALID_TYPE_MESSAGE: &str =
    "Invalid file type. Please upload an image file (JPEG, PNG, GIF, or WebP).";
pub const TOO_LARGE_MESSAGE: &str = "File size too large. Maximum size is 10MB.";
pub const NOT_SAVED_MESSAGE: &str = "Please save your portfolio first!";
pub const NOT_FOUND_MESSAGE: &str = "Portfolio not found. Please save your portfolio again.";

#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub id: String,
    pub share_url: String,
    /// False when the save succeeded but the follow-up fetch did not.
    pub verified: bool,
}

pub struct FormSession {
    api: ApiClient,
    /// Origin the shareable view is served from.
    public_url: String,
    id: Option<String>,
    draft: Portfolio,
}

impl FormSession {
    pub fn new(api: ApiClient, public_url: impl Into<String>) -> Self {
        Self::from_draft(api, public_url, Portfolio::default())
    }

    /// Starts from an existing draft; its `id`, if any, targets an update.
    pub fn from_draft(api: ApiClient, public_url: impl Into<String>, draft: Portfolio) -> Self {
        Self {
            api,
            public_url: public_url.into().trim_end_matches('/').to_string(),
            id: draft.id.clone().filter(|id| !id.is_empty()),
            draft,
        }
    }

    /// Replaces the draft with the stored record at `id`.
    pub async fn load(&mut self, id: &str) -> Result<(), ClientError> {
        self.draft = self.api.fetch(id).await?;
        self.id = Some(id.to_string());
        Ok(())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn draft(&self) -> &Portfolio {
        &self.draft
    }

    pub fn into_draft(self) -> Portfolio {
        self.draft
    }

    pub fn personal_info_mut(&mut self) -> &mut PersonalInfo {
        &mut self.draft.personal_info
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.draft.summary = summary.into();
    }

    pub fn add_experience(&mut self) -> &mut ExperienceEntry {
        push_default(&mut self.draft.experience)
    }

    pub fn experience_mut(&mut self, index: usize) -> Option<&mut ExperienceEntry> {
        self.draft.experience.get_mut(index)
    }

    pub fn remove_experience(&mut self, index: usize) -> Option<ExperienceEntry> {
        remove_at(&mut self.draft.experience, index)
    }

    pub fn add_education(&mut self) -> &mut EducationEntry {
        push_default(&mut self.draft.education)
    }

    pub fn education_mut(&mut self, index: usize) -> Option<&mut EducationEntry> {
        self.draft.education.get_mut(index)
    }

    pub fn remove_education(&mut self, index: usize) -> Option<EducationEntry> {
        remove_at(&mut self.draft.education, index)
    }

    pub fn add_project(&mut self) -> &mut ProjectEntry {
        push_default(&mut self.draft.projects)
    }

    pub fn project_mut(&mut self, index: usize) -> Option<&mut ProjectEntry> {
        self.draft.projects.get_mut(index)
    }

    pub fn remove_project(&mut self, index: usize) -> Option<ProjectEntry> {
        remove_at(&mut self.draft.projects, index)
    }

    /// Adds comma-separated skills, trimmed, skipping blanks and ones already present.
    /// Returns how many were added.
    pub fn add_skills(&mut self, input: &str) -> usize {
        let mut added = 0;
        for skill in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !self.draft.skills.iter().any(|existing| existing == skill) {
                self.draft.skills.push(skill.to_string());
                added += 1;
            }
        }
        added
    }

    pub fn remove_skill(&mut self, index: usize) -> Option<String> {
        remove_at(&mut self.draft.skills, index)
    }

    pub fn remove_certificate(&mut self, index: usize) -> Option<CertificateRef> {
        remove_at(&mut self.draft.certificates, index)
    }

    pub fn share_url(&self) -> Option<String> {
        self.id
            .as_deref()
            .map(|id| format!("{}/portfolio/{id}", self.public_url))
    }

    /// Submits the whole draft, adopts the assigned id and re-fetches to verify.
    pub async fn save(&mut self) -> Result<SaveOutcome, ClientError> {
        self.draft.id = self.id.clone();
        let reply = self.api.save(&self.draft).await?;
        info!(id = %reply.id, "Portfolio saved");

        self.id = Some(reply.id.clone());
        self.draft = reply.portfolio;

        let verified = match self.api.fetch(&reply.id).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Portfolio saved but verification failed: {e}");
                false
            }
        };

        Ok(SaveOutcome {
            share_url: format!("{}/portfolio/{}", self.public_url, reply.id),
            id: reply.id,
            verified,
        })
    }

    /// Share URL to navigate to, after checking the record still exists.
    pub async fn view_target(&self) -> Result<String, ClientError> {
        let id = self
            .id
            .as_deref()
            .ok_or_else(|| ClientError::Validation(NOT_SAVED_MESSAGE.to_string()))?;

        match self.api.fetch(id).await {
            Ok(_) => Ok(format!("{}/portfolio/{id}", self.public_url)),
            Err(e) if e.is_not_found() => {
                Err(ClientError::Validation(NOT_FOUND_MESSAGE.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Validates type and size locally, uploads, then appends the reference to the draft.
    pub async fn upload_certificate(&mut self, path: &Path) -> Result<CertificateRef, ClientError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Validation(INVALID_TYPE_MESSAGE.to_string()))?
            .to_string();

        let content_type = content_type_for(&file_name);
        if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
            return Err(ClientError::Validation(INVALID_TYPE_MESSAGE.to_string()));
        }

        let size = tokio::fs::metadata(path).await?.len();
        if size > DEFAULT_MAX_UPLOAD_BYTES as u64 {
            return Err(ClientError::Validation(TOO_LARGE_MESSAGE.to_string()));
        }

        let bytes = tokio::fs::read(path).await?;
        let reply = self
            .api
            .upload_certificate(&file_name, content_type, bytes)
            .await?;

        let certificate = CertificateRef {
            name: file_name,
            url: reply.url,
            filename: reply.filename,
            ..Default::default()
        };
        self.draft.certificates.push(certificate.clone());
        Ok(certificate)
    }
}

fn push_default<T: Default>(list: &mut Vec<T>) -> &mut T {
    list.push(T::default());
    let last = list.len() - 1;
    &mut list[last]
}

/// Out-of-range indices are a no-op.
fn remove_at<T>(list: &mut Vec<T>, index: usize) -> Option<T> {
    (index < list.len()).then(|| list.remove(index))
}
