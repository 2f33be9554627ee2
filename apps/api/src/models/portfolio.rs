use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys a client sent that the typed fields do not cover. Kept so a record
/// reads back exactly as it was written.
pub type ExtraFields = Map<String, Value>;

/// A stored portfolio document.
///
/// Field names follow the camelCase shape the browser form submits. Every field
/// except `id` defaults when absent, so partial payloads are accepted as-is.
/// Unknown keys, here and in every nested entry, are carried in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Portfolio {
    /// Absent on a create request; always set on a stored record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub personal_info: PersonalInfo,
    pub summary: String,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: Vec<String>,
    pub certificates: Vec<CertificateRef>,
    pub projects: Vec<ProjectEntry>,
    /// Stamped by the store on every write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub linkedin: String,
    pub github: String,
    pub website: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    pub start_date: String,
    pub end_date: String,
    pub description: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationEntry {
    pub degree: String,
    pub institution: String,
    pub year: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Reference to an uploaded certificate image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateRef {
    /// Display name, usually the original file name.
    pub name: String,
    /// Fetchable URL path, e.g. `/uploads/<filename>`.
    pub url: String,
    /// Generated storage file name.
    pub filename: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectEntry {
    pub name: String,
    pub link: String,
    pub description: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Portfolio {
    /// Copy of this record with the store-assigned fields cleared.
    pub fn without_stamps(&self) -> Portfolio {
        Portfolio {
            id: None,
            updated_at: None,
            ..self.clone()
        }
    }
}
