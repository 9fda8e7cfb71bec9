//! Maintenance cases and the enriched documents built from them.

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Whether a tradesperson has been assigned to the case.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sea_orm::EnumIter,
    sea_orm::DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(3))")]
pub enum JobAssigned {
    #[sea_orm(string_value = "yes")]
    Yes,
    #[sea_orm(string_value = "no")]
    No,
}

impl JobAssigned {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAssigned::Yes => "yes",
            JobAssigned::No => "no",
        }
    }
}

/// One maintenance request as stored in the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceCase {
    pub customer_id: String,
    pub case_id: String,
    /// Empty until enrichment has run.
    pub description: String,
    pub image_url: String,
    pub mould_detected: bool,
    pub file_name: String,
    pub date_opened: DateTime<Utc>,
    pub job_assigned: JobAssigned,
}

impl MaintenanceCase {
    /// Creates a fresh, not yet enriched case.
    pub fn new_pending(
        customer_id: impl Into<String>,
        case_id: impl Into<String>,
        image_url: impl Into<String>,
        file_name: impl Into<String>,
        date_opened: DateTime<Utc>,
        job_assigned: JobAssigned,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            case_id: case_id.into(),
            description: String::new(),
            image_url: image_url.into(),
            mould_detected: false,
            file_name: file_name.into(),
            date_opened: date_opened.trunc_subsecs(3),
            job_assigned,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.description.is_empty()
    }
}

/// The unit published to the search index and written to the JSON artifact.
///
/// Field names match the index schema exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedDocument {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "CaseID")]
    pub case_id: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "ImageURL")]
    pub image_url: String,
    #[serde(rename = "MouldDetected")]
    pub mould_detected: bool,
    /// `None` when the embedding call failed; serialized as `null`.
    #[serde(rename = "Vector")]
    pub vector: Option<Vec<f32>>,
    #[serde(rename = "DateOpened", with = "date_millis")]
    pub date_opened: DateTime<Utc>,
    #[serde(rename = "JobAssigned")]
    pub job_assigned: JobAssigned,
}

impl EnrichedDocument {
    pub fn assemble(
        case: &MaintenanceCase,
        description: String,
        mould_detected: bool,
        vector: Option<Vec<f32>>,
    ) -> Self {
        Self {
            file_name: case.file_name.clone(),
            customer_id: case.customer_id.clone(),
            case_id: case.case_id.clone(),
            description,
            image_url: case.image_url.clone(),
            mould_detected,
            vector,
            date_opened: case.date_opened,
            job_assigned: case.job_assigned,
        }
    }
}

/// RFC 3339 UTC timestamps with millisecond precision and a `Z` suffix.
pub mod date_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
