use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum PredictionKind {
    #[serde(rename = "CROP")]
    CropRecommendation,
    #[serde(rename = "DISEASE")]
    DiseaseDetection,
}

impl PredictionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionKind::CropRecommendation => "CROP",
            PredictionKind::DiseaseDetection => "DISEASE",
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CROP" => Ok(PredictionKind::CropRecommendation),
            "DISEASE" => Ok(PredictionKind::DiseaseDetection),
            other => anyhow::bail!("unknown prediction kind {other:?}"),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub user_id: Uuid,
    pub kind: String,
    pub input_summary: String,
    pub result_summary: String,
    pub created_at: OffsetDateTime,
}

/// One recorded prediction. Never updated once written.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub kind: PredictionKind,
    pub input_summary: String,
    pub result_summary: String,
    #[serde(rename = "timestamp", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = anyhow::Error;

    fn try_from(r: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            kind: r.kind.parse()?,
            input_summary: r.input_summary,
            result_summary: r.result_summary,
            created_at: r.created_at,
        })
    }
}
