use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Soil and climate readings sent to the crop model. Field names match what
/// the model service expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilFeatures {
    #[serde(rename = "N")]
    pub n: i64,
    #[serde(rename = "P")]
    pub p: i64,
    #[serde(rename = "K")]
    pub k: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

impl SoilFeatures {
    pub fn validate(&self) -> Result<(), AppError> {
        let readings = [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("ph", self.ph),
            ("rainfall", self.rainfall),
        ];
        for (name, value) in readings {
            if !value.is_finite() {
                return Err(AppError::Validation(format!("{name} must be a finite number")));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!("N:{} P:{} K:{} pH:{:.1}", self.n, self.p, self.k, self.ph)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropScore {
    pub crop: String,
    pub confidence: String,
}

/// Ranked crops, best first, as produced by the model service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropResponse {
    pub top_crops: Vec<CropScore>,
}

impl CropResponse {
    pub fn summary(&self) -> String {
        self.top_crops
            .first()
            .map(|c| c.crop.clone())
            .unwrap_or_else(|| "No Result".to_string())
    }
}

/// Raw disease reply; the service reports failures in `error`.
#[derive(Debug, Deserialize)]
pub struct MlDiseaseReply {
    pub disease: Option<String>,
    pub confidence: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiseaseResponse {
    pub disease: String,
    pub confidence: String,
}

impl DiseaseResponse {
    pub fn summary(&self) -> String {
        format!("{} ({})", self.disease, self.confidence)
    }
}

impl TryFrom<MlDiseaseReply> for DiseaseResponse {
    type Error = anyhow::Error;

    fn try_from(r: MlDiseaseReply) -> Result<Self, Self::Error> {
        if let Some(err) = r.error {
            anyhow::bail!("model service reported: {err}");
        }
        match (r.disease, r.confidence) {
            (Some(disease), Some(confidence)) => Ok(Self {
                disease,
                confidence,
            }),
            _ => anyhow::bail!("model service reply is missing disease or confidence"),
        }
    }
}

/// A leaf image received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn summary(&self) -> String {
        format!("Image: {}", self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> SoilFeatures {
        SoilFeatures {
            n: 90,
            p: 42,
            k: 43,
            temperature: 20.8,
            humidity: 82.0,
            ph: 6.502,
            rainfall: 202.9,
        }
    }

    #[test]
    fn soil_features_use_model_field_names() {
        let json = serde_json::to_value(features()).unwrap();
        assert_eq!(json["N"], 90);
        assert_eq!(json["P"], 42);
        assert_eq!(json["K"], 43);
        assert!(json.get("n").is_none());
    }

    #[test]
    fn summaries() {
        assert_eq!(features().summary(), "N:90 P:42 K:43 pH:6.5");
        assert_eq!(CropResponse { top_crops: vec![] }.summary(), "No Result");
        let disease = DiseaseResponse {
            disease: "Apple___scab".into(),
            confidence: "91.20%".into(),
        };
        assert_eq!(disease.summary(), "Apple___scab (91.20%)");
    }

    #[test]
    fn non_finite_readings_are_rejected() {
        let mut f = features();
        f.rainfall = f64::NAN;
        assert!(matches!(f.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn disease_reply_with_error_is_a_failure() {
        let reply = MlDiseaseReply {
            disease: None,
            confidence: None,
            error: Some("No file part".into()),
        };
        let err = DiseaseResponse::try_from(reply).unwrap_err();
        assert!(err.to_string().contains("No file part"));
    }
}
