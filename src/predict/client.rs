use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use tracing::debug;

use crate::{
    config::MlConfig,
    predict::dto::{CropResponse, DiseaseResponse, ImageUpload, MlDiseaseReply, SoilFeatures},
};

/// The external model service. We forward inputs and relay answers; no
/// prediction logic lives on this side.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn recommend(&self, features: &SoilFeatures) -> anyhow::Result<CropResponse>;
    async fn detect(&self, image: ImageUpload) -> anyhow::Result<DiseaseResponse>;
}

#[derive(Clone)]
pub struct HttpPredictor {
    client: Client,
    base_url: String,
}

impl HttpPredictor {
    pub fn new(cfg: &MlConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build model service http client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
        })
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn recommend(&self, features: &SoilFeatures) -> anyhow::Result<CropResponse> {
        let url = format!("{}/predict", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(features)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .context("crop model returned an error status")?;
        let body = res
            .json::<CropResponse>()
            .await
            .context("decode crop model reply")?;
        debug!(crops = body.top_crops.len(), "crop model replied");
        Ok(body)
    }

    async fn detect(&self, image: ImageUpload) -> anyhow::Result<DiseaseResponse> {
        let url = format!("{}/predict_disease", self.base_url);
        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .context("image content type")?;
        let res = self
            .client
            .post(&url)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .context("disease model returned an error status")?;
        let reply = res
            .json::<MlDiseaseReply>()
            .await
            .context("decode disease model reply")?;
        let body = DiseaseResponse::try_from(reply)?;
        debug!(disease = %body.disease, "disease model replied");
        Ok(body)
    }
}

/// Canned model answers for handler tests.
#[cfg(test)]
pub struct StubPredictor {
    pub fail: bool,
}

#[cfg(test)]
#[async_trait]
impl Predictor for StubPredictor {
    async fn recommend(&self, _features: &SoilFeatures) -> anyhow::Result<CropResponse> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(CropResponse {
            top_crops: vec![
                crate::predict::dto::CropScore {
                    crop: "rice".into(),
                    confidence: "92.00%".into(),
                },
                crate::predict::dto::CropScore {
                    crop: "jute".into(),
                    confidence: "6.00%".into(),
                },
            ],
        })
    }

    async fn detect(&self, _image: ImageUpload) -> anyhow::Result<DiseaseResponse> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(DiseaseResponse {
            disease: "Tomato___Late_blight".into(),
            confidence: "97.10%".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Multipart,
        http::StatusCode,
        routing::post,
        Json, Router,
    };
    use bytes::Bytes;
    use serde_json::{json, Value};

    async fn spawn_model_service(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn predictor(base_url: String) -> HttpPredictor {
        HttpPredictor::new(&MlConfig {
            base_url,
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn features() -> SoilFeatures {
        SoilFeatures {
            n: 90,
            p: 42,
            k: 43,
            temperature: 20.8,
            humidity: 82.0,
            ph: 6.5,
            rainfall: 202.9,
        }
    }

    fn image() -> ImageUpload {
        ImageUpload {
            file_name: "leaf.jpg".into(),
            content_type: "image/jpeg".into(),
            bytes: Bytes::from_static(b"\xff\xd8\xff\xe0fake-jpeg"),
        }
    }

    #[tokio::test]
    async fn recommend_forwards_features_and_relays_ranking() {
        let model = Router::new().route(
            "/predict",
            post(|Json(body): Json<Value>| async move {
                // echo N back so the test can see what was forwarded
                Json(json!({
                    "top_crops": [
                        {"crop": format!("crop-for-N{}", body["N"]), "confidence": "88.00%"},
                        {"crop": "maize", "confidence": "10.00%"}
                    ]
                }))
            }),
        );
        let base = spawn_model_service(model).await;

        let res = predictor(base).recommend(&features()).await.expect("recommend");
        assert_eq!(res.top_crops.len(), 2);
        assert_eq!(res.top_crops[0].crop, "crop-for-N90");
        assert_eq!(res.top_crops[1].confidence, "10.00%");
    }

    #[tokio::test]
    async fn detect_forwards_the_file_field() {
        let model = Router::new().route(
            "/predict_disease",
            post(|mut mp: Multipart| async move {
                while let Some(field) = mp.next_field().await.unwrap() {
                    if field.name() == Some("file") {
                        let name = field.file_name().unwrap_or_default().to_string();
                        let ct = field.content_type().unwrap_or_default().to_string();
                        let len = field.bytes().await.unwrap().len();
                        return Json(json!({
                            "disease": format!("{name}|{ct}|{len}"),
                            "confidence": "99.00%"
                        }));
                    }
                }
                Json(json!({"error": "No file part"}))
            }),
        );
        let base = spawn_model_service(model).await;

        let res = predictor(base).detect(image()).await.expect("detect");
        assert_eq!(res.disease, "leaf.jpg|image/jpeg|13");
        assert_eq!(res.confidence, "99.00%");
    }

    #[tokio::test]
    async fn error_status_is_a_failure() {
        let model = Router::new().route(
            "/predict_disease",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "model crashed"})),
                )
            }),
        );
        let base = spawn_model_service(model).await;
        assert!(predictor(base).detect(image()).await.is_err());
    }

    #[tokio::test]
    async fn unreachable_service_is_a_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = predictor(format!("http://{addr}"))
            .recommend(&features())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("/predict"));
    }
}
