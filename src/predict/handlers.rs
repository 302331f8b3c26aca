use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        State,
    },
    routing::post,
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::extractors::MaybeUser,
    error::AppError,
    history::{repo_types::PredictionKind, services as history},
    predict::dto::{CropResponse, DiseaseResponse, ImageUpload, SoilFeatures},
    state::AppState,
};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/recommend", post(recommend))
        .route("/detect", post(detect))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES))
}

/// POST /recommend { N, P, K, temperature, humidity, ph, rainfall }
#[instrument(skip_all)]
pub async fn recommend(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    payload: Result<Json<SoilFeatures>, JsonRejection>,
) -> Result<Json<CropResponse>, AppError> {
    let Json(features) = payload?;
    features.validate()?;

    let response = state
        .predictor
        .recommend(&features)
        .await
        .map_err(|e| AppError::Upstream(format!("{e:#}")))?;

    match user {
        Some(user) => {
            history::record(
                state.users.as_ref(),
                state.history.as_ref(),
                &user.email,
                PredictionKind::CropRecommendation,
                &features.summary(),
                &response.summary(),
            )
            .await?;
        }
        None => debug!("anonymous recommendation; history not recorded"),
    }

    Ok(Json(response))
}

/// POST /detect (multipart, field `file`)
#[instrument(skip_all)]
pub async fn detect(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<DiseaseResponse>, AppError> {
    let mut mp = mp?;
    let mut upload = None;
    while let Some(field) = mp.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or("upload")
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        upload = Some(ImageUpload {
            file_name,
            content_type,
            bytes,
        });
        break;
    }

    let upload = upload.ok_or_else(|| AppError::Validation("file is required".into()))?;
    if upload.bytes.is_empty() {
        return Err(AppError::Validation("file is empty".into()));
    }
    let input_summary = upload.summary();

    let response = state
        .predictor
        .detect(upload)
        .await
        .map_err(|e| AppError::Upstream(format!("{e:#}")))?;

    match user {
        Some(user) => {
            history::record(
                state.users.as_ref(),
                state.history.as_ref(),
                &user.email,
                PredictionKind::DiseaseDetection,
                &input_summary,
                &response.summary(),
            )
            .await?;
        }
        None => debug!("anonymous detection; history not recorded"),
    }

    Ok(Json(response))
}
