use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    auth::repo::UserStore,
    error::AppError,
    history::{
        repo::HistoryStore,
        repo_types::{HistoryEntry, PredictionKind},
    },
};

/// Longest summary we keep, in characters.
pub const MAX_SUMMARY_LEN: usize = 1000;

fn bounded(text: &str) -> String {
    match text.char_indices().nth(MAX_SUMMARY_LEN) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

pub async fn record(
    users: &dyn UserStore,
    history: &dyn HistoryStore,
    email: &str,
    kind: PredictionKind,
    input_summary: &str,
    result_summary: &str,
) -> Result<HistoryEntry, AppError> {
    let user = users
        .find_by_email(email)
        .await?
        .ok_or_else(|| AppError::UserNotFound(email.to_string()))?;

    let entry = history
        .insert(
            user.id,
            kind,
            &bounded(input_summary),
            &bounded(result_summary),
            OffsetDateTime::now_utc(),
        )
        .await?;
    info!(user_id = %user.id, entry_id = entry.id, %kind, "prediction recorded");
    Ok(entry)
}

/// Never fails: an unknown identity or a store error yields an empty list.
pub async fn list_for(
    users: &dyn UserStore,
    history: &dyn HistoryStore,
    email: &str,
) -> Vec<HistoryEntry> {
    let user = match users.find_by_email(email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%email, "history requested for unknown user");
            return Vec::new();
        }
        Err(e) => {
            error!(error = ?e, "user lookup for history failed");
            return Vec::new();
        }
    };

    history.list_by_user(user.id).await.unwrap_or_else(|e| {
        error!(error = ?e, user_id = %user.id, "history listing failed");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{
            repo::MemoryUserStore,
            repo_types::NewUser,
        },
        history::repo::MemoryHistoryStore,
    };

    async fn seeded_users() -> MemoryUserStore {
        let users = MemoryUserStore::new();
        users
            .create(NewUser {
                name: "Lakshmi".into(),
                email: "lakshmi@example.com".into(),
                password_hash: "$argon2id$fake".into(),
                location: None,
            })
            .await
            .unwrap();
        users
    }

    #[tokio::test]
    async fn empty_history_is_not_an_error() {
        let users = seeded_users().await;
        let history = MemoryHistoryStore::new();
        assert!(list_for(&users, &history, "lakshmi@example.com").await.is_empty());
        assert!(list_for(&users, &history, "stranger@example.com").await.is_empty());
    }

    #[tokio::test]
    async fn most_recent_first() {
        let users = seeded_users().await;
        let history = MemoryHistoryStore::new();

        record(
            &users,
            &history,
            "lakshmi@example.com",
            PredictionKind::CropRecommendation,
            "N:90 P:42 K:43 pH:6.5",
            "rice",
        )
        .await
        .unwrap();
        record(
            &users,
            &history,
            "lakshmi@example.com",
            PredictionKind::DiseaseDetection,
            "Image: leaf.jpg",
            "Tomato___Late_blight (97.10%)",
        )
        .await
        .unwrap();

        let entries = list_for(&users, &history, "lakshmi@example.com").await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, PredictionKind::DiseaseDetection);
        assert_eq!(entries[1].kind, PredictionKind::CropRecommendation);
        assert!(entries[0].created_at >= entries[1].created_at);
    }

    #[tokio::test]
    async fn unknown_identity_cannot_record() {
        let users = MemoryUserStore::new();
        let history = MemoryHistoryStore::new();
        let err = record(
            &users,
            &history,
            "forged@example.com",
            PredictionKind::CropRecommendation,
            "N:1",
            "rice",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn long_summaries_are_truncated() {
        let users = seeded_users().await;
        let history = MemoryHistoryStore::new();
        let long = "é".repeat(MAX_SUMMARY_LEN + 50);
        let entry = record(
            &users,
            &history,
            "lakshmi@example.com",
            PredictionKind::DiseaseDetection,
            &long,
            "ok",
        )
        .await
        .unwrap();
        assert_eq!(entry.input_summary.chars().count(), MAX_SUMMARY_LEN);
        assert_eq!(entry.result_summary, "ok");
    }

    #[test]
    fn entry_json_shape() {
        let entry = HistoryEntry {
            id: 7,
            user_id: uuid::Uuid::new_v4(),
            kind: PredictionKind::CropRecommendation,
            input_summary: "N:1".into(),
            result_summary: "rice".into(),
            created_at: time::macros::datetime!(2024-06-01 12:00 UTC),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "CROP");
        assert_eq!(json["timestamp"], "2024-06-01T12:00:00Z");
        assert!(json.get("user_id").is_none());
    }
}
