//! Quest data routes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use atlas_shared::quest::QUEST_RESOURCE;
use atlas_shared::{Document, ListDocument, QuestRestModel, Resource};

use super::http::{ApiError, RequestTenant};
use crate::app::App;
use crate::infrastructure::seed::SeedSummary;

pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/data/quests", get(list_quests))
        .route("/data/quests/seed", post(seed_quests))
        .route("/data/quests/{id}", get(get_quest))
}

async fn list_quests(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
) -> Result<Json<ListDocument<QuestRestModel>>, ApiError> {
    let mut quests = app.repositories.quests.list(&tenant).await?;
    quests.sort_by_key(|q| q.id);
    let data = quests
        .iter()
        .map(|q| Resource::new(QUEST_RESOURCE, q.id, QuestRestModel::from(q)))
        .collect();
    Ok(Json(ListDocument::new(data)))
}

async fn get_quest(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
    Path(id): Path<u32>,
) -> Result<Json<Document<QuestRestModel>>, ApiError> {
    let quest = app
        .repositories
        .quests
        .get(&tenant, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(Document::new(Resource::new(
        QUEST_RESOURCE,
        quest.id,
        QuestRestModel::from(&quest),
    ))))
}

/// Loads the configured quest file into the requesting tenant.
async fn seed_quests(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
) -> Result<Json<SeedSummary>, ApiError> {
    let summary = app
        .seed_quests(&tenant)
        .await?
        .ok_or_else(|| ApiError::BadRequest("QUEST_DATA_PATH is not configured".into()))?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use atlas_domain::Quest;
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use super::super::http::test_support::*;

    #[tokio::test]
    async fn quests_are_served_in_id_order() {
        let app = app();
        let tenant = tenant();
        for (id, name) in [(2000, "Second"), (1000, "First")] {
            app.repositories
                .quests
                .save(&tenant, Quest::new(id, name))
                .await
                .expect("save");
        }

        let response = router(&app)
            .oneshot(request(&tenant, Method::GET, "/data/quests", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"][0]["id"], "1000");
        assert_eq!(body["data"][0]["type"], "quests");
        assert_eq!(body["data"][1]["attributes"]["name"], "Second");
    }

    #[tokio::test]
    async fn unknown_quest_is_not_found() {
        let app = app();
        let response = router(&app)
            .oneshot(request(&tenant(), Method::GET, "/data/quests/1", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn seeding_without_a_configured_file_is_rejected() {
        let app = app();
        let response = router(&app)
            .oneshot(request(&tenant(), Method::POST, "/data/quests/seed", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
