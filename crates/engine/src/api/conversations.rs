//! Conversation definition routes.
//!
//! Definitions are validated before they are stored; a graph with any issue
//! is rejected with the full report.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use atlas_domain::conversation::validator::{self, ValidationIssue};
use atlas_domain::{Conversation, NpcId};
use atlas_shared::{Document, Resource};

use super::http::{ApiError, RequestTenant};
use crate::app::App;
use crate::infrastructure::seed::SeedSummary;

const CONVERSATION_RESOURCE: &str = "conversations";

pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/npcs/conversations", post(save_conversation))
        .route("/npcs/conversations/validate", post(validate_conversation))
        .route("/npcs/conversations/seed", post(seed_conversations))
        .route("/npcs/{npc_id}/conversations", get(get_conversation))
}

#[derive(Debug, Serialize)]
struct ValidationResponse {
    valid: bool,
    issues: Vec<ValidationIssue>,
}

fn check(conversation: &Conversation) -> ValidationResponse {
    let report = validator::validate(conversation);
    ValidationResponse {
        valid: report.is_valid(),
        issues: report.issues,
    }
}

async fn get_conversation(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
    Path(npc_id): Path<u32>,
) -> Result<Json<Document<Conversation>>, ApiError> {
    let npc_id = NpcId::from_raw(npc_id);
    let conversation = app
        .repositories
        .conversations
        .get_for_npc(&tenant, npc_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(Document::new(Resource::new(
        CONVERSATION_RESOURCE,
        npc_id,
        conversation,
    ))))
}

async fn save_conversation(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
    Json(input): Json<Document<Conversation>>,
) -> Result<Response, ApiError> {
    let conversation = input.data.attributes;
    let result = check(&conversation);
    if !result.valid {
        tracing::info!(
            npc_id = %conversation.npc_id(),
            issues = result.issues.len(),
            "Rejecting invalid conversation"
        );
        return Ok((StatusCode::BAD_REQUEST, Json(result)).into_response());
    }

    let npc_id = conversation.npc_id();
    app.repositories
        .conversations
        .save(&tenant, conversation.clone())
        .await?;
    tracing::info!(npc_id = %npc_id, "Conversation saved");
    let document = Document::new(Resource::new(CONVERSATION_RESOURCE, npc_id, conversation));
    Ok((StatusCode::CREATED, Json(document)).into_response())
}

async fn validate_conversation(
    RequestTenant(_): RequestTenant,
    Json(input): Json<Document<Conversation>>,
) -> Json<ValidationResponse> {
    Json(check(&input.data.attributes))
}

/// Loads the configured conversation file into the requesting tenant.
async fn seed_conversations(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
) -> Result<Json<SeedSummary>, ApiError> {
    let summary = app
        .seed_conversations(&tenant)
        .await?
        .ok_or_else(|| ApiError::BadRequest("CONVERSATION_DATA_PATH is not configured".into()))?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;
    use tower::ServiceExt;

    use super::super::http::test_support::*;
    use super::*;

    fn document(start_state: &str) -> serde_json::Value {
        json!({
            "data": {
                "type": "conversations",
                "attributes": {
                    "npcId": 9010000,
                    "startState": start_state,
                    "states": [{
                        "id": "start",
                        "type": "dialogue",
                        "dialogue": {"dialogueType": "sendOk", "text": "Hello", "choices": [
                            {"text": "Ok", "nextState": ""},
                            {"text": "Exit", "nextState": ""}
                        ]}
                    }]
                }
            }
        })
    }

    #[tokio::test]
    async fn saved_conversation_is_served_by_npc() {
        let app = app();
        let tenant = tenant();

        let response = router(&app)
            .oneshot(request(&tenant, Method::POST, "/npcs/conversations", Some(document("start"))))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router(&app)
            .oneshot(request(&tenant, Method::GET, "/npcs/9010000/conversations", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"]["id"], "9010000");
        assert_eq!(body["data"]["attributes"]["startState"], "start");
    }

    #[tokio::test]
    async fn invalid_conversation_is_rejected_with_report() {
        let app = app();
        let tenant = tenant();

        let response = router(&app)
            .oneshot(request(&tenant, Method::POST, "/npcs/conversations", Some(document("nowhere"))))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["issues"][0]["field"], "startState");
        assert!(app
            .repositories
            .conversations
            .get_for_npc(&tenant, NpcId::from_raw(9010000))
            .await
            .expect("get")
            .is_none());
    }

    #[tokio::test]
    async fn validate_reports_without_storing() {
        let app = app();
        let tenant = tenant();

        let response = router(&app)
            .oneshot(request(&tenant, Method::POST, "/npcs/conversations/validate", Some(document("start"))))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["valid"], true);
        assert!(app
            .repositories
            .conversations
            .get_for_npc(&tenant, NpcId::from_raw(9010000))
            .await
            .expect("get")
            .is_none());
    }
}
