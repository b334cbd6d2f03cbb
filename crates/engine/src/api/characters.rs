//! Character JSON:API routes.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use atlas_domain::{AccountId, Character, CharacterId, JobId, MapId, SkillPoints, WorldId};
use atlas_shared::character::CHARACTER_RESOURCE;
use atlas_shared::{CharacterRestModel, Document, ListDocument, Resource};

use super::http::{ApiError, RequestTenant};
use crate::app::App;
use crate::infrastructure::ports::CharacterQuery;
use crate::infrastructure::temporal::TemporalDatum;
use crate::use_cases::character::CharacterPatch;

pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/characters", get(list_characters).post(create_character))
        .route(
            "/characters/{id}",
            get(get_character)
                .patch(update_character)
                .delete(delete_character),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CharacterFilter {
    account_id: Option<u32>,
    world_id: Option<u8>,
    map_id: Option<u32>,
    name: Option<String>,
}

impl CharacterFilter {
    fn into_query(self) -> Result<CharacterQuery, ApiError> {
        match self {
            CharacterFilter {
                account_id: Some(account_id),
                world_id: Some(world_id),
                ..
            } => Ok(CharacterQuery::ByAccountInWorld {
                account_id: AccountId::from_raw(account_id),
                world_id: WorldId::from_raw(world_id),
            }),
            CharacterFilter {
                world_id: Some(world_id),
                map_id: Some(map_id),
                ..
            } => Ok(CharacterQuery::InMap {
                world_id: WorldId::from_raw(world_id),
                map_id: MapId::from_raw(map_id),
            }),
            CharacterFilter { name: Some(name), .. } => Ok(CharacterQuery::ByName(name)),
            CharacterFilter {
                account_id: None,
                world_id: None,
                map_id: None,
                name: None,
            } => Ok(CharacterQuery::All),
            _ => Err(ApiError::BadRequest("unsupported character filter".into())),
        }
    }
}

async fn list_characters(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
    Query(filter): Query<CharacterFilter>,
) -> Result<Json<ListDocument<CharacterRestModel>>, ApiError> {
    let query = filter.into_query()?;
    let characters = app.use_cases.character.processor.query(&tenant, query).await?;

    let mut data = Vec::with_capacity(characters.len());
    for character in &characters {
        let datum = app.temporal.get_by_id(&tenant, character.id()).await?;
        data.push(to_resource(character, datum));
    }
    Ok(Json(ListDocument::new(data)))
}

async fn get_character(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
    Path(id): Path<u32>,
) -> Result<Json<Document<CharacterRestModel>>, ApiError> {
    let id = CharacterId::from_raw(id);
    let character = app.use_cases.character.processor.get(&tenant, id).await?;
    let datum = app.temporal.get_by_id(&tenant, id).await?;
    Ok(Json(Document::new(to_resource(&character, datum))))
}

async fn create_character(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
    Json(input): Json<Document<CharacterRestModel>>,
) -> Result<Json<Document<CharacterRestModel>>, ApiError> {
    let character = from_rest(&input.data.attributes);
    let created = app
        .use_cases
        .character
        .processor
        .create(&tenant, Uuid::new_v4(), character)
        .await?;
    Ok(Json(Document::new(to_resource(&created, TemporalDatum::default()))))
}

async fn update_character(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
    Path(id): Path<u32>,
    Json(input): Json<Document<CharacterRestModel>>,
) -> Result<StatusCode, ApiError> {
    let patch = CharacterPatch::from(&input.data.attributes);
    app.use_cases
        .character
        .processor
        .update(&tenant, Uuid::new_v4(), CharacterId::from_raw(id), patch)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_character(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
    Path(id): Path<u32>,
) -> Result<StatusCode, ApiError> {
    app.use_cases
        .character
        .processor
        .delete(&tenant, Uuid::new_v4(), CharacterId::from_raw(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Conversion
// =============================================================================

fn to_resource(character: &Character, datum: TemporalDatum) -> Resource<CharacterRestModel> {
    let attributes = CharacterRestModel {
        account_id: character.account_id().value(),
        world_id: character.world_id().value(),
        name: character.name().to_string(),
        level: character.level(),
        experience: character.experience(),
        gachapon_experience: character.gachapon_experience(),
        strength: character.strength(),
        dexterity: character.dexterity(),
        intelligence: character.intelligence(),
        luck: character.luck(),
        hp: character.hp(),
        max_hp: character.max_hp(),
        mp: character.mp(),
        max_mp: character.max_mp(),
        meso: character.meso(),
        hp_mp_used: character.hp_mp_used(),
        job_id: character.job_id().value(),
        skin_color: character.skin_color(),
        gender: character.gender(),
        fame: character.fame(),
        hair: character.hair(),
        face: character.face(),
        ap: character.ap(),
        sp: character.sp().to_string(),
        map_id: character.map_id().value(),
        spawn_point: character.spawn_point(),
        gm: character.gm(),
        x: datum.x,
        y: datum.y,
        stance: datum.stance,
    };
    Resource::new(CHARACTER_RESOURCE, character.id(), attributes)
}

fn from_rest(model: &CharacterRestModel) -> Character {
    let sp = if model.sp.is_empty() {
        SkillPoints::default()
    } else {
        SkillPoints::parse(&model.sp)
    };
    Character::new(
        AccountId::from_raw(model.account_id),
        WorldId::from_raw(model.world_id),
        model.name.clone(),
    )
    .with_level(model.level)
    .with_experience(model.experience)
    .with_gachapon_experience(model.gachapon_experience)
    .with_job(JobId::from_raw(model.job_id))
    .with_ap(model.ap)
    .with_sp(sp)
    .with_stats(model.strength, model.dexterity, model.intelligence, model.luck)
    .with_hp_mp(model.hp, model.max_hp, model.mp, model.max_mp)
    .with_hp_mp_used(model.hp_mp_used)
    .with_meso(model.meso)
    .with_fame(model.fame)
    .with_gm(model.gm)
    .with_appearance(model.gender, model.skin_color, model.hair, model.face)
    .with_map(MapId::from_raw(model.map_id), model.spawn_point)
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;
    use tower::ServiceExt;

    use super::super::http::test_support::*;
    use super::*;

    fn create_body(account_id: u32, name: &str) -> serde_json::Value {
        json!({
            "data": {
                "type": "characters",
                "attributes": {
                    "accountId": account_id,
                    "worldId": 0,
                    "name": name,
                    "level": 1,
                    "strength": 12, "dexterity": 5, "intelligence": 4, "luck": 4,
                    "hp": 50, "maxHp": 50, "mp": 5, "maxMp": 5,
                    "hair": 30030, "face": 20000, "mapId": 10000
                }
            }
        })
    }

    async fn create(app: &Arc<App>, tenant: &atlas_domain::Tenant, account_id: u32, name: &str) -> u32 {
        let response = router(app)
            .oneshot(request(tenant, Method::POST, "/characters", Some(create_body(account_id, name))))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        body["data"]["id"].as_str().expect("id").parse().expect("numeric id")
    }

    #[tokio::test]
    async fn create_then_fetch() {
        let app = app();
        let tenant = tenant();
        let id = create(&app, &tenant, 1000, "Hero").await;

        let response = router(&app)
            .oneshot(request(&tenant, Method::GET, &format!("/characters/{id}"), None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"]["type"], "characters");
        assert_eq!(body["data"]["attributes"]["name"], "Hero");
        assert_eq!(body["data"]["attributes"]["hair"], 30030);
    }

    #[tokio::test]
    async fn blocked_name_is_a_bad_request() {
        let app = app();
        let response = router(&app)
            .oneshot(request(&tenant(), Method::POST, "/characters", Some(create_body(1000, "x!"))))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_character_is_not_found() {
        let app = app();
        let response = router(&app)
            .oneshot(request(&tenant(), Method::GET, "/characters/404", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_name_patch_is_rejected_with_stable_message() {
        let app = app();
        let tenant = tenant();
        create(&app, &tenant, 1000, "ExistingName").await;
        let second = create(&app, &tenant, 1001, "SecondName").await;

        let patch = json!({"data": {"type": "characters", "id": second.to_string(), "attributes": {"name": "ExistingName"}}});
        let response = router(&app)
            .oneshot(request(&tenant, Method::PATCH, &format!("/characters/{second}"), Some(patch)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["errors"][0]["detail"], "invalid or duplicate name");

        let stored = app
            .repositories
            .characters
            .get(&tenant, CharacterId::from_raw(second))
            .await
            .expect("get")
            .expect("character");
        assert_eq!(stored.name(), "SecondName");
    }

    #[tokio::test]
    async fn patch_changes_only_the_given_field() {
        let app = app();
        let tenant = tenant();
        let id = create(&app, &tenant, 1000, "Hero").await;

        let patch = json!({"data": {"type": "characters", "id": id.to_string(), "attributes": {"face": 20001}}});
        let response = router(&app)
            .oneshot(request(&tenant, Method::PATCH, &format!("/characters/{id}"), Some(patch)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let stored = app
            .repositories
            .characters
            .get(&tenant, CharacterId::from_raw(id))
            .await
            .expect("get")
            .expect("character");
        assert_eq!(stored.face(), 20001);
        assert_eq!(stored.hair(), 30030);
        assert_eq!(stored.name(), "Hero");
    }

    #[tokio::test]
    async fn list_filters_by_account_and_world() {
        let app = app();
        let tenant = tenant();
        create(&app, &tenant, 1000, "Alpha").await;
        create(&app, &tenant, 1001, "Beta").await;

        let response = router(&app)
            .oneshot(request(&tenant, Method::GET, "/characters?accountId=1001&worldId=0", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        let data = body["data"].as_array().expect("list");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["attributes"]["name"], "Beta");
    }

    #[tokio::test]
    async fn other_tenants_see_nothing() {
        let app = app();
        create(&app, &tenant(), 1000, "Alpha").await;

        let response = router(&app)
            .oneshot(request(&tenant(), Method::GET, "/characters", None))
            .await
            .expect("response");
        let body = json(response).await;
        assert!(body["data"].as_array().expect("list").is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_character() {
        let app = app();
        let tenant = tenant();
        let id = create(&app, &tenant, 1000, "Hero").await;

        let response = router(&app)
            .oneshot(request(&tenant, Method::DELETE, &format!("/characters/{id}"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router(&app)
            .oneshot(request(&tenant, Method::GET, &format!("/characters/{id}"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rest_round_trip_keeps_skill_points() {
        let model = CharacterRestModel {
            name: "Hero".into(),
            level: 30,
            sp: "1, 2, 3".into(),
            job_id: 110,
            ..CharacterRestModel::default()
        };
        let character = from_rest(&model);
        assert_eq!(character.sp().get(2), 3);
        assert_eq!(character.job_id(), JobId::FIGHTER);

        let resource = to_resource(&character, TemporalDatum { x: 5, y: -3, stance: 2 });
        assert_eq!(resource.attributes.x, 5);
        assert_eq!(resource.attributes.level, 30);
        assert!(resource.attributes.sp.starts_with("1, 2, 3"));
    }
}
