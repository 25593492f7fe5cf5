use axum::Json;
use axum::extract::Path;
use axum::routing::{delete, patch, post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::services::{StatusView, SyncOutcome, SyncTrigger};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct EnabledRequest {
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct EnabledResponse {
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<SyncOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NetworkRequest {
    online: bool,
}

#[derive(Debug, Deserialize)]
struct VerifyDobRequest {
    dob: String,
}

#[derive(Debug, Serialize)]
struct VerifyDobResponse {
    valid: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sync", post(sync_now))
        .route("/sync/status", get(sync_status))
        .route("/sync/enabled", put(set_enabled))
        .route("/sync/history", get(sync_history))
        .route("/network", post(report_network))
        .route("/profiles", get(list_profiles).post(create_profile))
        .route("/profiles/{id}/touch", post(touch_profile))
        .route("/profiles/{id}/verify", post(verify_profile))
        .route("/profiles/{id}/courses", get(list_courses))
        .route("/courses", post(create_course))
        .route("/courses/{id}", patch(update_course).delete(delete_course))
        .route("/courses/{id}/games", get(list_games))
        .route("/courses/{id}/games/latest", get(latest_game))
        .route("/games", post(create_game))
        .route("/games/{id}", delete(delete_game))
        .route("/games/{id}/complete", post(complete_game))
        .route("/games/{id}/scores", get(list_scores))
        .route("/scores", post(record_score))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn sync_now(State(state): State<AppState>) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = state.scheduler.trigger_manual("Manual sync").await?;
    Ok(Json(outcome))
}

async fn sync_status(State(state): State<AppState>) -> Json<StatusView> {
    Json(state.status.borrow().clone())
}

async fn set_enabled(
    State(state): State<AppState>,
    Json(req): Json<EnabledRequest>,
) -> Json<EnabledResponse> {
    let engine = state.scheduler.engine();
    if !req.enabled {
        engine.disable().await;
        return Json(EnabledResponse {
            enabled: false,
            outcome: None,
            error: None,
        });
    }

    // Enabling sticks even when the initial sync fails.
    match engine.enable().await {
        Ok(outcome) => Json(EnabledResponse {
            enabled: true,
            outcome: Some(outcome),
            error: None,
        }),
        Err(e) => {
            warn!("Initial sync failed: {}", e);
            Json(EnabledResponse {
                enabled: true,
                outcome: None,
                error: Some(e.to_string()),
            })
        }
    }
}

async fn sync_history(State(state): State<AppState>) -> Json<Vec<SyncTrigger>> {
    Json(state.scheduler.history())
}

async fn report_network(
    State(state): State<AppState>,
    Json(req): Json<NetworkRequest>,
) -> StatusCode {
    state.scheduler.set_online(req.online);
    StatusCode::NO_CONTENT
}

async fn list_profiles(State(state): State<AppState>) -> Result<Json<Vec<Profile>>, AppError> {
    let profiles = repository::fetch_profiles(&state.db).await?;
    Ok(Json(profiles))
}

async fn create_profile(
    State(state): State<AppState>,
    Json(req): Json<NewProfileRequest>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let profile = repository::insert_profile(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn touch_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if repository::touch_profile(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// Checks a date of birth against the profile's stored hash.
async fn verify_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<VerifyDobRequest>,
) -> Result<Json<VerifyDobResponse>, AppError> {
    let profile = repository::find_profile_by_id(&state.db, &id)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or(AppError::NotFound)?;
    Ok(Json(VerifyDobResponse {
        valid: profile.verify_dob(&req.dob),
    }))
}

async fn list_courses(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = repository::fetch_courses_for_profile(&state.db, &profile_id).await?;
    Ok(Json(courses))
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<NewCourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let course = repository::insert_course(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCourseRequest>,
) -> Result<Json<Course>, AppError> {
    let course = repository::update_course(&state.db, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if repository::delete_course(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn list_games(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<Game>>, AppError> {
    let games = repository::fetch_games_for_course(&state.db, &course_id).await?;
    Ok(Json(games))
}

async fn latest_game(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Game>, AppError> {
    let game = repository::latest_game_for_course(&state.db, &course_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(game))
}

async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<NewGameRequest>,
) -> Result<(StatusCode, Json<Game>), AppError> {
    let game = repository::insert_game(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

async fn delete_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if repository::delete_game(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// Completes the game, then schedules the game-completion sync without
/// waiting for it.
async fn complete_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CompleteGameRequest>,
) -> Result<Json<Game>, AppError> {
    let game = repository::complete_game(&state.db, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    state.scheduler.game_completed(&game.id);
    Ok(Json(game))
}

async fn list_scores(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<Vec<Score>>, AppError> {
    let scores = repository::fetch_scores_for_game(&state.db, &game_id).await?;
    Ok(Json(scores))
}

async fn record_score(
    State(state): State<AppState>,
    Json(req): Json<RecordScoreRequest>,
) -> Result<Json<Score>, AppError> {
    let score = repository::record_score(&state.db, req).await?;
    Ok(Json(score))
}
