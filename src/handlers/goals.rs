// src/handlers/goals.rs

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::{ErrorBody, MessageResponse},
        goals::{GoalTypeQuery, GoalsResponse, SaveGoalsPayload},
    },
};

async fn upsert_goals(
    app_state: &AppState,
    user_id: uuid::Uuid,
    payload: SaveGoalsPayload,
    message: &str,
) -> Result<Json<GoalsResponse>, AppError> {
    payload.validate()?;

    let goals = app_state
        .goal_service
        .save(user_id, &payload.user_type, &payload.goal_data)
        .await?;

    Ok(Json(GoalsResponse {
        message: message.to_string(),
        goals: Some(goals),
    }))
}

// POST /api/goals/save
#[utoipa::path(
    post,
    path = "/api/goals/save",
    tag = "Goals",
    request_body = SaveGoalsPayload,
    responses(
        (status = 200, description = "Metas salvas", body = GoalsResponse),
        (status = 400, description = "Tipo de usuário ou dados inválidos", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn save_goals(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    WithRejection(Json(payload), _): WithRejection<Json<SaveGoalsPayload>, AppError>,
) -> Result<Json<GoalsResponse>, AppError> {
    upsert_goals(&app_state, user.id, payload, "Goals saved successfully").await
}

// PUT /api/goals/update
#[utoipa::path(
    put,
    path = "/api/goals/update",
    tag = "Goals",
    request_body = SaveGoalsPayload,
    responses((status = 200, description = "Metas atualizadas", body = GoalsResponse)),
    security(("api_jwt" = []))
)]
pub async fn update_goals(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    WithRejection(Json(payload), _): WithRejection<Json<SaveGoalsPayload>, AppError>,
) -> Result<Json<GoalsResponse>, AppError> {
    upsert_goals(&app_state, user.id, payload, "Goals updated successfully").await
}

// GET /api/goals/load?type=
#[utoipa::path(
    get,
    path = "/api/goals/load",
    tag = "Goals",
    params(GoalTypeQuery),
    responses((status = 200, description = "Metas do tipo pedido ou as mais recentes", body = GoalsResponse)),
    security(("api_jwt" = []))
)]
pub async fn load_goals(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<GoalTypeQuery>,
) -> Result<Json<GoalsResponse>, AppError> {
    let goals = app_state.goal_service.load(user.id, query.user_type.as_deref()).await?;

    let message = if goals.is_some() {
        "Goals loaded successfully"
    } else {
        "No goals found"
    };
    Ok(Json(GoalsResponse {
        message: message.to_string(),
        goals,
    }))
}

// DELETE /api/goals/delete?type=
#[utoipa::path(
    delete,
    path = "/api/goals/delete",
    tag = "Goals",
    params(GoalTypeQuery),
    responses((status = 200, description = "Metas removidas", body = MessageResponse)),
    security(("api_jwt" = []))
)]
pub async fn delete_goals(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<GoalTypeQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    app_state.goal_service.delete(user.id, query.user_type.as_deref()).await?;
    Ok(Json(MessageResponse::new("Goals deleted successfully")))
}
