// src/handlers/activities.rs

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        activities::{
            ActivityListQuery, ActivityListResponse, ActivityResponse, ActivityStatsQuery, ActivityStatsResponse,
            SaveActivityPayload,
        },
        auth::ErrorBody,
    },
};

// POST /api/activities/save
#[utoipa::path(
    post,
    path = "/api/activities/save",
    tag = "Activities",
    request_body = SaveActivityPayload,
    responses(
        (status = 200, description = "Dia gravado (upsert)", body = ActivityResponse),
        (status = 400, description = "Data, tipo ou contadores inválidos", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn save_activity(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    WithRejection(Json(payload), _): WithRejection<Json<SaveActivityPayload>, AppError>,
) -> Result<Json<ActivityResponse>, AppError> {
    payload.validate()?;

    let activity = app_state.activity_service.save(user.id, None, &payload).await?;
    Ok(Json(ActivityResponse {
        message: "Activity saved successfully".into(),
        activity,
    }))
}

// PUT /api/activities/update/{date}
#[utoipa::path(
    put,
    path = "/api/activities/update/{date}",
    tag = "Activities",
    params(("date" = String, Path, description = "Dia no formato YYYY-MM-DD")),
    request_body = SaveActivityPayload,
    responses(
        (status = 200, description = "Dia gravado (upsert)", body = ActivityResponse),
        (status = 400, description = "Data inválida", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_activity(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(date): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<SaveActivityPayload>, AppError>,
) -> Result<Json<ActivityResponse>, AppError> {
    payload.validate()?;

    let activity = app_state.activity_service.save(user.id, Some(&date), &payload).await?;
    Ok(Json(ActivityResponse {
        message: "Activity saved successfully".into(),
        activity,
    }))
}

// GET /api/activities/list
#[utoipa::path(
    get,
    path = "/api/activities/list",
    tag = "Activities",
    params(ActivityListQuery),
    responses((status = 200, description = "Dias registrados, mais recentes primeiro", body = ActivityListResponse)),
    security(("api_jwt" = []))
)]
pub async fn list_activities(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ActivityListQuery>,
) -> Result<Json<ActivityListResponse>, AppError> {
    let activities = app_state
        .activity_service
        .list(
            user.id,
            query.limit,
            query.start_date.as_deref(),
            query.end_date.as_deref(),
            query.user_type.as_deref(),
        )
        .await?;

    Ok(Json(ActivityListResponse {
        message: "Activities loaded successfully".into(),
        activities,
    }))
}

// GET /api/activities/stats
#[utoipa::path(
    get,
    path = "/api/activities/stats",
    tag = "Activities",
    params(ActivityStatsQuery),
    responses(
        (status = 200, description = "Médias, totais e taxas de conversão da janela", body = ActivityStatsResponse),
        (status = 403, description = "Assinatura paga necessária", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn activity_stats(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ActivityStatsQuery>,
) -> Result<Json<ActivityStatsResponse>, AppError> {
    let (stats, window) = app_state
        .activity_service
        .stats(user.id, query.period, query.user_type.as_deref())
        .await?;

    Ok(Json(ActivityStatsResponse {
        message: "Activity statistics calculated successfully".into(),
        stats,
        period: format!("{window} days"),
    }))
}
