// src/handlers/highlevel.rs

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::ErrorBody,
        crm::{
            available_tags, is_subscription_tag, subscription_tag, ConnectionResponse, ContactInput,
            ContactNotePayload, ContactResponse, ContactTagsResponse, NoteResponse, SubscriptionTagsPayload,
            SubscriptionTagsResponse, SyncResponse, TrackSubscriptionPayload, TrackSubscriptionResponse,
            UpsertContactPayload, UpsertContactResponse,
        },
        subscription::SubscriptionStatus,
    },
};

fn parse_status(raw: &str) -> Result<SubscriptionStatus, AppError> {
    SubscriptionStatus::parse(raw)
        .ok_or_else(|| AppError::invalid("INVALID_PLAN", format!("Unknown subscription status: {raw}")))
}

#[utoipa::path(
    get,
    path = "/api/highlevel/test",
    tag = "HighLevel",
    responses(
        (status = 200, description = "Conexão com o CRM verificada", body = ConnectionResponse),
        (status = 502, description = "CRM indisponível ou não configurado", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn test_connection(State(app_state): State<AppState>) -> Result<Json<ConnectionResponse>, AppError> {
    let ok = app_state.crm_service.test_connection().await?;
    let message = if ok {
        "HighLevel connection successful"
    } else {
        "HighLevel connection failed"
    };
    Ok(Json(ConnectionResponse {
        success: ok,
        message: message.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/highlevel/contacts",
    tag = "HighLevel",
    request_body = UpsertContactPayload,
    responses(
        (status = 200, description = "Contato criado ou atualizado com a tag de assinatura", body = UpsertContactResponse),
        (status = 400, description = "Dados inválidos", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn upsert_contact(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<UpsertContactPayload>, AppError>,
) -> Result<Json<UpsertContactResponse>, AppError> {
    payload.validate()?;

    let status = payload
        .subscription_status
        .as_deref()
        .map(parse_status)
        .transpose()?
        .unwrap_or_default();

    let input = ContactInput {
        email: payload.email,
        first_name: payload.first_name.unwrap_or_default(),
        last_name: payload.last_name.unwrap_or_default(),
        phone: payload.phone,
        user_type: payload.user_type,
        subscription_status: status,
        custom_fields: payload.custom_fields.unwrap_or_default(),
    };
    let (upserted, tag_result) = app_state.crm_service.sync_contact(input).await?;

    Ok(Json(UpsertContactResponse {
        success: true,
        contact: upserted.contact,
        tag_result,
        subscription_tag: subscription_tag(status).to_string(),
        available_tags: available_tags(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/highlevel/contacts/{email}",
    tag = "HighLevel",
    params(("email" = String, Path, description = "E-mail do contato")),
    responses(
        (status = 200, description = "Contato encontrado", body = ContactResponse),
        (status = 404, description = "Contato inexistente", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_contact(
    State(app_state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<ContactResponse>, AppError> {
    let contact = app_state.crm_service.find_contact(&email).await?;
    Ok(Json(ContactResponse { success: true, contact }))
}

#[utoipa::path(
    get,
    path = "/api/highlevel/contact-tags/{email}",
    tag = "HighLevel",
    params(("email" = String, Path, description = "E-mail do contato")),
    responses(
        (status = 200, description = "Tags do contato", body = ContactTagsResponse),
        (status = 404, description = "Contato inexistente", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn contact_tags(
    State(app_state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<ContactTagsResponse>, AppError> {
    let (contact, all_tags) = app_state.crm_service.contact_tags(&email).await?;
    let subscription_tags: Vec<String> = all_tags.iter().filter(|t| is_subscription_tag(t)).cloned().collect();

    Ok(Json(ContactTagsResponse {
        success: true,
        email: contact.email,
        contact_id: contact.id,
        has_subscription_tags: !subscription_tags.is_empty(),
        all_tags,
        subscription_tags,
    }))
}

// Sincroniza o próprio usuário a partir do perfil
#[utoipa::path(
    post,
    path = "/api/highlevel/sync-user",
    tag = "HighLevel",
    responses(
        (status = 200, description = "Usuário sincronizado com o CRM", body = SyncResponse),
        (status = 404, description = "Perfil inexistente", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn sync_user(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<SyncResponse>, AppError> {
    let profile = user
        .profile
        .ok_or_else(|| AppError::NotFound("User profile not found".into()))?;

    let input = ContactInput {
        email: profile.email.clone(),
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        phone: None,
        user_type: Some(profile.user_type.as_str().to_string()),
        subscription_status: profile.subscription_status,
        custom_fields: Default::default(),
    };
    let (upserted, tag_result) = app_state.crm_service.sync_contact(input).await?;

    tracing::info!(user_id = %profile.id, contact_id = %upserted.contact.id, "🔄 Usuário sincronizado com o CRM");
    Ok(Json(SyncResponse {
        success: true,
        message: "User synced to HighLevel successfully".into(),
        contact: upserted.contact,
        tag_result,
    }))
}

#[utoipa::path(
    post,
    path = "/api/highlevel/track-subscription",
    tag = "HighLevel",
    request_body = TrackSubscriptionPayload,
    responses(
        (status = 200, description = "Plano registrado no contato", body = TrackSubscriptionResponse),
        (status = 400, description = "Plano desconhecido", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn track_subscription(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<TrackSubscriptionPayload>, AppError>,
) -> Result<Json<TrackSubscriptionResponse>, AppError> {
    payload.validate()?;

    let tag_result = app_state
        .crm_service
        .track_subscription(&payload.email, &payload.plan_type, &payload.status)
        .await?;

    let message = if tag_result.is_some() {
        "Subscription tracked successfully"
    } else {
        "Contact not found in HighLevel"
    };
    Ok(Json(TrackSubscriptionResponse {
        success: tag_result.is_some(),
        message: message.into(),
        tag_result,
    }))
}

#[utoipa::path(
    post,
    path = "/api/highlevel/contacts/{contact_id}/notes",
    tag = "HighLevel",
    params(("contact_id" = String, Path, description = "Id do contato no CRM")),
    request_body = ContactNotePayload,
    responses((status = 200, description = "Nota criada", body = NoteResponse)),
    security(("api_jwt" = []))
)]
pub async fn add_note(
    State(app_state): State<AppState>,
    Path(contact_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<ContactNotePayload>, AppError>,
) -> Result<Json<NoteResponse>, AppError> {
    payload.validate()?;

    let note = app_state.crm_service.add_note(&contact_id, &payload.note_text).await?;
    Ok(Json(NoteResponse { success: true, note }))
}

// Com status: converge a tag. Sem status: só devolve as tags atuais.
#[utoipa::path(
    post,
    path = "/api/highlevel/subscription-tags",
    tag = "HighLevel",
    request_body = SubscriptionTagsPayload,
    responses(
        (status = 200, description = "Tags atuais e resultado da convergência", body = SubscriptionTagsResponse),
        (status = 404, description = "Contato inexistente", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn subscription_tags(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<SubscriptionTagsPayload>, AppError>,
) -> Result<Json<SubscriptionTagsResponse>, AppError> {
    payload.validate()?;

    let target = payload.subscription_status.as_deref().map(parse_status).transpose()?;
    let (contact, current_tags) = app_state.crm_service.contact_tags(&payload.email).await?;

    let tag_result = match target {
        Some(status) => Some(app_state.crm_service.converge_tags(&contact.id, status).await?),
        None => None,
    };

    Ok(Json(SubscriptionTagsResponse {
        success: true,
        contact_id: contact.id,
        email: contact.email,
        current_tags,
        tag_result,
        available_tags: available_tags(),
    }))
}
