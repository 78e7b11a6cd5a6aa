// src/routes.rs

use axum::{
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::AppState,
    docs::ApiDoc,
    handlers,
    middleware::{auth::auth_guard, subscription::require_paid},
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        tracing::warn!("⚠️ CORS_ORIGINS vazio: CORS permissivo");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "⚠️ Origem CORS inválida ignorada");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_router(app_state: AppState) -> Router {
    let guard = || axum_middleware::from_fn_with_state(app_state.clone(), auth_guard);

    // Rotas de autenticação: públicas + perfil (protegidas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/logout", post(handlers::auth::logout))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route("/reset-password", post(handlers::auth::reset_password))
        .route("/verify-email", get(handlers::auth::verify_email))
        .route("/register-after-payment", post(handlers::auth::register_after_payment))
        .merge(
            Router::new()
                .route(
                    "/profile",
                    get(handlers::auth::get_profile).put(handlers::auth::update_profile),
                )
                .route("/update-activity-role", post(handlers::auth::update_activity_role))
                .route_layer(guard()),
        );

    let goal_routes = Router::new()
        .route("/save", post(handlers::goals::save_goals))
        .route("/update", put(handlers::goals::update_goals))
        .route("/load", get(handlers::goals::load_goals))
        .route("/delete", delete(handlers::goals::delete_goals))
        .route_layer(guard());

    // `require_paid` roda depois do auth_guard (layer interno)
    let activity_routes = Router::new()
        .route("/save", post(handlers::activities::save_activity))
        .route("/update/{date}", put(handlers::activities::update_activity))
        .route("/list", get(handlers::activities::list_activities))
        .route(
            "/stats",
            get(handlers::activities::activity_stats)
                .layer(axum_middleware::from_fn_with_state(app_state.clone(), require_paid)),
        )
        .route_layer(guard());

    let subscription_routes = Router::new()
        .route("/plans", get(handlers::subscriptions::list_plans))
        .route("/guest-checkout", post(handlers::subscriptions::guest_checkout))
        .route("/webhook", post(handlers::subscriptions::stripe_webhook))
        .route("/verify-session", post(handlers::subscriptions::verify_session))
        .merge(
            Router::new()
                .route("/checkout", post(handlers::subscriptions::checkout))
                .route("/status", get(handlers::subscriptions::subscription_status))
                .route("/billing-portal", post(handlers::subscriptions::billing_portal))
                .route("/cancel", post(handlers::subscriptions::cancel_subscription))
                .route("/reactivate", post(handlers::subscriptions::reactivate_subscription))
                .route_layer(guard()),
        );

    let highlevel_routes = Router::new()
        .route("/test", get(handlers::highlevel::test_connection))
        .route("/contacts", post(handlers::highlevel::upsert_contact))
        .route("/contacts/{email}", get(handlers::highlevel::get_contact))
        .route("/contact-tags/{email}", get(handlers::highlevel::contact_tags))
        .route("/sync-user", post(handlers::highlevel::sync_user))
        .route("/track-subscription", post(handlers::highlevel::track_subscription))
        .route("/contacts/{contact_id}/notes", post(handlers::highlevel::add_note))
        .route("/subscription-tags", post(handlers::highlevel::subscription_tags))
        .route_layer(guard());

    let user_routes = Router::new()
        .route("/export", get(handlers::user::export_data))
        .route("/resend-verification", post(handlers::user::resend_verification))
        .route_layer(guard());

    let cors = cors_layer(&app_state.config.cors_origins);

    // Combina tudo no router principal
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(handlers::health::health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/goals", goal_routes)
        .nest("/api/activities", activity_routes)
        .nest("/api/subscriptions", subscription_routes)
        .nest("/api/highlevel", highlevel_routes)
        .nest("/api/user", user_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{
        clients::stripe::sign_payload,
        config::{AppConfig, Collaborators},
        models::subscription::SubscriptionStatus,
        testing::{profile, FakeAuth, Fakes, InMemoryProfiles},
    };

    const WEBHOOK_SECRET: &str = "whsec_router_test";

    fn test_config() -> AppConfig {
        AppConfig::from_lookup(|key| {
            let value = match key {
                "DATABASE_URL" => "postgres://localhost/igc_test",
                "SUPABASE_URL" => "https://project.supabase.co",
                "SUPABASE_ANON_KEY" => "anon",
                "SUPABASE_JWT_SECRET" => "jwt-secret",
                "STRIPE_SECRET_KEY" => "sk_test",
                "STRIPE_WEBHOOK_SECRET" => WEBHOOK_SECRET,
                _ => return None,
            };
            Some(value.to_string())
        })
        .unwrap()
    }

    fn app(fakes: &Fakes) -> Router {
        let collaborators = Collaborators {
            profiles: fakes.profiles.clone(),
            goals: fakes.goals.clone(),
            activities: fakes.activities.clone(),
            events: fakes.events.clone(),
            auth: fakes.auth.clone(),
            billing: fakes.billing.clone(),
            crm: fakes.crm.clone(),
        };
        build_router(AppState::from_collaborators(test_config(), collaborators))
    }

    fn fakes_with_user(id: Uuid, status: SubscriptionStatus) -> Fakes {
        Fakes {
            profiles: Arc::new(InMemoryProfiles::with(vec![profile(id, "dana@example.com", status)])),
            auth: Arc::new(FakeAuth::with_user(id, "dana@example.com")),
            ..Fakes::default()
        }
    }

    fn authed(method: &str, uri: &str, id: Uuid, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", FakeAuth::token_for(id)));
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = app(&Fakes::default())
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn protected_route_without_token_is_401() {
        let response = app(&Fakes::default())
            .oneshot(Request::get("/api/goals/load").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn expired_token_reports_token_expired() {
        let request = Request::get("/api/auth/profile")
            .header(header::AUTHORIZATION, "Bearer expired")
            .body(Body::empty())
            .unwrap();
        let response = app(&Fakes::default()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "TOKEN_EXPIRED");
    }

    #[tokio::test]
    async fn free_user_cannot_read_activity_stats() {
        let id = Uuid::new_v4();
        let fakes = fakes_with_user(id, SubscriptionStatus::Free);

        let response = app(&fakes)
            .oneshot(authed("GET", "/api/activities/stats", id, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["code"], "SUBSCRIPTION_REQUIRED");
    }

    #[tokio::test]
    async fn paid_user_gets_stats_for_the_default_window() {
        let id = Uuid::new_v4();
        let fakes = fakes_with_user(id, SubscriptionStatus::Annual);

        let response = app(&fakes)
            .oneshot(authed("GET", "/api/activities/stats", id, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["period"], "30 days");
        assert_eq!(body["stats"]["totalDays"], 0);
    }

    #[tokio::test]
    async fn goals_round_trip_through_the_router() {
        let id = Uuid::new_v4();
        let fakes = fakes_with_user(id, SubscriptionStatus::Free);
        let router = app(&fakes);

        let saved = router
            .clone()
            .oneshot(authed(
                "POST",
                "/api/goals/save",
                id,
                Some(json!({ "userType": "investor", "goalData": { "incomeGoal": 120000 } })),
            ))
            .await
            .unwrap();
        assert_eq!(saved.status(), StatusCode::OK);
        assert_eq!(json_body(saved).await["message"], "Goals saved successfully");

        let loaded = router
            .oneshot(authed("GET", "/api/goals/load?type=investor", id, None))
            .await
            .unwrap();
        let body = json_body(loaded).await;
        assert_eq!(body["message"], "Goals loaded successfully");
        assert_eq!(body["goals"]["goalData"]["incomeGoal"], 120000);
    }

    #[tokio::test]
    async fn missing_goals_answer_with_null() {
        let id = Uuid::new_v4();
        let fakes = fakes_with_user(id, SubscriptionStatus::Free);

        let response = app(&fakes)
            .oneshot(authed("GET", "/api/goals/load", id, None))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["message"], "No goals found");
        assert!(body["goals"].is_null());
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let id = Uuid::new_v4();
        let fakes = fakes_with_user(id, SubscriptionStatus::Free);
        let request = Request::post("/api/activities/save")
            .header(header::AUTHORIZATION, format!("Bearer {}", FakeAuth::token_for(id)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app(&fakes).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let request = Request::post("/api/subscriptions/webhook")
            .header("stripe-signature", "t=1,v1=00")
            .body(Body::from(r#"{"id":"evt_1","type":"ping","data":{"object":{}}}"#))
            .unwrap();

        let response = app(&Fakes::default()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "WEBHOOK_SIGNATURE");
    }

    #[tokio::test]
    async fn signed_webhook_is_acknowledged() {
        let payload = r#"{"id":"evt_2","type":"charge.refunded","data":{"object":{}}}"#;
        let signature = sign_payload(payload.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp());
        let request = Request::post("/api/subscriptions/webhook")
            .header("stripe-signature", signature)
            .body(Body::from(payload))
            .unwrap();

        let response = app(&Fakes::default()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "received": true }));
    }

    #[tokio::test]
    async fn status_is_never_cached() {
        let id = Uuid::new_v4();
        let fakes = fakes_with_user(id, SubscriptionStatus::Lifetime);

        let response = app(&fakes)
            .oneshot(authed("GET", "/api/subscriptions/status", id, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cache = response.headers()[header::CACHE_CONTROL].to_str().unwrap().to_string();
        assert!(cache.contains("no-store"));
        let body = json_body(response).await;
        assert_eq!(body["subscription"]["status"], "active");
        assert_eq!(body["subscription"]["plan"], "lifetime");
    }

    #[tokio::test]
    async fn export_is_a_csv_attachment() {
        let id = Uuid::new_v4();
        let fakes = fakes_with_user(id, SubscriptionStatus::Free);

        let response = app(&fakes)
            .oneshot(authed("GET", "/api/user/export", id, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"Income-Goal-Data-"));
        assert!(response.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    }

    #[tokio::test]
    async fn plans_are_public() {
        let response = app(&Fakes::default())
            .oneshot(Request::get("/api/subscriptions/plans").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["plans"].as_array().unwrap().len(), 3);
    }
}
