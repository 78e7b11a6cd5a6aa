// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::auth::verify_email,
        handlers::auth::get_profile,
        handlers::auth::update_profile,
        handlers::auth::update_activity_role,
        handlers::auth::register_after_payment,

        // --- Goals ---
        handlers::goals::save_goals,
        handlers::goals::update_goals,
        handlers::goals::load_goals,
        handlers::goals::delete_goals,

        // --- Activities ---
        handlers::activities::save_activity,
        handlers::activities::update_activity,
        handlers::activities::list_activities,
        handlers::activities::activity_stats,

        // --- Subscriptions ---
        handlers::subscriptions::list_plans,
        handlers::subscriptions::guest_checkout,
        handlers::subscriptions::checkout,
        handlers::subscriptions::subscription_status,
        handlers::subscriptions::billing_portal,
        handlers::subscriptions::cancel_subscription,
        handlers::subscriptions::reactivate_subscription,
        handlers::subscriptions::verify_session,
        handlers::subscriptions::stripe_webhook,

        // --- HighLevel ---
        handlers::highlevel::test_connection,
        handlers::highlevel::upsert_contact,
        handlers::highlevel::get_contact,
        handlers::highlevel::contact_tags,
        handlers::highlevel::sync_user,
        handlers::highlevel::track_subscription,
        handlers::highlevel::add_note,
        handlers::highlevel::subscription_tags,

        // --- User ---
        handlers::user::export_data,
        handlers::user::resend_verification,

        handlers::health::health_check,
    ),
    components(
        schemas(
            // --- Profile ---
            models::profile::UserType,
            models::profile::UserProfile,

            // --- Auth ---
            models::auth::RegisterPayload,
            models::auth::LoginPayload,
            models::auth::RefreshPayload,
            models::auth::EmailPayload,
            models::auth::ResetPasswordPayload,
            models::auth::UpdateProfilePayload,
            models::auth::UpdateActivityRolePayload,
            models::auth::RegisterAfterPaymentPayload,
            models::auth::MessageResponse,
            models::auth::RegisteredUser,
            models::auth::RegisterResponse,
            models::auth::SessionUser,
            models::auth::SessionTokens,
            models::auth::LoginResponse,
            models::auth::RefreshResponse,
            models::auth::ProfileResponse,
            models::auth::UpdateProfileResponse,
            models::auth::ActivityRoleResponse,
            models::auth::RegisterAfterPaymentResponse,
            models::auth::ErrorBody,

            // --- Goals ---
            models::goals::UserGoals,
            models::goals::SaveGoalsPayload,
            models::goals::GoalsResponse,

            // --- Activities ---
            models::activities::DailyActivity,
            models::activities::SaveActivityPayload,
            models::activities::ConversionRates,
            models::activities::ActivityStats,
            models::activities::ActivityResponse,
            models::activities::ActivityListResponse,
            models::activities::ActivityStatsResponse,

            // --- Subscriptions ---
            models::subscription::SubscriptionStatus,
            models::subscription::PlanType,
            models::subscription::PricingPlan,
            models::subscription::SubscriptionEventType,
            models::subscription::SubscriptionView,
            models::subscription::CheckoutPayload,
            models::subscription::VerifySessionPayload,
            models::subscription::PlansResponse,
            models::subscription::CheckoutResponse,
            models::subscription::SubscriptionStatusResponse,
            models::subscription::PortalResponse,
            models::subscription::SuccessMessage,
            models::subscription::WebhookAck,
            models::subscription::SessionSummary,
            models::subscription::VerifySessionResponse,

            // --- CRM ---
            models::crm::Contact,
            models::crm::TagSync,
            models::crm::UpsertContactPayload,
            models::crm::TrackSubscriptionPayload,
            models::crm::ContactNotePayload,
            models::crm::SubscriptionTagsPayload,
            models::crm::ConnectionResponse,
            models::crm::UpsertContactResponse,
            models::crm::ContactResponse,
            models::crm::ContactTagsResponse,
            models::crm::SyncResponse,
            models::crm::NoteResponse,
            models::crm::TrackSubscriptionResponse,
            models::crm::SubscriptionTagsResponse,

            handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Cadastro, login e perfil"),
        (name = "Goals", description = "Metas de renda por tipo de usuário"),
        (name = "Activities", description = "Registro diário do funil e estatísticas"),
        (name = "Subscriptions", description = "Planos, checkout e webhooks do Stripe"),
        (name = "HighLevel", description = "Contatos e tags no CRM"),
        (name = "User", description = "Exportação de dados e verificação de e-mail"),
        (name = "Health", description = "Verificação de disponibilidade")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
