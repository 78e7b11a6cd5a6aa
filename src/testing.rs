// src/testing.rs
//
// Fakes em memória dos colaboradores externos, usados pelos testes dos
// serviços e do roteador.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    clients::{
        highlevel::{CrmGateway, UpsertedContact},
        stripe::{BillingGateway, CheckoutRequest, CheckoutSession, PortalSession, StripeSubscription},
        supabase_auth::{AuthProvider, AuthProviderError},
        ClientError,
    },
    common::error::AppError,
    db::{ActivityFilter, ActivityStore, GoalStore, ProfileStore, SubscriptionEventStore},
    models::{
        activities::{ActivityCounts, DailyActivity},
        auth::{AuthIdentity, AuthSession, AuthUser, SignUpOutcome, SignUpRequest},
        crm::{Contact, ContactInput},
        goals::UserGoals,
        profile::{NewUserProfile, UserProfile, UserType},
        subscription::{NewSubscriptionEvent, SubscriptionEvent, SubscriptionStatus},
    },
};

fn store_down() -> AppError {
    AppError::InternalServerError(anyhow::anyhow!("store indisponível"))
}

fn api_down(service: &'static str) -> ClientError {
    ClientError::Api {
        service,
        status: 503,
        message: "unavailable".into(),
    }
}

pub fn profile(id: Uuid, email: &str, status: SubscriptionStatus) -> UserProfile {
    let now = Utc::now();
    UserProfile {
        id,
        email: email.to_string(),
        first_name: "Dana".into(),
        last_name: "Reyes".into(),
        user_type: UserType::Broker,
        subscription_status: status,
        stripe_customer_id: None,
        default_activity_role: UserType::Broker,
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
//  STORE
// =============================================================================

#[derive(Default)]
pub struct InMemoryProfiles {
    pub rows: Mutex<HashMap<Uuid, UserProfile>>,
    pub failing: bool,
}

impl InMemoryProfiles {
    pub fn with(profiles: Vec<UserProfile>) -> Self {
        Self {
            rows: Mutex::new(profiles.into_iter().map(|p| (p.id, p)).collect()),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn get(&self, id: Uuid) -> Option<UserProfile> {
        self.rows.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfiles {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppError> {
        if self.failing {
            return Err(store_down());
        }
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, AppError> {
        if self.failing {
            return Err(store_down());
        }
        let email = email.to_lowercase();
        Ok(self.rows.lock().unwrap().values().find(|p| p.email == email).cloned())
    }

    async fn create(&self, new: NewUserProfile) -> Result<UserProfile, AppError> {
        if self.failing {
            return Err(store_down());
        }
        let mut rows = self.rows.lock().unwrap();
        let email = new.email.to_lowercase();
        if rows.contains_key(&new.id) || rows.values().any(|p| p.email == email) {
            return Err(AppError::EmailAlreadyExists);
        }
        let now = Utc::now();
        let created = UserProfile {
            id: new.id,
            email,
            first_name: new.first_name,
            last_name: new.last_name,
            user_type: new.user_type,
            subscription_status: new.subscription_status,
            stripe_customer_id: new.stripe_customer_id,
            default_activity_role: new.default_activity_role,
            created_at: now,
            updated_at: now,
        };
        rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_names(&self, id: Uuid, first_name: &str, last_name: &str) -> Result<Option<UserProfile>, AppError> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.get_mut(&id).map(|p| {
            p.first_name = first_name.trim().to_string();
            p.last_name = last_name.trim().to_string();
            p.clone()
        }))
    }

    async fn update_activity_role(&self, id: Uuid, role: UserType) -> Result<Option<UserProfile>, AppError> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.get_mut(&id).map(|p| {
            p.default_activity_role = role;
            p.clone()
        }))
    }

    async fn set_subscription_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
        stripe_customer_id: Option<&str>,
    ) -> Result<Option<UserProfile>, AppError> {
        if self.failing {
            return Err(store_down());
        }
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.get_mut(&id).map(|p| {
            p.subscription_status = status;
            if let Some(customer) = stripe_customer_id {
                p.stripe_customer_id = Some(customer.to_string());
            }
            p.clone()
        }))
    }
}

#[derive(Default)]
pub struct InMemoryEvents {
    pub rows: Mutex<Vec<SubscriptionEvent>>,
    pub failing: bool,
}

impl InMemoryEvents {
    pub fn with(events: Vec<SubscriptionEvent>) -> Self {
        Self {
            rows: Mutex::new(events),
            failing: false,
        }
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl SubscriptionEventStore for InMemoryEvents {
    async fn append(&self, event: NewSubscriptionEvent) -> Result<SubscriptionEvent, AppError> {
        if self.failing {
            return Err(store_down());
        }
        let saved = SubscriptionEvent {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            event_type: event.event_type,
            stripe_customer_id: event.stripe_customer_id,
            stripe_subscription_id: event.stripe_subscription_id,
            plan_type: event.plan_type,
            amount: event.amount,
            currency: event.currency,
            event_data: event.event_data,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(saved.clone());
        Ok(saved)
    }

    async fn latest_subscription(&self, user_id: Uuid) -> Result<Option<SubscriptionEvent>, AppError> {
        use crate::models::subscription::SubscriptionEventType::{CheckoutCompleted, SubscriptionCreated};
        if self.failing {
            return Err(store_down());
        }
        // Ordem de inserção faz o papel de created_at
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|e| {
                e.user_id == user_id
                    && matches!(e.event_type, SubscriptionCreated | CheckoutCompleted)
                    && e.stripe_subscription_id.is_some()
            })
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryGoals {
    pub rows: Mutex<Vec<UserGoals>>,
}

#[async_trait]
impl GoalStore for InMemoryGoals {
    async fn upsert(&self, user_id: Uuid, user_type: UserType, goal_data: &Value) -> Result<UserGoals, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        if let Some(row) = rows.iter_mut().find(|g| g.user_id == user_id && g.user_type == user_type) {
            row.goal_data = goal_data.clone();
            row.updated_at = now;
            return Ok(row.clone());
        }
        let row = UserGoals {
            id: Uuid::new_v4(),
            user_id,
            user_type,
            goal_data: goal_data.clone(),
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find(&self, user_id: Uuid, user_type: Option<UserType>) -> Result<Option<UserGoals>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.user_id == user_id && user_type.is_none_or(|t| g.user_type == t))
            .max_by_key(|g| g.updated_at)
            .cloned())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<UserGoals>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, user_id: Uuid, user_type: Option<UserType>) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|g| !(g.user_id == user_id && user_type.is_none_or(|t| g.user_type == t)));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryActivities {
    pub rows: Mutex<Vec<DailyActivity>>,
}

#[async_trait]
impl ActivityStore for InMemoryActivities {
    async fn upsert(
        &self,
        user_id: Uuid,
        user_type: UserType,
        date: NaiveDate,
        counts: ActivityCounts,
    ) -> Result<DailyActivity, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        let apply = |row: &mut DailyActivity| {
            row.attempts = counts.attempts;
            row.contacts = counts.contacts;
            row.appointments = counts.appointments;
            row.contracts = counts.contracts;
            row.closings = counts.closings;
            row.updated_at = now;
        };

        if let Some(row) = rows
            .iter_mut()
            .find(|a| a.user_id == user_id && a.user_type == user_type && a.activity_date == date)
        {
            apply(row);
            return Ok(row.clone());
        }

        let mut row = DailyActivity {
            id: Uuid::new_v4(),
            user_id,
            user_type,
            activity_date: date,
            attempts: 0,
            contacts: 0,
            appointments: 0,
            contracts: 0,
            closings: 0,
            created_at: now,
            updated_at: now,
        };
        apply(&mut row);
        rows.push(row.clone());
        Ok(row)
    }

    async fn list(&self, user_id: Uuid, filter: &ActivityFilter) -> Result<Vec<DailyActivity>, AppError> {
        let mut found: Vec<DailyActivity> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter(|a| filter.user_type.is_none_or(|t| a.user_type == t))
            .filter(|a| filter.start_date.is_none_or(|d| a.activity_date >= d))
            .filter(|a| filter.end_date.is_none_or(|d| a.activity_date <= d))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.activity_date.cmp(&a.activity_date));
        found.truncate(filter.limit.max(0) as usize);
        Ok(found)
    }
}

// =============================================================================
//  AUTH
// =============================================================================

/// Tokens aceitos: `token-<uuid>`; `expired` expira; o resto é inválido.
#[derive(Default)]
pub struct FakeAuth {
    pub emails: Mutex<HashMap<Uuid, String>>,
    pub registered: Mutex<HashMap<String, (Uuid, String)>>,
}

impl FakeAuth {
    pub fn with_user(id: Uuid, email: &str) -> Self {
        let fake = Self::default();
        fake.emails.lock().unwrap().insert(id, email.to_string());
        fake
    }

    pub fn token_for(id: Uuid) -> String {
        format!("token-{id}")
    }

    fn session(&self, id: Uuid, email: &str) -> AuthSession {
        AuthSession {
            access_token: Self::token_for(id),
            refresh_token: format!("refresh-{id}"),
            expires_at: Some(Utc::now().timestamp() + 3600),
            user: AuthUser {
                id,
                email: Some(email.to_string()),
                email_confirmed_at: Some(Utc::now().to_rfc3339()),
                user_metadata: None,
            },
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    fn verify(&self, token: &str) -> Result<AuthIdentity, AuthProviderError> {
        if token == "expired" {
            return Err(AuthProviderError::Expired);
        }
        let id = token
            .strip_prefix("token-")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(AuthProviderError::Invalid)?;
        let email = self
            .emails
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(AuthProviderError::Invalid)?;
        Ok(AuthIdentity { user_id: id, email })
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, AuthProviderError> {
        let mut registered = self.registered.lock().unwrap();
        if registered.contains_key(&request.email) {
            return Err(AuthProviderError::AlreadyRegistered);
        }
        let id = Uuid::new_v4();
        registered.insert(request.email.clone(), (id, request.password));
        self.emails.lock().unwrap().insert(id, request.email.clone());
        Ok(SignUpOutcome {
            user: AuthUser {
                id,
                email: Some(request.email),
                email_confirmed_at: None,
                user_metadata: Some(request.metadata),
            },
            session: None,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError> {
        let registered = self.registered.lock().unwrap();
        match registered.get(email) {
            Some((id, stored)) if stored == password => Ok(self.session(*id, email)),
            _ => Err(AuthProviderError::InvalidCredentials),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthProviderError> {
        let id = refresh_token
            .strip_prefix("refresh-")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(AuthProviderError::Invalid)?;
        let email = self.emails.lock().unwrap().get(&id).cloned().ok_or(AuthProviderError::Invalid)?;
        Ok(self.session(id, &email))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthProviderError> {
        Ok(())
    }

    async fn send_password_reset(&self, _email: &str, _redirect_to: &str) -> Result<(), AuthProviderError> {
        Err(AuthProviderError::Rejected("User not found".into()))
    }

    async fn update_password(&self, access_token: &str, _new_password: &str) -> Result<(), AuthProviderError> {
        self.verify(access_token).map(|_| ())
    }

    async fn resend_verification(&self, _email: &str, _redirect_to: &str) -> Result<(), AuthProviderError> {
        Ok(())
    }

    async fn verify_email_otp(&self, token_hash: &str, _kind: &str) -> Result<(), AuthProviderError> {
        if token_hash == "good" {
            Ok(())
        } else {
            Err(AuthProviderError::Rejected("Token has expired or is invalid".into()))
        }
    }
}

// =============================================================================
//  BILLING
// =============================================================================

#[derive(Default)]
pub struct FakeBilling {
    pub subscriptions: Mutex<HashMap<String, StripeSubscription>>,
    pub sessions: Mutex<HashMap<String, CheckoutSession>>,
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
    pub subscription_calls: AtomicUsize,
    pub failing: bool,
}

impl FakeBilling {
    pub fn with_subscription(subscription: StripeSubscription) -> Self {
        let fake = Self::default();
        fake.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id.clone(), subscription);
        fake
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.subscription_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillingGateway for FakeBilling {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, ClientError> {
        if self.failing {
            return Err(api_down("stripe"));
        }
        let id = format!("cs_test_{}", self.checkouts.lock().unwrap().len() + 1);
        self.checkouts.lock().unwrap().push(request);
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/{id}")),
            id,
            ..Default::default()
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, ClientError> {
        if self.failing {
            return Err(api_down("stripe"));
        }
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ClientError::Api {
                service: "stripe",
                status: 404,
                message: "No such checkout.session".into(),
            })
    }

    async fn create_portal_session(&self, customer_id: &str, _return_url: &str) -> Result<PortalSession, ClientError> {
        if self.failing {
            return Err(api_down("stripe"));
        }
        Ok(PortalSession {
            url: format!("https://billing.stripe.test/{customer_id}"),
        })
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription, ClientError> {
        self.subscription_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(api_down("stripe"));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| ClientError::Api {
                service: "stripe",
                status: 404,
                message: "No such subscription".into(),
            })
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<StripeSubscription, ClientError> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions.get_mut(subscription_id).ok_or_else(|| ClientError::Api {
            service: "stripe",
            status: 404,
            message: "No such subscription".into(),
        })?;
        subscription.cancel_at_period_end = cancel;
        Ok(subscription.clone())
    }
}

// =============================================================================
//  CRM
// =============================================================================

#[derive(Default)]
pub struct FakeCrm {
    pub contacts: Mutex<HashMap<String, Contact>>,
    pub custom_fields: Mutex<HashMap<String, Map<String, Value>>>,
    pub failing: bool,
}

impl FakeCrm {
    pub fn with_contact(email: &str, tags: &[&str]) -> Self {
        let fake = Self::default();
        fake.insert(email, tags);
        fake
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn insert(&self, email: &str, tags: &[&str]) {
        let contact = Contact {
            id: format!("contact-{email}"),
            email: Some(email.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        self.contacts.lock().unwrap().insert(contact.id.clone(), contact);
    }

    pub fn tags_of(&self, email: &str) -> Vec<String> {
        let mut tags = self
            .contacts
            .lock()
            .unwrap()
            .values()
            .find(|c| c.email.as_deref() == Some(email))
            .map(|c| c.tags.clone())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.failing {
            Err(api_down("highlevel"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CrmGateway for FakeCrm {
    async fn find_contact_by_email(&self, email: &str) -> Result<Option<Contact>, ClientError> {
        self.check()?;
        let email = email.to_lowercase();
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .values()
            .find(|c| c.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(&email)))
            .cloned())
    }

    async fn get_contact_tags(&self, contact_id: &str) -> Result<Vec<String>, ClientError> {
        self.check()?;
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .get(contact_id)
            .map(|c| c.tags.clone())
            .unwrap_or_default())
    }

    async fn add_tag(&self, contact_id: &str, tag: &str) -> Result<(), ClientError> {
        self.check()?;
        if let Some(contact) = self.contacts.lock().unwrap().get_mut(contact_id) {
            if !contact.tags.iter().any(|t| t == tag) {
                contact.tags.push(tag.to_string());
            }
        }
        Ok(())
    }

    async fn remove_tag(&self, contact_id: &str, tag: &str) -> Result<(), ClientError> {
        self.check()?;
        if let Some(contact) = self.contacts.lock().unwrap().get_mut(contact_id) {
            contact.tags.retain(|t| t != tag);
        }
        Ok(())
    }

    async fn upsert_contact(&self, input: &ContactInput) -> Result<UpsertedContact, ClientError> {
        if let Some(contact) = self.find_contact_by_email(&input.email).await? {
            return Ok(UpsertedContact { contact, created: false });
        }
        self.insert(&input.email.to_lowercase(), &[]);
        let contact = self
            .find_contact_by_email(&input.email)
            .await?
            .ok_or_else(|| api_down("highlevel"))?;
        Ok(UpsertedContact { contact, created: true })
    }

    async fn update_custom_fields(&self, contact_id: &str, fields: Map<String, Value>) -> Result<(), ClientError> {
        self.check()?;
        self.custom_fields
            .lock()
            .unwrap()
            .entry(contact_id.to_string())
            .or_default()
            .extend(fields);
        Ok(())
    }

    async fn create_note(&self, contact_id: &str, body: &str) -> Result<Value, ClientError> {
        self.check()?;
        Ok(serde_json::json!({ "id": "note-1", "contactId": contact_id, "body": body }))
    }

    async fn test_connection(&self) -> Result<bool, ClientError> {
        Ok(!self.failing)
    }
}

/// Agrupa os fakes para montar serviços e o `AppState` nos testes.
pub struct Fakes {
    pub profiles: Arc<InMemoryProfiles>,
    pub events: Arc<InMemoryEvents>,
    pub goals: Arc<InMemoryGoals>,
    pub activities: Arc<InMemoryActivities>,
    pub auth: Arc<FakeAuth>,
    pub billing: Arc<FakeBilling>,
    pub crm: Arc<FakeCrm>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            profiles: Arc::new(InMemoryProfiles::default()),
            events: Arc::new(InMemoryEvents::default()),
            goals: Arc::new(InMemoryGoals::default()),
            activities: Arc::new(InMemoryActivities::default()),
            auth: Arc::new(FakeAuth::default()),
            billing: Arc::new(FakeBilling::default()),
            crm: Arc::new(FakeCrm::default()),
        }
    }
}
