pub mod activities;
pub mod auth;
pub mod goals;
pub mod health;
pub mod highlevel;
pub mod subscriptions;
pub mod user;
