pub mod activities;
pub mod auth;
pub mod crm;
pub mod goals;
pub mod profile;
pub mod subscription;
