pub mod activity_service;
pub mod activity_stats;
pub mod auth;
pub mod crm_service;
pub mod export_service;
pub mod goal_service;
pub mod subscription_service;
