pub mod activity_repo;
pub mod goal_repo;
pub mod profile_repo;
pub mod subscription_event_repo;

pub use activity_repo::{ActivityFilter, ActivityStore, PgActivityRepository};
pub use goal_repo::{GoalStore, PgGoalRepository};
pub use profile_repo::{PgProfileRepository, ProfileStore};
pub use subscription_event_repo::{PgSubscriptionEventRepository, SubscriptionEventStore};
