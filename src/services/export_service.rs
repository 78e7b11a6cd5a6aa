// src/services/export_service.rs
//
// Exportação dos dados do usuário em CSV legível (resumo, metas, atividades).

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{activities::DailyActivity, goals::UserGoals, profile::UserProfile},
    services::{activity_service::ActivityService, goal_service::GoalService},
};

pub struct CsvExport {
    pub filename: String,
    pub content: String,
}

#[derive(Clone)]
pub struct ExportService {
    goals: GoalService,
    activities: ActivityService,
}

impl ExportService {
    pub fn new(goals: GoalService, activities: ActivityService) -> Self {
        Self { goals, activities }
    }

    pub async fn export_csv(&self, user_id: Uuid, profile: Option<&UserProfile>) -> Result<CsvExport, AppError> {
        let goals = self.goals.list(user_id).await?;
        let activities = self.activities.all(user_id).await?;
        let today = Utc::now().date_naive();

        tracing::info!(
            user_id = %user_id,
            goals = goals.len(),
            activities = activities.len(),
            "📊 Exportação CSV preparada"
        );

        Ok(CsvExport {
            filename: format!("Income-Goal-Data-{today}.csv"),
            content: render_csv(profile, &goals, &activities, today),
        })
    }
}

// Campo entre aspas, com aspas internas duplicadas
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub fn render_csv(
    profile: Option<&UserProfile>,
    goals: &[UserGoals],
    activities: &[DailyActivity],
    today: NaiveDate,
) -> String {
    let mut rows: Vec<String> = vec![
        "Income Goal Calculator - Data Export".into(),
        format!("Export Date: {today}"),
        format!(
            "Account Created: {}",
            profile
                .map(|p| p.created_at.date_naive().to_string())
                .unwrap_or_else(|| "N/A".into())
        ),
        format!(
            "Subscription: {}",
            profile.map(|p| p.subscription_status.as_str()).unwrap_or("free")
        ),
        format!("Total Goals: {}", goals.len()),
        format!("Total Activities: {}", activities.len()),
        String::new(),
    ];

    if !goals.is_empty() {
        rows.push("=== YOUR INCOME GOALS ===".into());
        rows.push("User Type,Goal Data,Last Updated".into());
        for goal in goals {
            rows.push(
                [
                    quoted(goal.user_type.as_str()),
                    quoted(&goal.goal_data.to_string()),
                    quoted(&goal.updated_at.date_naive().to_string()),
                ]
                .join(","),
            );
        }
        rows.push(String::new());
    }

    rows.push("=== YOUR ACTIVITY TRACKING ===".into());
    if activities.is_empty() {
        rows.push("No activities recorded yet. Start tracking your daily activities to see your progress!".into());
    } else {
        rows.push("Date,User Type,Attempts,Contacts,Appointments,Contracts,Closings,Total".into());
        for a in activities {
            let total: i64 = [a.attempts, a.contacts, a.appointments, a.contracts, a.closings]
                .into_iter()
                .map(i64::from)
                .sum();
            let fields = [
                a.activity_date.to_string(),
                a.user_type.as_str().to_string(),
                a.attempts.to_string(),
                a.contacts.to_string(),
                a.appointments.to_string(),
                a.contracts.to_string(),
                a.closings.to_string(),
                total.to_string(),
            ];
            rows.push(fields.iter().map(|f| quoted(f)).collect::<Vec<_>>().join(","));
        }
    }

    rows.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::UserType;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[test]
    fn empty_export_has_summary_and_placeholder() {
        let csv = render_csv(None, &[], &[], today());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Income Goal Calculator - Data Export");
        assert_eq!(lines[1], "Export Date: 2025-06-30");
        assert_eq!(lines[2], "Account Created: N/A");
        assert!(!csv.contains("YOUR INCOME GOALS"));
        assert!(csv.ends_with("see your progress!"));
    }

    #[test]
    fn goal_json_is_escaped_and_activities_are_totalled() {
        let goal = UserGoals {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            user_type: UserType::Broker,
            goal_data: json!({ "income": 250000 }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let activity = DailyActivity {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            user_type: UserType::Investor,
            activity_date: today(),
            attempts: 10,
            contacts: 5,
            appointments: 2,
            contracts: 1,
            closings: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let csv = render_csv(None, &[goal], &[activity], today());
        assert!(csv.contains(r#""broker","{""income"":250000}""#));
        assert!(csv.contains(r#""2025-06-30","investor","10","5","2","1","1","19""#));
        assert!(csv.contains("Total Goals: 1"));
    }

    #[test]
    fn totals_do_not_overflow_with_maximal_counters() {
        let activity = DailyActivity {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            user_type: UserType::Broker,
            activity_date: today(),
            attempts: i32::MAX,
            contacts: i32::MAX,
            appointments: i32::MAX,
            contracts: i32::MAX,
            closings: i32::MAX,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let csv = render_csv(None, &[], &[activity], today());
        let expected = i64::from(i32::MAX) * 5;
        assert!(csv.contains(&format!(r#","{}""#, expected)));
    }
}
