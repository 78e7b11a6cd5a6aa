// src/services/activity_service.rs

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        validation::{parse_activity_date, user_type_or_default},
    },
    db::{ActivityFilter, ActivityStore},
    models::activities::{ActivityStats, DailyActivity, SaveActivityPayload},
    services::activity_stats::DEFAULT_WINDOW_DAYS,
};

pub const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 1000;
// Histórico máximo considerado pelas estatísticas
const STATS_HISTORY_ROWS: i64 = 365;

#[derive(Clone)]
pub struct ActivityService {
    repo: Arc<dyn ActivityStore>,
}

impl ActivityService {
    pub fn new(repo: Arc<dyn ActivityStore>) -> Self {
        Self { repo }
    }

    /// Grava o dia (upsert por usuário, tipo e data). `path_date` vem de
    /// `PUT /update/{date}` e tem precedência sobre a data do corpo.
    pub async fn save(
        &self,
        user_id: Uuid,
        path_date: Option<&str>,
        payload: &SaveActivityPayload,
    ) -> Result<DailyActivity, AppError> {
        let raw_date = path_date
            .or(payload.date.as_deref())
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| AppError::invalid("VALIDATION_ERROR", "Date is required"))?;
        let date = parse_activity_date(raw_date)?;
        let user_type = user_type_or_default(payload.user_type.as_deref())?;

        let activity = self.repo.upsert(user_id, user_type, date, payload.counts()).await?;
        tracing::info!(
            user_id = %user_id,
            date = %date,
            user_type = user_type.as_str(),
            "📊 Atividade diária salva"
        );
        Ok(activity)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        user_type: Option<&str>,
    ) -> Result<Vec<DailyActivity>, AppError> {
        let filter = ActivityFilter {
            user_type: user_type.map(|t| user_type_or_default(Some(t))).transpose()?,
            start_date: parse_optional_date(start_date)?,
            end_date: parse_optional_date(end_date)?,
            limit: limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT),
        };
        self.repo.list(user_id, &filter).await
    }

    /// Estatísticas da janela `period` (em dias, padrão 30) até hoje.
    pub async fn stats(
        &self,
        user_id: Uuid,
        period: Option<i64>,
        user_type: Option<&str>,
    ) -> Result<(ActivityStats, i64), AppError> {
        let window = period.filter(|p| *p > 0).unwrap_or(DEFAULT_WINDOW_DAYS);
        let filter = ActivityFilter {
            user_type: user_type.map(|t| user_type_or_default(Some(t))).transpose()?,
            start_date: None,
            end_date: None,
            limit: STATS_HISTORY_ROWS,
        };
        let records = self.repo.list(user_id, &filter).await?;
        let today = Utc::now().date_naive();
        Ok((ActivityStats::summarize(&records, window, today), window))
    }

    pub async fn all(&self, user_id: Uuid) -> Result<Vec<DailyActivity>, AppError> {
        let filter = ActivityFilter {
            user_type: None,
            start_date: None,
            end_date: None,
            limit: i64::MAX,
        };
        self.repo.list(user_id, &filter).await
    }
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    raw.filter(|d| !d.is_empty()).map(parse_activity_date).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryActivities;

    fn payload(date: &str, attempts: i32, user_type: Option<&str>) -> SaveActivityPayload {
        SaveActivityPayload {
            date: Some(date.into()),
            attempts: Some(attempts),
            contacts: Some(1),
            appointments: None,
            contracts: None,
            closings: None,
            user_type: user_type.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn upsert_is_keyed_on_user_type_and_date() {
        let repo = Arc::new(InMemoryActivities::default());
        let service = ActivityService::new(repo.clone());
        let user = Uuid::new_v4();

        service.save(user, None, &payload("2025-03-14", 4, None)).await.unwrap();
        let second = service.save(user, None, &payload("2025-03-14", 9, Some("broker"))).await.unwrap();
        service.save(user, None, &payload("2025-03-14", 2, Some("investor"))).await.unwrap();

        assert_eq!(second.attempts, 9);
        assert_eq!(second.appointments, 0);
        assert_eq!(repo.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn path_date_wins_over_body_date() {
        let service = ActivityService::new(Arc::new(InMemoryActivities::default()));
        let saved = service
            .save(Uuid::new_v4(), Some("2025-04-01"), &payload("2025-03-14", 1, None))
            .await
            .unwrap();
        assert_eq!(saved.activity_date, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
    }

    #[tokio::test]
    async fn missing_or_bad_date_is_rejected() {
        let service = ActivityService::new(Arc::new(InMemoryActivities::default()));
        let mut body = payload("not-a-date", 1, None);
        let bad = service.save(Uuid::new_v4(), None, &body).await;
        assert!(matches!(bad, Err(AppError::InvalidInput { code: "INVALID_DATE", .. })));

        body.date = None;
        let missing = service.save(Uuid::new_v4(), None, &body).await;
        assert!(matches!(missing, Err(AppError::InvalidInput { code: "VALIDATION_ERROR", .. })));
    }

    #[tokio::test]
    async fn list_filters_by_date_range_newest_first() {
        let service = ActivityService::new(Arc::new(InMemoryActivities::default()));
        let user = Uuid::new_v4();
        for date in ["2025-03-01", "2025-03-10", "2025-03-20"] {
            service.save(user, None, &payload(date, 1, None)).await.unwrap();
        }

        let listed = service
            .list(user, None, Some("2025-03-05"), Some("2025-03-31"), None)
            .await
            .unwrap();
        let dates: Vec<String> = listed.iter().map(|a| a.activity_date.to_string()).collect();
        assert_eq!(dates, vec!["2025-03-20", "2025-03-10"]);
    }

    #[tokio::test]
    async fn stats_use_recent_days_only() {
        let service = ActivityService::new(Arc::new(InMemoryActivities::default()));
        let user = Uuid::new_v4();
        let today = Utc::now().date_naive();
        service.save(user, None, &payload(&today.to_string(), 10, None)).await.unwrap();
        let old = today - chrono::Duration::days(90);
        service.save(user, None, &payload(&old.to_string(), 50, None)).await.unwrap();

        let (stats, window) = service.stats(user, None, None).await.unwrap();
        assert_eq!(window, 30);
        assert_eq!(stats.total_days, 1);
        assert_eq!(stats.average_attempts, 10.0);
    }
}
