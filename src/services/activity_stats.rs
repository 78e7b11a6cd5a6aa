// src/services/activity_stats.rs
//
// Agregação das atividades diárias: médias por dia e taxas de conversão do
// funil tentativa -> contato -> reunião -> contrato -> fechamento.

use chrono::{Duration, NaiveDate};

use crate::models::activities::{ActivityStats, ConversionRates, DailyActivity};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Arredonda para uma casa decimal.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percentage(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round1(numerator as f64 / denominator as f64 * 100.0)
}

#[derive(Default)]
struct Totals {
    attempts: i64,
    contacts: i64,
    appointments: i64,
    contracts: i64,
    closings: i64,
}

impl ActivityStats {
    /// Resume os registros com `activity_date >= today - window_days`.
    /// `total_days` conta os registros mantidos, não os dias do calendário.
    pub fn summarize(records: &[DailyActivity], window_days: i64, today: NaiveDate) -> ActivityStats {
        // Janela maior que o calendário representável: mantém tudo
        let cutoff = Duration::try_days(window_days)
            .and_then(|window| today.checked_sub_signed(window))
            .unwrap_or(NaiveDate::MIN);
        let kept: Vec<&DailyActivity> = records.iter().filter(|r| r.activity_date >= cutoff).collect();

        if kept.is_empty() {
            return ActivityStats::default();
        }

        let totals = kept.iter().fold(Totals::default(), |mut acc, r| {
            acc.attempts += i64::from(r.attempts);
            acc.contacts += i64::from(r.contacts);
            acc.appointments += i64::from(r.appointments);
            acc.contracts += i64::from(r.contracts);
            acc.closings += i64::from(r.closings);
            acc
        });

        let days = kept.len() as f64;
        ActivityStats {
            total_days: kept.len() as u32,
            average_attempts: round1(totals.attempts as f64 / days),
            average_contacts: round1(totals.contacts as f64 / days),
            average_appointments: round1(totals.appointments as f64 / days),
            total_contracts: totals.contracts,
            total_closings: totals.closings,
            conversion_rates: ConversionRates {
                attempt_to_contact: percentage(totals.contacts, totals.attempts),
                contact_to_appointment: percentage(totals.appointments, totals.contacts),
                appointment_to_contract: percentage(totals.contracts, totals.appointments),
                contract_to_closing: percentage(totals.closings, totals.contracts),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::UserType;
    use chrono::Utc;
    use uuid::Uuid;

    fn day(date: NaiveDate, counts: [i32; 5]) -> DailyActivity {
        DailyActivity {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            user_type: UserType::Broker,
            activity_date: date,
            attempts: counts[0],
            contacts: counts[1],
            appointments: counts[2],
            contracts: counts[3],
            closings: counts[4],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[test]
    fn empty_input_yields_zeroes() {
        let stats = ActivityStats::summarize(&[], DEFAULT_WINDOW_DAYS, today());
        assert_eq!(stats, ActivityStats::default());
        assert_eq!(stats.conversion_rates.attempt_to_contact, 0.0);
    }

    #[test]
    fn single_day_funnel_conversions() {
        let stats = ActivityStats::summarize(&[day(today(), [10, 5, 2, 1, 1])], DEFAULT_WINDOW_DAYS, today());
        assert_eq!(stats.total_days, 1);
        assert_eq!(stats.average_attempts, 10.0);
        assert_eq!(stats.conversion_rates.attempt_to_contact, 50.0);
        assert_eq!(stats.conversion_rates.contact_to_appointment, 40.0);
        assert_eq!(stats.conversion_rates.appointment_to_contract, 50.0);
        assert_eq!(stats.conversion_rates.contract_to_closing, 100.0);
    }

    #[test]
    fn records_outside_the_window_are_ignored() {
        let records = [
            day(today(), [3, 1, 0, 0, 0]),
            day(today() - Duration::days(1), [4, 2, 1, 0, 0]),
            day(today() - Duration::days(45), [100, 100, 100, 100, 100]),
        ];
        let stats = ActivityStats::summarize(&records, DEFAULT_WINDOW_DAYS, today());
        assert_eq!(stats.total_days, 2);
        assert_eq!(stats.average_attempts, 3.5);
        assert_eq!(stats.average_contacts, 1.5);
        assert_eq!(stats.total_contracts, 0);
        // 1/3 de 100 arredondado
        assert_eq!(stats.conversion_rates.contact_to_appointment, 33.3);
        assert_eq!(stats.conversion_rates.contract_to_closing, 0.0);
    }

    #[test]
    fn window_start_is_inclusive() {
        let edge = day(today() - Duration::days(7), [1, 1, 1, 1, 1]);
        assert_eq!(ActivityStats::summarize(&[edge], 7, today()).total_days, 1);
    }

    #[test]
    fn huge_windows_keep_every_record() {
        let records = [
            day(today(), [2, 1, 0, 0, 0]),
            day(today() - Duration::days(3650), [4, 3, 0, 0, 0]),
        ];

        for window in [200_000_000, i64::MAX / 86_400 + 1, i64::MAX] {
            let stats = ActivityStats::summarize(&records, window, today());
            assert_eq!(stats.total_days, 2, "window {window}");
            assert_eq!(stats.average_attempts, 3.0);
        }
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round1(2.0 / 3.0), 0.7);
        assert_eq!(round1(12.345), 12.3);
    }
}
