//! # Dashboard analytics
//!
//! Read-only aggregates over a trailing window of `days` days ending today.
//! Raw counts come from SQL; [`domain::daily_series`] fills missing days and
//! [`domain::StatusBreakdown`] turns status counts into totals and a
//! completion rate.

use chrono::{Days, NaiveDate};
use domain::{daily_series, DailyCount, StatusBreakdown};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

pub const DEFAULT_DAYS: u32 = 30;
pub const MAX_DAYS: u32 = 365;

#[derive(Debug, Clone, Serialize)]
pub struct ClinicAnalytics {
    pub days: u32,
    pub appointments: StatusBreakdown,
    pub daily_appointments: Vec<DailyCount>,
    pub doctors: i64,
    pub staff: i64,
    pub patients: i64,
    pub consultation_revenue: Decimal,
    pub pending_lab_orders: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorAnalytics {
    pub days: u32,
    pub appointments: StatusBreakdown,
    pub daily_appointments: Vec<DailyCount>,
    pub unique_patients: i64,
    pub prescriptions: i64,
    pub today_queue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleCount {
    pub role: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminAnalytics {
    pub users: Vec<RoleCount>,
    pub clinics: i64,
    pub appointments: StatusBreakdown,
    pub orders: i64,
    pub order_revenue: Decimal,
}

/// Clamp a requested window to `1..=MAX_DAYS`.
pub fn window(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
}

/// First day of a `days`-long window ending on `today`.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(today)
}

pub async fn clinic(
    pool: &PgPool,
    clinic_id: Uuid,
    today: NaiveDate,
    days: u32,
) -> Result<ClinicAnalytics, sqlx::Error> {
    let start = window_start(today, days);

    let statuses: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT status, COUNT(*) FROM appointments
        WHERE clinic_id = $1 AND appointment_date BETWEEN $2 AND $3
        GROUP BY status
        "#,
    )
    .bind(clinic_id)
    .bind(start)
    .bind(today)
    .fetch_all(pool)
    .await?;

    let daily: Vec<(NaiveDate, i64)> = sqlx::query_as(
        r#"
        SELECT appointment_date, COUNT(*) FROM appointments
        WHERE clinic_id = $1 AND appointment_date BETWEEN $2 AND $3
        GROUP BY appointment_date
        "#,
    )
    .bind(clinic_id)
    .bind(start)
    .bind(today)
    .fetch_all(pool)
    .await?;

    let (doctors, staff, patients, revenue, pending_labs): (i64, i64, i64, Option<Decimal>, i64) =
        sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM doctors WHERE clinic_id = $1),
                (SELECT COUNT(*) FROM staff WHERE clinic_id = $1),
                (SELECT COUNT(DISTINCT patient_id) FROM appointments WHERE clinic_id = $1),
                (SELECT SUM(d.consultation_fee) FROM appointments a
                    JOIN doctors d ON d.id = a.doctor_id
                    WHERE a.clinic_id = $1 AND a.status = 'completed'
                      AND a.appointment_date BETWEEN $2 AND $3),
                (SELECT COUNT(*) FROM lab_orders
                    WHERE clinic_id = $1 AND status NOT IN ('completed', 'cancelled'))
            "#,
        )
        .bind(clinic_id)
        .bind(start)
        .bind(today)
        .fetch_one(pool)
        .await?;

    Ok(ClinicAnalytics {
        days,
        appointments: StatusBreakdown::from_counts(&statuses),
        daily_appointments: daily_series(start, days, &daily),
        doctors,
        staff,
        patients,
        consultation_revenue: revenue.unwrap_or_default(),
        pending_lab_orders: pending_labs,
    })
}

pub async fn doctor(
    pool: &PgPool,
    doctor_id: Uuid,
    today: NaiveDate,
    days: u32,
) -> Result<DoctorAnalytics, sqlx::Error> {
    let start = window_start(today, days);

    let statuses: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT status, COUNT(*) FROM appointments
        WHERE doctor_id = $1 AND appointment_date BETWEEN $2 AND $3
        GROUP BY status
        "#,
    )
    .bind(doctor_id)
    .bind(start)
    .bind(today)
    .fetch_all(pool)
    .await?;

    let daily: Vec<(NaiveDate, i64)> = sqlx::query_as(
        r#"
        SELECT appointment_date, COUNT(*) FROM appointments
        WHERE doctor_id = $1 AND appointment_date BETWEEN $2 AND $3
        GROUP BY appointment_date
        "#,
    )
    .bind(doctor_id)
    .bind(start)
    .bind(today)
    .fetch_all(pool)
    .await?;

    let (unique_patients, prescriptions, today_queue): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(DISTINCT patient_id) FROM appointments WHERE doctor_id = $1),
            (SELECT COUNT(*) FROM prescriptions
                WHERE doctor_id = $1 AND created_at::DATE BETWEEN $2 AND $3),
            (SELECT COUNT(*) FROM appointments
                WHERE doctor_id = $1 AND appointment_date = $3
                  AND status IN ('scheduled', 'in-progress'))
        "#,
    )
    .bind(doctor_id)
    .bind(start)
    .bind(today)
    .fetch_one(pool)
    .await?;

    Ok(DoctorAnalytics {
        days,
        appointments: StatusBreakdown::from_counts(&statuses),
        daily_appointments: daily_series(start, days, &daily),
        unique_patients,
        prescriptions,
        today_queue,
    })
}

pub async fn admin(pool: &PgPool) -> Result<AdminAnalytics, sqlx::Error> {
    let users = super::User::count_by_role(pool)
        .await?
        .into_iter()
        .map(|(role, count)| RoleCount { role, count })
        .collect();

    let statuses: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM appointments GROUP BY status")
            .fetch_all(pool)
            .await?;

    let (clinics, orders, revenue): (i64, i64, Option<Decimal>) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM clinics),
            (SELECT COUNT(*) FROM orders),
            (SELECT SUM(total_amount) FROM orders WHERE status = 'delivered')
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(AdminAnalytics {
        users,
        clinics,
        appointments: StatusBreakdown::from_counts(&statuses),
        orders,
        order_revenue: revenue.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_clamps() {
        assert_eq!(window(None), 30);
        assert_eq!(window(Some(0)), 1);
        assert_eq!(window(Some(10_000)), 365);
    }

    #[test]
    fn test_window_start_includes_today() {
        let today = NaiveDate::from_ymd_opt(2030, 3, 10).unwrap();
        assert_eq!(window_start(today, 1), today);
        assert_eq!(
            window_start(today, 7),
            NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
        );
    }
}
