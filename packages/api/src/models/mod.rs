//! # Data models and queries
//!
//! One module per table (or small family of tables). Each holds the row
//! struct deriving [`sqlx::FromRow`], the request payloads that create or
//! update it, and async query functions over a `&PgPool` or an open
//! transaction. Joined read models (`*Details`, `*Profile`) flatten the row
//! and add the names a client shows next to it.

pub mod analytics;
mod appointment;
mod bookmark;
mod cart;
mod clinic;
mod device;
mod doctor;
mod document;
mod lab_order;
mod medicine;
mod order;
mod patient;
mod prescription;
mod reminder;
mod staff;
mod user;

pub use appointment::{
    Appointment, AppointmentDetails, AppointmentFilter, AppointmentOwner, NewAppointment,
};
pub use bookmark::Bookmark;
pub use cart::{Cart, CartEntry};
pub use clinic::{Clinic, ClinicSummary, UpdateClinic};
pub use device::{Device, NewDevice};
pub use doctor::{Doctor, DoctorFilter, DoctorInput, DoctorProfile, Schedule};
pub use document::{NewDocument, PatientDocument};
pub use lab_order::{LabOrder, LabOrderDetails, LabOrderOwner, LabResult, NewLabOrder};
pub use medicine::{Medicine, MedicineFilter, MedicineInput};
pub use order::{Checkout, Order, OrderDetails, OrderItem};
pub use patient::{Patient, PatientProfile, PatientScope, UpdatePatient};
pub use prescription::{
    NewPrescription, Prescription, PrescriptionDetails, PrescriptionLabTest, PrescriptionMedicine,
};
pub use reminder::{parse_repeat, Reminder, ReminderInput};
pub use staff::{Staff, StaffMember, UpdateStaff};
pub use user::{normalize_email, NewUser, User, UserInfo};

/// `%term%` for ILIKE with LIKE wildcards escaped, or `None` for blank input.
pub(crate) fn search_pattern(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern() {
        assert_eq!(search_pattern("  "), None);
        assert_eq!(search_pattern(" ana ").as_deref(), Some("%ana%"));
        assert_eq!(search_pattern("50%_off").as_deref(), Some("%50\\%\\_off%"));
    }
}

/// Rows for database tests. Every helper takes a unique `tag` so one test can
/// create several accounts of the same kind.
#[cfg(test)]
pub(crate) mod fixtures {
    use domain::Role;
    use rust_decimal::Decimal;
    use sqlx::PgPool;
    use uuid::Uuid;

    use super::*;

    pub async fn user(pool: &PgPool, role: Role, tag: &str) -> User {
        User::create(
            pool,
            &NewUser {
                email: format!("{tag}@example.com"),
                name: tag.to_string(),
                phone: None,
                role,
                password_hash: "not-a-real-hash".into(),
            },
        )
        .await
        .unwrap()
    }

    pub async fn clinic(pool: &PgPool, tag: &str) -> Clinic {
        let owner = user(pool, Role::ClinicAdmin, tag).await;
        Clinic::create(pool, owner.id, &format!("{tag} clinic")).await.unwrap()
    }

    /// A doctor on the default Monday to Friday schedule.
    pub async fn doctor(pool: &PgPool, clinic_id: Option<Uuid>, tag: &str) -> Doctor {
        let account = user(pool, Role::Doctor, tag).await;
        let input = DoctorInput::default();
        let schedule = input.schedule(None).unwrap();
        Doctor::create(pool, account.id, clinic_id, &input, &schedule)
            .await
            .unwrap()
    }

    pub async fn patient(pool: &PgPool, tag: &str) -> Patient {
        let account = user(pool, Role::Patient, tag).await;
        Patient::ensure_for_user(pool, account.id).await.unwrap()
    }

    pub async fn medicine(pool: &PgPool, name: &str, price: Decimal, stock: i32) -> Medicine {
        let input = MedicineInput {
            stock: Some(stock),
            ..MedicineInput::default()
        };
        Medicine::create(pool, None, name, price, &input).await.unwrap()
    }

    pub async fn count(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
        let (n,): (i64,) = sqlx::query_as(sql).bind(id).fetch_one(pool).await.unwrap();
        n
    }
}
