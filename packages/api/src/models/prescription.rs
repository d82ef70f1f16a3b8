//! # Prescriptions
//!
//! A prescription is written by a doctor for a patient, optionally against an
//! appointment, and carries medicine and lab-test line items. Creation is one
//! transaction: the prescription, every line item and one pending lab order
//! per requested test are inserted together or not at all.

use chrono::{DateTime, Utc};
use domain::{Lifecycle, PrescriptionStatus};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PrescriptionMedicine {
    #[serde(default)]
    pub id: Uuid,
    #[serde(default)]
    pub prescription_id: Uuid,
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PrescriptionLabTest {
    #[serde(default)]
    pub id: Uuid,
    #[serde(default)]
    pub prescription_id: Uuid,
    pub test_name: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PrescriptionDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub prescription: Prescription,
    pub doctor_name: String,
    pub patient_name: String,
    #[sqlx(skip)]
    pub medicines: Vec<PrescriptionMedicine>,
    #[sqlx(skip)]
    pub lab_tests: Vec<PrescriptionLabTest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub medicines: Vec<PrescriptionMedicine>,
    #[serde(default)]
    pub lab_tests: Vec<PrescriptionLabTest>,
}

impl NewPrescription {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.diagnosis.trim().is_empty() {
            return Err(ApiError::bad_request("Diagnosis is required"));
        }
        if self.medicines.iter().any(|m| m.name.trim().is_empty()) {
            return Err(ApiError::bad_request("Every medicine needs a name"));
        }
        if self.lab_tests.iter().any(|t| t.test_name.trim().is_empty()) {
            return Err(ApiError::bad_request("Every lab test needs a name"));
        }
        Ok(())
    }
}

const DETAILS_SELECT: &str = r#"
    SELECT pr.*, du.name AS doctor_name, pu.name AS patient_name
    FROM prescriptions pr
    JOIN doctors d ON d.id = pr.doctor_id
    JOIN users du ON du.id = d.user_id
    JOIN patients p ON p.id = pr.patient_id
    JOIN users pu ON pu.id = p.user_id
"#;

impl Prescription {
    pub async fn create(
        pool: &PgPool,
        doctor_id: Uuid,
        clinic_id: Option<Uuid>,
        input: &NewPrescription,
    ) -> Result<PrescriptionDetails, ApiError> {
        let mut tx = pool.begin().await?;

        if let Some(appointment_id) = input.appointment_id {
            let (matches,): (bool,) = sqlx::query_as(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM appointments
                    WHERE id = $1 AND doctor_id = $2 AND patient_id = $3
                )
                "#,
            )
            .bind(appointment_id)
            .bind(doctor_id)
            .bind(input.patient_id)
            .fetch_one(&mut *tx)
            .await?;
            if !matches {
                return Err(ApiError::bad_request(
                    "Appointment does not belong to this doctor and patient",
                ));
            }
        }

        let prescription: Prescription = sqlx::query_as(
            r#"
            INSERT INTO prescriptions (patient_id, doctor_id, appointment_id, diagnosis, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.patient_id)
        .bind(doctor_id)
        .bind(input.appointment_id)
        .bind(input.diagnosis.trim())
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        let mut medicines = Vec::with_capacity(input.medicines.len());
        for medicine in &input.medicines {
            let row: PrescriptionMedicine = sqlx::query_as(
                r#"
                INSERT INTO prescription_medicines
                    (prescription_id, name, dosage, frequency, duration, instructions)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(prescription.id)
            .bind(medicine.name.trim())
            .bind(&medicine.dosage)
            .bind(&medicine.frequency)
            .bind(&medicine.duration)
            .bind(&medicine.instructions)
            .fetch_one(&mut *tx)
            .await?;
            medicines.push(row);
        }

        let mut lab_tests = Vec::with_capacity(input.lab_tests.len());
        for test in &input.lab_tests {
            let row: PrescriptionLabTest = sqlx::query_as(
                r#"
                INSERT INTO prescription_lab_tests (prescription_id, test_name, instructions)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(prescription.id)
            .bind(test.test_name.trim())
            .bind(&test.instructions)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO lab_orders (patient_id, doctor_id, clinic_id, prescription_id, test_name)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(input.patient_id)
            .bind(doctor_id)
            .bind(clinic_id)
            .bind(prescription.id)
            .bind(&row.test_name)
            .execute(&mut *tx)
            .await?;

            lab_tests.push(row);
        }

        let names: (String, String) = sqlx::query_as(
            r#"
            SELECT du.name, pu.name
            FROM doctors d JOIN users du ON du.id = d.user_id,
                 patients p JOIN users pu ON pu.id = p.user_id
            WHERE d.id = $1 AND p.id = $2
            "#,
        )
        .bind(doctor_id)
        .bind(input.patient_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            prescription_id = %prescription.id,
            medicines = medicines.len(),
            lab_tests = lab_tests.len(),
            "prescription created"
        );

        Ok(PrescriptionDetails {
            prescription,
            doctor_name: names.0,
            patient_name: names.1,
            medicines,
            lab_tests,
        })
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<PrescriptionDetails>, sqlx::Error> {
        let details: Option<PrescriptionDetails> =
            sqlx::query_as(&format!("{DETAILS_SELECT} WHERE pr.id = $1"))
                .bind(id)
                .fetch_optional(pool)
                .await?;
        match details {
            Some(details) => Ok(Some(with_items(pool, details).await?)),
            None => Ok(None),
        }
    }

    pub async fn for_patient(pool: &PgPool, patient_id: Uuid) -> Result<Vec<PrescriptionDetails>, sqlx::Error> {
        let rows = sqlx::query_as(&format!(
            "{DETAILS_SELECT} WHERE pr.patient_id = $1 ORDER BY pr.created_at DESC"
        ))
        .bind(patient_id)
        .fetch_all(pool)
        .await?;
        with_items_all(pool, rows).await
    }

    pub async fn for_doctor(pool: &PgPool, doctor_id: Uuid) -> Result<Vec<PrescriptionDetails>, sqlx::Error> {
        let rows = sqlx::query_as(&format!(
            "{DETAILS_SELECT} WHERE pr.doctor_id = $1 ORDER BY pr.created_at DESC"
        ))
        .bind(doctor_id)
        .fetch_all(pool)
        .await?;
        with_items_all(pool, rows).await
    }

    pub async fn transition(
        pool: &PgPool,
        current: &Prescription,
        to: PrescriptionStatus,
    ) -> Result<Prescription, ApiError> {
        let from = PrescriptionStatus::parse(&current.status)?;
        from.transition(to)?;

        sqlx::query_as(
            r#"
            UPDATE prescriptions SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::conflict("Prescription was updated concurrently"))
    }
}

async fn with_items(
    pool: &PgPool,
    mut details: PrescriptionDetails,
) -> Result<PrescriptionDetails, sqlx::Error> {
    let id = details.prescription.id;
    details.medicines = sqlx::query_as("SELECT * FROM prescription_medicines WHERE prescription_id = $1")
        .bind(id)
        .fetch_all(pool)
        .await?;
    details.lab_tests = sqlx::query_as("SELECT * FROM prescription_lab_tests WHERE prescription_id = $1")
        .bind(id)
        .fetch_all(pool)
        .await?;
    Ok(details)
}

async fn with_items_all(
    pool: &PgPool,
    rows: Vec<PrescriptionDetails>,
) -> Result<Vec<PrescriptionDetails>, sqlx::Error> {
    let mut out = Vec::with_capacity(rows.len());
    for details in rows {
        out.push(with_items(pool, details).await?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use serde_json::json;

    #[test]
    fn test_payload_defaults_line_items() {
        let input: NewPrescription = serde_json::from_value(json!({
            "patient_id": Uuid::nil(),
            "diagnosis": "Seasonal flu",
            "medicines": [{"name": "Paracetamol", "dosage": "500mg"}]
        }))
        .unwrap();
        assert_eq!(input.medicines.len(), 1);
        assert!(input.lab_tests.is_empty());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_blank_diagnosis_rejected() {
        let input: NewPrescription = serde_json::from_value(json!({
            "patient_id": Uuid::nil(),
            "diagnosis": "  "
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_blank_test_name_rejected() {
        let input: NewPrescription = serde_json::from_value(json!({
            "patient_id": Uuid::nil(),
            "diagnosis": "Anaemia",
            "lab_tests": [{"test_name": ""}]
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }

    fn flu_visit(patient_id: Uuid) -> NewPrescription {
        serde_json::from_value(json!({
            "patient_id": patient_id,
            "diagnosis": "Seasonal flu",
            "medicines": [
                {"name": "Paracetamol", "dosage": "500mg"},
                {"name": "Cetirizine"}
            ],
            "lab_tests": [{"test_name": "CBC"}, {"test_name": "CRP"}]
        }))
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_lab_tests_become_lab_orders(pool: PgPool) {
        let clinic = fixtures::clinic(&pool, "riverside").await;
        let doctor = fixtures::doctor(&pool, Some(clinic.id), "dr-rao").await;
        let patient = fixtures::patient(&pool, "asha").await;

        let details = Prescription::create(&pool, doctor.id, Some(clinic.id), &flu_visit(patient.id))
            .await
            .unwrap();
        assert_eq!(details.medicines.len(), 2);
        assert_eq!(details.lab_tests.len(), 2);
        assert_eq!((details.doctor_name.as_str(), details.patient_name.as_str()), ("dr-rao", "asha"));

        let pending = fixtures::count(
            &pool,
            "SELECT COUNT(*) FROM lab_orders WHERE prescription_id = $1 AND status = 'pending'",
            details.prescription.id,
        )
        .await;
        assert_eq!(pending, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_failed_create_leaves_nothing_behind(pool: PgPool) {
        let doctor = fixtures::doctor(&pool, None, "dr-rao").await;
        let patient = fixtures::patient(&pool, "asha").await;

        // The unknown clinic only fails on the lab order insert, after the
        // prescription and its line items are already written.
        let missing_clinic = Some(Uuid::new_v4());
        let err = Prescription::create(&pool, doctor.id, missing_clinic, &flu_visit(patient.id))
            .await
            .unwrap_err();
        assert_eq!(err.status_and_message().0, axum::http::StatusCode::BAD_REQUEST);

        for sql in [
            "SELECT COUNT(*) FROM prescriptions WHERE patient_id = $1",
            "SELECT COUNT(*) FROM lab_orders WHERE patient_id = $1",
            r#"SELECT COUNT(*) FROM prescription_medicines m
               JOIN prescriptions p ON p.id = m.prescription_id WHERE p.patient_id = $1"#,
        ] {
            assert_eq!(fixtures::count(&pool, sql, patient.id).await, 0, "{sql}");
        }
        let (orphans,): (i64,) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM prescription_medicines) + (SELECT COUNT(*) FROM prescription_lab_tests)",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(orphans, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_appointment_must_match(pool: PgPool) {
        let rao = fixtures::doctor(&pool, None, "dr-rao").await;
        let iyer = fixtures::doctor(&pool, None, "dr-iyer").await;
        let patient = fixtures::patient(&pool, "asha").await;
        let date = chrono::NaiveDate::from_ymd_opt(2031, 3, 3).unwrap();
        let visit = crate::models::Appointment::create(
            &pool,
            patient.id,
            None,
            &crate::models::NewAppointment {
                doctor_id: iyer.id,
                appointment_date: date,
                appointment_time: "10:00 AM".into(),
                reason: None,
                patient_id: None,
            },
            "10:00 AM",
        )
        .await
        .unwrap();

        let mut input = flu_visit(patient.id);
        input.appointment_id = Some(visit.id);
        let err = Prescription::create(&pool, rao.id, None, &input).await.unwrap_err();
        assert_eq!(err.status_and_message().0, axum::http::StatusCode::BAD_REQUEST);
        assert!(Prescription::create(&pool, iyer.id, None, &input).await.is_ok());
    }
}
