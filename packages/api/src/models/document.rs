//! Patient documents: reports, scans and other uploads referenced by URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PatientDocument {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub document_type: String,
    pub file_url: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub document_type: Option<String>,
    pub file_url: String,
    pub notes: Option<String>,
}

pub const DOCUMENT_TYPES: [&str; 5] = ["report", "scan", "prescription", "insurance", "other"];

impl NewDocument {
    pub fn document_type(&self) -> Result<String, String> {
        let kind = self
            .document_type
            .as_deref()
            .unwrap_or("other")
            .trim()
            .to_lowercase();
        if DOCUMENT_TYPES.contains(&kind.as_str()) {
            Ok(kind)
        } else {
            Err(format!("unknown document type: {kind}"))
        }
    }
}

impl PatientDocument {
    pub async fn create(
        pool: &PgPool,
        patient_id: Uuid,
        input: &NewDocument,
        document_type: &str,
    ) -> Result<PatientDocument, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO patient_documents (patient_id, title, document_type, file_url, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(patient_id)
        .bind(input.title.trim())
        .bind(document_type)
        .bind(input.file_url.trim())
        .bind(&input.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn for_patient(pool: &PgPool, patient_id: Uuid) -> Result<Vec<PatientDocument>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM patient_documents WHERE patient_id = $1 ORDER BY created_at DESC",
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<PatientDocument>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM patient_documents WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid, patient_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM patient_documents WHERE id = $1 AND patient_id = $2")
            .bind(id)
            .bind(patient_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(kind: Option<&str>) -> NewDocument {
        NewDocument {
            title: "X-ray".into(),
            document_type: kind.map(String::from),
            file_url: "https://files.example/x.png".into(),
            notes: None,
        }
    }

    #[test]
    fn test_document_type() {
        assert_eq!(doc(None).document_type().unwrap(), "other");
        assert_eq!(doc(Some(" Scan ")).document_type().unwrap(), "scan");
        assert!(doc(Some("selfie")).document_type().is_err());
    }
}
