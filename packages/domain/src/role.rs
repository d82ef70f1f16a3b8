//! User roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role stored in the `users.role` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    ClinicAdmin,
    Receptionist,
    Nurse,
    Lab,
    Pharmacy,
    Admin,
}

/// Returned when a string does not name a role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Patient,
        Role::Doctor,
        Role::ClinicAdmin,
        Role::Receptionist,
        Role::Nurse,
        Role::Lab,
        Role::Pharmacy,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::ClinicAdmin => "clinic_admin",
            Role::Receptionist => "receptionist",
            Role::Nurse => "nurse",
            Role::Lab => "lab",
            Role::Pharmacy => "pharmacy",
            Role::Admin => "admin",
        }
    }

    /// Roles that can sign up on their own. Staff accounts are created by a clinic admin
    /// and platform admins are provisioned out of band.
    pub fn self_registrable(&self) -> bool {
        matches!(self, Role::Patient | Role::Doctor | Role::ClinicAdmin)
    }

    /// Roles backed by a row in the `staff` table.
    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            Role::Receptionist | Role::Nurse | Role::Lab | Role::Pharmacy
        )
    }

    /// Roles that operate inside a single clinic.
    pub fn is_clinic_scoped(&self) -> bool {
        self.is_staff() || matches!(self, Role::ClinicAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        assert_eq!("patient".parse::<Role>().unwrap(), Role::Patient);
        assert_eq!("clinic-admin".parse::<Role>().unwrap(), Role::ClinicAdmin);
        assert_eq!(" Pharmacy ".parse::<Role>().unwrap(), Role::Pharmacy);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_round_trip_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Role::ClinicAdmin).unwrap();
        assert_eq!(json, "\"clinic_admin\"");
    }

    #[test]
    fn test_self_registration() {
        assert!(Role::Patient.self_registrable());
        assert!(Role::ClinicAdmin.self_registrable());
        assert!(!Role::Nurse.self_registrable());
        assert!(!Role::Admin.self_registrable());
    }

    #[test]
    fn test_staff_roles() {
        assert!(Role::Lab.is_staff());
        assert!(!Role::Doctor.is_staff());
        assert!(Role::ClinicAdmin.is_clinic_scoped());
        assert!(!Role::Patient.is_clinic_scoped());
    }
}
