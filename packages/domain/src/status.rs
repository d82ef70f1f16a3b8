//! # Status lifecycles
//!
//! Appointments, lab orders, pharmacy orders and prescriptions each carry a
//! string `status` column. The enums here are the single source of truth for
//! which strings are valid and which moves between them are allowed.
//!
//! | Entity | Flow |
//! |--------|------|
//! | [`AppointmentStatus`] | `scheduled` → `in-progress` → `completed`, with `cancelled` reachable from both open states |
//! | [`LabOrderStatus`] | `pending` → `sample-collected` → `processing` → `completed`, `cancelled` from any open state |
//! | [`OrderStatus`] | `pending` → `confirmed` → `shipped` → `delivered`, `cancelled` before shipping |
//! | [`PrescriptionStatus`] | `active` → `completed` or `cancelled` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("unknown {entity} status: {value}")]
    Unknown { entity: &'static str, value: String },
    #[error("cannot move {entity} from {from} to {to}")]
    Transition {
        entity: &'static str,
        from: String,
        to: String,
    },
}

/// Shared behaviour of the status enums.
pub trait Lifecycle: Copy + PartialEq + Sized + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;
    /// Every variant, in lifecycle order.
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// States reachable in one step.
    fn next(&self) -> &'static [Self];

    fn is_terminal(&self) -> bool {
        self.next().is_empty()
    }

    fn can_transition_to(&self, to: Self) -> bool {
        self.next().contains(&to)
    }

    /// Validate a move and hand back the target state.
    fn transition(self, to: Self) -> Result<Self, StatusError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(StatusError::Transition {
                entity: Self::ENTITY,
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn parse(value: &str) -> Result<Self, StatusError> {
        let value = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.as_str() == value)
            .ok_or_else(|| StatusError::Unknown {
                entity: Self::ENTITY,
                value,
            })
    }
}

macro_rules! impl_str_traits {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = StatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty as Lifecycle>::parse(s)
            }
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl Lifecycle for AppointmentStatus {
    const ENTITY: &'static str = "appointment";
    const ALL: &'static [Self] = &[
        Self::Scheduled,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn next(&self) -> &'static [Self] {
        match self {
            Self::Scheduled => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }
}

impl AppointmentStatus {
    /// Whether the appointment still occupies its slot.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl_str_traits!(AppointmentStatus);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabOrderStatus {
    Pending,
    SampleCollected,
    Processing,
    Completed,
    Cancelled,
}

impl Lifecycle for LabOrderStatus {
    const ENTITY: &'static str = "lab order";
    const ALL: &'static [Self] = &[
        Self::Pending,
        Self::SampleCollected,
        Self::Processing,
        Self::Completed,
        Self::Cancelled,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::SampleCollected => "sample-collected",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn next(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::SampleCollected, Self::Cancelled],
            Self::SampleCollected => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }
}

impl_str_traits!(LabOrderStatus);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl Lifecycle for OrderStatus {
    const ENTITY: &'static str = "order";
    const ALL: &'static [Self] = &[
        Self::Pending,
        Self::Confirmed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    fn next(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered],
            Self::Delivered | Self::Cancelled => &[],
        }
    }
}

impl OrderStatus {
    /// Cancelling puts the reserved quantities back on the shelf.
    pub fn restores_stock(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl_str_traits!(OrderStatus);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrescriptionStatus {
    Active,
    Completed,
    Cancelled,
}

impl Lifecycle for PrescriptionStatus {
    const ENTITY: &'static str = "prescription";
    const ALL: &'static [Self] = &[Self::Active, Self::Completed, Self::Cancelled];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn next(&self) -> &'static [Self] {
        match self {
            Self::Active => &[Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }
}

impl_str_traits!(PrescriptionStatus);
