//! # Domain rules for the clinic backend
//!
//! Everything in this crate is pure: no database, no HTTP. The `api` crate
//! calls into these modules from its handlers and models so the rules can be
//! tested without a running PostgreSQL.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`role`] | User roles and which of them may self-register |
//! | [`status`] | Lifecycles for appointments, lab orders, orders and prescriptions |
//! | [`slots`] | Appointment time formatting, schedule generation and availability |
//! | [`pricing`] | Cart line totals, order totals and stock checks |
//! | [`pagination`] | Page/limit clamping for list endpoints |
//! | [`analytics`] | Dense daily series and status breakdowns for dashboards |

pub mod analytics;
pub mod pagination;
pub mod pricing;
pub mod role;
pub mod slots;
pub mod status;

pub use analytics::{daily_series, DailyCount, StatusBreakdown};
pub use pagination::Pagination;
pub use pricing::{CartLine, PricingError};
pub use role::{Role, UnknownRole};
pub use slots::{SlotError, WeekdaySet, WorkingHours};
pub use status::{
    AppointmentStatus, LabOrderStatus, Lifecycle, OrderStatus, PrescriptionStatus, StatusError,
};
