//! Multi-scope, multi-window quota enforcement.
//!
//! # Quota Module
//!
//! A [`Quota`] is a named credit counter with an optional limit, a calendar
//! [`QuotaWindow`] and a [`BreachAction`]. The scope a quota applies to is encoded
//! in its name (see [`QuotaScope`]): `global`, `backend:<id>`, `caller:<id>`,
//! `project:<id>`.
//!
//! The [`QuotaManager`] owns every counter and performs check-then-reserve as one
//! indivisible step: either every matching quota is charged, or none is.
//!
//! ```rust
//! use ai_governance::clock::system_clock;
//! use ai_governance::quota::{BreachAction, QuotaConfig, QuotaManager, QuotaScope, QuotaWindow};
//! use rust_decimal_macros::dec;
//!
//! let manager = QuotaManager::new(system_clock());
//! manager.register(QuotaConfig::new("global", Some(dec!(10)), QuotaWindow::Day, BreachAction::HardStop))?;
//!
//! let scopes = vec![QuotaScope::Global.key(), QuotaScope::Caller("alice".into()).key()];
//! let outcome = manager.check_and_reserve(dec!(4), &scopes)?;
//! assert!(outcome.is_reserved());
//! # Ok::<(), ai_governance::Error>(())
//! ```

mod manager;
mod types;
mod window;

pub use manager::{QuotaManager, QuotaRejection, Reservation, ReservationGuard, ReservationOutcome};
pub use types::{BreachAction, Quota, QuotaConfig, QuotaScope, QuotaStatus};
pub use window::QuotaWindow;
