//! Responder agents
//!
//! One handler per routing variant. All responder-internal failures are
//! converted to a textual Outcome at the agent boundary; only gateway
//! unavailability is allowed to escape as an error.

pub mod analytics;
pub mod general;
pub mod verification;

pub use analytics::AnalyticsAgent;
pub use general::GeneralAgent;
pub use verification::VerificationAgent;
