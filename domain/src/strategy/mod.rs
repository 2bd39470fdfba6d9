//! Orchestration strategies.
//!
//! - [`entities::Strategy`] — the plan for one complexity level
//! - [`selector::StrategyTable`] — total level → strategy mapping

pub mod entities;
pub mod selector;

pub use entities::{DEFAULT_CALL_TIMEOUT_MS, Strategy};
pub use selector::{CLINICAL_ADVISOR, MEDICATION_SAFETY_ADVISOR, SOAP_EDITOR, StrategyTable};
