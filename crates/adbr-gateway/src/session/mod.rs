//! Session management

mod plan;
mod reconciler;
mod table;

pub use plan::{plan, ReconcilePlan};
pub use reconciler::{InitError, PassError, PassReport, ReconcilerSettings, SessionReconciler};
pub use table::{Session, SessionTable};
