//! Application services: criteria, the orchestration loop, and its collaborators.

pub mod batch_coordinator;
pub mod criteria;
pub mod fix_pipeline;
pub mod orchestrator;
pub mod progress_notifier;
pub mod provenance_ledger;

pub use batch_coordinator::BatchCoordinator;
pub use criteria::CriterionSuite;
pub use fix_pipeline::FixPipeline;
pub use orchestrator::RequirementOrchestrator;
pub use progress_notifier::{ProgressNotifier, Subscription};
pub use provenance_ledger::{LedgerWriter, ProvenanceLedger};
