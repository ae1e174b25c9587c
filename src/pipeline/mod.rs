// Discovery pipeline: plan generation, processing, assembly, and run orchestration

pub mod assembler;
pub mod orchestrator;
pub mod processing;
pub mod strategy;

pub use assembler::{AssembledRecord, Assembler, ExportRow};
pub use orchestrator::{DiscoveryRun, PlanFailure, RunOutcome, RunReport};
pub use strategy::{plans, PlanSet};
