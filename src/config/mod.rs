pub mod triage;

pub use triage::TriageConfig;
