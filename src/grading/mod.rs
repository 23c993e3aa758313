//! Multi-round grading pipeline: per-job grading, bounded dispatch,
//! rounds, orchestration and consolidation.

pub mod consolidator;
pub mod dispatcher;
pub mod grader;
pub mod orchestrator;
pub mod policy;
pub mod round;
pub mod submission;

pub use dispatcher::BoundedDispatcher;
pub use grader::Grader;
pub use orchestrator::Orchestrator;
pub use policy::SelectionPolicy;
pub use submission::{Submission, SubmissionStatus};
