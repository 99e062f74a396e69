//! Submission and local execution engines: the two ways a built, reconciled
//! job set is driven to completion.

pub mod local;
pub mod submission;

pub use local::{run, LocalRunFlags, LocalRunReport};
pub use submission::{submit, SubmissionFlags, SubmissionReport};
