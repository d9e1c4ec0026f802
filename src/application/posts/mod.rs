//! Post persistence workflow: create, update and delete posts together with
//! their stored media.

mod commands;
mod queries;
mod service;
pub mod submission;
pub mod types;

pub use service::PostService;
pub use submission::{SubmissionGate, SubmissionState, SubmissionTarget};
pub use types::{
    CreatePostCommand, CurrentUser, DeletePostOutcome, PartialCleanupWarning, PostWorkflowError,
    UpdatePostCommand, UpdatePostOutcome,
};
