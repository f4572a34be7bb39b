// Job execution
//
// - task: the observable record of one job
// - controller: single-flight spawn, output streaming, cancellation
// - kill: process tree termination

pub mod controller;
pub mod kill;
pub mod task;

pub use controller::{ControllerState, Job, JobController, JobFailure, JobOutcome, JobRequest};
pub use task::{TaskRecord, TaskSnapshot, TaskStatus};
