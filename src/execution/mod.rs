//! Step execution records and their versioned store
//!
//! - `model.rs` - business-facing `StepExecution` and its parent reference
//! - `mapper.rs` - flat document layout and conversions
//! - `dao.rs` - `StepExecutionDao` with optimistic locking

mod dao;
mod mapper;
mod model;

pub use dao::{
    DEFAULT_EXIT_DESCRIPTION_LENGTH, DEFAULT_STEP_EXECUTION_COLLECTION, DocumentStepExecutionDao,
    StepExecutionDao,
};
pub use mapper::{MUTABLE_FIELDS, StepExecutionDocument, truncate_exit_description};
pub use model::{JobExecutionRef, MAX_COUNTER, StepExecution};
