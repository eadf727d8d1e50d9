mod flow;
mod storage;

pub use flow::FlowState;
pub use storage::{proportional_volume, StorageState};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StateError {
    #[error("Combination index {index} is out of range for state of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Expected {expected} values (one per combination); found {found}")]
    LengthMismatch { found: usize, expected: usize },
}
