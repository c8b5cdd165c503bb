pub mod batch;
pub mod scheduler;

pub use batch::{Batch, BatchBuffer};
pub use scheduler::FlushTimer;
