mod orchestrator;
mod retry;

pub use orchestrator::{CycleReport, Pipeline};
pub use retry::RetryPolicy;
