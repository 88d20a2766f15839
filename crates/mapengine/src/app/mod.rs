mod input;
mod loop_runner;
mod metrics;
pub mod rendering;

pub(crate) use input::ActionStates;
pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
