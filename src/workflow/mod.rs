pub mod cell_ctx;
pub mod cell_flow;
pub mod retry;

pub use cell_ctx::CellCtx;
pub use cell_flow::{CellFlow, FlowOutcome};
pub use retry::{RetryDecision, RetryPolicy, RetryState, Sleeper, TokioSleeper};
