//! The six interceptor stages.

mod authorization;
mod cancellation;
mod panic_recovery;
mod rate_limit;
mod request_log;
mod validation;

pub use authorization::AuthorizationStage;
pub use cancellation::CancellationStage;
pub use panic_recovery::{PanicRecoveryStage, PANIC_MESSAGE};
pub use rate_limit::{RateLimitStage, Rejected, TokenBucket};
pub use request_log::RequestLogStage;
pub use validation::ValidationStage;
