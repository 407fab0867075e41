//! Targets that own exactly one inner target and change how events reach it

pub mod async_wrapper;
pub mod buffering;
pub mod filtering;
pub mod limiting;
pub mod retrying;
pub mod throttling;

pub use async_wrapper::{AsyncTargetConfig, AsyncTargetWrapper};
pub use buffering::{BufferOverflowAction, BufferingConfig, BufferingTargetWrapper};
pub use filtering::FilteringTargetWrapper;
pub use limiting::{LimitingConfig, LimitingTargetWrapper};
pub use retrying::{RetryingConfig, RetryingTargetWrapper};
pub use throttling::{DedupKeyMode, ThrottlingConfig, ThrottlingTargetWrapper};
