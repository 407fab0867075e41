//! Targets that own several inner targets and route or broadcast among them

pub mod fallback;
pub mod random;
pub mod round_robin;
pub mod split;

pub use fallback::{FallbackConfig, FallbackGroup};
pub use random::RandomGroup;
pub use round_robin::RoundRobinGroup;
pub use split::SplitGroup;
