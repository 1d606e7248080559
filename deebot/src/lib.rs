//! The robot-side integration daemon: polling orchestration, runtime state
//! derivation, the persisted runtime cache, the mdsctl local-socket client
//! and the typed upward facade consumed by the capability layer.

mod events;
mod mdsctl;
#[cfg(test)]
mod test_support;
mod orchestrator;
mod presets;
mod robot;
mod runtime_cache;
mod services;
mod state;

pub use events::*;
pub use mdsctl::*;
pub use orchestrator::*;
pub use presets::*;
pub use robot::*;
pub use runtime_cache::*;
pub use services::*;
pub use state::*;
