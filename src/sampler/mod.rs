//! Periodic rate sampling.
//!
//! - [`selection`]: which interface(s) to watch
//! - [`detect`]: busiest-interface probing and switch hysteresis
//! - [`rates`]: delta and rate math
//! - [`engine`]: the tick state machine and run loop

pub mod detect;
pub mod engine;
pub mod rates;
pub mod selection;

pub use detect::InterfaceActivity;
pub use engine::{Phase, Sampler, TickOutcome};
pub use rates::{Perspective, Throughput};
pub use selection::SelectionPolicy;
