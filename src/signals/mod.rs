// =============================================================================
// Signals Module
// =============================================================================
//
// Turns the latest indicator frames into a discrete trading verdict:
// - Additive buy / sell scoring with a reason trail
// - Threshold decision (ties always hold)

pub mod scorer;
pub mod signal;

pub use scorer::{SignalScorer, MIN_SIGNAL_BARS};
pub use signal::{Action, Signal};
