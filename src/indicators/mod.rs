// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the signal
// scorer. Series functions return output aligned with their input, with
// `Option` marking bars where a window is not yet full so callers are forced
// to handle insufficient history.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod frame;
pub mod macd;
pub mod rolling;
pub mod rsi;
pub mod stochastic;

pub use frame::{compute_frames, IndicatorFrame};
