pub mod classifier;

pub use classifier::{calculate_volatility, detect_trend, Trend};
