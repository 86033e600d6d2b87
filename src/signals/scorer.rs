// =============================================================================
// Signal Scorer — additive buy / sell pressure from the latest two frames
// =============================================================================
//
// Each rule adds points to exactly one side and appends a reason:
//
//   RSI         <30 → buy 25 | <40 → buy 15 | >70 → sell 25 | >60 → sell 15
//   MACD        bullish cross → buy 25 | bearish cross → sell 25
//               else above signal → buy 10 | else → sell 10
//   EMA         fast > slow → buy 15 | else → sell 15
//   Bollinger   < lower → buy 20 | > upper → sell 20
//               else < middle → sell 5 | else → buy 5
//   Stochastic  %K <20 → buy 15 | %K >80 → sell 15
//   Volume      ratio >1.5 → +10 to the side currently ahead (none on a tie)
//   Trend       uptrend → buy 10 | downtrend → sell 10
//
// A rule whose inputs are unavailable does not fire at all. Ties between the
// two totals always resolve to Hold.
// =============================================================================

use chrono::Utc;
use tracing::{debug, info};

use super::signal::{Action, Signal};
use crate::indicators::{compute_frames, IndicatorFrame};
use crate::market_data::Candle;
use crate::regime::{calculate_volatility, detect_trend, Trend};

/// Minimum bars before the scorer emits a signal at all.
pub const MIN_SIGNAL_BARS: usize = 50;

/// Either score above this on a hold is logged as a near miss in verbose mode.
const NEAR_MISS_SCORE: u32 = 40;

// ---------------------------------------------------------------------------
// Score card
// ---------------------------------------------------------------------------

/// Running totals for both sides plus the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreCard {
    pub buy_score: u32,
    pub sell_score: u32,
    pub reasons: Vec<String>,
}

impl ScoreCard {
    fn buy(&mut self, points: u32, reason: impl Into<String>) {
        self.buy_score += points;
        self.reasons.push(reason.into());
    }

    fn sell(&mut self, points: u32, reason: impl Into<String>) {
        self.sell_score += points;
        self.reasons.push(reason.into());
    }
}

/// Apply every rule to the last two frames.
pub fn score_frames(close: f64, last: &IndicatorFrame, prev: &IndicatorFrame, trend: Trend) -> ScoreCard {
    let mut card = ScoreCard::default();

    // RSI (0-25)
    if let Some(rsi) = last.rsi {
        if rsi < 30.0 {
            card.buy(25, format!("RSI oversold ({rsi:.1})"));
        } else if rsi < 40.0 {
            card.buy(15, format!("RSI low ({rsi:.1})"));
        } else if rsi > 70.0 {
            card.sell(25, format!("RSI overbought ({rsi:.1})"));
        } else if rsi > 60.0 {
            card.sell(15, format!("RSI high ({rsi:.1})"));
        }
    }

    // MACD (0-25)
    if let (Some(macd), Some(signal)) = (last.macd, last.macd_signal) {
        let prev_pair = prev.macd.zip(prev.macd_signal);
        if prev_pair.is_some_and(|(pm, ps)| pm < ps) && macd > signal {
            card.buy(25, "MACD bullish crossover");
        } else if prev_pair.is_some_and(|(pm, ps)| pm > ps) && macd < signal {
            card.sell(25, "MACD bearish crossover");
        } else if macd > signal {
            card.buy(10, "MACD above signal");
        } else {
            card.sell(10, "MACD below signal");
        }
    }

    // EMA (0-15)
    if let (Some(fast), Some(slow)) = (last.ema_fast, last.ema_slow) {
        if fast > slow {
            card.buy(15, "EMA bullish");
        } else {
            card.sell(15, "EMA bearish");
        }
    }

    // Bollinger (0-20)
    if let (Some(upper), Some(middle), Some(lower)) = (last.bb_upper, last.bb_middle, last.bb_lower) {
        if close < lower {
            card.buy(20, "Price below lower BB");
        } else if close > upper {
            card.sell(20, "Price above upper BB");
        } else if close < middle {
            card.sell(5, "Price below BB middle");
        } else {
            card.buy(5, "Price above BB middle");
        }
    }

    // Stochastic (0-15)
    if let Some(k) = last.stoch_k {
        if k < 20.0 {
            card.buy(15, format!("Stochastic oversold ({k:.1})"));
        } else if k > 80.0 {
            card.sell(15, format!("Stochastic overbought ({k:.1})"));
        }
    }

    // Volume confirmation (0-10), goes to whichever side leads so far.
    if let Some(ratio) = last.volume_ratio.filter(|r| *r > 1.5) {
        let reason = format!("High volume ({ratio:.1}x)");
        if card.buy_score > card.sell_score {
            card.buy(10, reason);
        } else if card.sell_score > card.buy_score {
            card.sell(10, reason);
        }
    }

    // Trend (0-10)
    match trend {
        Trend::Uptrend => card.buy(10, "Uptrend detected"),
        Trend::Downtrend => card.sell(10, "Downtrend detected"),
        Trend::Neutral => {}
    }

    card
}

/// Turn the two totals into an action and a confidence in [0, 100].
pub fn decide(buy_score: u32, sell_score: u32, min_confidence: u32) -> (Action, u32) {
    if buy_score > sell_score && buy_score >= min_confidence {
        (Action::Buy, buy_score.min(100))
    } else if sell_score > buy_score && sell_score >= min_confidence {
        (Action::Sell, sell_score.min(100))
    } else {
        (Action::Hold, buy_score.max(sell_score).min(100))
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Produces one [`Signal`] per instrument per cycle.
#[derive(Debug, Clone)]
pub struct SignalScorer {
    pub min_confidence: u32,
    pub verbose: bool,
}

impl SignalScorer {
    pub fn new(min_confidence: u32, verbose: bool) -> Self {
        Self {
            min_confidence,
            verbose,
        }
    }

    /// Score the latest bar of `candles` (oldest first).
    ///
    /// Returns `None` with fewer than [`MIN_SIGNAL_BARS`] candles.
    pub fn generate_signal(&self, instrument: &str, candles: &[Candle]) -> Option<Signal> {
        if candles.len() < MIN_SIGNAL_BARS {
            debug!(instrument, bars = candles.len(), "not enough history to score");
            return None;
        }

        let frames = compute_frames(candles);
        let (last_candle, last, prev) = match (candles.last(), frames.last(), frames.iter().rev().nth(1)) {
            (Some(c), Some(l), Some(p)) => (c, l, p),
            _ => return None,
        };

        let trend = detect_trend(candles, &frames);
        let volatility = calculate_volatility(candles);
        let card = score_frames(last_candle.close, last, prev, trend);
        let (action, confidence) = decide(card.buy_score, card.sell_score, self.min_confidence);

        if self.verbose {
            info!(
                instrument,
                buy = card.buy_score,
                sell = card.sell_score,
                %action,
                confidence,
                "scored"
            );
            if action == Action::Hold && (card.buy_score > NEAR_MISS_SCORE || card.sell_score > NEAR_MISS_SCORE) {
                let top: Vec<&str> = card.reasons.iter().take(3).map(String::as_str).collect();
                info!(instrument, reasons = %top.join(", "), "close to signal");
            }
        }

        Some(Signal {
            id: uuid::Uuid::new_v4().to_string(),
            instrument: instrument.to_string(),
            timestamp: Utc::now(),
            candle_time: last_candle.timestamp,
            action,
            confidence,
            reference_price: last_candle.close,
            indicators: *last,
            trend,
            volatility,
            buy_score: card.buy_score,
            sell_score: card.sell_score,
            reasons: card.reasons,
        })
    }
}

impl Default for SignalScorer {
    fn default() -> Self {
        Self::new(60, false)
    }
}
