use crate::domain::recommendation::RecommendationType;
use crate::domain::stock::AnalystAction;

pub const ANALYST_WEIGHT: f64 = 0.4;
pub const FUNDAMENTAL_WEIGHT: f64 = 0.3;
pub const TARGET_WEIGHT: f64 = 0.3;
const BASE_SCORE: f64 = 50.0;

const REPUTABLE_BROKERAGES: [&str; 3] = ["goldman", "morgan", "jp"];

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Momentum score for a top gainer: ten points per percent plus a volume bonus.
pub fn gainer_score(change_percent: f64, volume: &str) -> f64 {
    let volume = volume.trim().parse::<f64>().unwrap_or(0.0);

    let bonus = if volume > 1_000_000.0 {
        20.0
    } else if volume > 500_000.0 {
        10.0
    } else if volume > 100_000.0 {
        5.0
    } else {
        0.0
    };

    clamp_score(change_percent * 10.0 + bonus)
}

/// Weighted score for a stored action, in `[0, 100]`.
pub fn action_score(action: &AnalystAction) -> f64 {
    clamp_score(
        BASE_SCORE
            + ANALYST_WEIGHT * analyst_score(action)
            + FUNDAMENTAL_WEIGHT * fundamental_score(action)
            + TARGET_WEIGHT * target_score(action),
    )
}

pub fn analyst_score(action: &AnalystAction) -> f64 {
    let mut score = match action.action.to_uppercase().as_str() {
        "BUY" | "STRONG BUY" => 40.0,
        "OUTPERFORM" | "OVERWEIGHT" | "UPGRADED BY" => 30.0,
        "INITIATED BY" if action.rating_to.to_uppercase().contains("BUY") => 35.0,
        "INITIATED BY" => 15.0,
        "HOLD" | "NEUTRAL" => 10.0,
        "UNDERPERFORM" | "UNDERWEIGHT" | "DOWNGRADED BY" => -15.0,
        "SELL" | "STRONG SELL" => -30.0,
        "TARGET LOWERED BY" | "TARGET RAISED BY" => 5.0,
        _ => 0.0,
    };

    if !action.rating_from.is_empty() && !action.rating_to.is_empty() {
        let from = action.rating_from.to_uppercase();
        let to = action.rating_to.to_uppercase();
        if from != to {
            if (from == "HOLD" || from == "NEUTRAL") && to.contains("BUY") {
                score += 15.0;
            } else if from.contains("SELL") && (to.contains("BUY") || to == "HOLD") {
                score += 20.0;
            } else if from.contains("BUY") && to.contains("SELL") {
                score -= 25.0;
            }
        }
    }

    let brokerage = action.brokerage.to_lowercase();
    if REPUTABLE_BROKERAGES.iter().any(|b| brokerage.contains(b)) {
        score += 10.0;
    }

    score
}

pub fn fundamental_score(action: &AnalystAction) -> f64 {
    let f = &action.fundamentals;
    let mut score = 0.0;

    if let Some(pe) = f.pe_ratio.filter(|pe| *pe > 0.0) {
        if pe < 15.0 {
            score += 20.0;
        } else if pe < 25.0 {
            score += 10.0;
        } else if pe > 40.0 {
            score -= 10.0;
        }
    }

    let range = (f.current_price, f.week_high_52, f.week_low_52);
    if let (Some(current), Some(high), Some(low)) = range {
        if high > low && current > 0.0 {
            let position = (current - low) / (high - low);
            if position < 0.3 {
                score += 15.0;
            } else if position > 0.8 {
                score -= 5.0;
            } else {
                score += 5.0;
            }
        }
    }

    if let Some(cap) = f.market_cap {
        if cap > 10_000_000_000 {
            score += 5.0;
        } else if cap > 2_000_000_000 {
            score += 10.0;
        } else if cap > 300_000_000 {
            score += 8.0;
        }
    }

    if f.eps.is_some_and(|eps| eps > 0.0) {
        score += 10.0;
    }

    if f.dividend_yield.is_some_and(|y| y > 0.02 && y < 0.08) {
        score += 5.0;
    }

    score
}

pub fn target_score(action: &AnalystAction) -> f64 {
    let Some(target) = target_price(action) else {
        return 0.0;
    };
    let Some(current) = action.fundamentals.current_price.filter(|p| *p > 0.0) else {
        return 0.0;
    };

    let upside = (target - current) / current;
    if upside > 0.3 {
        25.0
    } else if upside > 0.15 {
        15.0
    } else if upside > 0.05 {
        8.0
    } else if upside < -0.1 {
        -15.0
    } else {
        0.0
    }
}

/// The new target when it parses positive, otherwise the old one.
pub fn target_price(action: &AnalystAction) -> Option<f64> {
    [&action.target_to, &action.target_from]
        .into_iter()
        .map(|s| parse_price(s))
        .find(|p| *p > 0.0)
}

/// Parses a price like "$1,000.25". Anything unparseable is 0.
pub fn parse_price(s: &str) -> f64 {
    let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn tier_phrase(score: f64) -> &'static str {
    match RecommendationType::from_score(score) {
        RecommendationType::Buy => "Strong buy candidate",
        RecommendationType::Hold => "Moderate opportunity",
        RecommendationType::Watch => "Hold consideration",
    }
}

pub fn action_reason(action: &AnalystAction, score: f64) -> String {
    let mut parts = Vec::new();

    if !action.action.is_empty() {
        parts.push(format!("analyst {} recommendation", action.action.to_lowercase()));
    }
    if !action.brokerage.is_empty() {
        parts.push(format!("from {}", action.brokerage));
    }
    if !action.rating_from.is_empty()
        && !action.rating_to.is_empty()
        && action.rating_from != action.rating_to
    {
        parts.push(format!(
            "rating changed from {} to {}",
            action.rating_from, action.rating_to
        ));
    }
    if !action.target_from.is_empty() && !action.target_to.is_empty() {
        parts.push(format!(
            "price target: ${} to ${}",
            action.target_from.trim_start_matches('$'),
            action.target_to.trim_start_matches('$')
        ));
    }
    if parts.is_empty() {
        parts.push("based on current market analysis".to_string());
    }

    format!("{} {}. Score: {:.1}/100", tier_phrase(score), parts.join(" "), score)
}

pub fn gainer_reason(change_percent: f64, volume: &str) -> String {
    let volume = volume.trim();
    let volume = if volume.is_empty() { "unknown" } else { volume };
    format!(
        "Top gainer with {change_percent:.2}% increase on volume {volume}. High momentum stock."
    )
}
