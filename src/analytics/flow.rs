//! Flow Scoring
//!
//! Converts a wallet-category flow snapshot into a 0-100 confidence score.
//! Points are additive:
//! - Smart money: inflow (+30), 3+ wallets (+20), 5+ wallets (+10), >$100k (+15)
//! - Whales: inflow (+20), 2+ wallets (+10), 5+ wallets (+10), >$100k (+10)
//! - Public figures: inflow (+10), 1+ wallet (+5)
//! - Dominance: positive flows more than double the negative flows (+20)

use serde::{Deserialize, Serialize};

use crate::types::FlowSnapshot;

/// Maximum score after clamping
pub const MAX_FLOW_SCORE: u8 = 100;

const LARGE_FLOW_USD: f64 = 100_000.0;

/// Thresholds for the derived flow predicates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowThresholds {
    /// Minimum score for a flow to count as positive
    pub positive_min_score: u8,
    /// Minimum score for strong flow
    pub strong_min_score: u8,
    /// Minimum smart money wallets for strong flow
    pub strong_min_smart_money_wallets: u32,
    /// Smart money net flow (USD) that strong flow must exceed
    pub strong_min_smart_money_flow_usd: f64,
}

impl Default for FlowThresholds {
    fn default() -> Self {
        Self {
            positive_min_score: 50,
            strong_min_score: 70,
            strong_min_smart_money_wallets: 3,
            strong_min_smart_money_flow_usd: 50_000.0,
        }
    }
}

/// A scored flow snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAnalysis {
    /// Assigned by the repository
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub snapshot: FlowSnapshot,
    pub score: u8,
}

/// Stateless flow scorer
#[derive(Debug, Clone, Default)]
pub struct FlowScorer {
    thresholds: FlowThresholds,
}

impl FlowScorer {
    pub fn new(thresholds: FlowThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &FlowThresholds {
        &self.thresholds
    }

    /// Score a snapshot, clamped to [0, 100]
    pub fn score(&self, flow: &FlowSnapshot) -> u8 {
        let sm_flow = flow.smart_money_net_flow_usd;
        let sm_count = flow.smart_money_wallet_count;
        let whale_flow = flow.whale_net_flow_usd;
        let whale_count = flow.whale_wallet_count;
        let pf_flow = flow.public_figure_net_flow_usd;
        let pf_count = flow.public_figure_wallet_count;

        let mut score: u32 = 0;

        if sm_flow > 0.0 {
            score += 30;
        }
        if sm_count >= 3 {
            score += 20;
        }
        if sm_count >= 5 {
            score += 10;
        }

        if whale_flow > 0.0 {
            score += 20;
        }
        if whale_count >= 2 {
            score += 10;
        }
        if whale_count >= 5 {
            score += 10;
        }

        if pf_flow > 0.0 {
            score += 10;
        }
        if pf_count >= 1 {
            score += 5;
        }

        if sm_flow > LARGE_FLOW_USD {
            score += 15;
        }
        if whale_flow > LARGE_FLOW_USD {
            score += 10;
        }

        let (positive, negative) = flow.category_flows().iter().fold(
            (0.0_f64, 0.0_f64),
            |(pos, neg), &f| {
                if f > 0.0 {
                    (pos + f, neg)
                } else {
                    (pos, neg + f.abs())
                }
            },
        );
        if positive > negative * 2.0 {
            score += 20;
        }

        score.min(MAX_FLOW_SCORE as u32) as u8
    }

    /// Score a snapshot and bundle the result
    pub fn analyze(&self, snapshot: FlowSnapshot) -> FlowAnalysis {
        let score = self.score(&snapshot);
        FlowAnalysis {
            id: None,
            snapshot,
            score,
        }
    }

    /// Smart money buying, whales not selling, and a passing score
    pub fn is_positive(&self, analysis: &FlowAnalysis) -> bool {
        analysis.snapshot.smart_money_net_flow_usd > 0.0
            && analysis.snapshot.whale_net_flow_usd >= 0.0
            && analysis.score >= self.thresholds.positive_min_score
    }

    pub fn has_strong_flow(&self, analysis: &FlowAnalysis) -> bool {
        analysis.score >= self.thresholds.strong_min_score
            && analysis.snapshot.smart_money_wallet_count
                >= self.thresholds.strong_min_smart_money_wallets
            && analysis.snapshot.smart_money_net_flow_usd
                > self.thresholds.strong_min_smart_money_flow_usd
    }
}
