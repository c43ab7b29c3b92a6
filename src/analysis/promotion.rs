//! Octave/meter correction ("tempo promotion")
//!
//! Evaluates the mode's promotion table in order. A rule promotes the current
//! reading `slow` to `fast = slow * factor` when:
//!
//! 1. `slow` lies in the rule's slow band
//! 2. `fast` lies in the fast band (if any) and does not exceed `max_bpm`
//! 3. `support(fast) / support(slow)` meets the rule's ratio, relaxed when the
//!    fast reading's breakbeat score clearly improved
//! 4. The meter gate agrees
//!
//! The fast reading is fine-tuned with a support-only local search, never
//! re-branched, and every rule fires at most once. Factors are > 1, so the
//! tempo only ever moves up and evaluation cannot oscillate.

use crate::analysis::refinement::{refine_harmonics, RefineScope};
use crate::analysis::result::{BeatMode, MeterEvidence};
use crate::config::{MeterGate, PromotionRule, TempoConfig};
use crate::features::meter::beat_type::BeatType;
use crate::features::meter::MeterScorer;

/// Below this the slow reading has no support to compare against
const MIN_SLOW_SUPPORT: f32 = 1e-6;

/// Result of evaluating the promotion table
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionOutcome {
    /// Final reading after every applicable promotion
    pub evidence: MeterEvidence,
    /// Names of the rules that fired, in order
    pub applied: Vec<String>,
}

/// Apply the promotion table of `mode` to a refined reading
pub fn apply_promotions(
    evidence: MeterEvidence,
    mode: BeatMode,
    scorer: &MeterScorer<'_>,
    config: &TempoConfig,
) -> PromotionOutcome {
    let mut current = evidence;
    let mut applied = Vec::new();

    for rule in config.promotions.rules_for(mode) {
        let Some(fast) = try_rule(rule, &current, mode, scorer, config) else {
            continue;
        };

        log::debug!(
            "Promotion {}: {:.2} -> {:.2} BPM (support {:.3} -> {:.3})",
            rule.name,
            current.bpm,
            fast.bpm,
            current.support,
            fast.support
        );
        current = fast;
        applied.push(rule.name.clone());

        if rule.lock {
            break;
        }
    }

    PromotionOutcome {
        evidence: current,
        applied,
    }
}

/// Evaluate one rule; returns the fine-tuned fast reading when it fires
fn try_rule(
    rule: &PromotionRule,
    slow: &MeterEvidence,
    mode: BeatMode,
    scorer: &MeterScorer<'_>,
    config: &TempoConfig,
) -> Option<MeterEvidence> {
    if !rule.slow_band.contains(slow.bpm) {
        return None;
    }

    let fast_bpm = slow.bpm * rule.factor;
    if fast_bpm > config.max_bpm || rule.fast_band.is_some_and(|band| !band.contains(fast_bpm)) {
        return None;
    }
    if slow.support <= MIN_SLOW_SUPPORT {
        return None;
    }

    let fast = refine_harmonics(fast_bpm, mode, RefineScope::FineTune, scorer, config)?;
    let ratio = fast.support / slow.support;

    let required = match rule.relaxed {
        Some(relaxed)
            if fast.breakbeat_score - slow.breakbeat_score >= relaxed.min_breakbeat_gain =>
        {
            relaxed.ratio
        }
        _ => rule.min_support_ratio,
    };

    let meter_ok = match rule.meter_gate {
        MeterGate::Any => true,
        MeterGate::EitherBreakbeat => {
            slow.beat_type == BeatType::Breakbeat || fast.beat_type == BeatType::Breakbeat
        }
        MeterGate::BothBreakbeat => {
            slow.beat_type == BeatType::Breakbeat && fast.beat_type == BeatType::Breakbeat
        }
    };

    log::debug!(
        "Rule {}: {:.2} x{:.2} -> {:.2}, ratio {:.3} (need {:.3}), meter {}",
        rule.name,
        slow.bpm,
        rule.factor,
        fast.bpm,
        ratio,
        required,
        if meter_ok { "ok" } else { "rejected" }
    );

    (ratio >= required && meter_ok).then_some(fast)
}
