//! Poll distributions and the synthetic fallback.
//!
//! When the backend aggregation call fails, the participant still gets a
//! plausible distribution instead of an empty panel: their own option
//! receives a weighted share, rating scales get a centre-weighted curve,
//! and the rest is noise. Percentages are normalized to exactly 100 by
//! largest remainder and rows sort by descending percentage. This is a
//! deliberate product behavior; deployments that prefer honesty switch
//! it off and get a `Pending` outcome instead.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::question::{Question, QuestionKind};

/// Total synthetic votes are drawn from this range.
const SYNTH_VOTES_MIN: u32 = 20;
const SYNTH_VOTES_MAX: u32 = 70;

/// The caller's own option takes 15–40% of the synthetic total.
const SYNTH_OWN_SHARE_MIN: f64 = 0.15;
const SYNTH_OWN_SHARE_MAX: f64 = 0.40;

/// Any other option takes at most 30% of the synthetic total.
const SYNTH_OTHER_SHARE_MAX: f64 = 0.30;

/// One aggregated row of a poll distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRow {
    pub option: String,
    pub count: u32,
    pub percentage: u32,
}

/// What the participant sees after locking in a poll answer.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Distribution(Vec<PollRow>),
    /// Backend unavailable and synthesis disabled.
    Pending,
}

/// The labels a poll distribution aggregates over: rating kinds span
/// `1..=max`, choice kinds use their configured option list.
pub fn poll_options(question: &Question) -> Vec<String> {
    match &question.kind {
        QuestionKind::Rating { max } => (1..=*max).map(|n| n.to_string()).collect(),
        _ => question
            .kind
            .options()
            .map(<[String]>::to_vec)
            .unwrap_or_default(),
    }
}

/// Synthesize a distribution around the participant's chosen option.
///
/// The chosen option is always present with a nonzero count, even when
/// it is not in the configured option list ("other" answers).
pub fn synthesize_distribution(
    question: &Question,
    chosen: &str,
    rng: &mut impl Rng,
) -> Vec<PollRow> {
    let mut options = poll_options(question);
    if !options.iter().any(|o| o == chosen) {
        options.push(chosen.to_string());
    }

    let is_rating = matches!(question.kind, QuestionKind::Rating { .. });
    let total_votes = f64::from(rng.random_range(SYNTH_VOTES_MIN..SYNTH_VOTES_MAX));
    let scale = options.len() as f64;
    let middle = (scale + 1.0) / 2.0;

    let counts: Vec<u32> = options
        .iter()
        .map(|label| {
            let count = if label == chosen {
                total_votes * rng.random_range(SYNTH_OWN_SHARE_MIN..SYNTH_OWN_SHARE_MAX)
            } else if is_rating {
                // Centre-weighted curve over the numeric scale.
                match label.parse::<f64>() {
                    Ok(value) => {
                        let weight = 1.0 - ((value - middle).abs() / scale) * 0.6;
                        rng.random::<f64>() * total_votes * SYNTH_OTHER_SHARE_MAX * weight
                    }
                    Err(_) => rng.random::<f64>() * total_votes * SYNTH_OTHER_SHARE_MAX,
                }
            } else {
                rng.random::<f64>() * total_votes * SYNTH_OTHER_SHARE_MAX
            };
            count.floor() as u32
        })
        .collect();

    let percentages = largest_remainder_percentages(&counts);
    let mut rows: Vec<PollRow> = options
        .into_iter()
        .zip(counts)
        .zip(percentages)
        .map(|((option, count), percentage)| PollRow {
            option,
            count,
            percentage,
        })
        .collect();
    rows.sort_by(|a, b| b.percentage.cmp(&a.percentage));
    rows
}

/// Build display rows from backend-aggregated counts.
///
/// Percentages are recomputed from the counts so rendered rows always
/// sum to exactly 100, whatever rounding the aggregator applied.
pub fn distribution_from_counts(counts: Vec<(String, u32)>) -> Vec<PollRow> {
    let raw: Vec<u32> = counts.iter().map(|(_, c)| *c).collect();
    let percentages = largest_remainder_percentages(&raw);
    let mut rows: Vec<PollRow> = counts
        .into_iter()
        .zip(percentages)
        .map(|((option, count), percentage)| PollRow {
            option,
            count,
            percentage,
        })
        .collect();
    rows.sort_by(|a, b| b.percentage.cmp(&a.percentage));
    rows
}

/// Normalize counts into integer percentages summing to exactly 100.
fn largest_remainder_percentages(counts: &[u32]) -> Vec<u32> {
    let total: u32 = counts.iter().sum();
    if total == 0 {
        return vec![0; counts.len()];
    }

    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| f64::from(c) * 100.0 / f64::from(total))
        .collect();
    let mut floors: Vec<u32> = exact.iter().map(|e| e.floor() as u32).collect();
    let assigned: u32 = floors.iter().sum();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let rem_a = exact[a] - exact[a].floor();
        let rem_b = exact[b] - exact[b].floor();
        rem_b.total_cmp(&rem_a)
    });
    for &i in order.iter().take((100 - assigned) as usize) {
        floors[i] += 1;
    }
    floors
}
