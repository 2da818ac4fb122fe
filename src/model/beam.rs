use std::cmp::Ordering;

use crate::{
    error::ServiceError,
    model::{CancellationFlag, DecodingConfig, SpecialTokens},
};

/// One decoder step of a sequence-to-sequence model.
///
/// Receives the full decoder sequence of every live beam (all of equal
/// length, each starting with the decoder start token) and returns one row of
/// next-token logits per beam, in the same order.
pub trait StepScorer {
    fn next_token_logits(&mut self, beams: &[Vec<u32>]) -> Result<Vec<Vec<f32>>, ServiceError>;
}

#[derive(Clone, Debug)]
pub struct BeamHypothesis {
    pub tokens: Vec<u32>,
    pub score: f32,
}

impl BeamHypothesis {
    /// Log-probability divided by `generated_len ^ length_penalty`; the
    /// decoder start token does not count towards the length.
    pub fn normalized_score(&self, length_penalty: f32) -> f32 {
        normalize(self.score, self.tokens.len().saturating_sub(1), length_penalty)
    }
}

fn normalize(score: f32, generated_len: usize, length_penalty: f32) -> f32 {
    if generated_len == 0 {
        return score;
    }
    score / (generated_len as f32).powf(length_penalty)
}

struct FinishedHypotheses {
    hypotheses: Vec<(f32, BeamHypothesis)>,
    length_penalty: f32,
    num_beams: usize,
}

impl FinishedHypotheses {
    fn new(num_beams: usize, length_penalty: f32) -> Self {
        Self {
            hypotheses: Vec::with_capacity(num_beams + 1),
            length_penalty,
            num_beams,
        }
    }

    fn worst_score(&self) -> f32 {
        self.hypotheses
            .last()
            .map(|(score, _)| *score)
            .unwrap_or(f32::NEG_INFINITY)
    }

    fn add(&mut self, hypothesis: BeamHypothesis) {
        if hypothesis.score == f32::NEG_INFINITY {
            return;
        }
        let score = hypothesis.normalized_score(self.length_penalty);
        if self.hypotheses.len() < self.num_beams || score > self.worst_score() {
            // Stable insert keeps earlier hypotheses ahead on ties.
            let at = self
                .hypotheses
                .iter()
                .position(|(existing, _)| score > *existing)
                .unwrap_or(self.hypotheses.len());
            self.hypotheses.insert(at, (score, hypothesis));
            self.hypotheses.truncate(self.num_beams);
        }
    }

    fn is_done(&self, early_stopping: bool, best_live_score: f32, cur_len: usize) -> bool {
        if self.hypotheses.len() < self.num_beams {
            return false;
        }
        if early_stopping {
            return true;
        }
        let highest_attainable = normalize(
            best_live_score,
            cur_len.saturating_sub(1),
            self.length_penalty,
        );
        self.worst_score() >= highest_attainable
    }

    fn into_best(self) -> Option<BeamHypothesis> {
        self.hypotheses.into_iter().next().map(|(_, h)| h)
    }
}

/// Runs beam search and returns the best sequence without the decoder start
/// token or the trailing end-of-sequence token.
pub fn beam_search<S: StepScorer + ?Sized>(
    scorer: &mut S,
    config: &DecodingConfig,
    special: SpecialTokens,
    cancel: &CancellationFlag,
) -> Result<Vec<u32>, ServiceError> {
    let num_beams = config.num_beams.max(1);
    let mut finished = FinishedHypotheses::new(num_beams, config.length_penalty);
    let mut beams = vec![BeamHypothesis {
        tokens: vec![special.decoder_start_token_id],
        score: 0.0,
    }];
    let mut done = false;

    while beams[0].tokens.len() < config.max_length {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let sequences: Vec<Vec<u32>> = beams.iter().map(|b| b.tokens.clone()).collect();
        let logits = scorer.next_token_logits(&sequences)?;
        if logits.len() != beams.len() {
            return Err(ServiceError::Inference(format!(
                "decoder returned {} logit rows for {} beams",
                logits.len(),
                beams.len()
            )));
        }

        let mut candidates: Vec<(f32, usize, u32)> =
            Vec::with_capacity(beams.len() * num_beams * 2);
        for (beam_idx, (beam, row)) in beams.iter().zip(logits).enumerate() {
            // Penalized log-probs are accumulated as-is, without renormalizing.
            let mut log_probs = log_softmax(&row);
            apply_repetition_penalty(&mut log_probs, &beam.tokens, config.repetition_penalty);
            for (token, log_prob) in top_k(&log_probs, num_beams * 2) {
                candidates.push((beam.score + log_prob, beam_idx, token));
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        candidates.truncate(num_beams * 2);

        let mut next_beams = Vec::with_capacity(num_beams);
        for (rank, (score, beam_idx, token)) in candidates.into_iter().enumerate() {
            let mut tokens = beams[beam_idx].tokens.clone();
            tokens.push(token);
            let hypothesis = BeamHypothesis { tokens, score };

            if token == special.eos_token_id {
                if rank < num_beams {
                    finished.add(hypothesis);
                }
            } else {
                next_beams.push(hypothesis);
                if next_beams.len() == num_beams {
                    break;
                }
            }
        }

        if next_beams.is_empty() {
            done = true;
            break;
        }

        let cur_len = next_beams[0].tokens.len();
        if finished.is_done(config.early_stopping, next_beams[0].score, cur_len) {
            done = true;
            break;
        }
        beams = next_beams;
    }

    if !done {
        for beam in beams {
            finished.add(beam);
        }
    }

    let best = finished
        .into_best()
        .ok_or_else(|| ServiceError::Inference("beam search produced no hypotheses".into()))?;

    let mut tokens = best.tokens;
    if tokens.first() == Some(&special.decoder_start_token_id) {
        tokens.remove(0);
    }
    if tokens.last() == Some(&special.eos_token_id) {
        tokens.pop();
    }
    Ok(tokens)
}

/// Divides positive scores and multiplies negative ones, once per distinct
/// token already present in the sequence.
pub fn apply_repetition_penalty(scores: &mut [f32], tokens: &[u32], penalty: f32) {
    if penalty == 1.0 {
        return;
    }
    let mut seen = Vec::with_capacity(tokens.len());
    for &token in tokens {
        if seen.contains(&token) {
            continue;
        }
        seen.push(token);
        if let Some(score) = scores.get_mut(token as usize) {
            if *score < 0.0 {
                *score *= penalty;
            } else {
                *score /= penalty;
            }
        }
    }
}

pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![f32::NEG_INFINITY; logits.len()];
    }
    let sum: f32 = logits.iter().map(|&l| (l - max).exp()).sum();
    let log_sum = sum.ln() + max;
    logits.iter().map(|&l| l - log_sum).collect()
}

/// The `k` highest entries as `(token, value)`, best first; lower token ids
/// win ties.
pub fn top_k(values: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut best: Vec<(u32, f32)> = Vec::with_capacity(k + 1);
    for (idx, &value) in values.iter().enumerate() {
        if value == f32::NEG_INFINITY || value.is_nan() {
            continue;
        }
        if best.len() == k && best.last().is_some_and(|&(_, worst)| value <= worst) {
            continue;
        }
        let at = best
            .iter()
            .position(|&(_, v)| value.partial_cmp(&v) == Some(Ordering::Greater))
            .unwrap_or(best.len());
        best.insert(at, (idx as u32, value));
        best.truncate(k);
    }
    best
}
