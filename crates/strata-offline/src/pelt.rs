// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::time::Instant;
use strata_core::{BreakpointSet, Diagnostics, PruningStats, Segmentation, StrataError};
use strata_costs::{CostL1Median, CostModel};

const DEFAULT_PENALTY: f64 = 100.0;

/// Configuration for [`Pelt`].
///
/// With `min_segment_len = 1` and `jump = 1` every partition of `[0, n)` is
/// admissible and the search is exact over all of them.
#[derive(Clone, Debug, PartialEq)]
pub struct PeltConfig {
    /// Cost charged per segment; must be finite and `>= 0.0`.
    pub penalty: f64,
    /// Lower bound on every segment's length.
    pub min_segment_len: usize,
    /// Non-terminal breakpoints are restricted to multiples of `jump`.
    pub jump: usize,
    /// Discard provably dominated predecessors. Never changes the result.
    pub prune: bool,
}

impl Default for PeltConfig {
    fn default() -> Self {
        Self {
            penalty: DEFAULT_PENALTY,
            min_segment_len: 1,
            jump: 1,
            prune: true,
        }
    }
}

impl PeltConfig {
    pub fn with_penalty(penalty: f64) -> Self {
        Self {
            penalty,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StrataError> {
        if !self.penalty.is_finite() || self.penalty < 0.0 {
            return Err(StrataError::invalid_parameter(format!(
                "PeltConfig.penalty must be finite and >= 0.0; got {}",
                self.penalty
            )));
        }
        if self.min_segment_len == 0 {
            return Err(StrataError::invalid_parameter(
                "PeltConfig.min_segment_len must be >= 1; got 0",
            ));
        }
        if self.jump == 0 {
            return Err(StrataError::invalid_parameter(
                "PeltConfig.jump must be >= 1; got 0",
            ));
        }
        Ok(())
    }
}

/// Pruned Exact Linear Time offline segmenter.
#[derive(Debug)]
pub struct Pelt<C: CostModel> {
    cost_model: C,
    config: PeltConfig,
}

impl<C: CostModel> Pelt<C> {
    pub fn new(cost_model: C, config: PeltConfig) -> Result<Self, StrataError> {
        config.validate()?;
        Ok(Self { cost_model, config })
    }

    pub fn cost_model(&self) -> &C {
        &self.cost_model
    }

    pub fn config(&self) -> &PeltConfig {
        &self.config
    }
}

#[derive(Clone, Debug)]
struct KernelResult {
    breakpoints: Vec<usize>,
    change_count: usize,
    objective: f64,
    cost_evals: usize,
    candidates_considered: usize,
    candidates_pruned: usize,
}

/// A live predecessor. Once dominated it stays usable until `retire_at`,
/// the first index at which the dominating path is itself admissible.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    tau: usize,
    retire_at: Option<usize>,
}

fn checked_counter_increment(counter: &mut usize, name: &str) -> Result<(), StrataError> {
    *counter = counter
        .checked_add(1)
        .ok_or_else(|| StrataError::numerical_issue(format!("{name} counter overflow")))?;
    Ok(())
}

fn evaluate_segment_cost<C: CostModel>(
    model: &C,
    cache: &C::Cache,
    start: usize,
    end: usize,
    cost_evals: &mut usize,
) -> Result<f64, StrataError> {
    checked_counter_increment(cost_evals, "cost_evals")?;

    let segment_cost = model.segment_cost(cache, start, end);
    if !segment_cost.is_finite() {
        return Err(StrataError::numerical_issue(format!(
            "non-finite segment cost at [{start}, {end}): {segment_cost}"
        )));
    }
    Ok(segment_cost)
}

/// Indices the DP is evaluated at: admissible breakpoints, then `n`.
fn build_targets(n: usize, min_segment_len: usize, jump: usize) -> Vec<usize> {
    let mut targets: Vec<usize> = (jump..n)
        .step_by(jump)
        .filter(|&t| t >= min_segment_len && n - t >= min_segment_len)
        .collect();
    targets.push(n);
    targets
}

fn reconstruct_breakpoints(
    n: usize,
    last_cp: &[usize],
) -> Result<(Vec<usize>, usize), StrataError> {
    let mut reverse = vec![n];
    let mut cursor = n;
    let mut hops = 0usize;

    while cursor > 0 {
        hops += 1;
        if hops > n + 1 {
            return Err(StrataError::invalid_input(
                "invalid DP backtrack state: cycle detected",
            ));
        }

        let tau = last_cp[cursor];
        if tau == usize::MAX {
            return Err(StrataError::invalid_input(format!(
                "invalid DP backtrack state: missing predecessor at t={cursor}"
            )));
        }
        if tau >= cursor {
            return Err(StrataError::invalid_input(format!(
                "invalid DP backtrack state: predecessor tau={tau} is not < t={cursor}"
            )));
        }
        if tau == 0 {
            break;
        }
        reverse.push(tau);
        cursor = tau;
    }

    reverse.reverse();
    let change_count = reverse.len().saturating_sub(1);
    Ok((reverse, change_count))
}

fn run_pelt_penalized<C: CostModel>(
    model: &C,
    cache: &C::Cache,
    n: usize,
    config: &PeltConfig,
) -> Result<KernelResult, StrataError> {
    let beta = config.penalty;
    let min_segment_len = config.min_segment_len;
    let targets = build_targets(n, min_segment_len, config.jump);

    let mut f = vec![f64::INFINITY; n + 1];
    let mut last_cp = vec![usize::MAX; n + 1];
    f[0] = -beta;
    last_cp[0] = 0;

    let mut candidates = vec![Candidate {
        tau: 0,
        retire_at: None,
    }];
    let mut cost_evals = 0usize;
    let mut considered = 0usize;
    let mut pruned = 0usize;

    for &t in &targets {
        candidates.retain(|candidate| candidate.retire_at.is_none_or(|retire| retire > t));

        let mut scored = vec![None; candidates.len()];
        let mut best_cost = f64::INFINITY;
        let mut best_tau = usize::MAX;

        for (idx, candidate) in candidates.iter().enumerate() {
            let tau = candidate.tau;
            if t <= tau || t - tau < min_segment_len {
                continue;
            }
            if !f[tau].is_finite() {
                continue;
            }

            let segment_cost = evaluate_segment_cost(model, cache, tau, t, &mut cost_evals)?;
            checked_counter_increment(&mut considered, "candidates_considered")?;

            let score_no_penalty = f[tau] + segment_cost;
            if !score_no_penalty.is_finite() {
                return Err(StrataError::numerical_issue(format!(
                    "non-finite score without penalty at t={t}, tau={tau}: F(tau)={}, segment_cost={segment_cost}",
                    f[tau]
                )));
            }

            let score = score_no_penalty + beta;
            if !score.is_finite() {
                return Err(StrataError::numerical_issue(format!(
                    "non-finite objective at t={t}, tau={tau}: F(tau)={}, segment_cost={segment_cost}, beta={beta}",
                    f[tau]
                )));
            }

            scored[idx] = Some(score_no_penalty);

            if score < best_cost || (score == best_cost && tau < best_tau) {
                best_cost = score;
                best_tau = tau;
            }
        }

        if best_tau == usize::MAX {
            return Err(StrataError::insufficient_data(format!(
                "no feasible segmentation at t={t} under min_segment_len={min_segment_len}, jump={}",
                config.jump
            )));
        }

        f[t] = best_cost;
        last_cp[t] = best_tau;

        if config.prune {
            // F(tau) + C(tau, t) > F(t) means the path through t beats tau for
            // every later end s with s - t >= min_segment_len (L1 cost is
            // superadditive under splitting). Strict so ties keep the leftmost tau.
            let retire_at = t.saturating_add(min_segment_len);
            for (candidate, score) in candidates.iter_mut().zip(&scored) {
                if let Some(score_no_penalty) = *score
                    && score_no_penalty > best_cost
                    && candidate.retire_at.is_none()
                {
                    candidate.retire_at = Some(retire_at);
                    checked_counter_increment(&mut pruned, "candidates_pruned")?;
                }
            }
        }

        if t < n {
            candidates.push(Candidate {
                tau: t,
                retire_at: None,
            });
        }
    }

    if !f[n].is_finite() {
        return Err(StrataError::insufficient_data(
            "no feasible segmentation reached terminal index n",
        ));
    }

    let (breakpoints, change_count) = reconstruct_breakpoints(n, &last_cp)?;
    Ok(KernelResult {
        breakpoints,
        change_count,
        // F(n) charges the penalty once per change point; add the first segment's.
        objective: f[n] + beta,
        cost_evals,
        candidates_considered: considered,
        candidates_pruned: pruned,
    })
}

impl<C: CostModel> Pelt<C> {
    /// Segments `values`, returning breakpoints and run diagnostics.
    ///
    /// Fails with `InsufficientData` on an empty input or when no partition
    /// satisfies `min_segment_len`/`jump`.
    pub fn detect(&self, values: &[f64]) -> Result<Segmentation, StrataError> {
        self.config.validate()?;

        let n = values.len();
        if n == 0 {
            return Err(StrataError::insufficient_data(
                "segmentation requires at least one value; got n=0",
            ));
        }
        if n < self.config.min_segment_len {
            return Err(StrataError::insufficient_data(format!(
                "n={n} is shorter than min_segment_len={}",
                self.config.min_segment_len
            )));
        }

        self.cost_model.validate(values)?;
        let cache = self.cost_model.precompute(values)?;

        let started_at = Instant::now();
        let kernel = run_pelt_penalized(&self.cost_model, &cache, n, &self.config)?;
        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);

        log::debug!(
            "pelt n={n} penalty={} -> {} change points, objective={}, cost_evals={}, pruned {}/{} candidates in {runtime_ms}ms",
            self.config.penalty,
            kernel.change_count,
            kernel.objective,
            kernel.cost_evals,
            kernel.candidates_pruned,
            kernel.candidates_considered
        );

        let mut notes = vec![format!(
            "penalty={}, min_segment_len={}, jump={}, prune={}",
            self.config.penalty, self.config.min_segment_len, self.config.jump, self.config.prune
        )];
        notes.push(format!(
            "final_objective={}, change_count={}",
            kernel.objective, kernel.change_count
        ));

        let diagnostics = Diagnostics {
            n,
            runtime_ms: Some(runtime_ms),
            notes,
            algorithm: Cow::Borrowed("pelt"),
            cost_model: Cow::Borrowed(self.cost_model.name()),
            objective: Some(kernel.objective),
            cost_evals: kernel.cost_evals,
            pruning_stats: Some(PruningStats {
                candidates_considered: kernel.candidates_considered,
                candidates_pruned: kernel.candidates_pruned,
            }),
            ..Diagnostics::default()
        };

        Ok(Segmentation {
            breakpoints: BreakpointSet::new(n, kernel.breakpoints)?,
            diagnostics,
        })
    }
}

/// Optimal L1 segmentation of `values` under `penalty`, with default constraints.
pub fn segment(values: &[f64], penalty: f64) -> Result<BreakpointSet, StrataError> {
    let detector = Pelt::new(CostL1Median::new(), PeltConfig::with_penalty(penalty))?;
    Ok(detector.detect(values)?.breakpoints)
}
