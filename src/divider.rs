//! Column-to-worker assignment for the conversion phase.
//!
//! The first round is assigned round-robin. The following rounds, up to a
//! cap on rebalancing rounds, use longest-processing-time-first packing over
//! the per-column times measured in the previous round. After the cap the
//! assignment is frozen.
//!
//! ```
//! use ironload::divider::balance;
//! use std::time::Duration;
//!
//! let ms = Duration::from_millis;
//! // Two expensive columns end up on different workers.
//! let plan = balance(&[ms(1), ms(40), ms(2), ms(35)], 2);
//! assert_ne!(plan[1], plan[3]);
//! ```

use std::time::Duration;

/// Rebalancing rounds before the assignment freezes.
pub const DEFAULT_REBALANCE_ROUNDS: usize = 8;

/// `assignment[col] = col % workers`.
pub fn round_robin(columns: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    (0..columns).map(|c| c % workers).collect()
}

/// Longest-processing-time-first assignment.
///
/// Columns are visited by descending time (stable, so equal times keep
/// column order) and each goes to the worker with the least accumulated time,
/// the lowest worker id on ties.
pub fn balance(times: &[Duration], workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    let mut order: Vec<usize> = (0..times.len()).collect();
    order.sort_by(|&a, &b| times[b].cmp(&times[a]));

    let mut load = vec![Duration::ZERO; workers];
    let mut assignment = vec![0; times.len()];
    for col in order {
        let mut best = 0;
        for w in 1..workers {
            if load[w] < load[best] {
                best = w;
            }
        }
        assignment[col] = best;
        load[best] += times[col];
    }
    assignment
}

/// Stateful divider driven once per round by the batch loop.
#[derive(Debug, Clone)]
pub struct WorkDivider {
    workers: usize,
    cap: usize,
    rounds: usize,
    rebalanced: usize,
    assignment: Vec<usize>,
}

impl WorkDivider {
    pub fn new(columns: usize, workers: usize, cap: usize) -> Self {
        Self {
            workers: workers.max(1),
            cap: cap.max(1),
            rounds: 0,
            rebalanced: 0,
            assignment: round_robin(columns, workers),
        }
    }

    /// Assignment for the next round. `times` holds the per-column time of the
    /// previous round and is reset to zero.
    pub fn assign(&mut self, times: &mut [Duration]) -> &[usize] {
        self.rounds += 1;
        if self.rounds == 1 || self.workers == 1 {
            self.assignment = round_robin(times.len(), self.workers);
        } else if self.rebalanced < self.cap {
            self.assignment = balance(times, self.workers);
            self.rebalanced += 1;
            log::debug!("round {}: rebalanced columns {:?}", self.rounds, self.assignment);
        }
        times.fill(Duration::ZERO);
        &self.assignment
    }

    /// Whether further rounds reuse the current assignment unchanged.
    pub fn is_frozen(&self) -> bool {
        self.workers == 1 || self.rebalanced >= self.cap
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Rounds that ran the balancing heuristic.
    pub fn rebalanced(&self) -> usize {
        self.rebalanced
    }

    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn lpt_packs_heaviest_first() {
        let plan = balance(&[ms(5), ms(1), ms(9), ms(4), ms(3)], 2);
        assert_eq!(plan, [1, 1, 0, 1, 0]);
    }

    #[test]
    fn equal_loads_go_to_the_lowest_worker() {
        assert_eq!(balance(&[Duration::ZERO; 4], 2), [0, 0, 0, 0]);
        assert_eq!(balance(&[ms(3), ms(3), ms(3)], 3), [0, 1, 2]);
        assert_eq!(balance(&[ms(2), ms(1), ms(1)], 2), [0, 1, 1]);
    }

    #[test]
    fn freezes_after_cap() {
        let mut div = WorkDivider::new(3, 2, 3);
        let mut times = vec![ms(1), ms(2), ms(3)];
        assert_eq!(div.assign(&mut times), &[0, 1, 0]);
        assert!(times.iter().all(|t| t.is_zero()));

        times.copy_from_slice(&[ms(10), ms(1), ms(1)]);
        assert_eq!(div.assign(&mut times), &[0, 1, 1]);
        times.copy_from_slice(&[ms(1), ms(1), ms(10)]);
        assert_eq!(div.assign(&mut times), &[1, 1, 0]);
        assert!(!div.is_frozen());

        times.copy_from_slice(&[ms(10), ms(1), ms(1)]);
        assert_eq!(div.assign(&mut times), &[0, 1, 1]);
        assert!(div.is_frozen());
        assert_eq!(div.rebalanced(), 3);

        times.copy_from_slice(&[ms(1), ms(1), ms(10)]);
        assert_eq!(div.assign(&mut times), &[0, 1, 1]);
        assert_eq!(div.rebalanced(), 3);
        assert_eq!(div.rounds(), 5);
    }
}
