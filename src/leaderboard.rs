//! Bounded pool of the most interesting inputs seen so far.
//!
//! Entries carry a focus weight that starts at [`INITIAL_FOCUS_WEIGHT`] and
//! decays by [`FOCUS_DECAY`] every time a leader is drawn, never dropping
//! below [`MIN_FOCUS_WEIGHT`]. Fresh leaders are therefore picked more often
//! than ones that have already been explored, but nobody starves.

use rand::Rng;
use serde::Serialize;

use crate::error::{FuzzError, Result};

pub const INITIAL_FOCUS_WEIGHT: u32 = 10;
pub const FOCUS_DECAY: u32 = 1;
pub const MIN_FOCUS_WEIGHT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leader<T> {
    pub payload: T,
    pub score: f64,
    pub focus_weight: u32,
}

#[derive(Debug, Clone)]
pub struct Leaderboard<T> {
    capacity: usize,
    leaders: Vec<Leader<T>>,
    /// Index of the lowest-scoring leader, valid once the board is full.
    min_index: usize,
}

impl<T> Leaderboard<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(FuzzError::config("leaderboard", "capacity must be at least 1"));
        }
        Ok(Self {
            capacity,
            leaders: Vec::with_capacity(capacity),
            min_index: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.leaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }

    /// Current leaders in insertion order (replacements take the slot of the
    /// leader they evicted).
    pub fn get_leaders(&self) -> &[Leader<T>] {
        &self.leaders
    }

    pub fn min_score(&self) -> Option<f64> {
        self.leaders.get(self.min_index).map(|l| l.score)
    }

    /// Offers `payload` with `score`. Below capacity every post is accepted;
    /// a full board only takes a score strictly above its current minimum,
    /// which is then evicted. Returns whether the payload was kept.
    pub fn post_score(&mut self, payload: T, score: f64) -> bool {
        if score.is_nan() {
            return false;
        }
        let leader = Leader {
            payload,
            score,
            focus_weight: INITIAL_FOCUS_WEIGHT,
        };
        if self.leaders.len() < self.capacity {
            self.leaders.push(leader);
        } else if score > self.leaders[self.min_index].score {
            self.leaders[self.min_index] = leader;
        } else {
            return false;
        }
        self.recompute_min();
        true
    }

    /// Draws a leader with probability proportional to its focus weight, then
    /// decays every weight.
    pub fn get_random_leader<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<&T> {
        if self.leaders.is_empty() {
            return Err(FuzzError::EmptyLeaderboard);
        }
        let total: u64 = self.leaders.iter().map(|l| u64::from(l.focus_weight)).sum();
        let mut ticket = rng.gen_range(0..total);
        let mut chosen = self.leaders.len() - 1;
        for (i, leader) in self.leaders.iter().enumerate() {
            let weight = u64::from(leader.focus_weight);
            if ticket < weight {
                chosen = i;
                break;
            }
            ticket -= weight;
        }
        for leader in &mut self.leaders {
            leader.focus_weight = leader
                .focus_weight
                .saturating_sub(FOCUS_DECAY)
                .max(MIN_FOCUS_WEIGHT);
        }
        Ok(&self.leaders[chosen].payload)
    }

    fn recompute_min(&mut self) {
        self.min_index = self
            .leaders
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.score.total_cmp(&b.score))
            .map(|(i, _)| i)
            .unwrap_or(0);
    }
}
