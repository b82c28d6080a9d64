//! Thread topology generation.
//!
//! Decides which confirmed note each new reply attaches to, and who writes
//! it. The random source is injected so that a seed fully determines the
//! shape of a thread; nothing here touches the network or signs anything.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;

use crate::event::Note;
use crate::threading::ThreadPool;

/// Probability of replying to the top note under [`Strategy::ProbabilisticBranch`].
pub const DEFAULT_BRANCH_PROBABILITY: f64 = 0.8;

/// Strategy names accepted in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Flat,
    Linear,
    #[default]
    Branch,
    /// Root author against the first participant; see [`Strategy::AlternatingTwoParty`].
    Alternating,
}

/// Parent selection strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Every reply answers the top note.
    FlatFanOut,
    /// Every reply answers the most recently confirmed note.
    LinearChain,
    /// Answer the top note with `probability`, otherwise a random other note.
    ProbabilisticBranch { probability: f64 },
    /// The root author and the first participant take turns, each answering
    /// the previous confirmed note. Further participants never post.
    AlternatingTwoParty,
}

impl Strategy {
    /// Build from a configured kind; `probability` only applies to `branch`.
    pub fn from_kind(kind: StrategyKind, probability: f64) -> Self {
        match kind {
            StrategyKind::Flat => Strategy::FlatFanOut,
            StrategyKind::Linear => Strategy::LinearChain,
            StrategyKind::Branch => Strategy::ProbabilisticBranch {
                probability: probability.clamp(0.0, 1.0),
            },
            StrategyKind::Alternating => Strategy::AlternatingTwoParty,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::FlatFanOut => write!(f, "flat"),
            Strategy::LinearChain => write!(f, "linear"),
            Strategy::ProbabilisticBranch { probability } => {
                write!(f, "branch(p={})", probability)
            }
            Strategy::AlternatingTwoParty => write!(f, "alternating"),
        }
    }
}

/// Who writes the next reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    /// The identity that published the thread root.
    Root,
    /// Index into the participant list.
    Participant(usize),
}

/// Seeded parent and author selection.
pub struct TopologyGenerator<R> {
    strategy: Strategy,
    rng: R,
}

impl<R: Rng> TopologyGenerator<R> {
    pub fn new(strategy: Strategy, rng: R) -> Self {
        Self { strategy, rng }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Pick the parent for the next reply.
    ///
    /// `top` is the thread root. Only notes in `pool` (confirmed notes) are
    /// ever returned besides `top` itself.
    pub fn next_parent<'a>(&mut self, pool: &'a ThreadPool, top: &'a Arc<Note>) -> &'a Arc<Note> {
        match self.strategy {
            Strategy::FlatFanOut => top,
            Strategy::LinearChain | Strategy::AlternatingTwoParty => pool.latest().unwrap_or(top),
            Strategy::ProbabilisticBranch { probability } => {
                if self.rng.random_bool(probability.clamp(0.0, 1.0)) {
                    return top;
                }
                let others = pool.len() - usize::from(pool.contains(top.id()));
                if others == 0 {
                    return top;
                }
                let pick = self.rng.random_range(0..others);
                pool.notes()
                    .iter()
                    .filter(|n| n.id() != top.id())
                    .nth(pick)
                    .unwrap_or(top)
            }
        }
    }

    /// Pick the author of a reply to `parent`.
    ///
    /// Alternating runs pair the root author with the first participant:
    /// whoever did not write `parent` answers it, so a failed publish never
    /// leaves someone replying to themselves. Other strategies draw uniformly
    /// from the participants; with no participants the root author replies.
    pub fn next_author(&mut self, parent: &Note, root_author: &str, participants: usize) -> Author {
        if participants == 0 {
            return Author::Root;
        }
        match self.strategy {
            Strategy::AlternatingTwoParty => {
                if parent.author_id() == root_author {
                    Author::Participant(0)
                } else {
                    Author::Root
                }
            }
            _ => Author::Participant(self.rng.random_range(0..participants)),
        }
    }
}
