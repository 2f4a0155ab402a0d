//! Fork-choice rule for selecting the best chain.

use crate::types::{Header, Position};

/// Abstraction over fork-choice rules.
///
/// Given an incumbent tip and a candidate header, a fork-choice
/// implementation decides whether the candidate should become the new tip.
pub trait ForkChoice {
    /// Whether `candidate` may ever be a tip.
    fn is_eligible(&self, candidate: &Header) -> bool {
        !candidate.is_banned() && !candidate.is_disconnected()
    }

    /// Returns `true` if `candidate` should replace `incumbent`.
    fn prefers(
        &self,
        candidate: &Header,
        incumbent: &Header,
        checkpoint: Option<&Position>,
    ) -> bool;

    /// Picks the single best header among `candidates`, if any is eligible.
    ///
    /// Ties are resolved in favour of the checkpoint header, then of the
    /// earliest candidate, so callers order candidates by precedence.
    fn select<'a>(
        &self,
        candidates: &'a [Header],
        checkpoint: Option<&Position>,
    ) -> Option<&'a Header> {
        let mut best: Option<&'a Header> = None;

        for candidate in candidates.iter().filter(|c| self.is_eligible(c)) {
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    let tie_goes_to_checkpoint = candidate.is_checkpoint()
                        && !current.is_checkpoint()
                        && !self.prefers(current, candidate, checkpoint);
                    if self.prefers(candidate, current, checkpoint) || tie_goes_to_checkpoint {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        best
    }
}

/// "Most cumulative work" fork choice.
///
/// - Banned and disconnected headers never win.
/// - While a checkpoint is set, a chain that has reached the checkpoint
///   height beats one that has not. Only non-banned chains can reach it,
///   so once the checkpoint header is connected the best chain goes
///   through it.
/// - Otherwise the candidate needs strictly more work; equal work keeps
///   the incumbent.
#[derive(Clone, Copy, Debug, Default)]
pub struct MostWorkForkChoice;

impl ForkChoice for MostWorkForkChoice {
    fn prefers(
        &self,
        candidate: &Header,
        incumbent: &Header,
        checkpoint: Option<&Position>,
    ) -> bool {
        if !self.is_eligible(candidate) {
            return false;
        }
        if !self.is_eligible(incumbent) {
            return true;
        }

        if let Some(cp) = checkpoint {
            let candidate_reached = candidate.height() >= cp.height;
            let incumbent_reached = incumbent.height() >= cp.height;
            if candidate_reached != incumbent_reached {
                return candidate_reached;
            }
        }

        candidate.work() > incumbent.work()
    }
}
