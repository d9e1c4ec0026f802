//! Per-submission state: `Idle -> Submitting -> Succeeded | Failed`.
//!
//! While a submission for an (owner, target) pair is `Submitting`, further
//! submissions for the same pair are refused. A finished submission may be
//! started again.
//!
//! The gate only remembers pairs that are in flight or whose last attempt
//! failed. A success drops the pair (it reads as `Idle` afterwards) and is
//! reported to the caller by [`SubmissionTicket::settle`].

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::types::PostWorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionTarget {
    NewPost,
    Post(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded,
    Failed { message: String },
}

type SubmissionKey = (Uuid, SubmissionTarget);

#[derive(Clone, Default)]
pub struct SubmissionGate {
    states: Arc<DashMap<SubmissionKey, SubmissionState>>,
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, owner_id: Uuid, target: SubmissionTarget) -> SubmissionState {
        self.states
            .get(&(owner_id, target))
            .map(|entry| entry.value().clone())
            .unwrap_or(SubmissionState::Idle)
    }

    /// Number of pairs currently in flight or holding a failure.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    pub fn begin(
        &self,
        owner_id: Uuid,
        target: SubmissionTarget,
    ) -> Result<SubmissionTicket, PostWorkflowError> {
        let key = (owner_id, target);
        match self.states.entry(key) {
            Entry::Occupied(entry) if *entry.get() == SubmissionState::Submitting => {
                return Err(PostWorkflowError::Busy);
            }
            Entry::Occupied(mut entry) => {
                entry.insert(SubmissionState::Submitting);
            }
            Entry::Vacant(entry) => {
                entry.insert(SubmissionState::Submitting);
            }
        }
        Ok(SubmissionTicket {
            key,
            states: Arc::clone(&self.states),
            settled: false,
        })
    }
}

/// Held for the duration of a submission. Dropping it unsettled marks the
/// submission failed.
pub struct SubmissionTicket {
    key: SubmissionKey,
    states: Arc<DashMap<SubmissionKey, SubmissionState>>,
    settled: bool,
}

impl SubmissionTicket {
    /// Record the outcome and return the state the submission ended in.
    pub fn settle<T>(mut self, result: &Result<T, PostWorkflowError>) -> SubmissionState {
        self.settled = true;
        match result {
            Ok(_) => {
                self.states.remove(&self.key);
                SubmissionState::Succeeded
            }
            Err(err) => {
                let state = SubmissionState::Failed {
                    message: err.to_string(),
                };
                self.states.insert(self.key, state.clone());
                state
            }
        }
    }

    /// Forget the pair without recording an outcome, used when the
    /// submission stopped before it changed anything.
    pub fn release(mut self) {
        self.states.remove(&self.key);
        self.settled = true;
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.states.insert(
                self.key,
                SubmissionState::Failed {
                    message: "submission abandoned".to_string(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_submission_is_refused_while_first_runs() {
        let gate = SubmissionGate::new();
        let owner = Uuid::new_v4();

        let ticket = gate.begin(owner, SubmissionTarget::NewPost).unwrap();
        assert_eq!(
            gate.state(owner, SubmissionTarget::NewPost),
            SubmissionState::Submitting
        );
        assert!(matches!(
            gate.begin(owner, SubmissionTarget::NewPost),
            Err(PostWorkflowError::Busy)
        ));

        // other owners and targets are independent
        assert!(gate.begin(Uuid::new_v4(), SubmissionTarget::NewPost).is_ok());
        assert!(gate.begin(owner, SubmissionTarget::Post(Uuid::new_v4())).is_ok());

        assert_eq!(ticket.settle::<()>(&Ok(())), SubmissionState::Succeeded);
        assert_eq!(
            gate.state(owner, SubmissionTarget::NewPost),
            SubmissionState::Idle
        );
    }

    #[test]
    fn settled_successes_are_not_retained() {
        let gate = SubmissionGate::new();
        let owner = Uuid::new_v4();

        for _ in 0..5 {
            let target = SubmissionTarget::Post(Uuid::new_v4());
            gate.begin(owner, target).unwrap().settle::<()>(&Ok(()));
        }
        assert_eq!(gate.tracked(), 0);

        let target = SubmissionTarget::Post(Uuid::new_v4());
        gate.begin(owner, target)
            .unwrap()
            .settle::<()>(&Err(PostWorkflowError::Busy));
        assert_eq!(gate.tracked(), 1);

        // a later success clears the remembered failure
        gate.begin(owner, target).unwrap().settle::<()>(&Ok(()));
        assert_eq!(gate.tracked(), 0);
        assert_eq!(gate.state(owner, target), SubmissionState::Idle);
    }

    #[test]
    fn failed_submission_can_be_retried() {
        let gate = SubmissionGate::new();
        let owner = Uuid::new_v4();
        let target = SubmissionTarget::Post(Uuid::new_v4());

        let ticket = gate.begin(owner, target).unwrap();
        ticket.settle::<()>(&Err(PostWorkflowError::NotFound));
        assert_eq!(
            gate.state(owner, target),
            SubmissionState::Failed {
                message: "post not found".into()
            }
        );

        let ticket = gate.begin(owner, target).unwrap();
        ticket.release();
        assert_eq!(gate.state(owner, target), SubmissionState::Idle);
    }

    #[test]
    fn dropped_ticket_counts_as_failure() {
        let gate = SubmissionGate::new();
        let owner = Uuid::new_v4();
        drop(gate.begin(owner, SubmissionTarget::NewPost).unwrap());
        assert!(matches!(
            gate.state(owner, SubmissionTarget::NewPost),
            SubmissionState::Failed { .. }
        ));
    }
}
