//! Adoption lifecycle rules
//!
//! Pure functions over statuses: which request transitions are legal, and
//! which pet status a set of requests implies. The coordinator applies these
//! against stored records; nothing here touches the store.
use crate::adoption::AdoptionStatus;
use crate::error::{AdoptionError, Result};
use crate::pet::PetStatus;

/// A legal move for a single adoption request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Pending -> Approved. The pet becomes Adopted and every other pending
    /// request for it is rejected.
    Approve,
    /// Pending -> Rejected. The pet reverts to Available once nothing is pending.
    Reject,
    /// Approved -> Completed (hand-off confirmed). No pet status effect.
    Complete,
}

impl Transition {
    pub fn target(self) -> AdoptionStatus {
        match self {
            Transition::Approve => AdoptionStatus::Approved,
            Transition::Reject => AdoptionStatus::Rejected,
            Transition::Complete => AdoptionStatus::Completed,
        }
    }
}

/// Every (current, requested) pair is listed, so adding a status forces a
/// decision here.
pub fn plan_transition(from: AdoptionStatus, to: AdoptionStatus) -> Result<Transition> {
    use AdoptionStatus::*;

    match (from, to) {
        (Pending, Approved) => Ok(Transition::Approve),
        (Pending, Rejected) => Ok(Transition::Reject),
        (Approved, Completed) => Ok(Transition::Complete),

        (Pending, Pending) | (Pending, Completed) => Err(AdoptionError::InvalidTransition { from, to }),
        (Approved, Pending) | (Approved, Approved) | (Approved, Rejected) => {
            Err(AdoptionError::InvalidTransition { from, to })
        }
        (Rejected, Pending) | (Rejected, Approved) | (Rejected, Rejected) | (Rejected, Completed) => {
            Err(AdoptionError::InvalidTransition { from, to })
        }
        (Completed, Pending)
        | (Completed, Approved)
        | (Completed, Rejected)
        | (Completed, Completed) => Err(AdoptionError::InvalidTransition { from, to }),
    }
}

/// The pet status implied by the statuses of all of its requests.
pub fn derive_pet_status<I>(requests: I) -> PetStatus
where
    I: IntoIterator<Item = AdoptionStatus>,
{
    let mut pending = false;
    for status in requests {
        if status.is_successful() {
            return PetStatus::Adopted;
        }
        pending |= status == AdoptionStatus::Pending;
    }
    if pending {
        PetStatus::Pending
    } else {
        PetStatus::Available
    }
}

/// At most one successful request, and the pet status agrees with the
/// requests.
pub fn is_consistent(pet: PetStatus, requests: &[AdoptionStatus]) -> bool {
    let successful = requests.iter().filter(|s| s.is_successful()).count();
    successful <= 1 && derive_pet_status(requests.iter().copied()) == pet
}

#[cfg(test)]
mod tests {
    use super::*;
    use AdoptionStatus::*;

    const ALL: [AdoptionStatus; 4] = [Pending, Approved, Rejected, Completed];

    #[test]
    fn only_three_moves_are_legal() {
        let legal: Vec<_> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| plan_transition(*from, *to).is_ok())
            .collect();

        assert_eq!(
            legal,
            vec![(Pending, Approved), (Pending, Rejected), (Approved, Completed)]
        );
    }

    #[test]
    fn transition_targets_match_request() {
        for (from, to) in [(Pending, Approved), (Pending, Rejected), (Approved, Completed)] {
            assert_eq!(plan_transition(from, to).unwrap().target(), to);
        }
    }

    #[test]
    fn illegal_move_names_both_ends() {
        match plan_transition(Rejected, Approved) {
            Err(AdoptionError::InvalidTransition { from, to }) => {
                assert_eq!((from, to), (Rejected, Approved));
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }

    #[test]
    fn derived_status() {
        assert_eq!(derive_pet_status([]), PetStatus::Available);
        assert_eq!(derive_pet_status([Rejected]), PetStatus::Available);
        assert_eq!(derive_pet_status([Rejected, Pending]), PetStatus::Pending);
        assert_eq!(derive_pet_status([Pending, Approved]), PetStatus::Adopted);
        assert_eq!(derive_pet_status([Rejected, Completed]), PetStatus::Adopted);
    }

    #[test]
    fn two_successes_are_inconsistent() {
        assert!(is_consistent(PetStatus::Adopted, &[Approved, Rejected]));
        assert!(!is_consistent(PetStatus::Adopted, &[Approved, Completed]));
        assert!(!is_consistent(PetStatus::Available, &[Pending]));
    }
}
