use anyhow::Context;
use std::sync::{Arc, Barrier};
use std::thread;

use pet_adoption::config::LifecycleConfig;
use pet_adoption::{
    Actor, AdoptionError, AdoptionStatus, ApplicationForm, LifecycleCoordinator, PetDraft,
    PetStatus, Role, Store,
};

use tempfile::{TempDir, tempdir}; // Use for test db cleanup.

// Sled locks its directory, so every test gets its own database under a temp
// dir that is removed when the returned guard drops.
fn setup(name: &str) -> anyhow::Result<(TempDir, LifecycleCoordinator)> {
    setup_with(name, LifecycleConfig::default())
}

fn setup_with(
    name: &str,
    config: LifecycleConfig,
) -> anyhow::Result<(TempDir, LifecycleCoordinator)> {
    let temp_dir = tempdir()?;
    let store = Store::open(temp_dir.path().join(name))?;
    Ok((temp_dir, LifecycleCoordinator::new(store, config)))
}

fn owner() -> Actor {
    Actor::new("user_owner", Role::PetOwner)
}

fn customer(id: &str) -> Actor {
    Actor::new(id, Role::User)
}

fn draft(name: &str) -> PetDraft {
    PetDraft::new()
        .set_name(name)
        .set_species("Dog")
        .set_breed("Golden Retriever")
        .set_age("3 years")
        .set_gender("Male")
        .set_size("Large")
        .set_description("Friendly and loves long walks")
        .set_location("Portland, OR")
        .set_image_url("https://img.example/pet.jpg")
}

fn application(first_name: &str) -> ApplicationForm {
    ApplicationForm {
        first_name: Some(first_name.into()),
        last_name: Some("Smith".into()),
        email: Some(format!("{}@example.com", first_name.to_lowercase())),
        phone: Some("555-0100".into()),
        address: Some("1 Main St".into()),
        city: Some("Portland".into()),
        state: Some("OR".into()),
        zip_code: Some("97201".into()),
        home_environment: Some("House".into()),
        previous_pets: Some("Two dogs".into()),
        reason_for_adoption: Some("Companionship".into()),
        time_at_home: Some("Full-time".into()),
        other_pets: Some("None".into()),
        children: Some("No".into()),
        landlord_approval: Some("Own home".into()),
        notes: None,
    }
}

fn status_of(coordinator: &LifecycleCoordinator, request_id: &str) -> anyhow::Result<AdoptionStatus> {
    Ok(coordinator.ledger().get(request_id)?.status())
}

#[test]
fn buddy_is_adopted_by_first_approved_applicant() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("buddy.db")?;
    let buddy = coordinator.registry().create_pet(&owner(), &draft("Buddy"))?;
    assert_eq!(buddy.status(), PetStatus::Available);

    let a = coordinator
        .submit_request(&customer("user_a"), &buddy.id, &application("Alice"))
        .context("A failed to apply: ")?;
    assert_eq!(coordinator.registry().get_pet(&buddy.id)?.status(), PetStatus::Pending);
    assert_eq!(coordinator.ledger().get_by_pet(&buddy.id)?.len(), 1);
    assert_eq!(a.status(), AdoptionStatus::Pending);

    let b = coordinator
        .submit_request(&customer("user_b"), &buddy.id, &application("Bob"))
        .context("B failed to apply: ")?;
    assert_eq!(coordinator.registry().get_pet(&buddy.id)?.status(), PetStatus::Pending);
    assert_eq!(coordinator.ledger().get_by_pet(&buddy.id)?.len(), 2);

    let approved = coordinator
        .approve(&a.id, &owner(), Some("Welcome home".into()))
        .context("approval failed: ")?;
    assert_eq!(approved.status(), AdoptionStatus::Approved);
    assert!(approved.approval_date.is_some());
    assert_eq!(approved.owner_notes.as_deref(), Some("Welcome home"));
    assert_eq!(status_of(&coordinator, &b.id)?, AdoptionStatus::Rejected);
    assert_eq!(coordinator.registry().get_pet(&buddy.id)?.status(), PetStatus::Adopted);
    assert_eq!(coordinator.registry().get_pet(&buddy.id)?.adopted_by(), Some("user_a"));

    // B's request was rejected by the fan-out; approving it now is illegal
    let before = coordinator.registry().get_pet(&buddy.id)?;
    let err = coordinator.approve(&b.id, &owner(), None).unwrap_err();
    assert!(matches!(
        err,
        AdoptionError::InvalidTransition {
            from: AdoptionStatus::Rejected,
            to: AdoptionStatus::Approved
        }
    ));
    assert_eq!(coordinator.registry().get_pet(&buddy.id)?, before);
    assert_eq!(status_of(&coordinator, &a.id)?, AdoptionStatus::Approved);
    assert!(coordinator.is_consistent(&buddy.id)?);

    Ok(())
}

#[test]
fn milo_reverts_to_available_and_accepts_a_new_application() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("milo.db")?;
    let milo = coordinator.registry().create_pet(&owner(), &draft("Milo"))?;
    let c = customer("user_c");

    let first = coordinator.submit_request(&c, &milo.id, &application("Carol"))?;
    assert_eq!(coordinator.registry().get_pet(&milo.id)?.status(), PetStatus::Pending);

    let rejected = coordinator.reject(&first.id, &owner(), Some("Not a fit".into()))?;
    assert_eq!(rejected.status(), AdoptionStatus::Rejected);
    assert_eq!(coordinator.registry().get_pet(&milo.id)?.status(), PetStatus::Available);
    assert_eq!(coordinator.registry().get_pet(&milo.id)?.adopted_by(), None);

    // a rejected applicant may try again
    let second = coordinator.submit_request(&c, &milo.id, &application("Carol"))?;
    assert_ne!(first.id, second.id);
    assert_eq!(second.status(), AdoptionStatus::Pending);
    assert_eq!(coordinator.registry().get_pet(&milo.id)?.status(), PetStatus::Pending);
    assert!(coordinator.is_consistent(&milo.id)?);

    Ok(())
}

#[test]
fn duplicate_open_request_is_a_conflict() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("duplicate.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Rex"))?;
    let d = customer("user_d");

    coordinator.submit_request(&d, &pet.id, &application("Dan"))?;
    let err = coordinator
        .submit_request(&d, &pet.id, &application("Dan"))
        .unwrap_err();

    match err {
        AdoptionError::Conflict(message) => assert!(message.contains("pending")),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(coordinator.ledger().get_by_pet(&pet.id)?.len(), 1);

    Ok(())
}

#[test]
fn adopted_pet_refuses_new_applications() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("adopted.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Luna"))?;

    let request = coordinator.submit_request(&customer("user_a"), &pet.id, &application("Ann"))?;
    coordinator.approve(&request.id, &owner(), None)?;

    let err = coordinator
        .submit_request(&customer("user_b"), &pet.id, &application("Ben"))
        .unwrap_err();
    assert!(matches!(err, AdoptionError::Conflict(_)));

    Ok(())
}

#[test]
fn rejecting_one_of_two_keeps_the_pet_pending() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("reject_one.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Coco"))?;

    let first = coordinator.submit_request(&customer("user_a"), &pet.id, &application("Ann"))?;
    let second = coordinator.submit_request(&customer("user_b"), &pet.id, &application("Ben"))?;

    coordinator.reject(&first.id, &owner(), None)?;
    assert_eq!(coordinator.registry().get_pet(&pet.id)?.status(), PetStatus::Pending);
    assert_eq!(status_of(&coordinator, &second.id)?, AdoptionStatus::Pending);

    Ok(())
}

#[test]
fn second_reject_changes_nothing() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("reject_twice.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Pip"))?;
    let request = coordinator.submit_request(&customer("user_a"), &pet.id, &application("Ann"))?;

    let rejected = coordinator.reject(&request.id, &owner(), Some("first".into()))?;
    let pet_after_first = coordinator.registry().get_pet(&pet.id)?;

    let err = coordinator
        .reject(&request.id, &owner(), Some("second".into()))
        .unwrap_err();
    assert!(matches!(err, AdoptionError::InvalidTransition { .. }));
    assert_eq!(coordinator.ledger().get(&request.id)?, rejected);
    assert_eq!(coordinator.registry().get_pet(&pet.id)?, pet_after_first);

    Ok(())
}

#[test]
fn completion_follows_approval_only() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("complete.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Max"))?;
    let request = coordinator.submit_request(&customer("user_a"), &pet.id, &application("Ann"))?;

    let err = coordinator.complete(&request.id, &owner()).unwrap_err();
    assert!(matches!(
        err,
        AdoptionError::InvalidTransition {
            from: AdoptionStatus::Pending,
            to: AdoptionStatus::Completed
        }
    ));

    let approved = coordinator.approve(&request.id, &owner(), None)?;
    let completed = coordinator.complete(&request.id, &owner())?;
    assert_eq!(completed.status(), AdoptionStatus::Completed);
    assert!(completed.completion_date.is_some());
    assert_eq!(completed.approval_date, approved.approval_date);
    assert_eq!(coordinator.registry().get_pet(&pet.id)?.status(), PetStatus::Adopted);

    let adoptions = coordinator.ledger().adoptions_of("user_a")?;
    assert_eq!(adoptions.len(), 1);
    assert!(coordinator.is_consistent(&pet.id)?);

    Ok(())
}

#[test]
fn requesting_pending_is_never_legal() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("to_pending.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Ziggy"))?;
    let request = coordinator.submit_request(&customer("user_a"), &pet.id, &application("Ann"))?;

    let err = coordinator
        .update_status(&request.id, &owner(), AdoptionStatus::Pending, None)
        .unwrap_err();
    assert!(matches!(err, AdoptionError::InvalidTransition { .. }));

    let approved = coordinator.update_status(&request.id, &owner(), AdoptionStatus::Approved, None)?;
    assert_eq!(approved.status(), AdoptionStatus::Approved);

    Ok(())
}

#[test]
fn only_the_owner_or_an_admin_decides() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("authz.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Bella"))?;
    let applicant = customer("user_a");
    let request = coordinator.submit_request(&applicant, &pet.id, &application("Ann"))?;

    let stranger = Actor::new("user_other_owner", Role::PetOwner);
    assert!(matches!(
        coordinator.approve(&request.id, &stranger, None),
        Err(AdoptionError::Unauthorized(_))
    ));
    assert!(matches!(
        coordinator.reject(&request.id, &applicant, None),
        Err(AdoptionError::Unauthorized(_))
    ));
    assert_eq!(status_of(&coordinator, &request.id)?, AdoptionStatus::Pending);

    // both parties may read; outsiders may not
    coordinator.request_detail(&applicant, &request.id)?;
    coordinator.request_detail(&owner(), &request.id)?;
    assert!(matches!(
        coordinator.request_detail(&customer("user_z"), &request.id),
        Err(AdoptionError::Unauthorized(_))
    ));
    assert!(matches!(
        coordinator.requests_for_pet(&applicant, &pet.id),
        Err(AdoptionError::Unauthorized(_))
    ));

    let admin = Actor::new("user_admin", Role::Admin);
    let approved = coordinator.approve(&request.id, &admin, None)?;
    assert_eq!(approved.status(), AdoptionStatus::Approved);

    Ok(())
}

#[test]
fn oversized_owner_notes_are_checked_after_lookup_and_authorization() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("notes_order.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Pip"))?;
    let request = coordinator.submit_request(&customer("user_a"), &pet.id, &application("Ann"))?;
    let long_notes = || Some("n".repeat(501));

    assert!(matches!(
        coordinator.approve("adoption_missing", &owner(), long_notes()),
        Err(AdoptionError::NotFound(_))
    ));
    assert!(matches!(
        coordinator.approve(&request.id, &customer("user_z"), long_notes()),
        Err(AdoptionError::Unauthorized(_))
    ));
    match coordinator.approve(&request.id, &owner(), long_notes()) {
        Err(AdoptionError::Validation { fields, .. }) => assert_eq!(fields, vec!["ownerNotes"]),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(status_of(&coordinator, &request.id)?, AdoptionStatus::Pending);

    Ok(())
}

#[test]
fn customers_cannot_list_pets() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("create_authz.db")?;
    let err = coordinator
        .registry()
        .create_pet(&customer("user_a"), &draft("Nope"))
        .unwrap_err();
    assert!(matches!(err, AdoptionError::Unauthorized(_)));
    Ok(())
}

#[test]
fn missing_fields_are_all_reported() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("missing.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Sunny"))?;

    let mut form = application("Ann");
    form.email = None;
    form.zip_code = Some("   ".into());

    match coordinator.submit_request(&customer("user_a"), &pet.id, &form) {
        Err(AdoptionError::Validation { fields, .. }) => {
            assert_eq!(fields, vec!["email".to_string(), "zipCode".to_string()]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    // nothing was written
    assert!(coordinator.ledger().get_by_pet(&pet.id)?.is_empty());
    assert_eq!(coordinator.registry().get_pet(&pet.id)?.status(), PetStatus::Available);

    Ok(())
}

#[test]
fn deleting_a_pet_leaves_tombstoned_requests() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("delete.db")?;
    let pet = coordinator.registry().create_pet(&owner(), &draft("Ghost"))?;
    let approved = coordinator.submit_request(&customer("user_a"), &pet.id, &application("Ann"))?;
    coordinator.approve(&approved.id, &owner(), None)?;

    let other_pet = coordinator.registry().create_pet(&owner(), &draft("Shadow"))?;
    let pending =
        coordinator.submit_request(&customer("user_b"), &other_pet.id, &application("Ben"))?;

    coordinator.registry().delete_pet(&pet.id, &owner())?;
    coordinator.registry().delete_pet(&other_pet.id, &owner())?;

    assert!(matches!(
        coordinator.registry().get_pet(&pet.id),
        Err(AdoptionError::NotFound(_))
    ));

    let kept = coordinator.ledger().get(&approved.id)?;
    assert!(kept.pet_removed);
    assert_eq!(kept.status(), AdoptionStatus::Approved);

    let closed = coordinator.ledger().get(&pending.id)?;
    assert!(closed.pet_removed);
    assert_eq!(closed.status(), AdoptionStatus::Rejected);

    // the hand-off can still be recorded after the listing is gone
    let completed = coordinator.complete(&approved.id, &owner())?;
    assert_eq!(completed.status(), AdoptionStatus::Completed);

    Ok(())
}

#[test]
fn owner_statistics_count_pets_and_pending_requests() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("stats.db")?;
    let available = coordinator.registry().create_pet(&owner(), &draft("Ace"))?;
    let pending = coordinator.registry().create_pet(&owner(), &draft("Bo"))?;
    let adopted = coordinator.registry().create_pet(&owner(), &draft("Cy"))?;

    coordinator.submit_request(&customer("user_a"), &pending.id, &application("Ann"))?;
    coordinator.submit_request(&customer("user_b"), &pending.id, &application("Ben"))?;
    let winner = coordinator.submit_request(&customer("user_c"), &adopted.id, &application("Cal"))?;
    coordinator.approve(&winner.id, &owner(), None)?;

    let stats = coordinator.owner_statistics(&owner().id)?;
    assert_eq!(stats.total_pets, 3);
    assert_eq!(stats.available_pets, 1);
    assert_eq!(stats.pending_pets, 1);
    assert_eq!(stats.adopted_pets, 1);
    assert_eq!(stats.pending_requests, 2);
    assert_eq!(coordinator.registry().get_pet(&available.id)?.status(), PetStatus::Available);

    Ok(())
}

#[test]
fn concurrent_submissions_keep_the_ledger_consistent() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup_with(
        "concurrent_submit.db",
        LifecycleConfig {
            max_commit_retries: 16,
        },
    )?;
    let coordinator = Arc::new(coordinator);
    let pet = coordinator.registry().create_pet(&owner(), &draft("Rush"))?;

    let outcomes: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let coordinator = Arc::clone(&coordinator);
                let pet_id = pet.id.clone();
                s.spawn(move || {
                    coordinator.submit_request(
                        &customer(&format!("user_{i}")),
                        &pet_id,
                        &application("Ann"),
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join()).collect()
    });

    let mut submitted = 0;
    for outcome in outcomes {
        match outcome.map_err(|_| anyhow::anyhow!("worker panicked"))? {
            Ok(_) => submitted += 1,
            Err(AdoptionError::Conflict(_)) => {}
            Err(other) => return Err(other.into()),
        }
    }

    assert!(submitted >= 1);
    assert_eq!(coordinator.ledger().get_by_pet(&pet.id)?.len(), submitted);
    assert_eq!(coordinator.registry().get_pet(&pet.id)?.status(), PetStatus::Pending);
    assert!(coordinator.is_consistent(&pet.id)?);

    Ok(())
}

#[test]
fn concurrent_approvals_adopt_exactly_once() -> anyhow::Result<()> {
    let (_dir, coordinator) = setup("concurrent_approve.db")?;
    let coordinator = Arc::new(coordinator);

    for round in 0..10 {
        let pet = coordinator
            .registry()
            .create_pet(&owner(), &draft(&format!("Dash {round}")))?;
        let mut request_ids = vec![];
        for applicant in ["user_a", "user_b"] {
            let request = coordinator.submit_request(&customer(applicant), &pet.id, &application("Ann"))?;
            request_ids.push(request.id);
        }

        // Both approvals start together so each reads its request as Pending
        let barrier = Barrier::new(request_ids.len());
        let outcomes: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = request_ids
                .iter()
                .map(|id| {
                    let coordinator = Arc::clone(&coordinator);
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        coordinator.approve(id, &owner(), None)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut approvals = 0;
        for outcome in outcomes {
            match outcome.map_err(|_| anyhow::anyhow!("worker panicked"))? {
                Ok(_) => approvals += 1,
                Err(AdoptionError::Conflict(_)) => {}
                Err(other) => return Err(anyhow::anyhow!("round {round}: race loser got {other:?}")),
            }
        }

        assert_eq!(approvals, 1, "round {round}");
        let statuses: Vec<_> = coordinator
            .ledger()
            .get_by_pet(&pet.id)?
            .iter()
            .map(|r| r.status())
            .collect();
        assert_eq!(
            statuses.iter().filter(|s| **s == AdoptionStatus::Approved).count(),
            1
        );
        assert_eq!(
            statuses.iter().filter(|s| **s == AdoptionStatus::Rejected).count(),
            1
        );
        assert_eq!(coordinator.registry().get_pet(&pet.id)?.status(), PetStatus::Adopted);
        assert!(coordinator.is_consistent(&pet.id)?);
    }

    Ok(())
}
