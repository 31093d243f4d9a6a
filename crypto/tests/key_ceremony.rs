use crypto::guardian::Guardian;
use crypto::helper::Helper;
use crypto::key_ceremony::{combine_election_public_keys, CeremonyDetails, CeremonyState};
use crypto::key_ceremony_mediator::KeyCeremonyMediator;

fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
    Helper::setup_test_group();
}

#[test]
fn it_should_run_a_ceremony_step_by_step() {
    setup();
    let details = CeremonyDetails::new(3, 2).unwrap();
    let mut guardians: Vec<Guardian> = ["alpha", "beta", "gamma"]
        .iter()
        .enumerate()
        .map(|(i, id)| Guardian::new(id, i as u64 + 1, details).unwrap())
        .collect();
    let mut mediator = KeyCeremonyMediator::new("ceremony", details);

    for guardian in &guardians {
        assert_eq!(guardian.state(), CeremonyState::KeysGenerated);
        assert!(mediator.share_announced(&guardian.id).is_none());
        assert!(mediator.announce(guardian.share_public_keys()));
    }
    assert!(mediator.all_guardians_announced());
    assert_eq!(mediator.state(), CeremonyState::ElectionKeysExchanged);

    for guardian in guardians.iter_mut() {
        let announced = mediator.share_announced(&guardian.id).unwrap();
        assert_eq!(announced.len(), 2);
        for set in &announced {
            assert!(guardian.save_guardian_public_keys(set));
        }
        assert!(guardian.all_public_keys_received());
        assert!(guardian.generate_partial_key_backups());
        assert_eq!(guardian.state(), CeremonyState::BackupsGenerated);
    }

    assert!(mediator.publish_joint_key().is_none());
    for guardian in &guardians {
        assert!(mediator.receive_backups(guardian.share_election_partial_key_backups()));
    }
    assert!(mediator.all_backups_available());

    for guardian in guardians.iter_mut() {
        for backup in mediator.share_backups(&guardian.id).unwrap() {
            assert!(guardian.save_election_partial_key_backup(backup));
        }
        assert!(guardian.all_election_partial_key_backups_received());
    }

    let verifications: Vec<_> = guardians
        .iter()
        .flat_map(|designated| {
            guardians
                .iter()
                .filter(move |owner| owner.id != designated.id)
                .filter_map(move |owner| designated.verify_partial_key_backup(&owner.id))
        })
        .collect();
    assert_eq!(verifications.len(), 6);
    assert!(verifications.iter().all(|v| v.verified));
    mediator.receive_backup_verifications(verifications);
    assert!(mediator.failed_verifications().is_empty());
    assert_eq!(mediator.state(), CeremonyState::BackupsVerified);

    for guardian in guardians.iter_mut() {
        for verification in mediator.verifications_for_owner(&guardian.id) {
            assert!(guardian.save_election_partial_key_verification(verification));
        }
        assert!(guardian.all_election_partial_key_backups_verified());
    }

    let joint_key = mediator.publish_joint_key().unwrap();
    assert_eq!(mediator.state(), CeremonyState::JointKeyPublished);
    let election_keys: Vec<_> = guardians.iter().map(Guardian::share_election_public_key).collect();
    assert_eq!(joint_key, combine_election_public_keys(&election_keys));
    for guardian in guardians.iter_mut() {
        assert_eq!(guardian.publish_joint_key(), Some(joint_key.clone()));
        assert_eq!(guardian.state(), CeremonyState::JointKeyPublished);
    }
}
