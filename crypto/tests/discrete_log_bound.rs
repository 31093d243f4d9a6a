//! Lowers the process-wide discrete log bound, so it lives in its own test binary.

use crypto::ballot::{PlaintextBallot, PlaintextBallotContest, PlaintextBallotSelection, SubmittedBallot};
use crypto::constants::{initialize, EngineConfig, PrimeOption};
use crypto::decryption_mediator::DecryptionMediator;
use crypto::election::ElectionBuilder;
use crypto::encrypt::encrypt_ballot;
use crypto::group::ElementModQ;
use crypto::guardian::Guardian;
use crypto::helper::Helper;
use crypto::key_ceremony::CeremonyDetails;
use crypto::key_ceremony_mediator::{orchestrate_key_ceremony, KeyCeremonyMediator};
use crypto::pow_radix::PowRadixStyle;
use crypto::tally::tally_ballots;

#[test]
fn it_should_omit_only_the_selection_beyond_the_bound() {
    let _ = env_logger::builder().is_test(true).try_init();
    initialize(&EngineConfig {
        prime_option: PrimeOption::MediumTest,
        pow_radix_style: PowRadixStyle::LowMemoryUse,
        discrete_log_max: 3,
    });

    let details = CeremonyDetails::new(2, 2).unwrap();
    let mut guardians: Vec<Guardian> = (1..=2)
        .map(|i| Guardian::new(&format!("guardian-{}", i), i as u64, details).unwrap())
        .collect();
    let joint_key =
        orchestrate_key_ceremony(&mut guardians, &mut KeyCeremonyMediator::new("keys", details)).unwrap();
    let manifest = Helper::fake_manifest();
    let context = ElectionBuilder::new(2, 2, manifest.clone())
        .set_joint_key(&joint_key)
        .build()
        .unwrap();

    // four votes for alice exceed the bound of three, one for bob does not
    let votes = ["mayor-alice", "mayor-alice", "mayor-alice", "mayor-alice", "mayor-bob"];
    let submitted: Vec<SubmittedBallot> = votes
        .iter()
        .enumerate()
        .map(|(i, mayor)| {
            let ballot = PlaintextBallot::new(
                &format!("ballot-{}", i),
                vec![PlaintextBallotContest::new(
                    "mayor",
                    vec![PlaintextBallotSelection::new(mayor, 1)],
                )],
            );
            encrypt_ballot(&ballot, &manifest, &context, &ElementModQ::one(), None, None)
                .unwrap()
                .cast()
        })
        .collect();
    let tally = tally_ballots("tally", &submitted, &manifest);
    assert_eq!(tally.cast(), 5);

    let mut mediator = DecryptionMediator::new("decrypt", &context, &tally, &submitted);
    for guardian in &guardians {
        mediator.announce(guardian).unwrap();
    }
    let plaintext = mediator.get_plaintext_tally().unwrap();

    assert_eq!(plaintext.count("mayor", "mayor-alice"), None);
    assert!(!plaintext.contests["mayor"].selections.contains_key("mayor-alice"));
    assert_eq!(plaintext.count("mayor", "mayor-bob"), Some(1));
    for selection in ["council-carol", "council-dave", "council-erin"] {
        assert_eq!(plaintext.count("council", selection), Some(0));
    }
}
