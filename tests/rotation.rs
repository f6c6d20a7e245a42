use ticket_seeds::crypto::{split_ticket, IV_LEN};
use ticket_seeds::keys::{make_key_name, HASH_COUNT};
use ticket_seeds::seeds::SeedDigest;
use ticket_seeds::ticket::TICKET_NAME_LEN;
use ticket_seeds::{
    SealingContext, SeedCategory, TicketHandler, TicketKeyManager, TicketName, TicketOutcome,
};

fn issue(manager: &mut TicketKeyManager, state: &[u8]) -> Vec<u8> {
    let mut name = TicketName::from_bytes([0u8; TICKET_NAME_LEN]);
    let mut iv = [0u8; IV_LEN];
    let mut ctx = SealingContext::new();
    assert_eq!(
        manager.encrypt_ticket(&mut name, &mut iv, &mut ctx),
        TicketOutcome::Handled
    );
    ctx.seal(&name, state).unwrap()
}

fn resume(manager: &mut TicketKeyManager, ticket: &[u8]) -> (TicketOutcome, Option<Vec<u8>>) {
    let (name, iv) = split_ticket(ticket).unwrap();
    let mut ctx = SealingContext::new();
    let outcome = manager.decrypt_ticket(&name, &iv, &mut ctx);
    let state = match outcome {
        TicketOutcome::Handled | TicketOutcome::Renew => Some(ctx.open(ticket).unwrap()),
        _ => None,
    };
    (outcome, state)
}

#[test]
fn test_rotation_scenario() {
    // Day 0: a single current seed.
    let mut manager = TicketKeyManager::new();
    assert!(manager.set_tls_ticket_key_seeds(&[] as &[&str], &["seedA"], &[]));

    let ticket_a = issue(&mut manager, b"session under A");
    let (name_a, _) = split_ticket(&ticket_a).unwrap();
    assert_eq!(
        name_a.key_name(),
        make_key_name(&SeedDigest::of(b"seedA"), HASH_COUNT)
    );

    // Day 1: A retires, B takes over.
    assert!(manager.set_tls_ticket_key_seeds(&["seedA"], &["seedB"], &[]));

    let (outcome, state) = resume(&mut manager, &ticket_a);
    assert_eq!(outcome, TicketOutcome::Renew);
    assert_eq!(outcome.as_raw(), 2);
    assert_eq!(state.unwrap(), b"session under A");

    let ticket_b = issue(&mut manager, b"session under B");
    let (name_b, _) = split_ticket(&ticket_b).unwrap();
    assert_eq!(
        name_b.key_name(),
        make_key_name(&SeedDigest::of(b"seedB"), HASH_COUNT)
    );
    assert_eq!(resume(&mut manager, &ticket_b).0, TicketOutcome::Handled);
}

#[test]
fn test_promoted_new_seed() {
    // A server that already holds B as NEW resumes tickets from a peer that
    // has rotated, and asks for renewal.
    let mut rotated_peer = TicketKeyManager::new();
    assert!(rotated_peer.set_tls_ticket_key_seeds(&["seedA"], &["seedB"], &[]));
    let ticket_b = issue(&mut rotated_peer, b"from the future");

    let mut lagging = TicketKeyManager::new();
    assert!(lagging.set_tls_ticket_key_seeds(&[], &["seedA"], &["seedB"]));
    let (outcome, state) = resume(&mut lagging, &ticket_b);
    assert_eq!(outcome, TicketOutcome::Renew);
    assert_eq!(state.unwrap(), b"from the future");

    // NEW seeds never encrypt.
    let ticket_a = issue(&mut lagging, b"still on A");
    let (name, _) = split_ticket(&ticket_a).unwrap();
    assert_eq!(
        name.key_name(),
        make_key_name(&SeedDigest::of(b"seedA"), HASH_COUNT)
    );
}

#[test]
fn test_retired_seed_stops_decrypting() {
    let mut manager = TicketKeyManager::new();
    assert!(manager.set_tls_ticket_key_seeds(&[] as &[&str], &["seedA"], &[]));
    let ticket_a = issue(&mut manager, b"short lived");

    assert!(manager.set_tls_ticket_key_seeds(&[] as &[&str], &["seedB"], &[]));
    let (outcome, state) = resume(&mut manager, &ticket_a);
    assert_eq!(outcome, TicketOutcome::NotHandled);
    assert_eq!(outcome.as_raw(), 0);
    assert!(state.is_none());
}

#[test]
fn test_empty_configuration_is_rejected() {
    let mut manager = TicketKeyManager::new();
    assert!(!manager.set_tls_ticket_key_seeds(&[] as &[&str], &[], &[]));
    assert!(!manager.is_configured());

    assert!(manager.set_tls_ticket_key_seeds(&["seedOld"], &["seedA"], &["seedNew"]));
    let before = manager.seeds();
    let ticket = issue(&mut manager, b"survives a bad push");

    assert!(!manager.set_tls_ticket_key_seeds(&[] as &[&str], &[], &[]));
    assert!(!manager.set_tls_ticket_key_seeds(&["x"], &[], &["y"]));

    assert_eq!(manager.seeds(), before);
    assert_eq!(manager.registry().len(), 3);
    let (outcome, state) = resume(&mut manager, &ticket);
    assert_eq!(outcome, TicketOutcome::Handled);
    assert_eq!(state.unwrap(), b"survives a bad push");
}

#[test]
fn test_reapplying_seeds_is_idempotent() {
    let mut manager = TicketKeyManager::new();
    assert!(manager.set_tls_ticket_key_seeds(&["o1"], &["c1", "c2"], &["n1"]));
    let names_before: Vec<_> = {
        let mut names: Vec<_> = manager.registry().iter().map(|k| k.name()).collect();
        names.sort();
        names
    };
    let ticket = issue(&mut manager, b"idempotent");

    let mut twin = TicketKeyManager::new();
    assert!(twin.set_tls_ticket_key_seeds(&["o1"], &["c1", "c2"], &["n1"]));

    let record = manager
        .try_set_seeds(&["o1"], &["c1", "c2"], &["n1"])
        .unwrap();
    assert!(record.is_noop());
    assert!(record.valid_rotation);

    let mut names_after: Vec<_> = manager.registry().iter().map(|k| k.name()).collect();
    names_after.sort();
    assert_eq!(names_before, names_after);

    for source in manager.registry().iter() {
        let other = twin.registry().lookup_by_name(&source.name()).unwrap();
        assert!(source.same_key(other));
        assert_eq!(source.category(), other.category());
    }
    assert_eq!(resume(&mut manager, &ticket).0, TicketOutcome::Handled);
}

#[test]
fn test_latest_current_seed_encrypts() {
    let mut manager = TicketKeyManager::new();
    assert!(manager.set_tls_ticket_key_seeds(&[] as &[&str], &["c1", "c2"], &[]));

    for _ in 0..8 {
        let ticket = issue(&mut manager, b"x");
        let (name, _) = split_ticket(&ticket).unwrap();
        assert_eq!(
            name.key_name(),
            make_key_name(&SeedDigest::of(b"c2"), HASH_COUNT)
        );
    }
}

#[test]
fn test_seed_lists_are_reported_by_category() {
    let mut manager = TicketKeyManager::new();
    assert!(manager.set_tls_ticket_key_seeds(&["o1", "o2"], &["c1"], &["n1"]));

    let (old, current, new) = manager.get_tls_ticket_key_seeds();
    assert_eq!(old, vec![b"o1".to_vec(), b"o2".to_vec()]);
    assert_eq!(current, vec![b"c1".to_vec()]);
    assert_eq!(new, vec![b"n1".to_vec()]);
    assert_eq!(manager.seed_store().by_category(SeedCategory::Old).count(), 2);
}

#[test]
fn test_duplicate_seed_across_categories() {
    let mut manager = TicketKeyManager::new();
    assert!(manager.set_tls_ticket_key_seeds(&[] as &[&str], &["same"], &["same"]));

    // Both listings are kept as seeds, but they name one key.
    let (_, current, new) = manager.get_tls_ticket_key_seeds();
    assert_eq!(current, new);
    assert_eq!(manager.registry().len(), 1);

    let ticket = issue(&mut manager, b"dup");
    assert_eq!(resume(&mut manager, &ticket).0, TicketOutcome::Handled);
}
