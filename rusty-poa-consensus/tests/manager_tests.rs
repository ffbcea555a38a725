use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rusty_poa_consensus::{
    snapshot_key, ConsensusError, KeyValueStore, MemoryStore, PoaConfig, SealRecoverer,
    SnapshotManager,
};
use rusty_poa_crypto::SealKeyPair;
use rusty_poa_types::{Address, BlockHeader, VoteKind};

const GENESIS_HASH: [u8; 32] = [7; 32];

fn key(id: u8) -> SealKeyPair {
    SealKeyPair::from_seed([id; 32]).unwrap()
}

fn sealed(key: &SealKeyPair, number: u64, target: Address, kind: VoteKind) -> BlockHeader {
    let mut header = BlockHeader::new([0; 32], number, target, kind.nonce());
    key.seal(&mut header);
    header
}

fn config(signers: &[&SealKeyPair]) -> PoaConfig {
    let mut config = PoaConfig::with_signers(signers.iter().map(|key| key.address()).collect());
    config.checkpoint_interval = 2;
    config
}

fn new_manager(config: PoaConfig, store: &Arc<MemoryStore>) -> SnapshotManager {
    let recovery = Arc::new(SealRecoverer::with_capacity(64).unwrap());
    SnapshotManager::new(config, store.clone(), recovery).unwrap()
}

#[test]
fn test_genesis_is_persisted() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (x, y) = (key(1), key(2));
    let store = Arc::new(MemoryStore::new());
    let mut manager = new_manager(config(&[&x, &y]), &store);
    assert!(manager.current().is_none());

    let genesis = manager.genesis(GENESIS_HASH).unwrap();
    assert_eq!(genesis.number(), 0);
    assert_eq!(genesis.signer_count(), 2);
    assert_eq!(genesis.quorum_percent(), 50);
    assert!(store.get(&snapshot_key(&GENESIS_HASH)).unwrap().is_some());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_advance_checkpoints_on_interval() {
    let (x, y, z) = (key(1), key(2), key(3));
    let store = Arc::new(MemoryStore::new());
    let mut manager = new_manager(config(&[&x, &y, &z]), &store);
    manager.genesis(GENESIS_HASH).unwrap();

    let first = sealed(&x, 1, Address::zero(), VoteKind::Drop);
    assert_eq!(manager.advance(&[first]).unwrap().number(), 1);
    assert_eq!(store.len(), 1);

    let second = sealed(&y, 2, Address::zero(), VoteKind::Drop);
    let snap = manager.advance(&[second.clone()]).unwrap();
    assert_eq!(snap.number(), 2);
    assert_eq!(snap.hash(), second.hash());
    assert_eq!(store.len(), 2);
    assert!(store.get(&snapshot_key(&second.hash())).unwrap().is_some());
}

#[test]
fn test_resume_from_checkpoint() {
    let (x, y, z, w) = (key(1), key(2), key(3), key(4));
    let store = Arc::new(MemoryStore::new());
    let mut first = new_manager(config(&[&x, &y, &z]), &store);
    first.genesis(GENESIS_HASH).unwrap();

    let headers = vec![
        sealed(&x, 1, w.address(), VoteKind::Authorize),
        sealed(&y, 2, Address::from_low_u64(60), VoteKind::QuorumPercent),
    ];
    let checkpoint = headers[1].hash();
    let expected = first.advance(&headers).unwrap().clone();
    assert_eq!(expected.tally()[&w.address()].votes, 1);

    let mut second = new_manager(config(&[&x, &y, &z]), &store);
    let resumed = second.resume(&checkpoint).unwrap();
    assert_eq!(*resumed, expected);
    assert_eq!(resumed.recently_signed(&y.address()), Some(2));
    assert_eq!(resumed.quorum_tally()[&60].votes, 1);

    // The resumed snapshot keeps tallying where the first manager stopped
    let snap = second
        .advance(&[sealed(&z, 3, w.address(), VoteKind::Authorize)])
        .unwrap();
    assert!(snap.is_signer(&w.address()));
}

#[test]
fn test_snapshot_lookup() {
    let (x, y) = (key(1), key(2));
    let store = Arc::new(MemoryStore::new());
    let mut manager = new_manager(config(&[&x, &y]), &store);
    manager.genesis(GENESIS_HASH).unwrap();

    let header = sealed(&x, 1, Address::zero(), VoteKind::Drop);
    manager.advance(&[header.clone()]).unwrap();

    // Not a checkpoint, so only the in-memory cache knows it
    assert!(store.get(&snapshot_key(&header.hash())).unwrap().is_none());
    assert_eq!(manager.snapshot(&header.hash()).unwrap().number(), 1);

    let mut fresh = new_manager(config(&[&x, &y]), &store);
    assert_eq!(fresh.snapshot(&GENESIS_HASH).unwrap().number(), 0);
    assert_eq!(
        fresh.snapshot(&header.hash()),
        Err(ConsensusError::SnapshotNotFound(header.hash()))
    );
}

#[test]
fn test_failed_advance_keeps_current() {
    let (x, y, z) = (key(1), key(2), key(3));
    let store = Arc::new(MemoryStore::new());
    let mut manager = new_manager(config(&[&x, &y, &z]), &store);
    manager.genesis(GENESIS_HASH).unwrap();
    let before = manager.current().cloned();

    let result = manager.advance(&[sealed(&x, 5, Address::zero(), VoteKind::Drop)]);
    assert!(matches!(
        result,
        Err(ConsensusError::InvalidChain { expected: 1, found: 5 })
    ));

    let headers = vec![
        sealed(&x, 1, Address::zero(), VoteKind::Drop),
        sealed(&x, 2, Address::zero(), VoteKind::Drop),
    ];
    assert!(matches!(
        manager.advance(&headers),
        Err(ConsensusError::RecentlySigned(_))
    ));
    assert_eq!(manager.current().cloned(), before);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_advance_requires_snapshot() {
    let x = key(1);
    let store = Arc::new(MemoryStore::new());
    let mut manager = new_manager(config(&[&x]), &store);
    let header = sealed(&x, 1, Address::zero(), VoteKind::Drop);
    assert!(matches!(manager.advance(&[header]), Err(ConsensusError::NoSnapshot)));
    assert!(matches!(
        manager.resume(&[1; 32]),
        Err(ConsensusError::SnapshotNotFound(_))
    ));
}

#[test]
fn test_advance_with_abort() {
    let (x, y) = (key(1), key(2));
    let store = Arc::new(MemoryStore::new());
    let mut manager = new_manager(config(&[&x, &y]), &store);
    manager.genesis(GENESIS_HASH).unwrap();

    let headers = vec![sealed(&x, 1, Address::zero(), VoteKind::Drop)];
    let abort = AtomicBool::new(true);
    assert!(matches!(
        manager.advance_with_abort(&headers, &abort),
        Err(ConsensusError::Aborted { processed: 0 })
    ));
    assert_eq!(manager.current().map(|snap| snap.number()), Some(0));

    let proceed = AtomicBool::new(false);
    let snap = manager.advance_with_abort(&headers, &proceed).unwrap();
    assert_eq!(snap.number(), 1);
}

#[test]
fn test_invalid_config_rejected() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let recovery = Arc::new(SealRecoverer::with_capacity(8).unwrap());

    let empty = PoaConfig::default();
    assert!(matches!(
        SnapshotManager::new(empty, store.clone(), recovery.clone()),
        Err(ConsensusError::InvalidConfig(_))
    ));

    let mut no_cache = PoaConfig::with_signers(vec![key(1).address()]);
    no_cache.inmemory_snapshots = 0;
    assert!(matches!(
        SnapshotManager::new(no_cache, store, recovery),
        Err(ConsensusError::InvalidConfig(_))
    ));
}
