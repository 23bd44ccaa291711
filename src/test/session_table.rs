use super::{addr, mac};
use crate::sim::SimTime;
use crate::tunnel::{SessionState, SessionTable};
use crate::wire::Capacity;

fn state() -> SessionState {
    SessionState::new(Capacity::default(), 1234)
}

#[test]
fn insert_indexes_by_mac_addr_and_last_seen() {
    let mut t = SessionTable::new();
    let k = t
        .insert(mac(1), addr("10.0.0.1:1000"), SimTime::from_secs(1), state())
        .expect("insert");
    assert_eq!(t.len(), 1);
    assert_eq!(t.find_by_mac(&mac(1)), Some(k));
    assert_eq!(t.find_by_addr(&addr("10.0.0.1:1000")), Some(k));
    assert_eq!(t.oldest(), Some(k));
    assert!(t.is_consistent());
}

#[test]
fn insert_rejects_duplicate_keys() {
    let mut t = SessionTable::new();
    t.insert(mac(1), addr("10.0.0.1:1000"), SimTime::ZERO, state())
        .expect("insert");
    assert!(t.insert(mac(1), addr("10.0.0.2:1000"), SimTime::ZERO, state()).is_none());
    assert!(t.insert(mac(2), addr("10.0.0.1:1000"), SimTime::ZERO, state()).is_none());
    assert_eq!(t.len(), 1);
    assert!(t.is_consistent());
}

#[test]
fn touch_reorders_last_seen() {
    let mut t = SessionTable::new();
    let a = t
        .insert(mac(1), addr("10.0.0.1:1"), SimTime::from_secs(1), state())
        .expect("a");
    let b = t
        .insert(mac(2), addr("10.0.0.2:1"), SimTime::from_secs(2), state())
        .expect("b");
    assert_eq!(t.oldest(), Some(a));

    assert!(t.touch(a, SimTime::from_secs(3)));
    assert_eq!(t.oldest(), Some(b));
    assert_eq!(t.get(a).expect("a").last_seen(), SimTime::from_secs(3));
    let order: Vec<_> = t.iter().map(|(_, s)| s.mac()).collect();
    assert_eq!(order, vec![mac(2), mac(1)]);
    assert!(t.is_consistent());
}

#[test]
fn equal_last_seen_keeps_insertion_order() {
    let mut t = SessionTable::new();
    let a = t
        .insert(mac(1), addr("10.0.0.1:1"), SimTime::ZERO, state())
        .expect("a");
    t.insert(mac(2), addr("10.0.0.2:1"), SimTime::ZERO, state())
        .expect("b");
    assert_eq!(t.oldest(), Some(a));
}

#[test]
fn update_addr_moves_the_address_index() {
    let mut t = SessionTable::new();
    let a = t
        .insert(mac(1), addr("10.0.0.1:1"), SimTime::ZERO, state())
        .expect("a");
    t.insert(mac(2), addr("10.0.0.2:1"), SimTime::ZERO, state())
        .expect("b");

    assert!(t.update_addr(a, addr("10.0.0.9:1")));
    assert_eq!(t.find_by_addr(&addr("10.0.0.9:1")), Some(a));
    assert!(t.find_by_addr(&addr("10.0.0.1:1")).is_none());
    assert_eq!(t.get(a).expect("a").addr(), addr("10.0.0.9:1"));

    // 地址属于别的会话时不动
    assert!(!t.update_addr(a, addr("10.0.0.2:1")));
    assert_eq!(t.get(a).expect("a").addr(), addr("10.0.0.9:1"));
    assert!(t.is_consistent());
}

#[test]
fn remove_clears_all_indices_and_invalidates_key() {
    let mut t = SessionTable::new();
    let a = t
        .insert(mac(1), addr("10.0.0.1:1"), SimTime::ZERO, state())
        .expect("a");
    let removed = t.remove(a).expect("removed");
    assert_eq!(removed.mac(), mac(1));
    assert!(t.is_empty());
    assert!(t.find_by_mac(&mac(1)).is_none());
    assert!(t.find_by_addr(&addr("10.0.0.1:1")).is_none());
    assert!(t.oldest().is_none());
    assert!(t.get(a).is_none());
    assert!(t.remove(a).is_none());

    // 复用的槽位不会被旧键访问到
    let b = t
        .insert(mac(2), addr("10.0.0.2:1"), SimTime::ZERO, state())
        .expect("b");
    assert_ne!(a, b);
    assert!(t.get(a).is_none());
    assert!(t.state_mut(a).is_none());
    assert!(t.is_consistent());
}

#[test]
fn pop_oldest_and_clear() {
    let mut t = SessionTable::new();
    t.insert(mac(1), addr("10.0.0.1:1"), SimTime::from_secs(5), state())
        .expect("a");
    t.insert(mac(2), addr("10.0.0.2:1"), SimTime::from_secs(1), state())
        .expect("b");
    t.insert(mac(3), addr("10.0.0.3:1"), SimTime::from_secs(3), state())
        .expect("c");

    assert_eq!(t.pop_oldest().expect("oldest").mac(), mac(2));
    assert_eq!(t.len(), 2);
    assert!(t.is_consistent());

    t.clear();
    assert!(t.is_empty());
    assert!(t.is_consistent());
}
