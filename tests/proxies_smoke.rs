use std::{sync::Arc, time::Duration};

use pretty_assertions::assert_eq;

use pod_memory::{
    ConnSpec, PodMemoryConn,
    network::LocalNetwork,
    primitive::PrimitiveSpec,
    protocol::ProtocolError,
    proxy::{
        CounterMapServer as _, CounterServer as _, IndexedMapServer as _,
        LeaderElectionServer as _, LockServer as _, MapServer as _, MultiMapServer as _,
        PrimitiveProxy as _, SetServer as _, ValueServer as _,
    },
};

async fn connected(namespace: &str) -> PodMemoryConn {
    let conn = PodMemoryConn::new(Arc::new(LocalNetwork::new()));
    conn.connect(&ConnSpec::new(namespace, "store1"))
        .await
        .unwrap();
    conn
}

fn code(err: &ProtocolError) -> Option<&'static str> {
    err.primitive().map(|e| e.code())
}

#[tokio::test]
async fn counter_end_to_end() {
    let conn = connected("counter").await;
    let counter = conn.new_counter(&PrimitiveSpec::new("c")).unwrap();

    assert_eq!(counter.get().await.unwrap(), 0);
    assert_eq!(counter.increment(5).await.unwrap(), 5);
    assert_eq!(counter.decrement(2).await.unwrap(), 3);
    assert_eq!(counter.set(10).await.unwrap(), 10);
    assert_eq!(counter.update(10, 11).await.unwrap(), 11);

    let err = counter.update(10, 12).await.unwrap_err();
    assert_eq!(code(&err), Some("conflict"));
    assert_eq!(counter.get().await.unwrap(), 11);

    // A second proxy over the same name sees the same state.
    let again = conn.new_counter(&PrimitiveSpec::new("c")).unwrap();
    assert_eq!(again.get().await.unwrap(), 11);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn empty_primitive_name_is_rejected() {
    let conn = connected("names").await;
    let err = conn.new_counter(&PrimitiveSpec::new("")).unwrap_err();
    assert_eq!(code(&err), Some("invalid_argument"));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn counter_map_end_to_end() {
    let conn = connected("counter-map").await;
    let map = conn.new_counter_map(&PrimitiveSpec::new("cm")).unwrap();

    assert_eq!(map.set("a".into(), 1).await.unwrap(), None);
    assert_eq!(map.set("a".into(), 2).await.unwrap(), Some(1));
    map.insert("b".into(), 7).await.unwrap();
    let err = map.insert("b".into(), 8).await.unwrap_err();
    assert_eq!(code(&err), Some("already_exists"));

    assert_eq!(map.increment("a".into(), 3).await.unwrap(), 5);
    assert_eq!(map.decrement("b".into(), 2).await.unwrap(), 5);
    map.update("a".into(), 9, 5).await.unwrap();
    let err = map.update("a".into(), 1, 5).await.unwrap_err();
    assert_eq!(code(&err), Some("conflict"));
    assert_eq!(map.get("a".into()).await.unwrap(), Some(9));
    assert_eq!(map.get("zz".into()).await.unwrap(), None);
    assert_eq!(map.len().await.unwrap(), 2);

    let keys: Vec<_> = map
        .entries()
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.key, e.value))
        .collect();
    assert_eq!(keys, vec![("a".to_string(), 9), ("b".to_string(), 5)]);

    let err = map.remove("a".into(), Some(1)).await.unwrap_err();
    assert_eq!(code(&err), Some("conflict"));
    assert_eq!(map.remove("a".into(), Some(9)).await.unwrap(), 9);
    let err = map.remove("a".into(), None).await.unwrap_err();
    assert_eq!(code(&err), Some("not_found"));

    map.clear().await.unwrap();
    assert_eq!(map.len().await.unwrap(), 0);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn set_end_to_end() {
    let conn = connected("set").await;
    let set = conn.new_set(&PrimitiveSpec::new("s")).unwrap();

    set.add("b".into()).await.unwrap();
    set.add("a".into()).await.unwrap();
    let err = set.add("a".into()).await.unwrap_err();
    assert_eq!(code(&err), Some("already_exists"));

    assert!(set.contains("a".into()).await.unwrap());
    assert!(!set.contains("c".into()).await.unwrap());
    assert_eq!(set.len().await.unwrap(), 2);
    assert_eq!(set.elements().await.unwrap(), vec!["a", "b"]);

    set.remove("a".into()).await.unwrap();
    let err = set.remove("a".into()).await.unwrap_err();
    assert_eq!(code(&err), Some("not_found"));

    set.clear().await.unwrap();
    assert!(set.elements().await.unwrap().is_empty());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn value_end_to_end() {
    let conn = connected("value").await;
    let value = conn.new_value(&PrimitiveSpec::new("v")).unwrap();

    assert_eq!(value.get().await.unwrap(), None);
    let v1 = value.set(b"one".to_vec(), None).await.unwrap();
    let v2 = value.set(b"two".to_vec(), Some(v1)).await.unwrap();
    assert!(v2 > v1);

    let err = value.set(b"three".to_vec(), Some(v1)).await.unwrap_err();
    assert_eq!(code(&err), Some("conflict"));

    let current = value.get().await.unwrap().unwrap();
    assert_eq!(current.value, b"two".to_vec());
    assert_eq!(current.version, v2);

    let err = value.delete(Some(v1)).await.unwrap_err();
    assert_eq!(code(&err), Some("conflict"));
    let deleted = value.delete(Some(v2)).await.unwrap();
    assert_eq!(deleted.value, b"two".to_vec());
    assert_eq!(value.get().await.unwrap(), None);

    let err = value.delete(None).await.unwrap_err();
    assert_eq!(code(&err), Some("not_found"));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn map_end_to_end() {
    let conn = connected("map").await;
    let map = conn.new_map(&PrimitiveSpec::new("m")).unwrap();

    let first = map.put("k1".into(), b"a".to_vec(), None).await.unwrap();
    let err = map.insert("k1".into(), b"b".to_vec()).await.unwrap_err();
    assert_eq!(code(&err), Some("already_exists"));
    map.insert("k2".into(), b"b".to_vec()).await.unwrap();

    let err = map
        .update("missing".into(), b"x".to_vec(), None)
        .await
        .unwrap_err();
    assert_eq!(code(&err), Some("not_found"));

    let updated = map
        .update("k1".into(), b"c".to_vec(), Some(first.version))
        .await
        .unwrap();
    assert!(updated.version > first.version);
    let err = map
        .put("k1".into(), b"d".to_vec(), Some(first.version))
        .await
        .unwrap_err();
    assert_eq!(code(&err), Some("conflict"));

    let got = map.get("k1".into()).await.unwrap().unwrap();
    assert_eq!(got.value, b"c".to_vec());
    assert_eq!(map.get("nope".into()).await.unwrap(), None);
    assert_eq!(map.len().await.unwrap(), 2);

    let keys: Vec<_> = map
        .entries()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(keys, vec!["k1", "k2"]);

    let removed = map.remove("k2".into(), None).await.unwrap();
    assert_eq!(removed.value, b"b".to_vec());
    map.clear().await.unwrap();
    assert_eq!(map.len().await.unwrap(), 0);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn multi_map_end_to_end() {
    let conn = connected("multi-map").await;
    let map = conn.new_multi_map(&PrimitiveSpec::new("mm")).unwrap();

    assert!(map.put("k".into(), b"x".to_vec()).await.unwrap());
    assert!(!map.put("k".into(), b"x".to_vec()).await.unwrap());
    assert!(
        map.put_all("k".into(), vec![b"x".to_vec(), b"y".to_vec()])
            .await
            .unwrap()
    );
    assert!(map.contains_entry("k".into(), b"y".to_vec()).await.unwrap());
    assert_eq!(
        map.get("k".into()).await.unwrap(),
        vec![b"x".to_vec(), b"y".to_vec()]
    );

    assert!(map.remove("k".into(), b"x".to_vec()).await.unwrap());
    assert!(!map.remove("k".into(), b"x".to_vec()).await.unwrap());

    map.put("other".into(), b"z".to_vec()).await.unwrap();
    let entries = map.entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, "k");

    assert_eq!(
        map.remove_all("k".into()).await.unwrap(),
        vec![b"y".to_vec()]
    );
    assert!(map.get("k".into()).await.unwrap().is_empty());
    map.clear().await.unwrap();
    assert_eq!(map.len().await.unwrap(), 0);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn indexed_map_end_to_end() {
    let conn = connected("indexed-map").await;
    let map = conn.new_indexed_map(&PrimitiveSpec::new("im")).unwrap();

    let a = map.append("a".into(), b"1".to_vec()).await.unwrap();
    let b = map.append("b".into(), b"2".to_vec()).await.unwrap();
    let c = map.append("c".into(), b"3".to_vec()).await.unwrap();
    assert!(a.index < b.index && b.index < c.index);
    let err = map.append("a".into(), b"x".to_vec()).await.unwrap_err();
    assert_eq!(code(&err), Some("already_exists"));

    assert_eq!(map.first().await.unwrap().unwrap().key, "a");
    assert_eq!(map.last().await.unwrap().unwrap().key, "c");
    assert_eq!(map.next(a.index).await.unwrap().unwrap().key, "b");
    assert_eq!(map.prev(a.index).await.unwrap(), None);
    assert_eq!(map.get_index(c.index).await.unwrap().unwrap().key, "c");

    let updated = map
        .update("b".into(), b"22".to_vec(), Some(b.version))
        .await
        .unwrap();
    assert_eq!(updated.index, b.index);
    let err = map
        .update("b".into(), b"222".to_vec(), Some(b.version))
        .await
        .unwrap_err();
    assert_eq!(code(&err), Some("conflict"));

    map.remove("b".into(), None).await.unwrap();
    assert_eq!(map.next(a.index).await.unwrap().unwrap().key, "c");
    assert_eq!(map.get("b".into()).await.unwrap(), None);

    // Indexes are never reused.
    let d = map.append("b".into(), b"4".to_vec()).await.unwrap();
    assert!(d.index > c.index);
    assert_eq!(map.len().await.unwrap(), 3);

    let keys: Vec<_> = map
        .entries()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(keys, vec!["a", "c", "b"]);
    map.clear().await.unwrap();
    assert_eq!(map.first().await.unwrap(), None);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn leader_election_end_to_end() {
    let conn = connected("election").await;
    let election = conn.new_leader_election(&PrimitiveSpec::new("e")).unwrap();

    let term = election.enter("a".into()).await.unwrap();
    assert_eq!(term.leader.as_deref(), Some("a"));
    let first_term = term.term;

    election.enter("b".into()).await.unwrap();
    let term = election.enter("c".into()).await.unwrap();
    assert_eq!(term.candidates, vec!["a", "b", "c"]);
    assert_eq!(term.term, first_term);

    let term = election.promote("c".into()).await.unwrap();
    assert_eq!(term.candidates, vec!["a", "c", "b"]);

    let term = election.anoint("b".into()).await.unwrap();
    assert_eq!(term.leader.as_deref(), Some("b"));
    assert!(term.term > first_term);

    let term = election.withdraw("b".into()).await.unwrap();
    assert_eq!(term.leader.as_deref(), Some("a"));
    election.withdraw("nobody".into()).await.unwrap();

    let err = election.evict("nobody".into()).await.unwrap_err();
    assert_eq!(code(&err), Some("not_found"));
    let term = election.evict("a".into()).await.unwrap();
    assert_eq!(term.leader.as_deref(), Some("c"));
    assert_eq!(election.get_term().await.unwrap(), term);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn lock_contention_between_proxies() {
    let conn = connected("lock").await;
    let spec = PrimitiveSpec::new("l");
    let first = conn.new_lock(&spec).unwrap();
    let second = conn.new_lock(&spec).unwrap();
    assert_ne!(first.owner(), second.owner());

    assert_eq!(first.get_lock().await.unwrap(), None);
    let v1 = first.lock(Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(first.get_lock().await.unwrap(), Some(v1));
    assert_eq!(second.try_lock().await.unwrap(), None);

    let err = second
        .lock(Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout { operation: "lock" }));

    let err = second.unlock().await.unwrap_err();
    assert_eq!(code(&err), Some("conflict"));

    let waiter = tokio::spawn(async move { second.lock(None).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    first.unlock().await.unwrap();

    let v2 = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(v2 > v1);
    assert_eq!(first.get_lock().await.unwrap(), Some(v2));
    assert_eq!(first.try_lock().await.unwrap(), None);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn unbounded_lock_timeout_waits_for_release() {
    let conn = connected("lock-forever").await;
    let spec = PrimitiveSpec::new("l");
    let holder = conn.new_lock(&spec).unwrap();
    let waiter = conn.new_lock(&spec).unwrap();
    let v1 = holder.lock(None).await.unwrap();

    let pending = tokio::time::timeout(
        Duration::from_millis(300),
        waiter.lock(Some(Duration::MAX)),
    )
    .await;
    assert!(pending.is_err(), "lock should still be waiting");

    let task = tokio::spawn(async move { waiter.lock(Some(Duration::MAX)).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    holder.unlock().await.unwrap();

    let v2 = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(v2 > v1);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn primitives_of_different_kinds_share_a_name() {
    let conn = connected("kinds").await;
    let spec = PrimitiveSpec::new("same");
    let counter = conn.new_counter(&spec).unwrap();
    let set = conn.new_set(&spec).unwrap();

    counter.increment(1).await.unwrap();
    set.add("x".into()).await.unwrap();
    assert_eq!(counter.get().await.unwrap(), 1);
    assert_eq!(set.len().await.unwrap(), 1);
    assert_ne!(counter.kind(), set.kind());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn proxy_calls_fail_after_close() {
    let conn = connected("closed").await;
    let map = conn.new_map(&PrimitiveSpec::new("m")).unwrap();
    map.put("k".into(), b"v".to_vec(), None).await.unwrap();

    conn.close().await.unwrap();
    let err = map.get("k".into()).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Closed));
    let err = conn.new_map(&PrimitiveSpec::new("m")).unwrap_err();
    assert!(matches!(err, ProtocolError::NotConnected));
}
