//! End-to-end tests for batched key-value access.
//!
//! Tests set/get round trips through SampleProxy, overwrites with same and
//! different lengths, missing keys, erasure, scans and named collections.
//! Each test runs against a fresh in-memory Database.

use kvgraph::{
    BufferStride, Database, DisjointValuesView, Error, Key, MemoryStore, SampleProxy, Store,
    StoreConfig,
};

// ============================================================================
// Helper: assert that a proxy reads back exactly `values`, in key order.
// ============================================================================

fn round_trip<S: Store>(proxy: &SampleProxy<'_, '_, S>, values: &DisjointValuesView<'_>) {
    proxy.set(values).expect("failed to assign");

    let tape = proxy.get().expect("failed to fetch inserted keys");
    let retrieved = tape.values();
    assert_eq!(retrieved.len(), proxy.len());
    for (i, got) in retrieved.iter().enumerate() {
        assert_eq!(got, values.get(i).unwrap(), "value {i} differs");
    }
}

fn int_bytes(vals: &[u64]) -> Vec<u8> {
    vals.iter().flat_map(|v| v.to_le_bytes()).collect()
}

// ============================================================================
// 1. Fixed-width integers, then overwritten with same-length values
// ============================================================================

#[test]
fn test_integers_round_trip_and_overwrite() {
    let db = Database::open_memory().unwrap();
    let session = db.session();
    let keys = [34, 35, 36];
    let proxy = session.sample(&keys);

    let mut vals = vec![34u64, 35, 36];
    let bytes = int_bytes(&vals);
    let view = DisjointValuesView::packed(&bytes, &[0, 8, 16], &[8, 8, 8]).unwrap();
    round_trip(&proxy, &view);

    // Same length, different byte pattern
    for v in &mut vals {
        *v += 100;
    }
    let bytes = int_bytes(&vals);
    let view = DisjointValuesView::fixed_width(&bytes, 8).unwrap();
    round_trip(&proxy, &view);

    let tape = proxy.get().unwrap();
    let first = u64::from_le_bytes(tape.values().get(0).unwrap().try_into().unwrap());
    assert_eq!(first, 134);
}

// ============================================================================
// 2. Overwrite with different lengths is a full replacement
// ============================================================================

#[test]
fn test_overwrite_different_length() {
    let db = Database::open_memory().unwrap();
    let session = db.session();
    let keys = [7];
    let proxy = session.sample(&keys);

    for value in [&b"y"[..], &b"jjjjjjjj"[..], &b"yy"[..]] {
        round_trip(&proxy, &DisjointValuesView::from_slices(&[value]));
    }
    assert_eq!(proxy.get().unwrap().contents(), b"yy");
}

// ============================================================================
// 3. Ragged batch across per-value buffers
// ============================================================================

#[test]
fn test_ragged_batch_insert() {
    let db = Database::open_memory().unwrap();
    let session = db.session();

    let keys: Vec<Key> = (1..=20).collect();
    let owned: Vec<Vec<u8>> = keys
        .iter()
        .map(|&i| {
            let reps = if i <= 10 { i } else { i - 10 };
            i.to_string().repeat(reps as usize).into_bytes()
        })
        .collect();
    let buffers: Vec<&[u8]> = owned.iter().map(Vec::as_slice).collect();
    let offsets = vec![0u32; buffers.len()];
    let lengths: Vec<u32> = buffers.iter().map(|b| b.len() as u32).collect();

    let view = DisjointValuesView::new(&buffers, BufferStride::PerValue, &offsets, &lengths).unwrap();
    let proxy = session.sample(&keys);
    round_trip(&proxy, &view);

    let single = [13];
    let tape = session.sample(&single).get().unwrap();
    assert_eq!(tape.values().get(0), Some(&b"131313"[..]));
}

// ============================================================================
// 4. Missing keys read as zero-length, not as errors
// ============================================================================

#[test]
fn test_missing_keys_are_zero_length() {
    let db = Database::open_memory().unwrap();
    let session = db.session();
    let written = [1];
    session
        .sample(&written)
        .set(&DisjointValuesView::from_slices(&[&b"x"[..]]))
        .unwrap();

    let keys = [5, 1, 6];
    let proxy = session.sample(&keys);
    let tape = proxy.get().unwrap();
    assert_eq!(tape.lengths(), &[0, 1, 0]);
    assert_eq!(proxy.lengths().unwrap(), vec![None, Some(1), None]);
}

// ============================================================================
// 5. Repeated keys in one proxy
// ============================================================================

#[test]
fn test_repeated_keys() {
    let db = Database::open_memory().unwrap();
    let session = db.session();
    let keys = [9, 9, 10];
    let proxy = session.sample(&keys);
    proxy
        .set(&DisjointValuesView::packed(b"abc", &[0, 1, 2], &[1, 1, 1]).unwrap())
        .unwrap();

    let values: Vec<Vec<u8>> = proxy.get().unwrap().values().iter().map(<[u8]>::to_vec).collect();
    assert_eq!(values, vec![b"b".to_vec(), b"b".to_vec(), b"c".to_vec()]);
}

// ============================================================================
// 6. Shape mismatch is reported and nothing is written
// ============================================================================

#[test]
fn test_shape_mismatch() {
    let db = Database::open_memory().unwrap();
    let session = db.session();
    let keys = [1, 2];
    let proxy = session.sample(&keys);

    let err = proxy
        .set(&DisjointValuesView::from_slices(&[&b"only one"[..]]))
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { keys: 2, values: 1 }));
    assert_eq!(proxy.contains().unwrap(), vec![false, false]);
}

// ============================================================================
// 7. Erase and explicit delete via zero-length writes
// ============================================================================

#[test]
fn test_erase() {
    let db = Database::open_memory().unwrap();
    let session = db.session();
    let keys = [3, 4];
    let proxy = session.sample(&keys);
    proxy
        .set(&DisjointValuesView::from_slices(&[&b"x"[..], &b"y"[..]]))
        .unwrap();
    assert_eq!(proxy.contains().unwrap(), vec![true, true]);

    let just_three = [3];
    session.sample(&just_three).erase().unwrap();
    assert_eq!(proxy.contains().unwrap(), vec![false, true]);

    session
        .sample(&[4])
        .set(&DisjointValuesView::erasures(1))
        .unwrap();
    assert_eq!(proxy.contains().unwrap(), vec![false, false]);
}

// ============================================================================
// 8. Scans
// ============================================================================

#[test]
fn test_scan() {
    let db = Database::open_memory().unwrap();
    let session = db.session();
    let keys = [10, 20, 30, 40, 50, 60];
    let payload = b"aaaaaa";
    let offsets = [0u32; 6];
    let lengths = [1u32, 2, 3, 4, 5, 6];
    session
        .sample(&keys)
        .set(&DisjointValuesView::packed(payload, &offsets, &lengths).unwrap())
        .unwrap();

    let page = session.scan(10, 6).unwrap();
    assert_eq!(page.keys, vec![10, 20, 30, 40, 50, 60]);
    assert_eq!(page.lengths, vec![1, 2, 3, 4, 5, 6]);

    let page = session.scan(20, 5).unwrap();
    assert_eq!(page.keys, vec![20, 30, 40, 50, 60]);

    let page = session.scan(40, 2).unwrap();
    assert_eq!(page.keys, vec![40, 50]);
    assert_eq!(page.lengths, vec![4, 5]);

    let page = session.scan(60, 1).unwrap();
    assert_eq!(page.keys, vec![60]);
    assert_eq!(page.lengths, vec![6]);
}

// ============================================================================
// 9. Named collections partition the key space
// ============================================================================

#[test]
fn test_named_collections() {
    let db = Database::open_memory().unwrap();
    let sub = db.collection("sub").unwrap();
    let dub = db.collection("dub").unwrap();
    let keys = [1];

    sub.sample(&keys).set(&DisjointValuesView::from_slices(&[&b"s"[..]])).unwrap();
    dub.sample(&keys).set(&DisjointValuesView::from_slices(&[&b"dd"[..]])).unwrap();

    assert_eq!(sub.sample(&keys).get().unwrap().contents(), b"s");
    assert_eq!(dub.sample(&keys).get().unwrap().contents(), b"dd");
    assert_eq!(db.session().sample(&keys).lengths().unwrap(), vec![None]);
    assert_eq!(db.collections().unwrap(), vec!["dub", "sub"]);

    db.remove_collection("sub").unwrap();
    assert!(matches!(sub.sample(&keys).get(), Err(Error::ReadFailed(_))));
    assert_eq!(db.collections().unwrap(), vec!["dub"]);
}

// ============================================================================
// 10. Config: open from JSON, limits, bad configs
// ============================================================================

#[test]
fn test_open_from_json_config() {
    let db = Database::<MemoryStore>::open(
        r#"{"max_value_len": 4, "collections": ["graph"]}"#,
    )
    .unwrap();
    assert_eq!(db.collections().unwrap(), vec!["graph"]);

    let keys = [1, 2];
    let session = db.session();
    let err = session
        .sample(&keys)
        .set(&DisjointValuesView::from_slices(&[&b"ok"[..], &b"too long"[..]]))
        .unwrap_err();
    assert!(matches!(err, Error::WriteFailed(_)));
    assert_eq!(session.sample(&keys).contains().unwrap(), vec![false, false]);
}

#[test]
fn test_open_rejects_bad_config() {
    assert!(matches!(Database::<MemoryStore>::open("{oops"), Err(Error::OpenError(_))));
    assert!(matches!(
        Database::<MemoryStore>::open_with(StoreConfig::default().with_max_batch_len(0)),
        Err(Error::OpenError(_))
    ));
    assert!(Database::<MemoryStore>::open("   ").is_ok());
}

// ============================================================================
// 11. Closed store: every call fails with NotOpen
// ============================================================================

#[test]
fn test_not_open_after_close() {
    let db = Database::open_memory().unwrap();
    let session = db.session();
    let keys = [1];
    let proxy = session.sample(&keys);
    proxy.set(&DisjointValuesView::from_slices(&[&b"a"[..]])).unwrap();

    db.close().unwrap();
    assert!(matches!(proxy.get(), Err(Error::NotOpen)));
    assert!(matches!(
        proxy.set(&DisjointValuesView::from_slices(&[&b"b"[..]])),
        Err(Error::NotOpen)
    ));
    assert!(matches!(session.scan(0, 10), Err(Error::NotOpen)));
    assert!(matches!(db.collection("late"), Err(Error::NotOpen)));
}
