//! Fixed-point and structural-preservation properties (§8): a filter that
//! never changes anything must reproduce the exact input root OID and
//! write no new objects.

mod common;

use std::sync::Arc;

use common::NoopFilter;
use filtertree_lib::backend::memory::MemoryStore;
use filtertree_lib::Engine;
use filtertree_lib::Entry;
use filtertree_lib::EntryPath;
use filtertree_lib::Kind;
use filtertree_lib::Mode;
use filtertree_lib::ObjectStore;
use filtertree_lib::Scheduler;

#[test]
fn noop_filter_reproduces_the_input_root_oid() {
    let scheduler = Arc::new(Scheduler::new(Some(4)).unwrap());
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());

    scheduler.block_on(async {
        let a = store.write_blob(b"a").await.unwrap();
        let b = store.write_blob(b"b").await.unwrap();
        let nested = store
            .write_tree(&[Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid: b,
                name: "b.txt".to_string(),
                path: EntryPath::root(),
            }])
            .await
            .unwrap();
        let root = store
            .write_tree(&[
                Entry {
                    mode: Mode::REGULAR,
                    kind: Kind::Blob,
                    oid: a,
                    name: "a.txt".to_string(),
                    path: EntryPath::root(),
                },
                Entry {
                    mode: Mode::TREE,
                    kind: Kind::Tree,
                    oid: nested,
                    name: "nested".to_string(),
                    path: EntryPath::root(),
                },
            ])
            .await
            .unwrap();

        let engine = Engine::new(store.clone(), scheduler.clone(), Arc::new(NoopFilter));
        let new_root = engine.rewrite_root(root.clone()).await.unwrap();
        assert_eq!(new_root, root);
    });
}

#[test]
fn empty_tree_rewrites_to_an_empty_tree() {
    let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());

    scheduler.block_on(async {
        let empty = store.write_tree(&[]).await.unwrap();
        let engine = Engine::new(store.clone(), scheduler.clone(), Arc::new(NoopFilter));
        let new_root = engine.rewrite_root(empty.clone()).await.unwrap();
        assert_eq!(new_root, empty);
        assert!(store.read_tree(&new_root).await.unwrap().is_empty());
    });
}

#[test]
fn zero_length_blob_is_handled_without_error() {
    let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());

    scheduler.block_on(async {
        let empty_blob = store.write_blob(b"").await.unwrap();
        let root = store
            .write_tree(&[Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid: empty_blob,
                name: "empty".to_string(),
                path: EntryPath::root(),
            }])
            .await
            .unwrap();

        let engine = Engine::new(store.clone(), scheduler.clone(), Arc::new(NoopFilter));
        let new_root = engine.rewrite_root(root.clone()).await.unwrap();
        assert_eq!(new_root, root);
    });
}

#[test]
fn unmodified_subtree_keeps_its_original_oid() {
    let scheduler = Arc::new(Scheduler::new(Some(4)).unwrap());
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());

    scheduler.block_on(async {
        let file = store.write_blob(b"unchanged").await.unwrap();
        let untouched_subtree = store
            .write_tree(&[Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid: file,
                name: "file.txt".to_string(),
                path: EntryPath::root(),
            }])
            .await
            .unwrap();
        let other = store.write_blob(b"root-level file").await.unwrap();
        let root = store
            .write_tree(&[
                Entry {
                    mode: Mode::TREE,
                    kind: Kind::Tree,
                    oid: untouched_subtree.clone(),
                    name: "keep-me".to_string(),
                    path: EntryPath::root(),
                },
                Entry {
                    mode: Mode::REGULAR,
                    kind: Kind::Blob,
                    oid: other,
                    name: "root.txt".to_string(),
                    path: EntryPath::root(),
                },
            ])
            .await
            .unwrap();

        let engine = Engine::new(store.clone(), scheduler.clone(), Arc::new(NoopFilter));
        let new_root = engine.rewrite_root(root.clone()).await.unwrap();
        let new_entries = store.read_tree(&new_root).await.unwrap();
        let kept = new_entries.iter().find(|e| e.name == "keep-me").unwrap();
        assert_eq!(kept.oid, untouched_subtree);
    });
}
