use blockfs::tree::{NodeCache, Path};
use blockfs::{BlockPointer, BranchName, CacheError, TlfId};
use std::sync::Arc;
use std::thread;

fn ptr(seed: &str) -> BlockPointer {
    BlockPointer::from_content(seed.as_bytes())
}

fn new_cache() -> NodeCache {
    NodeCache::new(TlfId::from_name("alice,bob"), BranchName::master())
}

#[test]
fn path_of_deep_chain_is_root_to_leaf() {
    let cache = new_cache();
    let mut parent = cache.get_or_create(ptr("n0"), "alice,bob", None).unwrap();
    for i in 1..10 {
        let name = format!("d{}", i);
        parent = cache
            .get_or_create(ptr(&format!("n{}", i)), &name, Some(&parent))
            .unwrap();
    }

    let path = cache.path_from_node(&parent);
    assert_eq!(path.len(), 10);
    for (i, step) in path.nodes.iter().enumerate() {
        assert_eq!(step.pointer, ptr(&format!("n{}", i)));
    }
    assert_eq!(path.to_string(), "/alice,bob/d1/d2/d3/d4/d5/d6/d7/d8/d9");
}

#[test]
fn rename_then_rewrite_keeps_identity() {
    let cache = new_cache();
    let root = cache.get_or_create(ptr("root"), "alice,bob", None).unwrap();
    let docs = cache.get_or_create(ptr("docs"), "docs", Some(&root)).unwrap();
    let archive = cache.get_or_create(ptr("archive"), "archive", Some(&root)).unwrap();
    let file = cache.get_or_create(ptr("f-v1"), "notes.txt", Some(&docs)).unwrap();

    cache.move_node(ptr("f-v1"), &archive, "old-notes.txt").unwrap();
    cache.update_pointer(ptr("f-v1"), ptr("f-v2"));

    let path = cache.path_from_node(&file);
    assert_eq!(path.to_string(), "/alice,bob/archive/old-notes.txt");
    assert_eq!(path.tail_pointer(), Some(ptr("f-v2")));
    assert_eq!(cache.ref_count(&ptr("docs")), Some(1));
    assert_eq!(cache.ref_count(&ptr("archive")), Some(2));

    // A directory whose content was rewritten still parents its children
    cache.update_pointer(ptr("archive"), ptr("archive-v2"));
    let path = cache.path_from_node(&file);
    assert_eq!(path.nodes[1].pointer, ptr("archive-v2"));
}

#[test]
fn stale_handle_must_be_reacquired() {
    let cache = new_cache();
    let root = cache.get_or_create(ptr("root"), "alice,bob", None).unwrap();
    let dir = cache.get_or_create(ptr("dir"), "dir", Some(&root)).unwrap();
    cache.forget(&dir);

    let err = cache.get_or_create(ptr("child"), "child", Some(&dir)).unwrap_err();
    assert_eq!(err, CacheError::ParentNotFound(ptr("dir")));

    // Re-resolving from the root yields a fresh, usable handle
    let dir = cache.get_or_create(ptr("dir"), "dir", Some(&root)).unwrap();
    let child = cache.get_or_create(ptr("child"), "child", Some(&dir)).unwrap();
    assert_eq!(cache.path_from_node(&child).to_string(), "/alice,bob/dir/child");
}

#[test]
fn unlinked_file_keeps_answering_with_old_path() {
    let cache = new_cache();
    let root = cache.get_or_create(ptr("root"), "alice,bob", None).unwrap();
    let file = cache.get_or_create(ptr("f"), "open.txt", Some(&root)).unwrap();
    let old_path = cache.path_from_node(&file);

    cache.unlink(ptr("f"), old_path.clone());
    cache.forget(&root);
    assert!(cache.get_without_reference(&ptr("root")).is_none());

    let path: Path = cache.path_from_node(&file);
    assert_eq!(path, old_path);
    assert_eq!(path.to_string(), "/alice,bob/open.txt");

    cache.forget(&file);
    assert!(cache.is_empty());
}

#[test]
fn releasing_tree_layer_by_layer_empties_cache() {
    let cache = new_cache();
    let root = cache.get_or_create(ptr("root"), "alice,bob", None).unwrap();
    let dir = cache.get_or_create(ptr("dir"), "dir", Some(&root)).unwrap();
    let file = cache.get_or_create(ptr("file"), "file", Some(&dir)).unwrap();
    assert_eq!(cache.len(), 3);

    // Each child holds one reference on its parent, released when the
    // child is unlinked from the tree.
    cache.unlink(ptr("file"), cache.path_from_node(&file));
    cache.forget(&file);
    cache.unlink(ptr("dir"), cache.path_from_node(&dir));
    cache.forget(&dir);
    cache.forget(&root);
    assert!(cache.is_empty());
}

#[test]
fn concurrent_moves_and_path_lookups() {
    let cache = Arc::new(new_cache());
    let root = cache.get_or_create(ptr("root"), "alice,bob", None).unwrap();
    let a = cache.get_or_create(ptr("a"), "a", Some(&root)).unwrap();
    let b = cache.get_or_create(ptr("b"), "b", Some(&root)).unwrap();
    let file = cache.get_or_create(ptr("f"), "f", Some(&a)).unwrap();

    let mover = {
        let cache = Arc::clone(&cache);
        let (a, b) = (a.clone(), b.clone());
        thread::spawn(move || {
            for i in 0..500 {
                let target = if i % 2 == 0 { &b } else { &a };
                cache.move_node(ptr("f"), target, "f").unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let file = file.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let path = cache.path_from_node(&file);
                    let shown = path.to_string();
                    assert!(shown == "/alice,bob/a/f" || shown == "/alice,bob/b/f", "{}", shown);
                }
            })
        })
        .collect();

    mover.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    // 500 moves end on `a`; each parent holds its own reference plus the file's
    assert_eq!(cache.ref_count(&ptr("a")), Some(2));
    assert_eq!(cache.ref_count(&ptr("b")), Some(1));
}
