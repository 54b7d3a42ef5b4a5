use std::ptr;
use std::thread::scope;

use rand::prelude::*;

use mvptr::{Clock, Global, Marks, Shared, VersionMeta, Versioned, VersionedPtr};

struct Node {
    meta: VersionMeta,
    val: usize,
}

impl Versioned for Node {
    fn meta(&self) -> &VersionMeta {
        &self.meta
    }
}

fn node(val: usize) -> *mut Node {
    Box::into_raw(Box::new(Node {
        meta: VersionMeta::new(),
        val,
    }))
}

fn val(shared: Shared<'_, Node>) -> usize {
    unsafe { shared.deref() }.val
}

#[test]
fn read_after_write() {
    const STORES: usize = 100;

    let global = Global::new();
    let guard = global.guard();
    let field = VersionedPtr::null();

    for i in 1..=STORES {
        assert!(field.store(node(i), &guard));
    }

    assert_eq!(val(field.read_linearized(&guard)), STORES);
    // Exactly one tag advance per successful store.
    assert_eq!(field.tag(), STORES as u64);
}

#[test]
fn snapshot_stability() {
    let global = Global::new();
    let guard = global.guard();
    let field = VersionedPtr::null();

    assert!(field.store(node(1), &guard));

    let snap = global.snapshot();
    assert!(field.store(node(2), &guard));
    assert!(field.store(node(3), &guard));

    // The pinned guard keeps answering with the pre-store value.
    for _ in 0..3 {
        assert_eq!(val(field.load(&snap)), 1);
    }
    assert_eq!(val(field.load(&guard)), 3);

    // A snapshot taken after the stores sees the latest value.
    let later = global.snapshot();
    assert_eq!(val(field.load(&later)), 3);
}

#[test]
fn null_store_roundtrip() {
    let global = Global::new();
    let guard = global.guard();
    let field = VersionedPtr::new(node(1));

    assert!(field.store(ptr::null_mut(), &guard));
    assert!(field.read_linearized(&guard).is_null());
    assert_eq!(field.marks(), Marks::INDIRECT | Marks::WRAPPED_NULL);

    assert!(field.store(node(2), &guard));
    assert_eq!(val(field.read_linearized(&guard)), 2);
}

#[test]
fn reclaim_shortens_indirection() {
    let global = Global::new();
    let guard = global.guard();
    let field = VersionedPtr::null();

    assert!(field.store(node(1), &guard));
    assert!(field.store(ptr::null_mut(), &guard));
    assert!(field.marks().contains(Marks::WRAPPED_NULL));

    global.advance_horizon(global.clock().read_stamp());
    let tag_before = field.tag();

    assert!(field.read_and_reclaim(&guard).is_null());
    // The wrapped null was unwrapped in place, tag preserved.
    assert_eq!(field.marks(), Marks::empty());
    assert_eq!(field.tag(), tag_before);
    assert!(field.read_linearized(&guard).is_null());
}

#[test]
fn concurrent_store_race() {
    const ROUNDS: usize = 256;

    for _ in 0..ROUNDS {
        let global = Global::new();
        let field = VersionedPtr::null();

        let (outcomes, addrs): (Vec<bool>, Vec<usize>) = scope(|s| {
            let handles: Vec<_> = (1..=2usize)
                .map(|v| {
                    let global = &global;
                    let field = &field;
                    s.spawn(move || {
                        let new = node(v);
                        let won = field.store(new, &global.guard());
                        (won, new as usize)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).unzip()
        });

        // At least one store wins; a loser never touches the field.
        let wins = outcomes.iter().filter(|&&w| w).count();
        assert!(wins >= 1);
        assert_eq!(field.tag(), wins as u64);

        let guard = global.guard();
        let head = field.read_linearized(&guard).as_raw() as usize;
        assert!(addrs.contains(&head));

        // The chain stays traversable at every timestamp.
        for at in 0..=global.clock().read_stamp() {
            let seen = field.read_snapshot(at, &guard);
            assert!(seen.is_null() || addrs.contains(&(seen.as_raw() as usize)));
        }
    }
}

#[test]
fn contended_stores_advance_tag_once_each() {
    const THREADS: usize = 4;
    const ITER: usize = 1024;

    let global = Global::new();
    let field = VersionedPtr::null();

    scope(|s| {
        for t in 0..THREADS {
            let global = &global;
            let field = &field;
            s.spawn(move || {
                let mut rng = rand::thread_rng();
                let mut vals: Vec<usize> = (0..ITER).map(|i| t * ITER + i).collect();
                vals.shuffle(&mut rng);
                for v in vals {
                    let new = node(v);
                    let guard = global.guard();
                    // A lost publish is the caller's retry.
                    while !field.store(new, &guard) {}
                }
            });
        }
    });

    // No store double-publishes and no splice ran: the tag counted them.
    assert_eq!(field.tag(), (THREADS * ITER) as u64);

    let guard = global.guard();
    assert!(!field.read_linearized(&guard).is_null());
}

#[test]
fn snapshot_readers_race_writers() {
    const ITER: usize = 4096;
    const READERS: usize = 3;

    let global = Global::new();
    let field = VersionedPtr::new(node(0));

    scope(|s| {
        s.spawn(|| {
            let guard = global.guard();
            for i in 1..=ITER {
                let new = node(i);
                while !field.store(new, &guard) {}
            }
        });

        for _ in 0..READERS {
            s.spawn(|| {
                let mut last = 0;
                loop {
                    // Each pinned guard must see one stable value.
                    let snap = global.snapshot();
                    let first = field.load(&snap);
                    for _ in 0..4 {
                        assert_eq!(field.load(&snap), first);
                    }

                    // Linearized reads never move backwards.
                    let cur = val(field.read_linearized(&global.guard()));
                    assert!(cur >= last);
                    last = cur;
                    if cur == ITER {
                        break;
                    }
                }
            });
        }
    });
}
