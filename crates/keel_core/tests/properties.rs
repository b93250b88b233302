//! Randomized invariant checks for the heap, array and partitioned array.

use keel_core::{Allocation, Array, Heap, IdGenerator, PartitionedArray, StorageError};
use proptest::prelude::*;

const HEAP_SIZE: usize = 4096;
const ALIGNMENTS: [usize; 4] = [1, 4, 8, 16];

#[derive(Debug, Clone)]
enum HeapOp {
    Allocate { size: usize, align: usize },
    Release { pick: usize },
}

fn heap_op() -> impl Strategy<Value = HeapOp> {
    prop_oneof![
        3 => (1usize..200, 0usize..4).prop_map(|(size, a)| HeapOp::Allocate {
            size,
            align: ALIGNMENTS[a],
        }),
        2 => any::<usize>().prop_map(|pick| HeapOp::Release { pick }),
    ]
}

fn assert_disjoint(live: &[Allocation]) {
    for (i, a) in live.iter().enumerate() {
        for b in &live[i + 1..] {
            assert!(
                !a.range().overlaps(&b.range()),
                "{:?} overlaps {:?}",
                a.range(),
                b.range()
            );
        }
    }
}

proptest! {
    #[test]
    fn heap_allocations_never_overlap_and_stay_aligned(
        ops in proptest::collection::vec(heap_op(), 1..120),
    ) {
        let mut heap = Heap::new(&mut IdGenerator::new(), HEAP_SIZE);
        let mut live: Vec<Allocation> = Vec::new();

        for op in ops {
            match op {
                HeapOp::Allocate { size, align } => match heap.allocate(size, align) {
                    Ok(alloc) => {
                        prop_assert_eq!(alloc.offset() % align, 0);
                        prop_assert_eq!(alloc.size(), size);
                        prop_assert!(alloc.range().end() <= HEAP_SIZE);
                        live.push(alloc);
                    }
                    Err(StorageError::OutOfMemory { .. } | StorageError::Fragmented { .. }) => {}
                    Err(other) => prop_assert!(false, "unexpected error {}", other),
                },
                HeapOp::Release { pick } => {
                    if !live.is_empty() {
                        let alloc = live.swap_remove(pick % live.len());
                        heap.deallocate(alloc).unwrap();
                    }
                }
            }

            assert_disjoint(&live);
            prop_assert!(heap.is_coalesced());
            let in_use: usize = live.iter().map(Allocation::size).sum();
            prop_assert_eq!(heap.free_bytes() + in_use, HEAP_SIZE);
            prop_assert_eq!(heap.tracker().in_use(), in_use);
        }
    }

    #[test]
    fn releasing_everything_coalesces_to_one_range(
        sizes in proptest::collection::vec((1usize..100, 0usize..4), 1..30),
        order in any::<u64>(),
    ) {
        let mut heap = Heap::new(&mut IdGenerator::new(), HEAP_SIZE);
        let mut live: Vec<Allocation> = sizes
            .iter()
            .map(|&(size, a)| heap.allocate(size, ALIGNMENTS[a]).unwrap())
            .collect();

        // Deterministic shuffle driven by `order`.
        let mut seed = order;
        while !live.is_empty() {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let alloc = live.swap_remove((seed >> 33) as usize % live.len());
            heap.deallocate(alloc).unwrap();
        }

        prop_assert_eq!(heap.free_ranges().len(), 1);
        prop_assert_eq!(heap.largest_free(), HEAP_SIZE);
        let whole = heap.allocate_unaligned(HEAP_SIZE).unwrap();
        prop_assert_eq!(whole.offset(), 0);
    }

    #[test]
    fn array_matches_vec_model(
        ops in proptest::collection::vec(prop_oneof![
            any::<u32>().prop_map(Ok::<u32, usize>),
            any::<usize>().prop_map(Err::<u32, usize>),
        ], 1..100),
    ) {
        const CAPACITY: usize = 16;
        let mut arr = Array::new(&mut IdGenerator::new(), CAPACITY);
        let mut model: Vec<u32> = Vec::new();

        for op in ops {
            match op {
                Ok(value) => {
                    let result = arr.add(value);
                    if model.len() < CAPACITY {
                        prop_assert_eq!(result, Ok(model.len()));
                        model.push(value);
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
                Err(pick) if !model.is_empty() => {
                    let index = pick % model.len();
                    prop_assert_eq!(arr.remove(index).unwrap(), model.remove(index));
                }
                Err(_) => prop_assert!(arr.remove(0).is_err()),
            }
            prop_assert_eq!(arr.as_slice(), model.as_slice());
        }
    }

    #[test]
    fn partitions_stay_contiguous_under_interleaving(
        ops in proptest::collection::vec((0usize..4, any::<bool>(), any::<u32>(), any::<usize>()), 1..150),
    ) {
        const NAMES: [&str; 4] = ["terrain", "props", "actors", "fx"];
        const CAPACITY: usize = 48;

        let mut arr = PartitionedArray::new(&mut IdGenerator::new(), CAPACITY);
        // Model: partitions in first-use order.
        let mut model: Vec<(&str, Vec<u32>)> = Vec::new();

        for (which, insert, value, pick) in ops {
            let name = NAMES[which];
            let total: usize = model.iter().map(|(_, items)| items.len()).sum();
            if insert {
                let result = arr.add(name, value);
                if total < CAPACITY {
                    result.unwrap();
                    match model.iter_mut().find(|(n, _)| *n == name) {
                        Some((_, items)) => items.push(value),
                        None => model.push((name, vec![value])),
                    }
                } else {
                    prop_assert!(result.is_err());
                }
            } else if let Some((_, items)) = model.iter_mut().find(|(n, _)| *n == name) {
                if items.is_empty() {
                    prop_assert!(arr.remove_relative(name, 0).is_err());
                } else {
                    let rel = pick % items.len();
                    prop_assert_eq!(arr.remove_relative(name, rel).unwrap(), items.remove(rel));
                }
            } else {
                prop_assert!(!arr.exists(name));
            }

            prop_assert!(arr.is_contiguous());
            let flat: Vec<u32> = model.iter().flat_map(|(_, items)| items.iter().copied()).collect();
            prop_assert_eq!(arr.as_slice(), flat.as_slice());
            for (name, items) in &model {
                prop_assert_eq!(arr.partition(name).unwrap(), items.as_slice());
            }
            let order: Vec<&str> = arr.partitions().map(|(n, _)| n).collect();
            let expected: Vec<&str> = model.iter().map(|(n, _)| *n).collect();
            prop_assert_eq!(order, expected);
        }
    }
}

#[test]
fn clear_then_refill_matches_fresh_instances() {
    let mut ids = IdGenerator::new();

    let mut heap = Heap::new(&mut ids, 256);
    for size in [10, 20, 30] {
        let _ = heap.allocate(size, 8).unwrap();
    }
    heap.clear();
    let fresh = Heap::new(&mut ids, 256);
    assert_eq!(heap.free_ranges(), fresh.free_ranges());
    assert_eq!(heap.allocate_unaligned(256).unwrap().offset(), 0);

    let mut arr = PartitionedArray::new(&mut ids, 5);
    arr.add("a", 1u8).unwrap();
    arr.add("b", 2u8).unwrap();
    arr.clear();
    for v in 0..5u8 {
        arr.add("b", v).unwrap();
    }
    assert_eq!(arr.partition_count(), 1);
    assert_eq!(arr.partition_range("b").unwrap(), 0..5);
}
