//! Integration tests: structural invariants of the scene graph under long
//! sequences of append / remove / move.

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use scena_core::{ElementId, ElementSpec, MemoryDom, MoveSpec, SceneGraph};

fn spec(rng: &mut StdRng, depth: usize) -> ElementSpec {
    let mut spec = match rng.gen_range(0..3) {
        0 => ElementSpec::plain("p").with_text("text"),
        1 => ElementSpec::markup("div"),
        _ => ElementSpec::component("Widget"),
    };
    if depth > 0 {
        for _ in 0..rng.gen_range(0..3) {
            spec = spec.with_child(spec_leaf(rng));
        }
    }
    spec
}

fn spec_leaf(rng: &mut StdRng) -> ElementSpec {
    ElementSpec::plain("span").with_attr("data-n", &rng.r#gen::<u64>().to_string())
}

fn pick(rng: &mut StdRng, ids: &[ElementId]) -> ElementId {
    // The root is always present, so `ids` is never empty.
    *ids.choose(rng).unwrap()
}

fn assert_consistent(graph: &SceneGraph) {
    let problems = graph.check_integrity();
    assert!(problems.is_empty(), "integrity: {problems:#?}");

    // Every id is in exactly one scope's children, no duplicates anywhere.
    let mut seen = std::collections::HashSet::new();
    for id in graph.walk() {
        for child in graph.children(id).unwrap() {
            assert!(seen.insert(child), "{child} listed twice");
            assert_eq!(graph.parent(child), Some(id));
        }
    }
    assert_eq!(seen.len() + 1, graph.len());
}

#[test]
fn random_operation_sequences_keep_integrity() {
    let _ = env_logger::builder().is_test(true).try_init();
    for seed in [0x9e37_79b9_7f4a_7c15_u64, 42, 7, 0xdead_beef] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut graph = SceneGraph::new();

        for _ in 0..300 {
            let ids = graph.walk();
            match rng.gen_range(0..4) {
                0 | 1 => {
                    let scope = pick(&mut rng, &ids);
                    let count = rng.gen_range(1..=3);
                    let specs = (0..count).map(|_| spec(&mut rng, 1)).collect();
                    let index = rng.gen_bool(0.5).then(|| rng.gen_range(0..4));
                    graph.append(specs, index, Some(scope)).unwrap();
                }
                2 => {
                    let targets: Vec<ElementId> =
                        (0..rng.gen_range(1..=2)).map(|_| pick(&mut rng, &ids)).collect();
                    // Root, duplicates and already-removed descendants fail in isolation.
                    let _ = graph.remove(&targets, None);
                }
                _ => {
                    let moves: Vec<MoveSpec> = (0..rng.gen_range(1..=3))
                        .map(|_| {
                            let index = rng.gen_bool(0.5).then(|| rng.gen_range(0..3));
                            MoveSpec::new(pick(&mut rng, &ids), pick(&mut rng, &ids), index)
                        })
                        .collect();
                    let _ = graph.move_batch(&moves);
                }
            }
            assert_consistent(&graph);
        }
    }
}

#[test]
fn failed_moves_do_not_undo_earlier_ones() {
    let mut graph = SceneGraph::new();
    let ids = graph
        .append(
            vec![ElementSpec::markup("a"), ElementSpec::markup("b"), ElementSpec::markup("c")],
            None,
            None,
        )
        .unwrap()
        .ids;
    let batch = graph.move_batch(&[
        MoveSpec::new(ids[1], ids[0], None),
        MoveSpec::new(ids[0], ids[1], None),
        MoveSpec::new(ids[2], ids[1], None),
    ]);
    assert_eq!(batch.ok.len(), 2);
    assert_eq!(batch.failed.len(), 1);
    assert_eq!(graph.children(ids[0]).unwrap(), vec![ids[1]]);
    assert_eq!(graph.children(ids[1]).unwrap(), vec![ids[2]]);
    assert_consistent(&graph);
}

#[test]
fn remove_then_append_restores_structure() {
    let mut rng = StdRng::seed_from_u64(1234);
    let mut graph = SceneGraph::new();
    let specs: Vec<ElementSpec> = (0..4).map(|_| spec(&mut rng, 1)).collect();
    let ids = graph.append(specs, None, None).unwrap().ids;
    let mut dom = MemoryDom::new();
    assert!(graph.remount(&mut dom).is_clean());

    let targets = [ids[3], ids[1]];
    let before: Vec<ElementSpec> = targets
        .iter()
        .map(|id| graph.capture_subtree(*id, Some(&dom)).unwrap().without_ids())
        .collect();

    let detached = graph.remove(&targets, Some(&dom));
    assert!(detached.is_clean());
    assert_eq!(graph.children(graph.root_id()).unwrap(), vec![ids[0], ids[2]]);

    for (d, expected) in detached.ok.into_iter().zip(before) {
        let placement = d.placement;
        let appended = graph
            .append(vec![d.spec], Some(placement.index), Some(placement.scope))
            .unwrap();
        let rebuilt = graph
            .capture_subtree(appended.ids[0], None)
            .unwrap()
            .without_ids();
        assert_eq!(rebuilt, expected);
    }
    assert_eq!(graph.children(graph.root_id()).unwrap().len(), 4);
    assert_consistent(&graph);
}

#[test]
fn deep_chains_do_not_overflow() {
    let mut deep = ElementSpec::plain("leaf");
    for _ in 0..2_000 {
        deep = ElementSpec::markup("div").with_child(deep);
    }
    let mut graph = SceneGraph::new();
    let top = graph.append(vec![deep], None, None).unwrap().ids[0];
    let descendants = graph.descendants(top).unwrap();
    assert_eq!(descendants.len(), 2_000);
    let leaf = *descendants.last().unwrap();
    assert_eq!(graph.index_path(leaf).unwrap().len(), 2_001);
    let removed = graph.remove(&[top], None);
    assert!(removed.is_clean());
    assert_eq!(graph.len(), 1);
}
