use std::collections::HashMap;

use super::*;
use crate::store::{SqliteList, StateStore};
use crate::trace::{MemoryTrace, TraceEvent};
use crate::traverse::fake::{FakeConverter, FakeTree, memory_state};

type TestEngine = TraversalEngine<FakeTree, FakeConverter, MemoryTrace, SqliteList>;

async fn make_engine(
    state: &StateStore,
    tree: FakeTree,
    converter: FakeConverter,
    config: EngineConfig,
) -> TestEngine {
    let queue = FolderQueue::open(state).await.unwrap();
    let stack = FolderStack::open(state).await.unwrap();
    TraversalEngine::new(tree, converter, MemoryTrace::new(), queue, stack, config)
}

fn converting() -> EngineConfig {
    EngineConfig {
        convert: true,
        ..EngineConfig::default()
    }
}

/// A -> [B -> [D], C]
fn nested_tree() -> FakeTree {
    FakeTree::new()
        .folder("A", "A", None)
        .folder("B", "B", Some("A"))
        .folder("C", "C", Some("A"))
        .folder("D", "D", Some("B"))
}

#[tokio::test]
async fn example_scenario_converts_once_and_nests_trace() {
    let state = memory_state().await;
    let tree = FakeTree::new()
        .folder("R", "R", None)
        .file("a", "a.docx", "R")
        .folder("S", "S", Some("R"))
        .file("b", "b.txt", "S");
    let converter = FakeConverter::new();
    let mut engine = make_engine(&state, tree, converter.clone(), converting()).await;
    engine.queue().enqueue("R").await.unwrap();

    let summary = engine.run().await.unwrap();

    assert_eq!(converter.calls(), vec!["a.docx"]);
    assert_eq!(summary.converted, 1);
    assert_eq!(summary.folders, 2);
    assert_eq!(summary.files, 2);
    assert_eq!(
        engine.trace().events(),
        [
            TraceEvent::EnterFolder {
                name: "R".into(),
                url: "https://drive.example/folders/R".into(),
                depth: 0
            },
            TraceEvent::Conversion {
                original_name: "a.docx".into(),
                original_url: "https://drive.example/file/a".into(),
                converted_name: "a".into(),
                converted_url: "https://docs.example/a-converted".into(),
                depth: 1
            },
            TraceEvent::EnterFolder {
                name: "S".into(),
                url: "https://drive.example/folders/S".into(),
                depth: 1
            },
            TraceEvent::VisitFile {
                name: "b.txt".into(),
                url: "https://drive.example/file/b".into(),
                depth: 2
            },
            TraceEvent::ExitFolder { depth: 1 },
            TraceEvent::ExitFolder { depth: 0 },
        ]
    );
    assert!(engine.queue().is_empty().await.unwrap());
    assert!(engine.stack().is_empty().await.unwrap());
}

#[tokio::test]
async fn walks_children_before_later_siblings() {
    let state = memory_state().await;
    let mut engine = make_engine(
        &state,
        nested_tree().folder("X", "X", None),
        FakeConverter::new(),
        EngineConfig::default(),
    )
    .await;
    engine.queue().enqueue("A").await.unwrap();
    engine.queue().enqueue("X").await.unwrap();

    engine.run().await.unwrap();

    assert_eq!(engine.trace().entered_folders(), vec!["A", "B", "D", "C", "X"]);
}

#[tokio::test]
async fn every_folder_is_entered_and_exited_once_one_level_below_its_parent() {
    let state = memory_state().await;
    let tree = nested_tree()
        .folder("E", "E", Some("D"))
        .folder("F", "F", Some("C"))
        .folder("G", "G", Some("C"));
    let parents: HashMap<&str, &str> = [
        ("B", "A"),
        ("C", "A"),
        ("D", "B"),
        ("E", "D"),
        ("F", "C"),
        ("G", "C"),
    ]
    .into_iter()
    .collect();
    let mut engine = make_engine(&state, tree, FakeConverter::new(), EngineConfig::default()).await;
    engine.queue().enqueue("A").await.unwrap();

    engine.run().await.unwrap();

    let mut enter_depth = HashMap::new();
    let mut enters = 0;
    let mut exits = 0;
    for event in engine.trace().events() {
        match event {
            TraceEvent::EnterFolder { name, depth, .. } => {
                enters += 1;
                assert!(enter_depth.insert(name.clone(), *depth).is_none());
            }
            TraceEvent::ExitFolder { .. } => exits += 1,
            _ => {}
        }
    }
    assert_eq!(enters, 7);
    assert_eq!(exits, 7);
    for (child, parent) in parents {
        assert_eq!(enter_depth[child], enter_depth[parent] + 1, "depth of {child}");
    }
    assert_eq!(engine.trace().depth(), 0);
}

#[tokio::test]
async fn empty_folder_emits_only_enter_and_exit() {
    let state = memory_state().await;
    let tree = FakeTree::new().folder("E", "Empty", None);
    let mut engine = make_engine(&state, tree, FakeConverter::new(), converting()).await;
    engine.queue().enqueue("E").await.unwrap();

    engine.run().await.unwrap();

    assert_eq!(
        engine.trace().events(),
        [
            TraceEvent::EnterFolder {
                name: "Empty".into(),
                url: "https://drive.example/folders/E".into(),
                depth: 0
            },
            TraceEvent::ExitFolder { depth: 0 },
        ]
    );
}

#[tokio::test]
async fn dry_run_records_matching_files_without_converting() {
    let state = memory_state().await;
    let tree = FakeTree::new()
        .folder("R", "R", None)
        .file("a", "a.docx", "R");
    let converter = FakeConverter::new();
    let mut engine =
        make_engine(&state, tree, converter.clone(), EngineConfig::default()).await;
    engine.queue().enqueue("R").await.unwrap();

    let summary = engine.run().await.unwrap();

    assert!(converter.calls().is_empty());
    assert_eq!(summary.converted, 0);
    assert!(matches!(
        &engine.trace().events()[1],
        TraceEvent::VisitFile { name, depth: 1, .. } if name == "a.docx"
    ));
}

#[tokio::test]
async fn unmatched_files_are_omitted_when_not_recording_all() {
    let state = memory_state().await;
    let tree = FakeTree::new()
        .folder("R", "R", None)
        .file("a", "a.docx", "R")
        .file("b", "archive.tar.gz", "R")
        .file("c", "noext", "R");
    let config = EngineConfig {
        convert: true,
        record_all_files: false,
        ..EngineConfig::default()
    };
    let converter = FakeConverter::new();
    let mut engine = make_engine(&state, tree, converter.clone(), config).await;
    engine.queue().enqueue("R").await.unwrap();

    let summary = engine.run().await.unwrap();

    assert_eq!(converter.calls(), vec!["a.docx"]);
    assert_eq!(summary.files, 3);
    let visits = engine
        .trace()
        .events()
        .iter()
        .filter(|event| matches!(event, TraceEvent::VisitFile { .. }))
        .count();
    assert_eq!(visits, 0);
}

#[tokio::test]
async fn conversion_failure_is_recorded_and_siblings_continue() {
    let state = memory_state().await;
    let tree = FakeTree::new()
        .folder("R", "R", None)
        .file("a", "a.doc", "R")
        .file("b", "b.xlsx", "R")
        .folder("S", "S", Some("R"));
    let converter = FakeConverter::new().failing_on("a.doc");
    let mut engine = make_engine(&state, tree, converter.clone(), converting()).await;
    engine.queue().enqueue("R").await.unwrap();

    let summary = engine.run().await.unwrap();

    assert_eq!(converter.calls(), vec!["a.doc", "b.xlsx"]);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.converted, 1);
    assert!(matches!(
        &engine.trace().events()[1],
        TraceEvent::Failure { name, .. } if name == "a.doc"
    ));
    assert_eq!(engine.trace().entered_folders(), vec!["R", "S"]);
}

#[tokio::test]
async fn trashed_files_are_skipped() {
    let state = memory_state().await;
    let tree = FakeTree::new()
        .folder("R", "R", None)
        .trashed_file("a", "a.docx", "R");
    let converter = FakeConverter::new();
    let mut engine = make_engine(&state, tree, converter.clone(), converting()).await;
    engine.queue().enqueue("R").await.unwrap();

    let summary = engine.run().await.unwrap();

    assert!(converter.calls().is_empty());
    assert_eq!(summary.files, 0);
    assert_eq!(engine.trace().events().len(), 2);
}

#[tokio::test]
async fn unresolvable_roots_are_dropped() {
    let state = memory_state().await;
    let tree = FakeTree::new().folder("live", "Live", None);
    let mut engine = make_engine(&state, tree, FakeConverter::new(), EngineConfig::default()).await;
    engine.queue().enqueue("deleted").await.unwrap();
    engine
        .queue()
        .enqueue("https://drive.google.com/drive/folders/live")
        .await
        .unwrap();

    let summary = engine.run().await.unwrap();

    assert_eq!(summary.dropped, 1);
    assert_eq!(engine.trace().entered_folders(), vec!["Live"]);
    assert!(engine.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn vanished_child_does_not_pull_in_queued_siblings() {
    let state = memory_state().await;
    let tree = FakeTree::new()
        .folder("A", "A", None)
        .folder("B", "B", Some("A"))
        .folder("C", "C", Some("A"))
        .folder("X", "X", None)
        .vanished("B");
    let mut engine = make_engine(&state, tree, FakeConverter::new(), EngineConfig::default()).await;
    engine.queue().enqueue("A").await.unwrap();
    engine.queue().enqueue("X").await.unwrap();

    let summary = engine.run().await.unwrap();

    assert_eq!(summary.dropped, 1);
    assert_eq!(engine.trace().entered_folders(), vec!["A", "C", "X"]);
    let x_depth = engine.trace().events().iter().find_map(|event| match event {
        TraceEvent::EnterFolder { name, depth, .. } if name == "X" => Some(*depth),
        _ => None,
    });
    assert_eq!(x_depth, Some(0));
}

#[tokio::test]
async fn duplicate_entries_are_walked_twice() {
    let state = memory_state().await;
    let tree = FakeTree::new().folder("A", "A", None);
    let mut engine = make_engine(&state, tree, FakeConverter::new(), EngineConfig::default()).await;
    engine.queue().enqueue("A").await.unwrap();
    engine.queue().enqueue("A").await.unwrap();

    engine.run().await.unwrap();

    assert_eq!(engine.trace().entered_folders(), vec!["A", "A"]);
}

/// Writes the queue and stack a killed run would have left behind.
async fn seed(state: &StateStore, queued: &[&str], stacked: &[&str]) {
    let queue = FolderQueue::open(state).await.unwrap();
    let stack = FolderStack::open(state).await.unwrap();
    for locator in queued {
        queue.enqueue(locator).await.unwrap();
    }
    for entry in stacked {
        match entry.strip_prefix("> ") {
            Some(id) => stack.open_frame(id).await.unwrap(),
            None => stack.push(entry).await.unwrap(),
        }
    }
}

fn enter_depths(trace: &MemoryTrace) -> Vec<(String, usize)> {
    trace
        .events()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::EnterFolder { name, depth, .. } => Some((name.clone(), *depth)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn resumes_with_staged_children_of_a_committed_folder() {
    let state = memory_state().await;
    // Children [B, C] staged with no frame below them; X is a queued sibling.
    seed(&state, &["X"], &["C", "B"]).await;
    let tree = nested_tree().folder("X", "X", None);
    let mut engine = make_engine(&state, tree, FakeConverter::new(), EngineConfig::default()).await;

    let summary = engine.run().await.unwrap();

    assert_eq!(summary.recovered, 2);
    assert_eq!(engine.trace().entered_folders(), vec!["B", "D", "C", "X"]);
    assert!(engine.stack().is_empty().await.unwrap());
}

#[tokio::test]
async fn recover_stages_an_uncommitted_folder_again() {
    let state = memory_state().await;
    seed(&state, &["A", "X"], &["> A", "C", "B"]).await;
    let mut engine = make_engine(
        &state,
        FakeTree::new(),
        FakeConverter::new(),
        EngineConfig::default(),
    )
    .await;

    let recovered = engine.recover().await.unwrap();

    assert_eq!(recovered, 3);
    assert_eq!(engine.stack().entries().await.unwrap(), vec!["A"]);
    assert_eq!(engine.queue().entries().await.unwrap(), vec!["A", "X"]);
    assert_eq!(engine.trace().depth(), 0);
}

#[tokio::test]
async fn recover_keeps_staged_children_of_a_committed_frame() {
    let state = memory_state().await;
    seed(&state, &["X"], &["> A", "C", "> B", "D"]).await;
    let mut engine = make_engine(
        &state,
        FakeTree::new(),
        FakeConverter::new(),
        EngineConfig::default(),
    )
    .await;

    engine.recover().await.unwrap();

    assert_eq!(
        engine.stack().entries().await.unwrap(),
        vec!["> A", "C", "> B", "D"]
    );
    assert_eq!(engine.trace().depth(), 2);
}

#[tokio::test]
async fn kill_between_promoting_and_opening_a_child_walks_it_once() {
    let state = memory_state().await;
    // B was pushed to the queue front but is still staged on the stack.
    seed(&state, &["B", "X"], &["> A", "C", "B"]).await;
    let tree = nested_tree().folder("X", "X", None);
    let mut engine = make_engine(&state, tree, FakeConverter::new(), EngineConfig::default()).await;

    engine.run().await.unwrap();

    assert_eq!(
        enter_depths(engine.trace()),
        vec![
            ("B".to_string(), 1),
            ("D".to_string(), 2),
            ("C".to_string(), 1),
            ("X".to_string(), 0),
        ]
    );
    assert!(engine.queue().is_empty().await.unwrap());
    assert!(engine.stack().is_empty().await.unwrap());
    assert_eq!(engine.trace().depth(), 0);
}

#[tokio::test]
async fn kill_after_staging_before_commit_repeats_only_that_folder() {
    let state = memory_state().await;
    // A staged [B, C] but is still the queue head.
    seed(&state, &["A", "X"], &["> A", "C", "B"]).await;
    let tree = nested_tree().folder("X", "X", None).file("f", "f.docx", "A");
    let converter = FakeConverter::new();
    let mut engine = make_engine(&state, tree, converter.clone(), converting()).await;

    engine.run().await.unwrap();

    assert_eq!(engine.trace().entered_folders(), vec!["A", "B", "D", "C", "X"]);
    assert_eq!(converter.calls(), vec!["f.docx"]);
    assert!(engine.queue().is_empty().await.unwrap());
    assert!(engine.stack().is_empty().await.unwrap());
}

#[tokio::test]
async fn stopping_after_any_step_resumes_in_pre_order() {
    let tree = nested_tree()
        .folder("E", "E", Some("D"))
        .folder("F", "F", Some("C"))
        .folder("X", "X", None);
    let mut cut = 1;
    loop {
        let state = memory_state().await;
        seed(&state, &["A", "X"], &[]).await;
        let mut first =
            make_engine(&state, tree.clone(), FakeConverter::new(), EngineConfig::default()).await;
        let mut finished = false;
        for _ in 0..cut {
            if !first.step().await.unwrap() {
                finished = true;
                break;
            }
        }
        if finished {
            break;
        }

        let mut second =
            make_engine(&state, tree.clone(), FakeConverter::new(), EngineConfig::default()).await;
        second.run().await.unwrap();
        let mut entered = first.trace().entered_folders();
        entered.extend(second.trace().entered_folders());

        assert_eq!(entered, vec!["A", "B", "D", "E", "C", "F", "X"], "cut {cut}");
        assert_eq!(second.trace().depth(), 0, "cut {cut}");
        assert!(second.queue().is_empty().await.unwrap());
        assert!(second.stack().is_empty().await.unwrap());
        cut += 1;
    }
    assert_eq!(cut, 15);
}

#[tokio::test]
async fn interrupted_run_resumes_in_pre_order() {
    let state = memory_state().await;
    let tree = nested_tree()
        .folder("E", "E", Some("D"))
        .folder("X", "X", None)
        .unavailable("E");

    let mut first = make_engine(
        &state,
        tree.clone(),
        FakeConverter::new(),
        EngineConfig::default(),
    )
    .await;
    first.queue().enqueue("A").await.unwrap();
    first.queue().enqueue("X").await.unwrap();
    let err = first.run().await.unwrap_err();
    assert!(matches!(err, EngineError::Provider(_)));
    assert_eq!(first.trace().entered_folders(), vec!["A", "B", "D"]);
    assert_eq!(first.queue().entries().await.unwrap(), vec!["E", "X"]);
    assert_eq!(
        first.stack().entries().await.unwrap(),
        vec!["> A", "C", "> B", "> D", "> E"]
    );

    let mut second = make_engine(
        &state,
        tree.healed(),
        FakeConverter::new(),
        EngineConfig::default(),
    )
    .await;
    second.run().await.unwrap();

    assert_eq!(
        enter_depths(second.trace()),
        vec![
            ("E".to_string(), 3),
            ("C".to_string(), 1),
            ("X".to_string(), 0),
        ]
    );
    assert_eq!(second.trace().depth(), 0);
    assert!(second.queue().is_empty().await.unwrap());
    assert!(second.stack().is_empty().await.unwrap());
}

#[tokio::test]
async fn forbidden_child_is_dropped_and_siblings_continue() {
    let state = memory_state().await;
    let tree = nested_tree().folder("X", "X", None).forbidden("B");
    let mut engine = make_engine(&state, tree, FakeConverter::new(), EngineConfig::default()).await;
    engine.queue().enqueue("A").await.unwrap();
    engine.queue().enqueue("X").await.unwrap();

    let summary = engine.run().await.unwrap();

    assert_eq!(summary.dropped, 1);
    assert_eq!(engine.trace().entered_folders(), vec!["A", "C", "X"]);
}

#[tokio::test]
async fn unreadable_folder_is_recorded_and_committed() {
    let state = memory_state().await;
    let tree = FakeTree::new()
        .folder("R", "R", None)
        .folder("S", "S", Some("R"))
        .folder("T", "T", Some("R"))
        .folder("U", "U", Some("S"))
        .file("t", "t.txt", "T")
        .unlistable("S");
    let mut engine = make_engine(&state, tree, FakeConverter::new(), EngineConfig::default()).await;
    engine.queue().enqueue("R").await.unwrap();

    let summary = engine.run().await.unwrap();

    assert_eq!(summary.unreadable, 1);
    assert_eq!(engine.trace().entered_folders(), vec!["R", "S", "T"]);
    assert!(engine.trace().events().iter().any(|event| matches!(
        event,
        TraceEvent::Failure { name, depth: 2, .. } if name == "S"
    )));
    assert!(engine.queue().is_empty().await.unwrap());
    assert!(engine.stack().is_empty().await.unwrap());
    assert_eq!(engine.trace().depth(), 0);
}
