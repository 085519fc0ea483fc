mod support;

use std::path::PathBuf;
use std::sync::Arc;

use glot_core::{
    DiagnosticUnpacker, GlotError, ProcedureNamespace, ResultsRetriever, RetrievalOptions,
    ScaffoldTable, SearchQuery, SimulationService, SortKey,
};
use serde_json::json;
use support::archive::{write_tgz, FakeCloner};
use support::receiver::StaticReceiver;
use support::transport::RecordingTransport;

fn retriever(
    transport: &Arc<RecordingTransport>,
    receiver: StaticReceiver,
    options: RetrievalOptions,
) -> ResultsRetriever {
    let service = SimulationService::new(transport.clone(), ProcedureNamespace::default());
    let unpacker = DiagnosticUnpacker::new(ScaffoldTable::default(), Box::new(FakeCloner));
    ResultsRetriever::new(service, Box::new(receiver), unpacker, options)
}

fn search_reply() -> serde_json::Value {
    json!({
        "AAA": {"status": {"percentage": 50.0, "message": "solving", "timestamp": 10.0}, "finalized": true},
        "CCC": {"status": {"percentage": null, "message": "queued", "timestamp": null}, "finalized": false},
        "BBB": {"status": {"percentage": 100.0, "message": "done", "timestamp": 30.0},
                "finalized": true, "exit_status": [true, "ok"]}
    })
}

fn diagnostic_archive(dir: &std::path::Path) -> PathBuf {
    write_tgz(
        &dir.join("diag.tgz"),
        &[
            ("run123/input.final/mesh.vtk", b"mesh"),
            ("run123/input.final/settings.xml", b"<simulation/>"),
        ],
    )
}

#[test]
fn search_sorts_by_descending_timestamp_with_missing_last() {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply("com.gosmartsimulation.search", search_reply());

    let table = retriever(&transport, StaticReceiver::default(), RetrievalOptions::default())
        .search(&SearchQuery {
            sort: Some(SortKey::Timestamp),
            ..SearchQuery::default()
        })
        .expect("search succeeds");

    assert_eq!(table.first_column(), vec!["BBB", "AAA", "CCC"]);
    assert_eq!(table.headers[0], "GUID");
    assert_eq!(table.rows[0][5], "Y");
    assert_eq!(table.rows[2][5], "-");
}

#[test]
fn search_sorts_by_guid_and_applies_limit() {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply("com.gosmartsimulation.search", search_reply());

    let table = retriever(&transport, StaticReceiver::default(), RetrievalOptions::default())
        .search(&SearchQuery {
            sort: Some(SortKey::Guid),
            limit: Some(2),
            server_limit: Some(10),
            guid: Some("a".to_string()),
        })
        .expect("search succeeds");

    assert_eq!(table.first_column(), vec!["AAA", "BBB"]);
    assert_eq!(
        transport.args_of("com.gosmartsimulation.search"),
        Some(vec![json!("A"), json!(10)])
    );
}

#[test]
fn malformed_search_row_is_skipped() {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply(
        "com.gosmartsimulation.search",
        json!({
            "AAA": {"status": {"message": "ok"}, "finalized": true},
            "BAD": {"status": 5, "finalized": "perhaps"}
        }),
    );

    let table = retriever(&transport, StaticReceiver::default(), RetrievalOptions::default())
        .search(&SearchQuery::default())
        .expect("search succeeds");

    assert_eq!(table.first_column(), vec!["AAA"]);
}

#[test]
fn colored_search_marks_rows_by_outcome() {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply("com.gosmartsimulation.search", search_reply());
    let options = RetrievalOptions {
        color: true,
        ..RetrievalOptions::default()
    };

    let table = retriever(&transport, StaticReceiver::default(), options)
        .search(&SearchQuery {
            sort: Some(SortKey::Guid),
            ..SearchQuery::default()
        })
        .expect("search succeeds");

    use glot_core::table::RowColor;
    assert_eq!(
        table.colors,
        vec![Some(RowColor::Yellow), Some(RowColor::Green), Some(RowColor::Yellow)]
    );
}

#[test]
fn status_of_unknown_simulation_is_not_found() {
    let transport = Arc::new(RecordingTransport::new());

    let error = retriever(&transport, StaticReceiver::default(), RetrievalOptions::default())
        .status("abc")
        .expect_err("empty status");

    assert!(matches!(error, GlotError::NotFound { ref guid } if guid == "abc"));
    assert_eq!(
        transport.args_of("com.gosmartsimulation.retrieve_status"),
        Some(vec![json!("ABC")])
    );
}

#[test]
fn status_renders_key_value_rows() {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply(
        "com.gosmartsimulation.retrieve_status",
        json!({"message": "solving", "percentage": 42.0}),
    );

    let table = retriever(&transport, StaticReceiver::default(), RetrievalOptions::default())
        .status("abc")
        .expect("status found");

    assert!(table.headers.is_empty());
    assert_eq!(
        table.rows,
        vec![
            vec!["message".to_string(), "solving".to_string()],
            vec!["percentage".to_string(), "42.0".to_string()],
        ]
    );
}

#[test]
fn diagnostic_without_files_warns_and_returns() {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply("com.gosmartsimulation.request_diagnostic", json!({}));
    let receiver = StaticReceiver::default();

    let archive = retriever(&transport, receiver.clone(), RetrievalOptions::default())
        .diagnostic("abc", None, true)
        .expect("no files is not an error");

    assert_eq!(archive, None);
    assert_eq!(receiver.events(), vec!["listen abc-diagnostic.tgz", "cancel"]);
}

#[test]
fn diagnostic_with_two_files_is_ambiguous() {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply(
        "com.gosmartsimulation.request_diagnostic",
        json!({"a.tgz": "/srv/a.tgz", "b.tgz": "/srv/b.tgz"}),
    );
    let receiver = StaticReceiver::default();

    let error = retriever(&transport, receiver.clone(), RetrievalOptions::default())
        .diagnostic("abc", None, true)
        .expect_err("two archives");

    assert!(matches!(error, GlotError::AmbiguousDiagnostic { count: 2 }));
    assert_eq!(receiver.events().last().map(String::as_str), Some("cancel"));
}

#[test]
fn diagnostic_with_one_received_file_unpacks_under_prefix() {
    let dir = tempfile::tempdir().expect("tempdir");
    let archive = diagnostic_archive(dir.path());
    let transport = Arc::new(RecordingTransport::new());
    transport.reply(
        "com.gosmartsimulation.request_diagnostic",
        json!({"diag.tgz": "/srv/remote/diag.tgz"}),
    );
    let options = RetrievalOptions {
        destination: Some(dir.path().join("out")),
        ..RetrievalOptions::default()
    };

    let inspected = retriever(&transport, StaticReceiver::delivering(archive.clone()), options)
        .diagnostic("abc", None, true)
        .expect("single file proceeds");

    assert_eq!(inspected, Some(archive));
    let root = dir.path().join("out").join("run123");
    assert!(root.join("input/mesh.vtk").exists());
    assert!(root.join("settings/settings.xml").exists());
}

#[test]
fn diagnostic_with_target_inspects_delivered_file_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let archive = diagnostic_archive(dir.path());
    let transport = Arc::new(RecordingTransport::new());
    let mut files = serde_json::Map::new();
    files.insert(
        archive.to_string_lossy().into_owned(),
        json!("/srv/remote/diag.tgz"),
    );
    transport.reply("com.gosmartsimulation.request_diagnostic", serde_json::Value::Object(files));
    let receiver = StaticReceiver::default();

    let inspected = retriever(&transport, receiver.clone(), RetrievalOptions::default())
        .diagnostic("abc", Some("file:///srv"), true)
        .expect("single file proceeds");

    assert_eq!(inspected, Some(archive));
    assert!(receiver.events().is_empty(), "no local receiver with a target");
    assert!(dir.path().join("diag/input/mesh.vtk").exists());
    assert_eq!(
        transport.args_of("com.gosmartsimulation.request_diagnostic"),
        Some(vec![json!("ABC"), json!("file:///srv")])
    );
}

#[test]
fn forced_diagnostic_without_prefix_keeps_destination_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let archive = write_tgz(
        &dir.path().join("abc-diagnostic.tgz"),
        &[("input/settings.xml", b"<simulation/>"), ("notes.txt", b"flat")],
    );
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).expect("work dir");
    std::fs::write(work.join("precious.txt"), b"keep").expect("precious file");

    let transport = Arc::new(RecordingTransport::new());
    transport.reply(
        "com.gosmartsimulation.request_diagnostic",
        json!({"abc-diagnostic.tgz": "/srv/remote/abc-diagnostic.tgz"}),
    );
    let service = SimulationService::new(transport.clone(), ProcedureNamespace::default());
    let unpacker = DiagnosticUnpacker::new(ScaffoldTable::default(), Box::new(FakeCloner)).force(true);
    let options = RetrievalOptions {
        destination: Some(work.clone()),
        ..RetrievalOptions::default()
    };
    let retriever = ResultsRetriever::new(
        service,
        Box::new(StaticReceiver::delivering(archive)),
        unpacker,
        options,
    );

    retriever
        .diagnostic("abc", None, true)
        .expect("flat archive unpacks");

    assert_eq!(std::fs::read(work.join("precious.txt")).expect("still there"), b"keep");
    assert!(work.join("abc-diagnostic/notes.txt").exists());
    assert!(work.join("abc-diagnostic/settings/settings.xml").exists());
}

#[test]
fn search_keeps_rows_with_loose_flags() {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply(
        "com.gosmartsimulation.search",
        json!({
            "AAA": {"status": {"percentage": 10.0, "message": "meshing", "timestamp": 5.0},
                    "finalized": null, "exit_status": null},
            "BBB": {"status": null, "finalized": 1}
        }),
    );

    let table = retriever(&transport, StaticReceiver::default(), RetrievalOptions::default())
        .search(&SearchQuery {
            sort: Some(SortKey::Guid),
            ..SearchQuery::default()
        })
        .expect("search succeeds");

    assert_eq!(table.first_column(), vec!["AAA", "BBB"]);
    assert_eq!(table.rows[0][1], "N");
    assert_eq!(table.rows[1][1], "Y");
    assert_eq!(table.rows[1][5], "-");
}

#[test]
fn results_for_unknown_simulation_cancel_the_receiver() {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply("com.gosmartsimulation.request_results", json!(false));
    let receiver = StaticReceiver::default();

    let error = retriever(&transport, receiver.clone(), RetrievalOptions::default())
        .results("abc", None, false, false)
        .expect_err("simulation unknown");

    assert!(matches!(error, GlotError::NotFound { .. }));
    assert_eq!(receiver.events(), vec!["listen abc-results.tgz", "cancel"]);
}

#[test]
fn results_without_target_are_received_locally() {
    let dir = tempfile::tempdir().expect("tempdir");
    let archive = write_tgz(&dir.path().join("abc-results.tgz"), &[("output.vtp", b"vtp")]);
    let transport = Arc::new(RecordingTransport::new());
    transport.reply("com.gosmartsimulation.request_results", json!(true));
    let receiver = StaticReceiver::delivering(archive.clone());

    let received = retriever(&transport, receiver.clone(), RetrievalOptions::default())
        .results("abc", None, false, false)
        .expect("results received");

    assert_eq!(received, Some(archive));
    assert_eq!(receiver.events(), vec!["listen abc-results.tgz", "wait"]);
    assert_eq!(
        transport.procedures(),
        vec!["com.gosmartsimulation.request_results"]
    );
}

#[test]
fn results_with_diagnostic_inspection_extracts_both() {
    let dir = tempfile::tempdir().expect("tempdir");
    let archive = diagnostic_archive(dir.path());
    let transport = Arc::new(RecordingTransport::new());
    transport.reply("com.gosmartsimulation.request_results", json!(true));
    transport.reply(
        "com.gosmartsimulation.request_diagnostic",
        json!({"diag.tgz": "/srv/remote/diag.tgz"}),
    );
    let out = dir.path().join("out");
    let options = RetrievalOptions {
        destination: Some(out.clone()),
        ..RetrievalOptions::default()
    };

    retriever(&transport, StaticReceiver::delivering(archive), options)
        .results("abc", None, false, true)
        .expect("results and diagnostic retrieved");

    assert!(out.join("run123/input/mesh.vtk").exists(), "diagnostic unpacked");
    assert!(out.join("run123/input.final/mesh.vtk").exists(), "results extracted as is");
}
