use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::tempdir;

fn write_fixture(dir: &Path) {
    std::fs::write(dir.join("libc.txt"), "printf\nmalloc\n").unwrap();
    let doc = json!({"program": {"term": {"subs": [
        {"tid": {"address": "401000"},
         "term": {"name": "main", "uuid": "u-main",
                  "ops": ["PUSH RBP", "MOV RBP,RSP", "CALL call:printf", "POP RBP"]}},
        {"tid": {"address": "401100"},
         "term": {"name": "helper", "uuid": "u-helper",
                  "ops": ["XOR EAX,EAX", "CMP [RDI],0x0", "CALL call:malloc"]}},
        {"tid": {"address": "401200"},
         "term": {"name": "FUN_00401200", "uuid": "u-anon", "ops": ["INC RAX"]}},
        {"tid": {"address": "402000"},
         "term": {"name": "printf"}}
    ]}}});
    std::fs::write(dir.join("prog-x86_64-gcc-O2.json"), doc.to_string()).unwrap();
}

fn ingest(dir: &Path) {
    cargo_bin_cmd!("binsim")
        .arg("ingest")
        .arg("--store")
        .arg(dir.join("store"))
        .arg("--input")
        .arg(dir.join("prog-x86_64-gcc-O2.json"))
        .arg("--symbols")
        .arg(dir.join("libc.txt"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Inserted: 2"));
}

#[test]
fn ingest_then_query_ranks_each_function_first_against_itself() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    ingest(temp.path());

    let report_path = temp.path().join("results.json");
    cargo_bin_cmd!("binsim")
        .arg("query")
        .arg("--store")
        .arg(temp.path().join("store"))
        .arg("--input")
        .arg(temp.path().join("prog-x86_64-gcc-O2.json"))
        .arg("--symbols")
        .arg(temp.path().join("libc.txt"))
        .arg("--output")
        .arg(&report_path)
        .arg("--batch-size")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Queries: 3"));

    let report: Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).expect("report json");
    let funcs = report["funcs"].as_array().expect("funcs array");
    assert_eq!(funcs.len(), 3);
    assert_eq!(funcs[0]["fname"], "main");
    assert_eq!(funcs[0]["addr"], "401000");
    assert_eq!(funcs[0]["results"][0]["name"], "main");
    assert_eq!(funcs[0]["results"][0]["cve_uuid"], "u-main");
    assert_eq!(funcs[0]["results"][0]["sim"], 1.0);
    assert_eq!(funcs[1]["results"][0]["name"], "helper");
    // Placeholder functions are queried but were never stored.
    assert_eq!(funcs[2]["fname"], "FUN_00401200");
    assert_eq!(funcs[2]["results"].as_array().unwrap().len(), 2);
}

#[test]
fn query_top_k_truncates_rankings() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    ingest(temp.path());

    let report_path = temp.path().join("top.json");
    cargo_bin_cmd!("binsim")
        .arg("query")
        .arg("--store")
        .arg(temp.path().join("store"))
        .arg("--input")
        .arg(temp.path().join("prog-x86_64-gcc-O2.json"))
        .arg("--output")
        .arg(&report_path)
        .arg("--top-k")
        .arg("1")
        .assert()
        .success();

    let report: Value = serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    for func in report["funcs"].as_array().unwrap() {
        assert_eq!(func["results"].as_array().unwrap().len(), 1);
    }
}

#[test]
fn store_info_reports_counts_and_runs() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    ingest(temp.path());

    let output = cargo_bin_cmd!("binsim")
        .arg("store-info")
        .arg("--store")
        .arg(temp.path().join("store"))
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let body: Value = serde_json::from_slice(&output).expect("store-info json");
    assert_eq!(body["functions"], 2);
    assert_eq!(body["schema_version"], 3);
    assert_eq!(body["ingest_runs"].as_array().unwrap().len(), 1);

    cargo_bin_cmd!("binsim")
        .arg("store-info")
        .arg("--store")
        .arg(temp.path().join("store"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Functions: 2"));
}

#[test]
fn ingest_json_summary_and_dedupe() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    ingest(temp.path());

    let output = cargo_bin_cmd!("binsim")
        .arg("ingest")
        .arg("--store")
        .arg(temp.path().join("store"))
        .arg("--input")
        .arg(temp.path().join("prog-x86_64-gcc-O2.json"))
        .arg("--symbols")
        .arg(temp.path().join("libc.txt"))
        .arg("--dedupe")
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&output).expect("ingest json");
    assert_eq!(summary["inserted"], 0);
    assert_eq!(summary["skipped_duplicates"], 2);
}

#[test]
fn normalize_prints_records_as_json() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());

    let output = cargo_bin_cmd!("binsim")
        .arg("normalize")
        .arg("--input")
        .arg(temp.path().join("prog-x86_64-gcc-O2.json"))
        .arg("--symbols")
        .arg(temp.path().join("libc.txt"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let records: Value = serde_json::from_slice(&output).expect("normalize json");
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["instructions"][2], "call_libc:printf");

    cargo_bin_cmd!("binsim")
        .arg("normalize")
        .arg("--input")
        .arg(temp.path().join("prog-x86_64-gcc-O2.json"))
        .arg("--named-only")
        .assert()
        .success()
        .stdout(predicate::str::contains("FUN_00401200").not());
}

#[test]
fn export_corpus_writes_tsv() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    let out = temp.path().join("corpus.tsv");
    let vocab = temp.path().join("vocab.tsv");

    cargo_bin_cmd!("binsim")
        .arg("export-corpus")
        .arg("--input-dir")
        .arg(temp.path())
        .arg("--output")
        .arg(&out)
        .arg("--vocabulary")
        .arg(&vocab)
        .arg("--symbols")
        .arg(temp.path().join("libc.txt"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Functions: 3"));

    let corpus = std::fs::read_to_string(&out).unwrap();
    let first = corpus.lines().next().unwrap();
    assert_eq!(
        first,
        "prog-x86_64-gcc-O2\tmain\tpush_RBP,mov_RBP_RSP,call_libc:printf,pop_RBP\tgcc O2"
    );

    let vocabulary = std::fs::read_to_string(&vocab).unwrap();
    assert_eq!(vocabulary.lines().count(), 8);
    assert!(vocabulary.lines().any(|line| line == "call_libc:printf\t1"));
}

#[test]
fn list_oracles_marks_selection() {
    cargo_bin_cmd!("binsim")
        .arg("list-oracles")
        .assert()
        .success()
        .stdout(predicate::str::contains("hashing (selected)"));

    let temp = tempdir().unwrap();
    let config = temp.path().join("binsim.yaml");
    std::fs::write(&config, "oracle:\n  kind: command\n  command: [model-server]\n").unwrap();
    let output = cargo_bin_cmd!("binsim")
        .arg("list-oracles")
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let entries: Value = serde_json::from_slice(&output).expect("list-oracles json");
    assert_eq!(entries[0]["name"], "command");
    assert_eq!(entries[0]["selected"], true);
    assert_eq!(entries[1]["name"], "hashing");
}

#[test]
fn query_against_missing_store_fails() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    cargo_bin_cmd!("binsim")
        .arg("query")
        .arg("--store")
        .arg(temp.path().join("nowhere"))
        .arg("--input")
        .arg(temp.path().join("prog-x86_64-gcc-O2.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Fingerprint store not found"));
}
