use binsim_core::model::{QueryResult, SearchReport, SimilarityMatch};
use binsim_core::normalize::Normalizer;
use binsim_core::services::corpus::{
    export_corpus, write_vocabulary, CorpusError, CorpusFileName,
};
use binsim_core::services::report::{read_report, render_report, write_report};
use binsim_core::symbols::SymbolCatalog;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::tempdir;

fn ir(subs: serde_json::Value) -> String {
    json!({"program": {"term": {"subs": subs}}}).to_string()
}

#[test]
fn file_name_parts_come_from_the_right() {
    let parsed = CorpusFileName::parse(Path::new("/ir/openssl-1.0.1f-x86_64-gcc-O2.json")).unwrap();
    assert_eq!(parsed.binary, "openssl-1.0.1f-x86_64-gcc-O2");
    assert_eq!(parsed.arch, "x86_64");
    assert_eq!(parsed.compiler, "gcc");
    assert_eq!(parsed.opt_level, "O2");
    assert_eq!(parsed.label(), "gcc O2");

    for bad in ["busybox.json", "a-b-c.json", "a-b-c-d.txt", "-x86-gcc-O0.json"] {
        assert!(
            matches!(CorpusFileName::parse(Path::new(bad)), Err(CorpusError::FileName(_))),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn export_writes_one_line_per_function() {
    let temp = tempdir().unwrap();
    std::fs::write(
        temp.path().join("ls-arm-clang-O0.json"),
        ir(json!([
            {"tid": {"address": "10"}, "term": {"name": "main", "ops": ["PUSH RBP", "CALL call:puts"]}},
            {"tid": {"address": "20"}, "term": {"name": "FUN_00000020", "ops": ["RET X"]}},
            {"tid": {"address": "30"}, "term": {"name": "puts"}}
        ])),
    )
    .unwrap();
    std::fs::write(
        temp.path().join("cat-arm-gcc-O3.json"),
        ir(json!([{"tid": {"address": "40"}, "term": {"name": "main", "ops": ["RET X"]}}])),
    )
    .unwrap();
    std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

    let catalog = SymbolCatalog::from_names(["puts"]);
    let normalizer = Normalizer::new(&catalog);
    let mut out = Vec::new();
    let summary = export_corpus(temp.path(), &normalizer, &mut out).unwrap();

    assert_eq!(summary.files, 2);
    assert_eq!(summary.functions, 3);
    assert_eq!(summary.vocabulary.get("ret_X"), Some(&2));

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "cat-arm-gcc-O3\tmain\tret_X\tgcc O3",
            "ls-arm-clang-O0\tmain\tpush_RBP,call_libc:puts\tclang O0",
            "ls-arm-clang-O0\tFUN_00000020\tret_X\tclang O0",
        ]
    );
}

#[test]
fn vocabulary_is_written_most_frequent_first() {
    let vocabulary: BTreeMap<String, u64> =
        [("ret_X", 2u64), ("push_RBP", 1), ("call_libc:puts", 1)]
            .into_iter()
            .map(|(t, c)| (t.to_string(), c))
            .collect();
    let mut out = Vec::new();
    write_vocabulary(&vocabulary, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "ret_X\t2\ncall_libc:puts\t1\npush_RBP\t1\n"
    );
}

#[test]
fn export_rejects_badly_named_documents() {
    let temp = tempdir().unwrap();
    std::fs::write(temp.path().join("unlabelled.json"), ir(json!([]))).unwrap();
    let catalog = SymbolCatalog::empty();
    let err = export_corpus(temp.path(), &Normalizer::new(&catalog), &mut Vec::<u8>::new()).unwrap_err();
    assert!(matches!(err, CorpusError::FileName(ref name) if name == "unlabelled.json"));
}

fn sample_report() -> SearchReport {
    SearchReport {
        funcs: vec![QueryResult {
            query_address: 0x401000,
            query_name: "main".into(),
            ranked_matches: vec![SimilarityMatch {
                similarity: 0.5,
                name: "printf_impl".into(),
                identifier: "u-1".into(),
            }],
        }],
    }
}

#[test]
fn report_uses_wire_field_names() {
    let body = String::from_utf8(render_report(&sample_report()).unwrap()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        value,
        json!({"funcs": [{"addr": "401000", "fname": "main",
                          "results": [{"sim": 0.5, "name": "printf_impl", "cve_uuid": "u-1"}]}]})
    );
    assert!(body.contains("\n    \"funcs\""), "expected four-space indent: {body}");
}

#[test]
fn write_report_replaces_file_atomically() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("results.json");
    std::fs::write(&path, "stale").unwrap();

    write_report(&path, &sample_report()).unwrap();
    assert_eq!(read_report(&path).unwrap(), sample_report());

    let leftovers: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|n| n.to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn write_report_fails_for_missing_directory() {
    let temp = tempdir().unwrap();
    let err = write_report(&temp.path().join("nope/results.json"), &sample_report()).unwrap_err();
    assert!(err.to_string().contains("Failed to write report"), "unexpected error: {err}");
}
