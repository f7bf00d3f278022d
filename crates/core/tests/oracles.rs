use std::sync::atomic::{AtomicUsize, Ordering};

use binsim_core::config::OracleConfig;
use binsim_core::services::oracle::{
    compare_checked, default_oracle_registry, embed_checked, Embedding, EmbeddingOracle,
    OracleError, OracleRegistry, OracleResult,
};
use binsim_core::services::oracles::{HashingOracle, RetryPolicy, RetryingOracle};

fn tokens(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn fast_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy { max_attempts, initial_backoff_ms: 1, max_backoff_ms: 2 }
}

/// Fails `failures` times with the given error before succeeding.
struct FlakyOracle {
    failures: usize,
    transient: bool,
    calls: AtomicUsize,
}

impl FlakyOracle {
    fn new(failures: usize, transient: bool) -> Self {
        Self { failures, transient, calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingOracle for FlakyOracle {
    fn embed(&self, batch: &[Vec<String>]) -> OracleResult<Vec<Embedding>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(if self.transient {
                OracleError::Transient("model busy".into())
            } else {
                OracleError::Backend("model crashed".into())
            });
        }
        Ok(batch.iter().map(|_| Embedding::new(vec![1.0])).collect())
    }

    fn compare(&self, _a: &[Embedding], b: &[Embedding]) -> OracleResult<Vec<f32>> {
        Ok(vec![1.0; b.len()])
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[test]
fn hashing_oracle_is_deterministic_and_self_similar() {
    let oracle = HashingOracle::new(64);
    let batch = vec![tokens(&["push_RBP", "ret_X"]), tokens(&["push_RBP", "ret_X"])];
    let first = oracle.embed(&batch).unwrap();
    let second = oracle.embed(&batch).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].dimensions(), 64);

    let scores = oracle.compare(&first[..1], &first[1..]).unwrap();
    assert_eq!(scores, vec![1.0]);
}

#[test]
fn hashing_scores_stay_in_unit_range() {
    let oracle = HashingOracle::new(8);
    let batch = vec![
        tokens(&["mov_RAX_RBX", "add_RAX_0x1", "ret_X"]),
        tokens(&["xor_EAX_EAX", "ret_X"]),
        tokens(&["call_libc:printf"]),
    ];
    let e = oracle.embed(&batch).unwrap();
    let a = vec![e[0].clone(), e[0].clone(), e[1].clone()];
    let b = vec![e[1].clone(), e[2].clone(), e[2].clone()];
    let scores = compare_checked(&oracle, &a, &b).unwrap();
    assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)), "scores out of range: {scores:?}");
}

#[test]
fn zero_dimensions_are_clamped() {
    assert_eq!(HashingOracle::new(0).dimensions(), 1);
}

#[test]
fn retry_recovers_from_transient_failures() {
    let flaky = FlakyOracle::new(2, true);
    let oracle = RetryingOracle::new(&flaky, fast_retries(3));
    let out = oracle.embed(&[tokens(&["ret_X"])]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(flaky.calls(), 3);
}

#[test]
fn retry_gives_up_after_max_attempts() {
    let flaky = FlakyOracle::new(10, true);
    let oracle = RetryingOracle::new(&flaky, fast_retries(3));
    let err = oracle.embed(&[tokens(&["ret_X"])]).unwrap_err();
    assert!(err.is_transient());
    assert_eq!(flaky.calls(), 3);
}

#[test]
fn permanent_failures_are_not_retried() {
    let flaky = FlakyOracle::new(1, false);
    let oracle = RetryingOracle::new(&flaky, fast_retries(5));
    let err = oracle.embed(&[tokens(&["ret_X"])]).unwrap_err();
    assert!(matches!(err, OracleError::Backend(_)));
    assert_eq!(flaky.calls(), 1);
}

#[test]
fn retry_policy_none_makes_one_attempt() {
    let flaky = FlakyOracle::new(1, true);
    let oracle = RetryingOracle::new(&flaky, RetryPolicy::none());
    assert!(oracle.embed(&[tokens(&["ret_X"])]).is_err());
    assert_eq!(flaky.calls(), 1);
    assert_eq!(oracle.name(), "flaky");
}

#[test]
fn checked_embed_reports_length_mismatch() {
    struct Short;
    impl EmbeddingOracle for Short {
        fn embed(&self, _batch: &[Vec<String>]) -> OracleResult<Vec<Embedding>> {
            Ok(Vec::new())
        }
        fn compare(&self, _a: &[Embedding], _b: &[Embedding]) -> OracleResult<Vec<f32>> {
            Ok(Vec::new())
        }
        fn name(&self) -> &'static str {
            "short"
        }
    }
    let err = embed_checked(&Short, &[tokens(&["ret_X"])]).unwrap_err();
    assert!(matches!(err, OracleError::LengthMismatch { expected: 1, found: 0 }));
    let one = Embedding::new(vec![1.0]);
    let err = compare_checked(&Short, &[one.clone()], &[one]).unwrap_err();
    assert!(matches!(err, OracleError::LengthMismatch { expected: 1, found: 0 }));
}

#[test]
fn registry_resolves_by_name_and_lists_choices() {
    let mut registry = OracleRegistry::new();
    registry.register(HashingOracle::default());
    assert!(registry.get("hashing").is_some());
    assert!(registry.get("nope").is_none());

    let err = registry.require("nope").err().unwrap();
    assert!(matches!(err, OracleError::Unknown { ref available, .. } if available == "hashing"));
}

#[test]
fn default_registry_adds_command_oracle_only_when_configured() {
    let registry = default_oracle_registry(&OracleConfig::default());
    assert_eq!(registry.names(), vec!["hashing"]);

    let config = OracleConfig { command: vec!["model-server".into()], ..OracleConfig::default() };
    let registry = default_oracle_registry(&config);
    assert_eq!(registry.names(), vec!["command", "hashing"]);
}

#[cfg(unix)]
mod command {
    use std::time::Duration;

    use binsim_core::services::oracle::{Embedding, EmbeddingOracle, OracleError};
    use binsim_core::services::oracles::CommandOracle;

    fn sh(script: &str, timeout: Option<Duration>) -> CommandOracle {
        CommandOracle::new(vec!["sh".into(), "-c".into(), script.into()], timeout)
    }

    #[test]
    fn embed_parses_json_response() {
        let oracle = sh(r#"cat >/dev/null; echo '{"embeddings":[[1.0,0.0],[0.5,0.5]]}'"#, None);
        let out = oracle.embed(&[vec!["a".into()], vec!["b".into()]]).unwrap();
        assert_eq!(out, vec![Embedding::new(vec![1.0, 0.0]), Embedding::new(vec![0.5, 0.5])]);
    }

    #[test]
    fn request_is_written_to_stdin() {
        let oracle = sh(
            r#"grep -q '"op":"compare"' && echo '{"scores":[0.25]}' || exit 3"#,
            Some(Duration::from_secs(10)),
        );
        let e = Embedding::new(vec![1.0]);
        let scores = oracle.compare(&[e.clone()], &[e]).unwrap();
        assert_eq!(scores, vec![0.25]);
    }

    #[test]
    fn tempfail_exit_is_transient() {
        let oracle = sh("cat >/dev/null; echo busy >&2; exit 75", None);
        let err = oracle.embed(&[vec!["a".into()]]).unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn other_failures_are_permanent() {
        let oracle = sh("cat >/dev/null; exit 2", None);
        let err = oracle.embed(&[vec!["a".into()]]).unwrap_err();
        assert!(matches!(err, OracleError::Backend(_)));

        let oracle = sh("cat >/dev/null; echo not-json", None);
        let err = oracle.embed(&[vec!["a".into()]]).unwrap_err();
        assert!(matches!(err, OracleError::Backend(_)));
    }

    #[test]
    fn deadline_kills_slow_process() {
        let oracle = sh("exec sleep 5", Some(Duration::from_millis(100)));
        let err = oracle.embed(&[vec!["a".into()]]).unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn empty_command_is_rejected() {
        let oracle = CommandOracle::new(Vec::new(), None);
        assert!(matches!(oracle.embed(&[]), Err(OracleError::Backend(_))));
    }
}
