use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use citili_lib::{
    formula::{EXISTS_PATH, FINALLY, Formula, FormulaCategory, Operator},
    net::{Model, NetVariant, correspondence::ensure_correspondence},
    oracle::{FilterSubject, KeepAllOracle, Oracle, OracleRequest, filter, smc::SmcOracle},
};

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("citili_oracle_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn fireable(transitions: &[&str]) -> Formula {
    let atom = Formula::new(
        Operator::is_fireable(),
        transitions
            .iter()
            .map(|t| Formula::leaf(Operator::literal(*t)))
            .collect(),
    );
    Formula::new(
        Operator::new(EXISTS_PATH, 1, 1, false),
        vec![Formula::new(Operator::new(FINALLY, 1, 1, false), vec![atom])],
    )
}

fn pt_model(dir: &Path) -> Model {
    Model::new("M", "1", NetVariant::PlaceTransition, dir.join("M-PT-1"))
        .with_identifiers(strings(&["P.0"]), strings(&["T.0", "T.1"]))
}

struct FailingOracle;

impl Oracle for FailingOracle {
    fn name(&self) -> &str {
        "failing"
    }

    fn check(&self, _request: &OracleRequest) -> anyhow::Result<Vec<usize>> {
        anyhow::bail!("cannot create pipe")
    }
}

struct FixedOracle(Vec<usize>);

impl Oracle for FixedOracle {
    fn name(&self) -> &str {
        "fixed"
    }

    fn check(&self, _request: &OracleRequest) -> anyhow::Result<Vec<usize>> {
        Ok(self.0.clone())
    }
}

/// Keeps everything and remembers what it was asked.
#[derive(Default)]
struct RecordingOracle {
    calls: Mutex<Vec<(PathBuf, Vec<String>, usize)>>,
}

impl Oracle for RecordingOracle {
    fn name(&self) -> &str {
        "recording"
    }

    fn check(&self, request: &OracleRequest) -> anyhow::Result<Vec<usize>> {
        let transitions: Vec<String> = request
            .properties
            .formulas
            .iter()
            .flat_map(|f| f.transitions())
            .map(str::to_string)
            .collect();
        self.calls.lock().unwrap().push((
            request.model_file.to_path_buf(),
            transitions,
            request.target,
        ));
        Ok((0..request.properties.formulas.len()).collect())
    }
}

#[test]
fn oracle_failure_keeps_nothing() {
    let dir = test_dir("failure");
    let model = pt_model(&dir);
    let batch = vec![fireable(&["T.0"]); 4];

    let kept = filter(
        &FailingOracle,
        &FilterSubject::Direct(&model),
        FormulaCategory::CTLFireability,
        &batch,
        4,
    );
    assert!(kept.is_empty());
}

#[test]
fn missing_checker_keeps_nothing() {
    let dir = test_dir("missing");
    let model = pt_model(&dir);
    let batch = vec![fireable(&["T.0"]); 2];
    let oracle = SmcOracle::new("citili-no-such-interpreter", "smc.py", &dir, 10);

    let kept = filter(
        &oracle,
        &FilterSubject::Direct(&model),
        FormulaCategory::CTLFireability,
        &batch,
        2,
    );
    assert!(kept.is_empty());
}

#[test]
fn out_of_range_and_duplicate_indices_are_dropped() {
    let dir = test_dir("range");
    let model = pt_model(&dir);
    let batch = vec![fireable(&["T.0"]); 6];

    let kept = filter(
        &FixedOracle(vec![5, 1, 1, 99]),
        &FilterSubject::Direct(&model),
        FormulaCategory::CTLFireability,
        &batch,
        3,
    );
    assert_eq!(kept, vec![1, 5]);
}

#[test]
fn colored_model_without_twin_keeps_all() {
    let dir = test_dir("no_twin");
    let colored = Model::new("M", "1", NetVariant::Colored, dir.join("M-COL-1"))
        .with_identifiers(strings(&["P"]), strings(&["T"]));
    let batch = vec![fireable(&["T"]); 3];
    let oracle = RecordingOracle::default();

    let subject = FilterSubject::for_model(&colored, None);
    assert!(matches!(subject, FilterSubject::Unfilterable { .. }));

    let kept = filter(&oracle, &subject, FormulaCategory::CTLFireability, &batch, 1);
    assert_eq!(kept, vec![0, 1, 2]);
    assert!(oracle.calls.lock().unwrap().is_empty());
}

#[test]
fn colored_model_is_checked_on_twin() {
    let dir = test_dir("twin");
    let mut colored = Model::new("M", "1", NetVariant::Colored, dir.join("M-COL-1"))
        .with_identifiers(strings(&["P"]), strings(&["T"]));
    let twin = pt_model(&dir);
    assert!(ensure_correspondence(&mut colored, &twin).is_ok());

    let batch = vec![fireable(&["T"]); 2];
    let oracle = RecordingOracle::default();
    let subject = FilterSubject::for_model(&colored, Some(&twin));

    let kept = filter(&oracle, &subject, FormulaCategory::CTLFireability, &batch, 2);
    assert_eq!(kept, vec![0, 1]);

    let calls = oracle.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (model_file, transitions, target) = &calls[0];
    assert_eq!(model_file, &twin.file_path);
    assert_eq!(transitions, &strings(&["T.0", "T.1", "T.0", "T.1"]));
    assert_eq!(*target, 2);
}

#[test]
fn keep_all_oracle() {
    let dir = test_dir("keep_all");
    let model = pt_model(&dir);
    let batch = vec![fireable(&["T.1"]); 5];

    let kept = filter(
        &KeepAllOracle,
        &FilterSubject::Direct(&model),
        FormulaCategory::CTLFireability,
        &batch,
        2,
    );
    assert_eq!(kept, vec![0, 1, 2, 3, 4]);
}

#[test]
fn smc_pipeline_keeps_unknown_properties() {
    let dir = test_dir("smc");
    let model = pt_model(&dir);
    let script = dir.join("fake_smc.sh");
    // arguments: --use10 --max-states=N --mcc15-stop-after=K <model> <properties>
    std::fs::write(
        &script,
        r#"test -f "$5" || exit 3
grep -q "<id>M-PT-1-CTLFireability-03</id>" "$5" || exit 4
echo "smc: checking ? properties" >&1
echo "warning from the checker" >&2
echo "FORMULA M-PT-1-CTLFireability-00 TRUE TECHNIQUES EXPLICIT"
echo "FORMULA M-PT-1-CTLFireability-02 ? TECHNIQUES EXPLICIT"
echo "FORMULA M-PT-1-CTLFireability-03 ? TECHNIQUES EXPLICIT"
"#,
    )
    .unwrap();

    let tmp = dir.join("tmp");
    std::fs::create_dir_all(&tmp).unwrap();
    let oracle = SmcOracle::new("sh", &script, &tmp, 100);
    let batch = vec![fireable(&["T.0"]); 4];

    let kept = filter(
        &oracle,
        &FilterSubject::Direct(&model),
        FormulaCategory::CTLFireability,
        &batch,
        4,
    );
    assert_eq!(kept, vec![2, 3]);

    // the property file is removed after the call
    assert_eq!(std::fs::read_dir(&tmp).unwrap().count(), 0);
}

#[test]
fn smc_checker_failure_aborts_round() {
    let dir = test_dir("smc_fail");
    let model = pt_model(&dir);
    let script = dir.join("failing_smc.sh");
    std::fs::write(
        &script,
        "echo \"FORMULA M-PT-1-CTLFireability-01 ? TECHNIQUES\"\nexit 2\n",
    )
    .unwrap();

    let oracle = SmcOracle::new("sh", &script, &dir, 100);
    let batch = vec![fireable(&["T.0"]); 2];

    let kept = filter(
        &oracle,
        &FilterSubject::Direct(&model),
        FormulaCategory::CTLFireability,
        &batch,
        2,
    );
    assert!(kept.is_empty());
}
