use std::{
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::Context;
use regex::Regex;

use crate::{
    config::FilterConfig,
    oracle::{Oracle, OracleRequest},
};

const CHECKER_STAGE: &str = "checker";

static PROPERTY_FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Statistical model checker run as
/// `<interpreter> <checker> --use10 --max-states=N --mcc15-stop-after=K <model> <properties>`.
///
/// Its output goes through `grep -v ^smc:`, `grep ?` and `cut`, which leaves
/// one line per property whose answer is unknown, starting with the index
/// of the property.
#[derive(Debug, Clone)]
pub struct SmcOracle {
    interpreter: String,
    checker_path: PathBuf,
    tmp_dir: PathBuf,
    max_states: u64,
}

impl SmcOracle {
    pub fn new(
        interpreter: impl Into<String>,
        checker_path: impl Into<PathBuf>,
        tmp_dir: impl Into<PathBuf>,
        max_states: u64,
    ) -> Self {
        SmcOracle {
            interpreter: interpreter.into(),
            checker_path: checker_path.into(),
            tmp_dir: tmp_dir.into(),
            max_states,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        let tmp_dir = config
            .get_tmp_dir()
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        SmcOracle::new(
            config.get_interpreter().as_str(),
            config.get_checker_path().as_str(),
            tmp_dir,
            *config.get_max_states(),
        )
    }

    fn property_file(&self) -> PathBuf {
        self.tmp_dir.join(format!(
            "citili_{}_{}.xml",
            std::process::id(),
            PROPERTY_FILE_COUNTER.fetch_add(1, Ordering::SeqCst)
        ))
    }

    fn run_pipeline(
        &self,
        model_file: &Path,
        property_file: &Path,
        target: usize,
        cut_field: usize,
    ) -> anyhow::Result<String> {
        let mut children = Children::default();

        let mut checker = Command::new(&self.interpreter)
            .arg(&self.checker_path)
            .arg("--use10")
            .arg(format!("--max-states={}", self.max_states))
            .arg(format!("--mcc15-stop-after={}", target))
            .arg(model_file)
            .arg(property_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| {
                format!(
                    "failed to spawn checker: {} {}",
                    self.interpreter,
                    self.checker_path.display()
                )
            })?;
        let checker_stdout = checker.stdout.take().context("checker stdout not captured")?;
        let checker_stderr = checker.stderr.take().context("checker stderr not captured")?;
        children.push(CHECKER_STAGE, checker);

        let mut drop_logs = Command::new("grep")
            .args(["-v", "^smc:"])
            .stdin(Stdio::from(checker_stdout))
            .stdout(Stdio::piped())
            .spawn()
            .context("failed to spawn grep")?;
        let drop_logs_stdout = drop_logs.stdout.take().context("grep stdout not captured")?;
        children.push("grep -v ^smc:", drop_logs);

        let mut keep_unknown = Command::new("grep")
            .arg("?")
            .stdin(Stdio::from(drop_logs_stdout))
            .stdout(Stdio::piped())
            .spawn()
            .context("failed to spawn grep")?;
        let keep_unknown_stdout = keep_unknown.stdout.take().context("grep stdout not captured")?;
        children.push("grep ?", keep_unknown);

        let mut cut = Command::new("cut")
            .arg("-d-")
            .arg(format!("-f{}", cut_field))
            .stdin(Stdio::from(keep_unknown_stdout))
            .stdout(Stdio::piped())
            .spawn()
            .context("failed to spawn cut")?;
        let mut cut_stdout = cut.stdout.take().context("cut stdout not captured")?;
        children.push("cut", cut);

        let span = tracing::Span::current();
        let output = std::thread::scope(|s| {
            s.spawn(move || {
                let _enter = span.enter();
                for line in BufReader::new(checker_stderr).lines().map_while(Result::ok) {
                    tracing::warn!("checker stderr: {}", line);
                }
            });

            let mut output = String::new();
            cut_stdout.read_to_string(&mut output).map(|_| output)
        })
        .context("failed to read checker output")?;

        children.wait_all()?;

        Ok(output)
    }
}

impl Oracle for SmcOracle {
    fn name(&self) -> &str {
        "smc"
    }

    fn check(&self, request: &OracleRequest) -> anyhow::Result<Vec<usize>> {
        let property_file = RemoveOnDrop(self.property_file());
        request.properties.write_xml(&property_file.0)?;

        tracing::info!(
            "running checker on {} with {} properties, stop after {}",
            request.model_file.display(),
            request.properties.formulas.len(),
            request.target
        );

        let output = self.run_pipeline(
            request.model_file,
            &property_file.0,
            request.target,
            cut_field(request.properties.instance),
        )?;

        parse_indices(&output)
    }
}

/// Property ids look like `<name>-<COL|PT>-<instance>-<category>-<NN>` and the
/// name never contains `-`, so the index sits in field 5 when splitting the
/// checker line on `-`, shifted by the dashes of the instance.
pub fn cut_field(instance: &str) -> usize {
    5 + instance.matches('-').count()
}

/// Reads the leading number of every non-empty line. Lines without one are
/// skipped with a warning.
pub fn parse_indices(output: &str) -> anyhow::Result<Vec<usize>> {
    let regex = Regex::new(r"^\s*(\d+)")?;
    let mut indices = vec![];

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        match regex
            .captures(line)
            .and_then(|c| c[1].parse::<usize>().ok())
        {
            Some(i) => indices.push(i),
            None => tracing::warn!("skipping unparsable checker line: {}", line),
        }
    }

    Ok(indices)
}

#[derive(Default)]
struct Children {
    children: Vec<(&'static str, Child)>,
}

impl Children {
    fn push(&mut self, name: &'static str, child: Child) {
        self.children.push((name, child));
    }

    /// Waits for every stage. Only the checker has to succeed. A failing
    /// text stage is logged and its output is still used, `grep` exits
    /// with 1 when nothing matches.
    fn wait_all(mut self) -> anyhow::Result<()> {
        let mut result = Ok(());

        for (name, mut child) in self.children.drain(..) {
            let status = child
                .wait()
                .with_context(|| format!("failed to wait for {}", name))?;

            if status.success() {
                continue;
            }
            if name == CHECKER_STAGE {
                if result.is_ok() {
                    result = Err(anyhow::anyhow!("{} exited with {}", name, status));
                }
            } else {
                tracing::warn!("{} exited with {}", name, status);
            }
        }

        result
    }
}

impl Drop for Children {
    fn drop(&mut self) {
        for (_, child) in &mut self.children {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn test_cut_field() {
    assert_eq!(cut_field("000005"), 5);
    assert_eq!(cut_field("2-b"), 6);
}

#[test]
fn test_parse_indices() {
    let output = "03 ? TECHNIQUES\n\n 7\nnot-a-number\n12\n";
    assert_eq!(parse_indices(output).unwrap(), vec![3, 7, 12]);
}
