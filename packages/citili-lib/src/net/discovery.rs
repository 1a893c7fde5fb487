use std::path::Path;

use anyhow::Context;
use hashbrown::HashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::net::{Model, ModelArena, ModelId, NetVariant};

/// Entries of the input directory that did not become models, by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub not_directory: Vec<String>,
    pub wrong_name: Vec<String>,
    pub no_model: Vec<String>,
    pub duplicate: Vec<String>,
}

impl DiscoveryReport {
    pub fn total_skipped(&self) -> usize {
        self.not_directory.len() + self.wrong_name.len() + self.no_model.len() + self.duplicate.len()
    }

    pub fn log(&self) {
        if self.total_skipped() == 0 {
            return;
        }

        tracing::warn!(
            not_directory = self.not_directory.len(),
            wrong_name = self.wrong_name.len(),
            no_model = self.no_model.len(),
            duplicate = self.duplicate.len(),
            "skipped {} entries of the input directory",
            self.total_skipped()
        );
    }
}

/// Splits `<name>-<COL|PT>-<instance>` into its parts. The instance may
/// contain `-`, the name may not.
pub fn parse_directory_name(dir_name: &str) -> Option<(String, NetVariant, String)> {
    let regex = Regex::new(r"^([A-Za-z0-9_]+)-(COL|PT)-(.+)$").ok()?;
    let captures = regex.captures(dir_name)?;

    Some((
        captures[1].to_string(),
        NetVariant::from_tag(&captures[2])?,
        captures[3].to_string(),
    ))
}

#[test]
fn test_parse_directory_name() {
    assert_eq!(
        parse_directory_name("Philosophers-COL-000005"),
        Some((
            "Philosophers".to_string(),
            NetVariant::Colored,
            "000005".to_string()
        ))
    );
    assert_eq!(
        parse_directory_name("Peterson-PT-2-b"),
        Some((
            "Peterson".to_string(),
            NetVariant::PlaceTransition,
            "2-b".to_string()
        ))
    );
    assert_eq!(parse_directory_name("Peterson-SYM-2"), None);
    assert_eq!(parse_directory_name("Peterson-PT-"), None);
    assert_eq!(parse_directory_name("summary.json"), None);
}

/// Scans `input_dir` for model directories. Entries are visited in name
/// order, and colored and PT models of the same (name, instance) are linked
/// as twins. Only an unreadable `input_dir` is an error; everything else is
/// skipped and recorded in the report.
pub fn discover_models(input_dir: &Path) -> anyhow::Result<(ModelArena, DiscoveryReport)> {
    let entries = std::fs::read_dir(input_dir)
        .with_context(|| format!("failed to read dir: {}", input_dir.display()))?;
    let mut entries = entries
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read dir: {}", input_dir.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut arena = ModelArena::new();
    let mut report = DiscoveryReport::default();
    let mut seen: HashMap<(String, String, NetVariant), ModelId> = HashMap::new();

    for entry in entries {
        let dir_name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();

        if !path.is_dir() {
            tracing::debug!("skipping {}: not a directory", dir_name);
            report.not_directory.push(dir_name);
            continue;
        }

        let Some((name, variant, instance)) = parse_directory_name(&dir_name) else {
            tracing::warn!("skipping {}: not a <name>-<COL|PT>-<instance> directory", dir_name);
            report.wrong_name.push(dir_name);
            continue;
        };

        let model = Model::new(&name, &instance, variant, path);
        if !model.file_path.is_file() {
            tracing::warn!("skipping {}: no model.pnml", dir_name);
            report.no_model.push(dir_name);
            continue;
        }

        let key = (name, instance, variant);
        if seen.contains_key(&key) {
            tracing::warn!("skipping {}: duplicate model", dir_name);
            report.duplicate.push(dir_name);
            continue;
        }

        let id = arena.add(model);
        seen.insert(key, id);
    }

    for ((name, instance, variant), id) in &seen {
        if *variant != NetVariant::Colored {
            continue;
        }
        let twin_key = (name.clone(), instance.clone(), NetVariant::PlaceTransition);
        if let Some(twin) = seen.get(&twin_key) {
            arena.link_twins(*id, *twin)?;
        }
    }

    tracing::info!(
        models = arena.len(),
        skipped = report.total_skipped(),
        "discovered models in {}",
        input_dir.display()
    );

    Ok((arena, report))
}
