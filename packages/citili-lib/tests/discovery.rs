use std::path::{Path, PathBuf};

use citili_lib::net::{NetVariant, discovery::discover_models, pnml::PnmlParser};

const PT_NET: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<pnml xmlns="http://www.pnml.org/version-2009/grammar/pnml">
  <net id="A-PT-1" type="http://www.pnml.org/version-2009/grammar/ptnet">
    <page id="page0">
      <place id="P1.0"><initialMarking><text>12</text></initialMarking></place>
      <place id="P1.1"/>
      <transition id="T1.0"/>
    </page>
  </net>
</pnml>
"#;

const COL_NET: &str = r#"<?xml version="1.0"?>
<pnml>
  <net id="A-COL-1" type="http://www.pnml.org/version-2009/grammar/symmetricnet">
    <place id="P1"/>
    <transition id="T1"/>
  </net>
</pnml>
"#;

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("citili_discovery_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn model_dir(root: &Path, name: &str, content: Option<&str>) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    if let Some(content) = content {
        std::fs::write(dir.join("model.pnml"), content).unwrap();
    }
}

#[test]
fn discovers_and_links_twins() {
    let root = test_dir("twins");
    model_dir(&root, "A-COL-1", Some(COL_NET));
    model_dir(&root, "A-PT-1", Some(PT_NET));
    model_dir(&root, "B-PT-2-x", Some(PT_NET));
    model_dir(&root, "C-PT-1", None);
    model_dir(&root, "junk", None);
    std::fs::write(root.join("file.txt"), "not a model").unwrap();

    let (arena, report) = discover_models(&root).unwrap();

    assert_eq!(arena.len(), 3);
    assert_eq!(report.not_directory, vec!["file.txt".to_string()]);
    assert_eq!(report.wrong_name, vec!["junk".to_string()]);
    assert_eq!(report.no_model, vec!["C-PT-1".to_string()]);
    assert!(report.duplicate.is_empty());
    assert_eq!(report.total_skipped(), 3);

    let (colored_id, colored) = arena
        .iter()
        .find(|(_, m)| m.variant == NetVariant::Colored)
        .unwrap();
    let twin_id = arena.twin_of(colored_id).unwrap();
    assert_eq!(arena.get(twin_id).full_name(), "A-PT-1");
    assert_eq!(arena.twin_of(twin_id), Some(colored_id));
    assert_eq!(colored.instance, "1");

    let (_, lone) = arena.iter().find(|(_, m)| m.name == "B").unwrap();
    assert_eq!(lone.instance, "2-x");
    assert!(lone.twin.is_none());

    let mut jobs = arena.into_jobs();
    assert_eq!(jobs.len(), 2);

    let pair = jobs.iter_mut().find(|j| j.model.name == "A").unwrap();
    assert!(pair.model.is_colored());
    let twin = pair.twin.as_mut().unwrap();
    assert_eq!(twin.variant, NetVariant::PlaceTransition);

    twin.load(&PnmlParser).unwrap();
    assert_eq!(twin.places, vec!["P1.0".to_string(), "P1.1".to_string()]);
    assert_eq!(twin.transitions, vec!["T1.0".to_string()]);
    assert_eq!(twin.max_marking_constant, Some(12));

    pair.model.load(&PnmlParser).unwrap();
    assert_eq!(pair.model.places, vec!["P1".to_string()]);
    assert_eq!(pair.model.max_marking_constant, None);
}

#[test]
fn missing_input_dir_is_an_error() {
    let root = test_dir("missing").join("does-not-exist");
    assert!(discover_models(&root).is_err());
}

#[test]
fn unparsable_model_fails_to_load() {
    let root = test_dir("broken");
    model_dir(&root, "D-PT-1", Some("<pnml><page/></pnml>"));

    let (arena, _) = discover_models(&root).unwrap();
    let mut jobs = arena.into_jobs();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].model.load(&PnmlParser).is_err());
    assert!(!jobs[0].model.is_loaded());
}
