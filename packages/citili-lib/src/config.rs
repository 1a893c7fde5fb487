use citili_macros::config;

use crate::{
    formula::{FormulaCategory, Grammar, generator::MIN_CTL_DEPTH},
    logger::LogLevel,
};

pub trait IntoOr<T> {
    fn into_or(self, or: T) -> T;
}

impl<T> IntoOr<Option<T>> for Option<T> {
    fn into_or(self, or: Option<T>) -> Option<T> {
        match self {
            Some(t) => Some(t),
            None => or,
        }
    }
}

impl<T> IntoOr<T> for Option<T> {
    fn into_or(self, or: T) -> T {
        self.unwrap_or(or)
    }
}

pub const DEFAULT_MIN_INTEGER_CONSTANT: i64 = 0;
pub const DEFAULT_MAX_INTEGER_CONSTANT: i64 = 100;

config! {
    pub struct LoggerConfig {
        enabled: bool = true,
        log_file: bool = false,
        log_level: LogLevel = LogLevel::Info,
    }
}

config! {
    /// Shape of the generated formulas and how many of them are produced per
    /// model and category.
    pub struct GenerationConfig {
        /// Upper arity bound of `and` and `or`.
        max_arity: usize = 2,
        /// Maximum number of transitions in a single `is-fireable` atom.
        max_fireability_atom_size: usize = 1,
        /// Maximum number of places in a single `token-count` term.
        max_cardinality_atom_size: usize = 1,
        min_integer_constant: i64 = DEFAULT_MIN_INTEGER_CONSTANT,
        max_integer_constant: i64 = DEFAULT_MAX_INTEGER_CONSTANT,
        num_formulas: usize = 16,
        /// Number of accepted COL formulas unfolded into PT formulas for a
        /// COL/PT pair.
        num_unfold: usize = 8,
        formula_depth: usize = 2,
        categories: Vec<FormulaCategory> = FormulaCategory::ALL.to_vec(),
    }
}

config! {
    /// Settings of the external checker used to discard easy formulas.
    pub struct FilterConfig {
        enabled: bool = true,
        max_rounds: usize = 3,
        /// Number of candidates generated for one round of filtering.
        set_size: usize = 16,
        interpreter: String = "python".to_string(),
        checker_path: String = "smc.py".to_string(),
        /// Directory for the temporary property files, defaults to the
        /// system temp directory.
        tmp_dir: Option<String> = None,
        max_states: u64 = 2000,
    }
}

config! {
    pub struct CitiliConfig {
        seed: u64 = 0,
        input_dir: String = "INPUTS".to_string(),
        num_workers: usize = 1,
        generation: GenerationConfig (Option<PartialGenerationConfig> = GenerationConfig::default()),
        filter: FilterConfig (Option<PartialFilterConfig> = FilterConfig::default()),
        logger: LoggerConfig (Option<PartialLoggerConfig> = LoggerConfig::default()),
    }
}

impl GenerationConfig {
    /// The integer constant range used by cardinality atoms. Degenerate
    /// ranges fall back to the defaults, and `min` is clamped to `max` if the
    /// result is still inconsistent.
    pub fn integer_constant_bounds(&self) -> (i64, i64) {
        let mut min = self.min_integer_constant;
        let mut max = self.max_integer_constant;

        if max < 1 || min > max {
            min = DEFAULT_MIN_INTEGER_CONSTANT;
            max = DEFAULT_MAX_INTEGER_CONSTANT;
        }
        if min > max {
            min = max;
        }

        (min, max)
    }
}

impl CitiliConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_workers == 0 {
            anyhow::bail!("num_workers must be at least 1");
        }
        if self.generation.formula_depth == 0 {
            anyhow::bail!("generation.formula_depth must be at least 1");
        }
        let has_ctl = self
            .generation
            .categories
            .iter()
            .any(|c| c.grammar() == Grammar::CTL);
        if has_ctl && self.generation.formula_depth < MIN_CTL_DEPTH {
            anyhow::bail!(
                "generation.formula_depth must be at least {} for CTL categories",
                MIN_CTL_DEPTH
            );
        }
        if self.generation.max_fireability_atom_size == 0
            || self.generation.max_cardinality_atom_size == 0
        {
            anyhow::bail!("atom sizes must be at least 1");
        }
        if self.filter.enabled && self.filter.set_size == 0 {
            anyhow::bail!("filter.set_size must be at least 1 when filtering is enabled");
        }

        Ok(())
    }
}

#[test]
fn test_integer_constant_bounds() {
    let config = GenerationConfig::default()
        .with_min_integer_constant(5)
        .with_max_integer_constant(10);
    assert_eq!(config.integer_constant_bounds(), (5, 10));

    let config = config.with_max_integer_constant(0);
    assert_eq!(
        config.integer_constant_bounds(),
        (DEFAULT_MIN_INTEGER_CONSTANT, DEFAULT_MAX_INTEGER_CONSTANT)
    );

    let config = GenerationConfig::default()
        .with_min_integer_constant(20)
        .with_max_integer_constant(3);
    assert_eq!(config.integer_constant_bounds(), (0, 100));
}

#[test]
fn test_partial_json_config() {
    let json = r#"{ "seed": 7, "generation": { "num_formulas": 4 }, "filter": { "enabled": false } }"#;
    let config = CitiliConfig::from_str_with_extension(json, Some("json")).unwrap();

    assert_eq!(*config.get_seed(), 7);
    assert_eq!(*config.generation.get_num_formulas(), 4);
    assert_eq!(*config.generation.get_num_unfold(), 8);
    assert!(!config.filter.get_enabled());
    assert_eq!(config.filter.get_checker_path(), "smc.py");
}

#[test]
fn test_partial_toml_config() {
    let toml = r#"
        num_workers = 4

        [generation]
        max_arity = 3
        categories = ["CTLFireability"]
    "#;
    let config = CitiliConfig::from_str_with_extension(toml, Some("toml")).unwrap();

    assert_eq!(*config.get_num_workers(), 4);
    assert_eq!(*config.generation.get_max_arity(), 3);
    assert_eq!(
        config.generation.get_categories(),
        &vec![FormulaCategory::CTLFireability]
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_unknown_key_is_rejected() {
    let toml = "num_wrokers = 4";
    assert!(CitiliConfig::from_str_with_extension(toml, None).is_err());
}

#[test]
fn test_validate_ctl_depth() {
    let mut config = CitiliConfig::default();
    config.generation.set_formula_depth(1);
    assert!(config.validate().is_err());

    config
        .generation
        .set_categories(vec![FormulaCategory::ReachabilityFireability]);
    assert!(config.validate().is_ok());
}
