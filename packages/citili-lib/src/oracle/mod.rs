use std::path::Path;

use enum_dispatch::enum_dispatch;
use itertools::Itertools;

use crate::{
    formula::{Formula, FormulaCategory, print::PropertySet},
    net::{Model, correspondence::Correspondence, unfold::unfold},
    oracle::smc::SmcOracle,
};

pub mod smc;

/// One call to an oracle: a batch of properties over a model file, of which
/// the oracle should keep at most `target`.
#[derive(Debug, Clone)]
pub struct OracleRequest<'a> {
    pub model_file: &'a Path,
    pub properties: PropertySet<'a>,
    pub target: usize,
}

/// Decides which formulas of a batch are worth keeping. Blocks until the
/// decision is made.
#[enum_dispatch(OracleWrapper)]
pub trait Oracle {
    fn name(&self) -> &str;

    /// Indices into `request.properties.formulas` of the kept formulas.
    fn check(&self, request: &OracleRequest) -> anyhow::Result<Vec<usize>>;
}

#[enum_dispatch]
#[derive(Debug, Clone)]
pub enum OracleWrapper {
    Smc(SmcOracle),
    KeepAll(KeepAllOracle),
}

/// Keeps every formula, used when filtering is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAllOracle;

impl Oracle for KeepAllOracle {
    fn name(&self) -> &str {
        "keep-all"
    }

    fn check(&self, request: &OracleRequest) -> anyhow::Result<Vec<usize>> {
        Ok((0..request.properties.formulas.len()).collect())
    }
}

/// What a batch generated for a model is checked against.
#[derive(Debug, Clone, Copy)]
pub enum FilterSubject<'a> {
    /// A PT model, checked on its own file.
    Direct(&'a Model),
    /// A colored model whose formulas are unfolded and checked on the file
    /// of its PT twin.
    Unfolded {
        colored: &'a Model,
        twin: &'a Model,
        correspondence: &'a Correspondence,
    },
    /// A colored model the checker cannot handle. Everything is kept.
    Unfilterable {
        model: &'a Model,
        reason: &'static str,
    },
}

impl<'a> FilterSubject<'a> {
    pub fn for_model(model: &'a Model, twin: Option<&'a Model>) -> Self {
        if !model.is_colored() {
            return FilterSubject::Direct(model);
        }

        match (twin, model.usable_correspondence()) {
            (None, _) => FilterSubject::Unfilterable {
                model,
                reason: "colored model without PT twin",
            },
            (Some(_), None) => FilterSubject::Unfilterable {
                model,
                reason: "no usable correspondence with the PT twin",
            },
            (Some(twin), Some(correspondence)) => FilterSubject::Unfolded {
                colored: model,
                twin,
                correspondence,
            },
        }
    }

    pub fn model(&self) -> &'a Model {
        match self {
            FilterSubject::Direct(model) => model,
            FilterSubject::Unfolded { colored, .. } => colored,
            FilterSubject::Unfilterable { model, .. } => model,
        }
    }
}

/// Runs one filter round over `batch` and returns the indices of the kept
/// formulas, sorted and without duplicates.
///
/// Oracle failures abort the round: they are logged and nothing is kept.
/// Indices outside of the batch are dropped with a warning.
pub fn filter<O: Oracle + ?Sized>(
    oracle: &O,
    subject: &FilterSubject,
    category: FormulaCategory,
    batch: &[Formula],
    target: usize,
) -> Vec<usize> {
    let result = match subject {
        FilterSubject::Unfilterable { model, reason } => {
            tracing::info!(
                "{}: cannot filter formulas ({}), keeping all {}",
                model.full_name(),
                reason,
                batch.len()
            );
            return (0..batch.len()).collect();
        }
        FilterSubject::Direct(model) => oracle.check(&OracleRequest {
            model_file: &model.file_path,
            properties: PropertySet::new(model, category, batch),
            target,
        }),
        FilterSubject::Unfolded {
            twin,
            correspondence,
            ..
        } => {
            let unfolded: Vec<Formula> = batch.iter().map(|f| unfold(f, correspondence)).collect();
            oracle.check(&OracleRequest {
                model_file: &twin.file_path,
                properties: PropertySet::new(twin, category, &unfolded),
                target,
            })
        }
    };

    let indices = match result {
        Ok(indices) => indices,
        Err(e) => {
            tracing::warn!(
                oracle = oracle.name(),
                "filter round aborted for {}: {:#}",
                subject.model().full_name(),
                e
            );
            return vec![];
        }
    };

    let kept = indices
        .into_iter()
        .filter(|&i| {
            if i >= batch.len() {
                tracing::warn!("oracle returned index {} for a batch of {}", i, batch.len());
                return false;
            }
            true
        })
        .sorted()
        .dedup()
        .collect_vec();

    if kept.is_empty() {
        tracing::warn!(
            oracle = oracle.name(),
            "filter round for {} kept no formula",
            subject.model().full_name()
        );
    } else {
        tracing::debug!(
            oracle = oracle.name(),
            kept = kept.len(),
            batch = batch.len(),
            "filter round done"
        );
    }

    kept
}
