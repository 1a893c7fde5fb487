use anyhow::Context;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::{
    config::CitiliConfig,
    formula::{
        Formula, FormulaCategory, GenerationError, atoms::AtomBinder, generator::FormulaGenerator,
        operators::OperatorCatalog, print::PropertySet,
    },
    net::{
        Model, ModelJob, NetParser, NetVariant, correspondence::ensure_correspondence,
        unfold::unfold,
    },
    oracle::{FilterSubject, Oracle, filter},
};

/// State of the colored-to-PT unfolding for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnfoldingStatus {
    /// PT model without colored twin.
    NotApplicable,
    /// Colored model without (loadable) PT twin.
    NoTwin,
    Usable,
    /// The correspondence could not be built, the twin is handled on its own.
    Unusable(String),
}

/// The formulas picked for one category and model variant.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub formulas: Vec<Formula>,
    /// Formulas kept by the oracle.
    pub accepted_by_filter: usize,
    /// Unfiltered formulas added after the last round.
    pub random_fill: usize,
    pub rounds: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub category: FormulaCategory,
    pub variant: NetVariant,
    pub written: usize,
    pub accepted_by_filter: usize,
    pub random_fill: usize,
    /// Formulas obtained by unfolding formulas of the colored twin.
    pub unfolded: usize,
    pub rounds: usize,
}

impl CategoryOutcome {
    fn new(model: &Model, category: FormulaCategory, selection: &Selection, unfolded: usize) -> Self {
        CategoryOutcome {
            category,
            variant: model.variant,
            written: selection.formulas.len() + unfolded,
            accepted_by_filter: selection.accepted_by_filter,
            random_fill: selection.random_fill,
            unfolded,
            rounds: selection.rounds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOutcome {
    pub name: String,
    pub instance: String,
    pub variant: NetVariant,
    pub twin: Option<NetVariant>,
    pub twin_error: Option<String>,
    pub unfolding: UnfoldingStatus,
    pub unmapped_places: usize,
    pub unmapped_transitions: usize,
    pub categories: Vec<CategoryOutcome>,
}

impl ModelOutcome {
    pub fn total_written(&self) -> usize {
        self.categories.iter().map(|c| c.written).sum()
    }

    pub fn total_random_fill(&self) -> usize {
        self.categories.iter().map(|c| c.random_fill).sum()
    }
}

/// Drives generation, filtering and writing for one model job.
pub struct Orchestrator<'a, O: Oracle, P: NetParser> {
    config: &'a CitiliConfig,
    generator: FormulaGenerator<'a>,
    oracle: &'a O,
    parser: &'a P,
}

impl<'a, O: Oracle, P: NetParser> Orchestrator<'a, O, P> {
    pub fn new(
        config: &'a CitiliConfig,
        catalog: &'a OperatorCatalog,
        oracle: &'a O,
        parser: &'a P,
    ) -> Self {
        Orchestrator {
            config,
            generator: FormulaGenerator::new(catalog),
            oracle,
            parser,
        }
    }

    /// Generates and writes the property files of every configured category
    /// for the model of `job` and for its twin.
    ///
    /// Fails if the model file cannot be read, a formula cannot be generated
    /// or a property file cannot be written. A twin that cannot be read only
    /// causes a warning.
    pub fn run(&self, job: ModelJob, rng: &mut StdRng) -> anyhow::Result<ModelOutcome> {
        let ModelJob {
            mut model,
            mut twin,
        } = job;

        model.load(self.parser)?;

        let mut twin_error = None;
        if let Some(t) = &mut twin
            && let Err(e) = t.load(self.parser)
        {
            tracing::warn!("ignoring twin {}: {:#}", t.full_name(), e);
            twin_error = Some(format!("{:#}", e));
            twin = None;
        }

        let unfolding = match &twin {
            Some(t) if model.is_colored() => match ensure_correspondence(&mut model, t) {
                Ok(_) => UnfoldingStatus::Usable,
                Err(e) => {
                    let reason = e.to_string();
                    tracing::warn!("unfolding disabled for {}: {}", model.full_name(), reason);
                    UnfoldingStatus::Unusable(reason)
                }
            },
            _ if model.is_colored() => UnfoldingStatus::NoTwin,
            _ => UnfoldingStatus::NotApplicable,
        };

        let mut outcome = ModelOutcome {
            name: model.name.clone(),
            instance: model.instance.clone(),
            variant: model.variant,
            twin: twin.as_ref().map(|t| t.variant),
            twin_error,
            unfolding,
            unmapped_places: model.unmapped_places.len(),
            unmapped_transitions: model.unmapped_transitions.len(),
            categories: vec![],
        };

        for &category in self.config.get_generation().get_categories() {
            tracing::info!("generating {} formulas", category);

            let outcomes = self
                .run_category(&model, twin.as_ref(), category, rng)
                .with_context(|| format!("failed to generate {} formulas", category))?;
            outcome.categories.extend(outcomes);
        }

        model.release();
        if let Some(t) = &mut twin {
            t.release();
        }

        Ok(outcome)
    }

    /// Writes the files of one category for `model`, and for `twin` if
    /// there is one. With a usable correspondence, the first formulas of the
    /// twin are unfoldings of formulas of `model`.
    pub fn run_category(
        &self,
        model: &Model,
        twin: Option<&Model>,
        category: FormulaCategory,
        rng: &mut StdRng,
    ) -> anyhow::Result<Vec<CategoryOutcome>> {
        let generation = self.config.get_generation();
        let num_formulas = *generation.get_num_formulas();
        let mut outcomes = vec![];

        let binder = AtomBinder::for_model(model, generation);
        let subject = FilterSubject::for_model(model, twin);
        let selection = self.select_formulas(&subject, category, &binder, num_formulas, rng)?;
        write_property_files(&PropertySet::new(model, category, &selection.formulas), model)?;
        outcomes.push(CategoryOutcome::new(model, category, &selection, 0));

        let Some(twin) = twin else {
            return Ok(outcomes);
        };

        let mut formulas: Vec<Formula> = match model.usable_correspondence() {
            Some(correspondence) => selection
                .formulas
                .iter()
                .take((*generation.get_num_unfold()).min(num_formulas))
                .map(|f| unfold(f, correspondence))
                .collect(),
            None => vec![],
        };
        let unfolded = formulas.len();
        tracing::debug!(unfolded, "unfolded formulas for {}", twin.full_name());

        let binder = AtomBinder::for_model(twin, generation);
        let rest = self.select_formulas(
            &FilterSubject::Direct(twin),
            category,
            &binder,
            num_formulas - unfolded,
            rng,
        )?;
        formulas.extend(rest.formulas.iter().cloned());
        write_property_files(&PropertySet::new(twin, category, &formulas), twin)?;
        outcomes.push(CategoryOutcome::new(twin, category, &rest, unfolded));

        Ok(outcomes)
    }

    /// Up to `max_rounds` rounds of generating `set_size` candidates and
    /// keeping those the oracle accepts, then fresh unfiltered formulas
    /// until there are `count`.
    pub fn select_formulas(
        &self,
        subject: &FilterSubject,
        category: FormulaCategory,
        binder: &AtomBinder,
        count: usize,
        rng: &mut StdRng,
    ) -> Result<Selection, GenerationError> {
        let max_rounds = *self.config.get_filter().get_max_rounds();
        let set_size = *self.config.get_filter().get_set_size();
        let mut selection = Selection::default();

        if set_size > 0 {
            for _ in 0..max_rounds {
                let shortfall = count - selection.formulas.len();
                if shortfall == 0 {
                    break;
                }
                selection.rounds += 1;

                let batch = self.generate_batch(category, binder, set_size, rng)?;
                let kept = filter(self.oracle, subject, category, &batch, shortfall);

                let mut batch: Vec<Option<Formula>> = batch.into_iter().map(Some).collect();
                for i in kept.into_iter().take(shortfall) {
                    if let Some(formula) = batch[i].take() {
                        selection.formulas.push(formula);
                        selection.accepted_by_filter += 1;
                    }
                }
            }
        }

        let missing = count - selection.formulas.len();
        if missing > 0 {
            tracing::warn!(
                rounds = selection.rounds,
                "{} {} formulas for {} were not filtered",
                missing,
                category,
                subject.model().full_name()
            );
            let fill = self.generate_batch(category, binder, missing, rng)?;
            selection.formulas.extend(fill);
            selection.random_fill = missing;
        }

        Ok(selection)
    }

    /// `size` fresh formulas of `category` with atoms bound by `binder`.
    pub fn generate_batch(
        &self,
        category: FormulaCategory,
        binder: &AtomBinder,
        size: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Formula>, GenerationError> {
        let depth = *self.config.get_generation().get_formula_depth();

        (0..size)
            .map(|_| {
                let formula = self.generator.generate(category.grammar(), rng, depth)?;
                binder.bind(formula, category.atom_kind(), rng)
            })
            .collect()
    }
}

fn write_property_files(properties: &PropertySet, model: &Model) -> anyhow::Result<()> {
    let category = properties.category;
    properties.write_xml(&model.directory.join(category.xml_file_name()))?;
    properties.write_human_readable(&model.directory.join(category.human_readable_file_name()))?;

    tracing::info!(
        formulas = properties.formulas.len(),
        "wrote {} files for {}",
        category,
        model.full_name()
    );

    Ok(())
}
