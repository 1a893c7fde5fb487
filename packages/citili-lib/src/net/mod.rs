use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::net::correspondence::{Correspondence, MappingError};

pub mod correspondence;
pub mod discovery;
pub mod pnml;
pub mod unfold;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetVariant {
    Colored,
    PlaceTransition,
}

impl NetVariant {
    pub fn tag(&self) -> &'static str {
        match self {
            NetVariant::Colored => "COL",
            NetVariant::PlaceTransition => "PT",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "COL" => Some(NetVariant::Colored),
            "PT" => Some(NetVariant::PlaceTransition),
            _ => None,
        }
    }
}

impl Display for NetVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Identifiers and marking information read from a model file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedNet {
    pub places: Vec<String>,
    pub transitions: Vec<String>,
    /// Largest integer constant of the initial marking, if the marking is
    /// made of plain integers.
    pub max_marking_constant: Option<i64>,
}

/// Reads the identifiers of a model file.
pub trait NetParser {
    fn parse(&self, path: &Path) -> anyhow::Result<ParsedNet>;
}

#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub instance: String,
    pub variant: NetVariant,
    pub directory: PathBuf,
    pub file_path: PathBuf,
    /// Index of the other variant of the same (name, instance) in the arena
    /// the model was discovered in.
    pub twin: Option<ModelId>,
    /// Places used to build atoms.
    pub places: Vec<String>,
    /// Transitions used to build atoms.
    pub transitions: Vec<String>,
    /// Colored places without any unfolded counterpart.
    pub unmapped_places: Vec<String>,
    /// Colored transitions without any unfolded counterpart.
    pub unmapped_transitions: Vec<String>,
    /// Only set on colored models, computed at most once.
    pub correspondence: Option<Result<Correspondence, MappingError>>,
    /// Only set on PT models.
    pub max_marking_constant: Option<i64>,
    loaded: bool,
}

impl Model {
    pub fn new(name: &str, instance: &str, variant: NetVariant, directory: PathBuf) -> Self {
        let file_path = directory.join("model.pnml");

        Model {
            name: name.to_string(),
            instance: instance.to_string(),
            variant,
            directory,
            file_path,
            twin: None,
            places: vec![],
            transitions: vec![],
            unmapped_places: vec![],
            unmapped_transitions: vec![],
            correspondence: None,
            max_marking_constant: None,
            loaded: false,
        }
    }

    /// A model whose identifiers are already known.
    pub fn with_identifiers(mut self, places: Vec<String>, transitions: Vec<String>) -> Self {
        self.places = places;
        self.transitions = transitions;
        self.loaded = true;
        self
    }

    /// `<name>-<COL|PT>-<instance>`, the name of the model directory.
    pub fn full_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.variant.tag(), self.instance)
    }

    pub fn is_colored(&self) -> bool {
        self.variant == NetVariant::Colored
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Reads places and transitions from the model file, unless this already
    /// happened.
    pub fn load(&mut self, parser: &impl NetParser) -> anyhow::Result<()> {
        if self.loaded {
            return Ok(());
        }

        let net = parser
            .parse(&self.file_path)
            .with_context(|| format!("failed to parse model file: {}", self.file_path.display()))?;

        tracing::info!(
            places = net.places.len(),
            transitions = net.transitions.len(),
            model = %self.full_name(),
            "model file parsed"
        );

        self.places = net.places;
        self.transitions = net.transitions;
        if self.variant == NetVariant::PlaceTransition {
            self.max_marking_constant = net.max_marking_constant;
        }
        self.loaded = true;

        Ok(())
    }

    /// The correspondence to the PT twin, if it was built successfully.
    pub fn usable_correspondence(&self) -> Option<&Correspondence> {
        match &self.correspondence {
            Some(Ok(correspondence)) => Some(correspondence),
            _ => None,
        }
    }

    /// Drops the identifier lists and the correspondence.
    pub fn release(&mut self) {
        self.places = vec![];
        self.transitions = vec![];
        self.unmapped_places = vec![];
        self.unmapped_transitions = vec![];
        self.correspondence = None;
        self.loaded = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(usize);

impl ModelId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owns all discovered models. Twins refer to each other by [`ModelId`].
#[derive(Debug, Default)]
pub struct ModelArena {
    models: Vec<Model>,
}

impl ModelArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, model: Model) -> ModelId {
        self.models.push(model);
        ModelId(self.models.len() - 1)
    }

    pub fn get(&self, id: ModelId) -> &Model {
        &self.models[id.0]
    }

    pub fn get_mut(&mut self, id: ModelId) -> &mut Model {
        &mut self.models[id.0]
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &Model)> {
        self.models.iter().enumerate().map(|(i, m)| (ModelId(i), m))
    }

    pub fn twin_of(&self, id: ModelId) -> Option<ModelId> {
        self.get(id).twin
    }

    /// Links a colored model and a PT model of the same (name, instance).
    pub fn link_twins(&mut self, a: ModelId, b: ModelId) -> anyhow::Result<()> {
        let (ma, mb) = (self.get(a), self.get(b));

        if a == b || ma.variant == mb.variant {
            anyhow::bail!(
                "cannot link {} and {}: twins need different variants",
                ma.full_name(),
                mb.full_name()
            );
        }
        if ma.name != mb.name || ma.instance != mb.instance {
            anyhow::bail!(
                "cannot link {} and {}: twins need the same name and instance",
                ma.full_name(),
                mb.full_name()
            );
        }
        if ma.twin.is_some() || mb.twin.is_some() {
            anyhow::bail!(
                "cannot link {} and {}: one of them already has a twin",
                ma.full_name(),
                mb.full_name()
            );
        }

        self.get_mut(a).twin = Some(b);
        self.get_mut(b).twin = Some(a);

        Ok(())
    }

    /// Splits the arena into independent jobs. Every colored model becomes a
    /// job together with its PT twin, every PT model without a colored twin
    /// becomes a job of its own.
    pub fn into_jobs(self) -> Vec<ModelJob> {
        let mut slots: Vec<Option<Model>> = self.models.into_iter().map(Some).collect();
        let mut jobs = vec![];

        for i in 0..slots.len() {
            let Some(model) = &slots[i] else {
                continue;
            };

            let twin_index = model.twin.map(ModelId::index);
            let is_pt_with_twin =
                model.variant == NetVariant::PlaceTransition && twin_index.is_some();
            if is_pt_with_twin {
                // handled together with its colored twin
                continue;
            }

            let Some(model) = slots[i].take() else {
                continue;
            };
            let twin = twin_index.and_then(|t| slots[t].take());
            jobs.push(ModelJob { model, twin });
        }

        jobs
    }
}

/// A model together with its twin, owned by exactly one worker.
#[derive(Debug, Clone)]
pub struct ModelJob {
    pub model: Model,
    pub twin: Option<Model>,
}

impl ModelJob {
    pub fn new(model: Model, twin: Option<Model>) -> Self {
        ModelJob { model, twin }
    }
}
