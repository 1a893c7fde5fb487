use std::fmt::Display;

use hashbrown::{HashMap, HashSet};

use crate::net::Model;

/// Why a colored model could not be related to its PT twin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// No colored place was unfolded into any PT place.
    EmptyPlaces,
    /// No colored transition was unfolded into any PT transition.
    EmptyTransitions,
}

impl Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingError::EmptyPlaces => write!(f, "empty set of mapped places"),
            MappingError::EmptyTransitions => write!(f, "empty set of mapped transitions"),
        }
    }
}

impl std::error::Error for MappingError {}

/// Relation from the identifiers of one kind (places or transitions) of a
/// colored net to the identifiers of its unfolding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMapping {
    mapping: HashMap<String, Vec<String>>,
    /// Colored identifiers with a non-empty image, in colored order.
    pub mapped: Vec<String>,
    /// Colored identifiers with an empty image, in colored order.
    pub unmapped: Vec<String>,
    /// Uncolored identifiers not in the image of any colored identifier.
    pub unclaimed: Vec<String>,
}

impl IdentifierMapping {
    /// The uncolored identifiers `colored_id` unfolds into. Empty for unknown
    /// or unmapped identifiers.
    pub fn get(&self, colored_id: &str) -> &[String] {
        self.mapping
            .get(colored_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.mapped.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.mapping.iter()
    }
}

/// The place and transition mappings between a colored model and its PT
/// twin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correspondence {
    pub places: IdentifierMapping,
    pub transitions: IdentifierMapping,
}

/// Whether `uncolored_id` can be the unfolding of `colored_id`: it has to
/// start with `colored_id` and must not be a colored identifier itself,
/// unless both are equal. The second condition separates unfolded instances
/// from distinct colored nodes whose id merely extends another one.
pub fn is_unfolding(uncolored_id: &str, colored_id: &str, colored_ids: &HashSet<&str>) -> bool {
    if !uncolored_id.starts_with(colored_id) {
        return false;
    }

    uncolored_id == colored_id || !colored_ids.contains(uncolored_id)
}

/// Maps every colored identifier to the uncolored identifiers it unfolds
/// into, keeping the uncolored order.
pub fn map_identifiers(colored: &[String], uncolored: &[String]) -> IdentifierMapping {
    let colored_ids: HashSet<&str> = colored.iter().map(String::as_str).collect();
    let mut claimed = vec![false; uncolored.len()];
    let mut result = IdentifierMapping::default();

    for c in colored {
        let image: Vec<String> = uncolored
            .iter()
            .enumerate()
            .filter(|(_, u)| is_unfolding(u, c, &colored_ids))
            .map(|(i, u)| {
                claimed[i] = true;
                u.clone()
            })
            .collect();

        if image.is_empty() {
            result.unmapped.push(c.clone());
        } else {
            result.mapped.push(c.clone());
            result.mapping.insert(c.clone(), image);
        }
    }

    result.unclaimed = uncolored
        .iter()
        .zip(claimed)
        .filter(|(_, claimed)| !claimed)
        .map(|(u, _)| u.clone())
        .collect();

    result
}

fn warn_about(kind: &str, mapping: &IdentifierMapping) {
    for c in &mapping.unmapped {
        tracing::warn!(
            "colored model has a {} not mapped to any PT {}: {}",
            kind,
            kind,
            c
        );
    }
    for u in &mapping.unclaimed {
        tracing::warn!(
            "PT model has a {} not unfolded from any colored {}: {}",
            kind,
            kind,
            u
        );
    }
}

/// Builds the correspondence between `colored` and its PT twin `uncolored`.
/// Places and transitions are mapped independently. Unmapped identifiers
/// only cause warnings; the build fails if nothing at all could be mapped
/// for places or for transitions.
pub fn build_correspondence(
    colored: &Model,
    uncolored: &Model,
) -> Result<Correspondence, MappingError> {
    let places = map_identifiers(&colored.places, &uncolored.places);
    warn_about("place", &places);
    if places.is_empty() {
        tracing::warn!("colored model has an empty set of mapped places");
        return Err(MappingError::EmptyPlaces);
    }

    let transitions = map_identifiers(&colored.transitions, &uncolored.transitions);
    warn_about("transition", &transitions);
    if transitions.is_empty() {
        tracing::warn!("colored model has an empty set of mapped transitions");
        return Err(MappingError::EmptyTransitions);
    }

    tracing::info!(
        mapped_places = places.mapped.len(),
        unmapped_places = places.unmapped.len(),
        mapped_transitions = transitions.mapped.len(),
        unmapped_transitions = transitions.unmapped.len(),
        "correspondence built"
    );

    Ok(Correspondence {
        places,
        transitions,
    })
}

/// Builds the correspondence of a colored model with its twin once and
/// caches the outcome on the colored model. Unmapped identifiers are removed
/// from the identifiers used for generation, for places as soon as the place
/// mapping succeeded.
pub fn ensure_correspondence<'a>(
    colored: &'a mut Model,
    uncolored: &Model,
) -> Result<&'a Correspondence, &'a MappingError> {
    let result = match colored.correspondence.take() {
        Some(cached) => cached,
        None => {
            let result = build_correspondence(colored, uncolored);

            match &result {
                Ok(correspondence) => {
                    colored.places = correspondence.places.mapped.clone();
                    colored.unmapped_places = correspondence.places.unmapped.clone();
                    colored.transitions = correspondence.transitions.mapped.clone();
                    colored.unmapped_transitions = correspondence.transitions.unmapped.clone();
                }
                // places were mapped before transitions failed
                Err(MappingError::EmptyTransitions) => {
                    let places = map_identifiers(&colored.places, &uncolored.places);
                    colored.places = places.mapped;
                    colored.unmapped_places = places.unmapped;
                }
                Err(MappingError::EmptyPlaces) => {}
            }

            result
        }
    };

    colored.correspondence.insert(result).as_ref()
}
