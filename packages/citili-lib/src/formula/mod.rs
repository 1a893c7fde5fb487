use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod atoms;
pub mod generator;
pub mod operators;
pub mod print;

pub const ATOM: &str = "atom";
pub const ALL_PATHS: &str = "A";
pub const EXISTS_PATH: &str = "E";
pub const NOT: &str = "not";
pub const AND: &str = "and";
pub const OR: &str = "or";
pub const GLOBALLY: &str = "G";
pub const FINALLY: &str = "F";
pub const NEXT: &str = "X";
pub const UNTIL: &str = "U";
pub const IS_FIREABLE: &str = "is-fireable";
pub const TOKEN_COUNT: &str = "token-count";
pub const LEQ: &str = "leq";
pub const INTEGER_CONSTANT: &str = "integer-constant";

/// An operator of the formula grammar. Leaves that carry a payload (an
/// identifier or the text of an integer) store it in `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operator {
    pub name: String,
    pub min_arity: usize,
    pub max_arity: usize,
    /// Whether the operands are boolean (state) formulas. Otherwise they are
    /// path formulas.
    pub is_over_booleans: bool,
}

impl Operator {
    pub fn new(name: &str, min_arity: usize, max_arity: usize, is_over_booleans: bool) -> Self {
        Operator {
            name: name.to_string(),
            min_arity,
            max_arity,
            is_over_booleans,
        }
    }

    /// The placeholder leaf that atom substitution replaces.
    pub fn atom() -> Self {
        Operator::new(ATOM, 0, 0, false)
    }

    /// A payload leaf, e.g. a place id or the digits of a constant.
    pub fn literal(name: impl Into<String>) -> Self {
        Operator {
            name: name.into(),
            min_arity: 0,
            max_arity: 0,
            is_over_booleans: false,
        }
    }

    pub fn is_fireable() -> Self {
        Operator::new(IS_FIREABLE, 1, usize::MAX, false)
    }

    pub fn token_count() -> Self {
        Operator::new(TOKEN_COUNT, 1, usize::MAX, false)
    }

    pub fn leq() -> Self {
        Operator::new(LEQ, 2, 2, false)
    }

    pub fn integer_constant() -> Self {
        Operator::new(INTEGER_CONSTANT, 1, 1, false)
    }

    pub fn is_path_operator(&self) -> bool {
        matches!(self.name.as_str(), GLOBALLY | FINALLY | NEXT | UNTIL)
    }

    pub fn is_path_quantifier(&self) -> bool {
        matches!(self.name.as_str(), ALL_PATHS | EXISTS_PATH)
    }

    pub fn accepts_arity(&self, arity: usize) -> bool {
        self.min_arity <= arity && arity <= self.max_arity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Formula {
    pub operator: Operator,
    pub operands: Vec<Formula>,
}

impl Formula {
    pub fn new(operator: Operator, operands: Vec<Formula>) -> Self {
        Formula { operator, operands }
    }

    pub fn leaf(operator: Operator) -> Self {
        Formula {
            operator,
            operands: vec![],
        }
    }

    pub fn atom() -> Self {
        Formula::leaf(Operator::atom())
    }

    pub fn integer_constant(value: i64) -> Self {
        Formula::new(
            Operator::integer_constant(),
            vec![Formula::leaf(Operator::literal(value.to_string()))],
        )
    }

    pub fn is_atom(&self) -> bool {
        self.operator == Operator::atom()
    }

    pub fn name(&self) -> &str {
        &self.operator.name
    }

    /// Returns true if `predicate` holds for this node or any node below it.
    pub fn any(&self, predicate: &impl Fn(&Formula) -> bool) -> bool {
        predicate(self) || self.operands.iter().any(|op| op.any(predicate))
    }

    pub fn contains_path_operator(&self) -> bool {
        self.any(&|f| f.operator.is_path_operator())
    }

    pub fn contains_path_quantifier(&self) -> bool {
        self.any(&|f| f.operator.is_path_quantifier())
    }

    pub fn contains_atom(&self) -> bool {
        self.any(&|f| f.is_atom())
    }

    pub fn depth(&self) -> usize {
        1 + self.operands.iter().map(|op| op.depth()).max().unwrap_or(0)
    }

    /// Checks that every node has an operand count its operator allows.
    /// Payload leaves below `is-fireable`, `token-count` and
    /// `integer-constant` have no operands and are always valid.
    pub fn respects_arities(&self) -> bool {
        self.operator.accepts_arity(self.operands.len())
            && self.operands.iter().all(|op| op.respects_arities())
    }

    /// Collapses every `not(not(X))` into `X`, bottom-up.
    pub fn remove_double_negations(self) -> Formula {
        let Formula {
            operator,
            operands,
        } = self;
        let operands: Vec<Formula> = operands
            .into_iter()
            .map(|op| op.remove_double_negations())
            .collect();

        if operator.name == NOT
            && let [inner] = &operands[..]
            && inner.operator.name == NOT
            && inner.operands.len() == 1
        {
            let mut operands = operands;
            let mut inner = operands.remove(0);
            return inner.operands.remove(0);
        }

        Formula { operator, operands }
    }

    pub fn has_double_negation(&self) -> bool {
        self.any(&|f| {
            f.operator.name == NOT && f.operands.first().is_some_and(|op| op.operator.name == NOT)
        })
    }

    /// Identifiers referenced by `is-fireable` leaves, in order of appearance.
    pub fn transitions(&self) -> Vec<&str> {
        let mut res = vec![];
        self.collect_payloads(IS_FIREABLE, &mut res);
        res
    }

    /// Identifiers referenced by `token-count` leaves, in order of appearance.
    pub fn places(&self) -> Vec<&str> {
        let mut res = vec![];
        self.collect_payloads(TOKEN_COUNT, &mut res);
        res
    }

    fn collect_payloads<'a>(&'a self, operator: &str, res: &mut Vec<&'a str>) {
        if self.operator.name == operator {
            res.extend(self.operands.iter().map(|op| op.name()));
            return;
        }
        for op in &self.operands {
            op.collect_payloads(operator, res);
        }
    }
}

/// The kind of atoms a category binds placeholders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomKind {
    Fireability,
    Cardinality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grammar {
    /// Arbitrary CTL formulas, subject to rejection sampling.
    CTL,
    /// `A G state` or `E F state`.
    Reachability,
}

/// An examination category of the benchmark: one output file pair per
/// category and model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormulaCategory {
    CTLFireability,
    CTLCardinality,
    ReachabilityFireability,
    ReachabilityCardinality,
}

impl FormulaCategory {
    pub const ALL: [FormulaCategory; 4] = [
        FormulaCategory::CTLFireability,
        FormulaCategory::CTLCardinality,
        FormulaCategory::ReachabilityFireability,
        FormulaCategory::ReachabilityCardinality,
    ];

    pub fn grammar(&self) -> Grammar {
        match self {
            FormulaCategory::CTLFireability | FormulaCategory::CTLCardinality => Grammar::CTL,
            FormulaCategory::ReachabilityFireability
            | FormulaCategory::ReachabilityCardinality => Grammar::Reachability,
        }
    }

    pub fn atom_kind(&self) -> AtomKind {
        match self {
            FormulaCategory::CTLFireability | FormulaCategory::ReachabilityFireability => {
                AtomKind::Fireability
            }
            FormulaCategory::CTLCardinality | FormulaCategory::ReachabilityCardinality => {
                AtomKind::Cardinality
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormulaCategory::CTLFireability => "CTLFireability",
            FormulaCategory::CTLCardinality => "CTLCardinality",
            FormulaCategory::ReachabilityFireability => "ReachabilityFireability",
            FormulaCategory::ReachabilityCardinality => "ReachabilityCardinality",
        }
    }

    pub fn xml_file_name(&self) -> String {
        format!("{}.xml", self.name())
    }

    pub fn human_readable_file_name(&self) -> String {
        format!("{}.txt", self.name())
    }
}

impl Display for FormulaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors that make it impossible to produce a formula for a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The model has no place/transition left to build atoms from.
    NoCandidates(AtomKind),
    /// CTL rejection sampling cannot accept anything below this depth.
    DepthTooSmall { depth: usize, min: usize },
}

impl Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::NoCandidates(AtomKind::Fireability) => {
                write!(f, "no transition available for fireability atoms")
            }
            GenerationError::NoCandidates(AtomKind::Cardinality) => {
                write!(f, "no place available for cardinality atoms")
            }
            GenerationError::DepthTooSmall { depth, min } => write!(
                f,
                "formula depth {} is too small, CTL formulas need at least depth {}",
                depth, min
            ),
        }
    }
}

impl std::error::Error for GenerationError {}

#[test]
fn test_remove_double_negations() {
    let not = |f: Formula| Formula::new(Operator::new(NOT, 1, 1, true), vec![f]);

    let f = not(not(not(not(Formula::atom()))));
    assert_eq!(f.clone().remove_double_negations(), Formula::atom());

    let f = not(not(not(Formula::atom())));
    let normalized = f.remove_double_negations();
    assert_eq!(normalized, not(Formula::atom()));
    assert!(!normalized.has_double_negation());
}

#[test]
fn test_payload_collection() {
    let f = Formula::new(
        Operator::new(AND, 2, 2, true),
        vec![
            Formula::new(
                Operator::is_fireable(),
                vec![
                    Formula::leaf(Operator::literal("t1")),
                    Formula::leaf(Operator::literal("t2")),
                ],
            ),
            Formula::new(
                Operator::leq(),
                vec![
                    Formula::new(
                        Operator::token_count(),
                        vec![Formula::leaf(Operator::literal("p1"))],
                    ),
                    Formula::integer_constant(3),
                ],
            ),
        ],
    );

    assert_eq!(f.transitions(), vec!["t1", "t2"]);
    assert_eq!(f.places(), vec!["p1"]);
    assert!(f.respects_arities());
    assert!(!f.contains_atom());
}
