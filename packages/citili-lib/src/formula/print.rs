use std::{
    fmt::{self, Display, Formatter},
    path::Path,
};

use anyhow::Context;
use itertools::Itertools;

use crate::{
    formula::{
        ALL_PATHS, AND, EXISTS_PATH, FINALLY, Formula, FormulaCategory, GLOBALLY,
        INTEGER_CONSTANT, IS_FIREABLE, LEQ, NEXT, NOT, OR, TOKEN_COUNT, UNTIL,
    },
    net::{Model, NetVariant},
};

const INDENT: &str = "   ";

pub const DESCRIPTION: &str = concat!("Automatically generated by Citili ", env!("CARGO_PKG_VERSION"));

/// The formulas of one category for one model variant, as they are written
/// to the property files.
#[derive(Debug, Clone)]
pub struct PropertySet<'a> {
    pub model_name: &'a str,
    pub variant: NetVariant,
    pub instance: &'a str,
    pub category: FormulaCategory,
    pub formulas: &'a [Formula],
}

impl<'a> PropertySet<'a> {
    pub fn new(model: &'a Model, category: FormulaCategory, formulas: &'a [Formula]) -> Self {
        PropertySet {
            model_name: &model.name,
            variant: model.variant,
            instance: &model.instance,
            category,
            formulas,
        }
    }

    /// `<name>-<COL|PT>-<instance>-<category>-<NN>`
    pub fn property_id(&self, index: usize) -> String {
        format!(
            "{}-{}-{}-{}-{:02}",
            self.model_name,
            self.variant.tag(),
            self.instance,
            self.category.name(),
            index
        )
    }

    pub fn to_xml(&self) -> String {
        XmlPropertySet(self).to_string()
    }

    pub fn to_human_readable(&self) -> String {
        HumanReadablePropertySet(self).to_string()
    }

    pub fn write_xml(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_xml())
            .with_context(|| format!("failed to write property file: {}", path.display()))
    }

    pub fn write_human_readable(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_human_readable())
            .with_context(|| format!("failed to write property file: {}", path.display()))
    }
}

fn element_for(name: &str) -> Option<&'static str> {
    Some(match name {
        ALL_PATHS => "all-paths",
        EXISTS_PATH => "exists-path",
        NOT => "negation",
        AND => "conjunction",
        OR => "disjunction",
        GLOBALLY => "globally",
        FINALLY => "finally",
        NEXT => "next",
        IS_FIREABLE => "is-fireable",
        LEQ => "integer-le",
        TOKEN_COUNT => "tokens-count",
        _ => return None,
    })
}

/// MCC XML encoding of a [`PropertySet`].
struct XmlPropertySet<'s, 'a>(&'s PropertySet<'a>);

impl Display for XmlPropertySet<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "<?xml version=\"1.0\"?>")?;
        writeln!(f, "<property-set xmlns=\"http://mcc.lip6.fr/\">")?;

        for (i, formula) in self.0.formulas.iter().enumerate() {
            writeln!(f, "{}<property>", INDENT)?;
            writeln!(f, "{0}{0}<id>{1}</id>", INDENT, self.0.property_id(i))?;
            writeln!(f, "{0}{0}<description>{1}</description>", INDENT, DESCRIPTION)?;
            writeln!(f, "{0}{0}<formula>", INDENT)?;
            write_xml_formula(f, formula, 3)?;
            writeln!(f, "{0}{0}</formula>", INDENT)?;
            writeln!(f, "{}</property>", INDENT)?;
        }

        writeln!(f, "</property-set>")
    }
}

/// Encoding of a [`PropertySet`] used in the `.txt` files.
struct HumanReadablePropertySet<'s, 'a>(&'s PropertySet<'a>);

impl Display for HumanReadablePropertySet<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, formula) in self.0.formulas.iter().enumerate() {
            writeln!(f, "Property {}", self.0.property_id(i))?;
            writeln!(f, "{}\"{}\"", INDENT, DESCRIPTION)?;
            writeln!(f, "{}is:", INDENT)?;
            writeln!(f, "{0}{0}{1}", INDENT, human_readable(formula))?;
            writeln!(f, "{}end.", INDENT)?;
        }

        Ok(())
    }
}

fn write_xml_formula(f: &mut Formatter<'_>, formula: &Formula, depth: usize) -> fmt::Result {
    let indent = INDENT.repeat(depth);

    match formula.name() {
        UNTIL => {
            writeln!(f, "{}<until>", indent)?;
            for (tag, operand) in ["before", "reach"].into_iter().zip(&formula.operands) {
                writeln!(f, "{}{}<{}>", indent, INDENT, tag)?;
                write_xml_formula(f, operand, depth + 2)?;
                writeln!(f, "{}{}</{}>", indent, INDENT, tag)?;
            }
            writeln!(f, "{}</until>", indent)
        }
        INTEGER_CONSTANT => {
            let value = formula.operands.first().map(Formula::name).unwrap_or("0");
            writeln!(f, "{}<integer-constant>{}</integer-constant>", indent, value)
        }
        name => {
            let Some(element) = element_for(name) else {
                // unresolved placeholder or bare payload
                return writeln!(f, "{}<!-- {} -->", indent, name);
            };

            writeln!(f, "{}<{}>", indent, element)?;
            for operand in &formula.operands {
                match name {
                    IS_FIREABLE => {
                        writeln!(f, "{}{}<transition>{}</transition>", indent, INDENT, operand.name())?
                    }
                    TOKEN_COUNT => writeln!(f, "{}{}<place>{}</place>", indent, INDENT, operand.name())?,
                    _ => write_xml_formula(f, operand, depth + 1)?,
                }
            }
            writeln!(f, "{}</{}>", indent, element)
        }
    }
}

/// The textual form used in the `.txt` property files, e.g.
/// `A (G ((is-fireable("t1")) & (! (tokens-count("p1") <= 3))))`.
pub fn human_readable(formula: &Formula) -> String {
    let op = |i: usize| formula.operands.get(i).map(human_readable).unwrap_or_default();
    let quoted = || {
        formula
            .operands
            .iter()
            .map(|id| format!("\"{}\"", id.name()))
            .join(", ")
    };

    match formula.name() {
        ALL_PATHS | EXISTS_PATH | GLOBALLY | FINALLY | NEXT => {
            format!("{} ({})", formula.name(), op(0))
        }
        NOT => format!("! ({})", op(0)),
        AND => formula
            .operands
            .iter()
            .map(|f| format!("({})", human_readable(f)))
            .join(" & "),
        OR => formula
            .operands
            .iter()
            .map(|f| format!("({})", human_readable(f)))
            .join(" | "),
        UNTIL => format!("({}) U ({})", op(0), op(1)),
        IS_FIREABLE => format!("is-fireable({})", quoted()),
        TOKEN_COUNT => format!("tokens-count({})", quoted()),
        LEQ => format!("{} <= {}", op(0), op(1)),
        INTEGER_CONSTANT => formula
            .operands
            .first()
            .map(|c| c.name().to_string())
            .unwrap_or_default(),
        name => name.to_string(),
    }
}

#[cfg(test)]
fn sample() -> Formula {
    use crate::formula::Operator;

    // E ((is-fireable(t1, t2)) U (not (tokens-count(p1) <= 3)))
    Formula::new(
        Operator::new(EXISTS_PATH, 1, 1, false),
        vec![Formula::new(
            Operator::new(UNTIL, 2, 2, true),
            vec![
                Formula::new(
                    Operator::is_fireable(),
                    vec![
                        Formula::leaf(Operator::literal("t1")),
                        Formula::leaf(Operator::literal("t2")),
                    ],
                ),
                Formula::new(
                    Operator::new(NOT, 1, 1, true),
                    vec![Formula::new(
                        Operator::leq(),
                        vec![
                            Formula::new(
                                Operator::token_count(),
                                vec![Formula::leaf(Operator::literal("p1"))],
                            ),
                            Formula::integer_constant(3),
                        ],
                    )],
                ),
            ],
        )],
    )
}

#[test]
fn test_human_readable() {
    assert_eq!(
        human_readable(&sample()),
        r#"E ((is-fireable("t1", "t2")) U (! (tokens-count("p1") <= 3)))"#
    );
}

#[test]
fn test_xml() {
    let formulas = vec![sample()];
    let set = PropertySet {
        model_name: "Peterson",
        variant: NetVariant::PlaceTransition,
        instance: "2",
        category: FormulaCategory::CTLFireability,
        formulas: &formulas,
    };

    assert_eq!(set.property_id(0), "Peterson-PT-2-CTLFireability-00");

    let xml = set.to_xml();
    let expected_formula = r#"         <exists-path>
            <until>
               <before>
                  <is-fireable>
                     <transition>t1</transition>
                     <transition>t2</transition>
                  </is-fireable>
               </before>
               <reach>
                  <negation>
                     <integer-le>
                        <tokens-count>
                           <place>p1</place>
                        </tokens-count>
                        <integer-constant>3</integer-constant>
                     </integer-le>
                  </negation>
               </reach>
            </until>
         </exists-path>
"#;

    assert!(xml.starts_with("<?xml version=\"1.0\"?>\n<property-set xmlns=\"http://mcc.lip6.fr/\">\n"));
    assert!(xml.contains("      <id>Peterson-PT-2-CTLFireability-00</id>\n"));
    assert!(xml.contains(expected_formula));
    assert!(xml.ends_with("</property-set>\n"));
}

#[test]
fn test_human_readable_file() {
    let formulas = vec![sample(), sample()];
    let set = PropertySet {
        model_name: "Peterson",
        variant: NetVariant::Colored,
        instance: "2",
        category: FormulaCategory::CTLFireability,
        formulas: &formulas,
    };

    let text = set.to_human_readable();
    assert!(text.starts_with("Property Peterson-COL-2-CTLFireability-00\n"));
    assert!(text.contains("Property Peterson-COL-2-CTLFireability-01\n"));
    assert!(text.contains(&format!("   \"{}\"\n   is:\n", DESCRIPTION)));
    assert_eq!(text.matches("   end.\n").count(), 2);
}
