/// In this file, we extract the few things generation needs from PNML model
/// files: the ids of places and transitions in document order, and the
/// largest integer of the initial marking of a PT net.
///
/// This is not an XML parser. We only scan for start tags, e.g.
/// ```text
/// <place id="p1">
///   <initialMarking><text>3</text></initialMarking>
/// </place>
/// <transition id="t1"/>
/// ```
/// and ignore everything else (comments, declarations, arcs, colored
/// markings, ...).
use std::path::Path;

use anyhow::Context;
use nom::{
    Parser,
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{char, multispace0, multispace1},
    error::ParseError,
    multi::many0,
    sequence::delimited,
};

use crate::net::{NetParser, ParsedNet};

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}

fn name<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, &'a str, E> {
    take_while1(is_name_char)(input)
}

fn quoted_value<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, &'a str, E> {
    alt((
        delimited(char('"'), take_till(|c| c == '"'), char('"')),
        delimited(char('\''), take_till(|c| c == '\''), char('\'')),
    ))
    .parse(input)
}

// E.g., ` id="p1"`
fn attribute<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, (&'a str, &'a str), E> {
    let (input, _) = multispace1(input)?;
    let (input, key) = name(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = tag("=")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, value) = quoted_value(input)?;

    Ok((input, (key, value)))
}

#[test]
fn test_attribute_1() {
    let (rest, (key, value)) = attribute::<nom::error::Error<&str>>(r#" id="p-1.a">"#).unwrap();
    assert_eq!(key, "id");
    assert_eq!(value, "p-1.a");
    assert_eq!(rest, ">");
}

#[test]
fn test_attribute_2() {
    let (_, (key, value)) = attribute::<nom::error::Error<&str>>(" xmlns = 'x'").unwrap();
    assert_eq!(key, "xmlns");
    assert_eq!(value, "x");
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StartTag<'a> {
    name: &'a str,
    attributes: Vec<(&'a str, &'a str)>,
    self_closing: bool,
}

impl<'a> StartTag<'a> {
    fn attribute(&self, key: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

fn start_tag<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, StartTag<'a>, E> {
    let (input, _) = tag("<")(input)?;
    let (input, name) = name(input)?;
    let (input, attributes) = many0(attribute).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, closing) = nom::combinator::opt(tag("/")).parse(input)?;
    let (input, _) = tag(">")(input)?;

    Ok((
        input,
        StartTag {
            name,
            attributes,
            self_closing: closing.is_some(),
        },
    ))
}

#[test]
fn test_start_tag_1() {
    let (_, t) = start_tag::<nom::error::Error<&str>>(r#"<place id="P1" >"#).unwrap();
    assert_eq!(t.name, "place");
    assert_eq!(t.attribute("id"), Some("P1"));
    assert!(!t.self_closing);
}

#[test]
fn test_start_tag_2() {
    let (_, t) = start_tag::<nom::error::Error<&str>>(r#"<transition id="t1"/>"#).unwrap();
    assert_eq!(t.name, "transition");
    assert!(t.self_closing);
}

#[test]
fn test_start_tag_end_tag() {
    assert!(start_tag::<nom::error::Error<&str>>("</place>").is_err());
    assert!(start_tag::<nom::error::Error<&str>>("<?xml version=\"1.0\"?>").is_err());
}

// `<!-- ... -->`, an unterminated comment runs to the end of the input
fn comment<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, &'a str, E> {
    let (input, _) = tag("<!--")(input)?;
    match input.find("-->") {
        Some(end) => Ok((&input[end + 3..], &input[..end])),
        None => Ok(("", input)),
    }
}

#[test]
fn test_comment() {
    let (rest, body) = comment::<nom::error::Error<&str>>("<!-- <place id=\"x\"/> --><net>").unwrap();
    assert_eq!(body, " <place id=\"x\"/> ");
    assert_eq!(rest, "<net>");
    assert!(comment::<nom::error::Error<&str>>("<net>").is_err());
}

/// Scans a PNML document. Fails if the document does not contain a `net`
/// element.
pub fn parse_pnml(content: &str) -> anyhow::Result<ParsedNet> {
    let mut net = ParsedNet::default();
    let mut seen_net = false;
    let mut in_initial_marking = false;
    let mut rest = content;

    while let Some(pos) = rest.find('<') {
        rest = &rest[pos..];

        if let Ok((after, _)) = comment::<nom::error::Error<&str>>(rest) {
            rest = after;
            continue;
        }

        let Ok((after, element)) = start_tag::<nom::error::Error<&str>>(rest) else {
            if rest.starts_with("</initialMarking") {
                in_initial_marking = false;
            }
            rest = &rest[1..];
            continue;
        };
        rest = after;

        match element.name {
            "net" => seen_net = true,
            "place" | "transition" => {
                in_initial_marking = false;
                let Some(id) = element.attribute("id") else {
                    anyhow::bail!("{} element without id", element.name);
                };
                if element.name == "place" {
                    net.places.push(id.to_string());
                } else {
                    net.transitions.push(id.to_string());
                }
            }
            "initialMarking" => in_initial_marking = !element.self_closing,
            "text" if in_initial_marking => {
                in_initial_marking = false;
                let end = rest.find('<').unwrap_or(rest.len());
                // colored markings such as `1'x` are not integers and ignored
                if let Ok(value) = rest[..end].trim().parse::<i64>() {
                    net.max_marking_constant = Some(net.max_marking_constant.map_or(value, |m| m.max(value)));
                }
            }
            _ => {}
        }
    }

    if !seen_net {
        anyhow::bail!("not a PNML document: no net element found");
    }

    Ok(net)
}

/// [`NetParser`] for `model.pnml` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PnmlParser;

impl NetParser for PnmlParser {
    fn parse(&self, path: &Path) -> anyhow::Result<ParsedNet> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read: {}", path.display()))?;
        parse_pnml(&content).with_context(|| format!("failed to scan: {}", path.display()))
    }
}

#[test]
fn test_parse_pnml_1() {
    let pnml = r#"<?xml version="1.0" encoding="utf-8"?>
<pnml xmlns="http://www.pnml.org/version-2009/grammar/pnml">
  <net id="Example-PT-1" type="http://www.pnml.org/version-2009/grammar/ptnet">
    <page id="page0">
      <!-- <place id="commented"/> -->
      <place id="P1">
        <name><text>P1</text></name>
        <initialMarking><text>3</text></initialMarking>
      </place>
      <place id="P2">
        <initialMarking>
          <text> 12 </text>
        </initialMarking>
      </place>
      <place id="P3"/>
      <transition id="T1"><name><text>T1</text></name></transition>
      <transition id='T2'/>
      <arc id="a1" source="P1" target="T1"><inscription><text>2</text></inscription></arc>
    </page>
  </net>
</pnml>"#;

    let net = parse_pnml(pnml).unwrap();
    assert_eq!(net.places, vec!["P1", "P2", "P3"]);
    assert_eq!(net.transitions, vec!["T1", "T2"]);
    assert_eq!(net.max_marking_constant, Some(12));
}

#[test]
fn test_parse_pnml_colored_marking() {
    let pnml = r#"<pnml><net id="n">
      <place id="P"><hlinitialMarking><text>1'x</text></hlinitialMarking></place>
      <transition id="T"/>
    </net></pnml>"#;

    let net = parse_pnml(pnml).unwrap();
    assert_eq!(net.places, vec!["P"]);
    assert_eq!(net.max_marking_constant, None);
}

#[test]
fn test_parse_pnml_marking_without_text() {
    let pnml = r#"<pnml><net id="n">
      <place id="P1"><initialMarking></initialMarking><name><text>40</text></name></place>
      <place id="P2"><initialMarking/></place>
      <place id="P3"><initialMarking><structure/></initialMarking></place>
      <transition id="T"><name><text>70</text></name></transition>
      <place id="P4"><initialMarking><text>2</text></initialMarking></place>
    </net></pnml>"#;

    let net = parse_pnml(pnml).unwrap();
    assert_eq!(net.places, vec!["P1", "P2", "P3", "P4"]);
    assert_eq!(net.max_marking_constant, Some(2));
}

#[test]
fn test_parse_pnml_not_a_net() {
    assert!(parse_pnml("<html><body/></html>").is_err());
}
