//! The triple serializer: a canonical, line-oriented text encoding of the
//! reachable concept graph and a reader that replays construction through a
//! context, so structurally identical concepts come back as the identical
//! interned instances.
//!
//! The writer computes the transitive closure of all connections reachable
//! from the given top-level concepts over an explicit work queue (concept
//! definitions may be cyclic, so a visited set is used rather than
//! recursion). Every `Subject::Itself` placeholder is resolved to the owning
//! concept's term. Constructed abstractions get deterministic `_:N` blank
//! labels plus one `codedBy` line naming their class, which makes the output
//! canonical: same graph, same text.
//!
//! A root that never appears as a subject (a literal, or a referenced
//! abstraction without a definition) is anchored with one `loaded` line so
//! the reader can hand it back. Connections the format cannot express (a
//! literal subject, a predicate without a reference or identity term) are
//! refused at write time.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::codec::{CODED_BY, CONTEXT_ANCHOR, LOADED};
use crate::construct::{
    Concept, ConceptRef, Connection, ConnectionSet, Context, OtherHasher, Subject,
};
use crate::error::{ConceptError, Result};

#[derive(Parser)]
#[grammar = "triples.pest"]
struct TriplesParser;

// ------------- escaping -------------
fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'<' => out.push_str("\\<"),
            b'>' => out.push_str("\\>"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}

fn escape_text(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(raw: &str, line: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('\\') => out.push(b'\\'),
            Some('"') => out.push(b'"'),
            Some('<') => out.push(b'<'),
            Some('>') => out.push(b'>'),
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('r') => out.push(b'\r'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let byte = u8::from_str_radix(&hex, 16).map_err(|_| ConceptError::Parse {
                    message: format!("bad byte escape \\x{}", hex),
                    line: Some(line),
                })?;
                out.push(byte);
            }
            other => {
                return Err(ConceptError::Parse {
                    message: format!("unknown escape {:?}", other),
                    line: Some(line),
                });
            }
        }
    }
    Ok(out)
}

fn unescape_text(raw: &str, line: usize) -> Result<String> {
    String::from_utf8(unescape(raw, line)?).map_err(|_| ConceptError::Parse {
        message: "string literal is not valid UTF-8".to_string(),
        line: Some(line),
    })
}

// ------------- writing -------------
type Labels = HashMap<ConceptRef, u64, OtherHasher>;

fn term_of(concept: &ConceptRef, labels: &Labels) -> Result<String> {
    match concept.as_ref() {
        Concept::Identity(bytes) => Ok(format!("b\"{}\"", escape_bytes(bytes))),
        Concept::String(s) => Ok(format!("\"{}\"", escape_text(s))),
        Concept::Number(n) => Ok(n.to_string()),
        Concept::Referenced { name } => Ok(format!("<{}>", escape_bytes(name))),
        Concept::Constructed { .. } => labels
            .get(concept)
            .map(|label| format!("_:{}", label))
            .ok_or_else(|| {
                ConceptError::Collision(
                    "constructed concept escaped closure traversal".to_string(),
                )
            }),
    }
}

/// Writes the transitive closure of all connections reachable from
/// `concepts` as canonical triple text.
pub fn write_triples<W: Write>(
    concepts: &std::collections::HashSet<ConceptRef, OtherHasher>,
    sink: &mut W,
    context: &Context,
) -> Result<()> {
    let mut queue: Vec<ConceptRef> = concepts.iter().cloned().collect();
    let mut visited: std::collections::HashSet<ConceptRef, OtherHasher> =
        std::collections::HashSet::default();
    let mut owned: Vec<(ConceptRef, Vec<Connection>)> = Vec::new();
    while let Some(concept) = queue.pop() {
        if !visited.insert(Arc::clone(&concept)) {
            continue;
        }
        let mut connections: Vec<Connection> =
            context.connections_of(&concept)?.into_iter().collect();
        connections.sort();
        for connection in &connections {
            if let Subject::Is(subject) = connection.subject() {
                queue.push(Arc::clone(subject));
            }
            queue.push(connection.predicate());
            queue.push(connection.object());
        }
        owned.push((concept, connections));
    }

    // deterministic blank labels: constructed concepts in their natural order
    let mut constructed: Vec<ConceptRef> = visited
        .iter()
        .filter(|concept| matches!(concept.as_ref(), Concept::Constructed { .. }))
        .cloned()
        .collect();
    constructed.sort();
    let labels: Labels = constructed
        .into_iter()
        .enumerate()
        .map(|(label, concept)| (concept, label as u64))
        .collect();

    let mut lines: Vec<String> = Vec::new();
    let mut subjects: std::collections::HashSet<String> = std::collections::HashSet::new();
    for (owner, connections) in &owned {
        let owner_term = term_of(owner, &labels)?;
        if let Concept::Constructed { class, .. } = owner.as_ref() {
            lines.push(format!(
                "{} <{}> b\"{}\" .",
                owner_term,
                escape_bytes(CODED_BY),
                escape_bytes(class)
            ));
            subjects.insert(owner_term.clone());
        }
        for connection in connections {
            let subject_term = match connection.subject() {
                Subject::Itself => owner_term.clone(),
                Subject::Is(subject) => match subject.as_ref() {
                    Concept::Referenced { .. } | Concept::Constructed { .. } => {
                        term_of(subject, &labels)?
                    }
                    _ => {
                        return Err(ConceptError::Unrepresentable(format!(
                            "literal {} cannot be the subject of a triple",
                            subject
                        )));
                    }
                },
            };
            let predicate = connection.predicate();
            let predicate_term = match predicate.as_ref() {
                Concept::Referenced { .. } | Concept::Identity(_) => term_of(&predicate, &labels)?,
                _ => {
                    return Err(ConceptError::Unrepresentable(format!(
                        "{} cannot be the predicate of a triple",
                        predicate
                    )));
                }
            };
            lines.push(format!(
                "{} {} {} .",
                subject_term,
                predicate_term,
                term_of(&connection.object(), &labels)?
            ));
            subjects.insert(subject_term);
        }
    }
    // a root that never became a subject would vanish on import
    for concept in concepts {
        let term = term_of(concept, &labels)?;
        if !subjects.contains(&term) {
            lines.push(format!(
                "<{}> <{}> {} .",
                escape_bytes(CONTEXT_ANCHOR),
                escape_bytes(LOADED),
                term
            ));
        }
    }
    lines.sort();
    lines.dedup();
    for line in lines {
        writeln!(sink, "{}", line)?;
    }
    Ok(())
}

// ------------- reading -------------
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
enum Term {
    Reference(Vec<u8>),
    Bytes(Vec<u8>),
    Text(String),
    Number(i64),
    Blank(u64),
}

impl Term {
    fn render(&self) -> String {
        match self {
            Term::Reference(name) => format!("<{}>", escape_bytes(name)),
            Term::Bytes(bytes) => format!("b\"{}\"", escape_bytes(bytes)),
            Term::Text(s) => format!("\"{}\"", escape_text(s)),
            Term::Number(n) => n.to_string(),
            Term::Blank(label) => format!("_:{}", label),
        }
    }
}

fn term_from_pair(pair: Pair<Rule>) -> Result<Term> {
    let line = pair.as_span().start_pos().line_col().0;
    let inner = match pair.as_rule() {
        Rule::subject | Rule::predicate | Rule::object => match pair.into_inner().next() {
            Some(inner) => inner,
            None => {
                return Err(ConceptError::Parse {
                    message: "empty term".to_string(),
                    line: Some(line),
                });
            }
        },
        _ => pair,
    };
    let raw = inner.as_str();
    Ok(match inner.as_rule() {
        Rule::reference => Term::Reference(unescape(&raw[1..raw.len() - 1], line)?),
        Rule::bytes => Term::Bytes(unescape(&raw[2..raw.len() - 1], line)?),
        Rule::string => Term::Text(unescape_text(&raw[1..raw.len() - 1], line)?),
        Rule::number => Term::Number(raw.parse().map_err(|_| ConceptError::Parse {
            message: format!("number literal out of range: {}", raw),
            line: Some(line),
        })?),
        Rule::blank => Term::Blank(raw[2..].parse().map_err(|_| ConceptError::Parse {
            message: format!("bad blank label: {}", raw),
            line: Some(line),
        })?),
        rule => {
            return Err(ConceptError::Parse {
                message: format!("unexpected term {:?}", rule),
                line: Some(line),
            });
        }
    })
}

fn resolve_term(
    term: &Term,
    resolved: &HashMap<u64, ConceptRef, OtherHasher>,
    context: &Context,
) -> Result<Option<ConceptRef>> {
    Ok(Some(match term {
        Term::Reference(name) => context.referenced(name.clone(), vec![])?,
        Term::Bytes(bytes) => context.identity(bytes.clone())?,
        Term::Text(s) => context.string(s.clone())?,
        Term::Number(n) => context.number(*n)?,
        Term::Blank(label) => match resolved.get(label) {
            Some(concept) => Arc::clone(concept),
            None => return Ok(None),
        },
    }))
}

/// Parses triple text and replays concept construction through `context`.
/// Returns every subject keyed by its term text.
pub fn read_triples<R: Read>(
    source: &mut R,
    context: &Context,
) -> Result<HashMap<String, ConceptRef, OtherHasher>> {
    let mut text = String::new();
    source.read_to_string(&mut text)?;
    read_triples_str(&text, context)
}

pub fn read_triples_str(
    text: &str,
    context: &Context,
) -> Result<HashMap<String, ConceptRef, OtherHasher>> {
    let mut document =
        TriplesParser::parse(Rule::document, text).map_err(|e| ConceptError::Parse {
            line: Some(match e.line_col {
                pest::error::LineColLocation::Pos((line, _)) => line,
                pest::error::LineColLocation::Span((line, _), _) => line,
            }),
            message: e.to_string(),
        })?;

    let mut groups: HashMap<Term, Vec<(usize, Term, Term)>, OtherHasher> = HashMap::default();
    if let Some(root) = document.next() {
        for triple in root.into_inner() {
            if triple.as_rule() != Rule::triple {
                continue; // EOI
            }
            let line = triple.as_span().start_pos().line_col().0;
            let mut parts = triple.into_inner();
            let (Some(subject), Some(predicate), Some(object)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(ConceptError::Parse {
                    message: "incomplete triple".to_string(),
                    line: Some(line),
                });
            };
            groups
                .entry(term_from_pair(subject)?)
                .or_default()
                .push((line, term_from_pair(predicate)?, term_from_pair(object)?));
        }
    }

    // blank subjects are constructed abstractions; resolve them in dependency
    // order (a blank may appear as the object of another blank's connection)
    let blank_groups: Vec<(u64, &Vec<(usize, Term, Term)>)> = groups
        .iter()
        .filter_map(|(term, group)| match term {
            Term::Blank(label) => Some((*label, group)),
            _ => None,
        })
        .collect();
    let mut resolved: HashMap<u64, ConceptRef, OtherHasher> = HashMap::default();
    loop {
        let mut progressed = false;
        'groups: for (label, group) in &blank_groups {
            if resolved.contains_key(label) {
                continue;
            }
            let mut connections: Vec<Connection> = Vec::new();
            let mut class: Option<Vec<u8>> = None;
            for (line, predicate_term, object_term) in group.iter() {
                if let Term::Reference(name) = predicate_term {
                    if name.as_slice() == CODED_BY {
                        let Term::Bytes(class_name) = object_term else {
                            return Err(ConceptError::Parse {
                                message: "codedBy object must be a byte literal".to_string(),
                                line: Some(*line),
                            });
                        };
                        if let Some(previous) = &class {
                            if previous != class_name {
                                return Err(ConceptError::Parse {
                                    message: format!(
                                        "blank subject _:{} has conflicting codedBy classes",
                                        label
                                    ),
                                    line: Some(*line),
                                });
                            }
                        }
                        class = Some(class_name.clone());
                        continue;
                    }
                }
                let Some(predicate) = resolve_term(predicate_term, &resolved, context)? else {
                    continue 'groups;
                };
                let Some(object) = resolve_term(object_term, &resolved, context)? else {
                    continue 'groups;
                };
                connections.push(Connection::about_itself(predicate, object));
            }
            let Some(class) = class else {
                return Err(ConceptError::Parse {
                    message: format!("blank subject _:{} has no codedBy class", label),
                    line: None,
                });
            };
            let concept = match context.codec(&class)? {
                Some(codec) => {
                    let set: ConnectionSet = connections.iter().cloned().collect();
                    let content = codec.decode(&set, context)?;
                    context.construct(&class, content)?
                }
                // a class this context cannot interpret is stored verbatim
                None => context.construct_opaque(&class, connections)?,
            };
            resolved.insert(*label, concept);
            progressed = true;
        }
        if !progressed {
            break;
        }
    }
    if resolved.len() < blank_groups.len() {
        let mut unresolved: Vec<u64> = blank_groups
            .iter()
            .map(|(label, _)| *label)
            .filter(|label| !resolved.contains_key(label))
            .collect();
        unresolved.sort();
        return Err(ConceptError::Parse {
            message: format!("unresolvable blank subjects: {:?}", unresolved),
            line: None,
        });
    }

    // defining connections of referenced abstractions, asserted once all
    // blanks they may point at exist; loaded anchors are not definitions
    let mut anchored: Vec<(usize, &Term)> = Vec::new();
    for (term, group) in &groups {
        let Term::Reference(name) = term else { continue };
        let mut definition: Vec<Connection> = Vec::new();
        for (line, predicate_term, object_term) in group {
            if let Term::Reference(predicate_name) = predicate_term {
                if predicate_name.as_slice() == LOADED {
                    anchored.push((*line, object_term));
                    continue;
                }
            }
            let predicate = resolve_term(predicate_term, &resolved, context)?.ok_or_else(|| {
                ConceptError::Parse {
                    message: "unresolved blank in definition".to_string(),
                    line: Some(*line),
                }
            })?;
            let object = resolve_term(object_term, &resolved, context)?.ok_or_else(|| {
                ConceptError::Parse {
                    message: "unresolved blank in definition".to_string(),
                    line: Some(*line),
                }
            })?;
            definition.push(Connection::about_itself(predicate, object));
        }
        definition.sort();
        definition.dedup();
        context.referenced(name.clone(), definition)?;
    }

    let mut result: HashMap<String, ConceptRef, OtherHasher> = HashMap::default();
    for term in groups.keys() {
        let concept = match term {
            Term::Reference(name) => context.referenced(name.clone(), vec![])?,
            Term::Blank(label) => match resolved.get(label) {
                Some(concept) => Arc::clone(concept),
                None => continue,
            },
            _ => continue,
        };
        result.insert(term.render(), concept);
    }
    // anchored concepts reappear under their own term
    for (line, term) in anchored {
        let concept =
            resolve_term(term, &resolved, context)?.ok_or_else(|| ConceptError::Parse {
                message: "unresolved blank in loaded anchor".to_string(),
                line: Some(line),
            })?;
        result.insert(term.render(), concept);
    }
    Ok(result)
}
