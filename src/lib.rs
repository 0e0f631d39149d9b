//! Conceptlogic – a content-addressed semantic concept graph.
//!
//! The engine centers on the *concept*: an immutable, identity-bearing value
//! that is one of:
//! * [`construct::Concept::Identity`] – an opaque fixed byte identity.
//! * [`construct::Concept::String`] / [`construct::Concept::Number`] – literals.
//! * [`construct::Concept::Referenced`] – a vocabulary term identified by a
//!   byte name, optionally carrying a defining set of connections asserted
//!   once at first construction.
//! * [`construct::Concept::Constructed`] – structured content coded by a
//!   concept class into a set of (subject, predicate, object) connections.
//!
//! Concepts are owned and deduplicated by a "keeper" inside the
//! [`construct::Context`], enabling canonical sharing through `Arc`: two
//! constructions with equal defining data return the *same* instance. The
//! context is append-only and process-scoped.
//!
//! ## Modules
//! * [`construct`] – Concepts, connections, the keeper and the [`construct::Context`].
//! * [`codec`] – The [`codec::ConceptCodec`] trait, the distinct connection
//!   helpers, and the core classes: reified assertions, authorities and
//!   source based claims.
//! * [`serialize`] – Canonical triple text writer and a reader that replays
//!   construction through a context, preserving content-addressing across
//!   round trips.
//! * [`mlm`] – Model statistics ingestion: YAML records, arxiv citations and
//!   the domain vocabulary.
//! * [`error`] – The [`error::ConceptError`] taxonomy.
//!
//! ## Quick Start
//! ```
//! use conceptlogic::construct::Context;
//! use conceptlogic::serialize::{read_triples_str, write_triples};
//!
//! let context = Context::new().unwrap();
//! let authority = context.authority(b"docs.authority".as_slice()).unwrap();
//! let subject = context.referenced(b"docs.subject".as_slice(), vec![]).unwrap();
//! let predicate = context.referenced(b"docs.hasName".as_slice(), vec![]).unwrap();
//! let name = context.string("a name").unwrap();
//! let assertion = context.assertion(subject, predicate, name).unwrap();
//! let paper = context.referenced(b"docs.source".as_slice(), vec![]).unwrap();
//! let claim = context.source_based_claim(assertion, authority, paper).unwrap();
//! context.register(&claim).unwrap();
//!
//! let mut text = Vec::new();
//! write_triples(&context.loaded_concepts().unwrap(), &mut text, &context).unwrap();
//! let text = String::from_utf8(text).unwrap();
//! let reread = read_triples_str(&text, &context).unwrap();
//! assert!(reread.values().any(|concept| *concept == claim));
//! ```

pub mod codec;
pub mod construct;
pub mod error;
pub mod mlm;
pub mod serialize;
