//! The coded concept protocol: per-class codecs between structured content
//! and connection sets, the distinct connection helpers, and the core
//! concept classes (assertion, authority, source based claim).

use std::sync::Arc;

use crate::construct::{
    has_concept_class, printable, Concept, ConceptContent, ConceptRef, Connection, ConnectionSet,
    Context,
};
use crate::error::{ConceptError, Result};

// core vocabulary, partitioned from every domain by the namespace prefix
pub const CORE_PREFIX: &[u8] = b"conceptLogic.";

pub const ASSERTION: &[u8] = b"conceptLogic.assertion";
pub const AUTHORITY: &[u8] = b"conceptLogic.authority";
pub const SOURCE_BASED_CLAIM: &[u8] = b"conceptLogic.sourceBasedClaim";

pub const IS_INSTANCE_OF: &[u8] = b"conceptLogic.isInstanceOf";
pub const CODED_BY: &[u8] = b"conceptLogic.codedBy";
// anchors roots that contribute no connections of their own
pub const LOADED: &[u8] = b"conceptLogic.loaded";
pub(crate) const CONTEXT_ANCHOR: &[u8] = b"conceptLogic.context";

const TRIPLE_SUBJECT: &[u8] = b"conceptLogic.tripleSubject";
const TRIPLE_PREDICATE: &[u8] = b"conceptLogic.triplePredicate";
const TRIPLE_OBJECT: &[u8] = b"conceptLogic.tripleObject";
const HAS_AUTHORITY_ID: &[u8] = b"conceptLogic.hasAuthorityId";
const CLAIMS: &[u8] = b"conceptLogic.claims";
const AUTHORITY_OF: &[u8] = b"conceptLogic.authorityOf";
const SOURCE_OF: &[u8] = b"conceptLogic.sourceOf";

/// A named, namespace-prefixed definition of how a structured content value
/// maps to and from a connection set.
///
/// The inverse law holds for every codec: `decode(encode(v)) == v` for all
/// valid `v`. Decoding fails with a connections-not-valid error when required
/// connections are missing, duplicated where uniqueness is required, or point
/// to a concept of the wrong class.
pub trait ConceptCodec: Send + Sync {
    fn name(&self) -> &'static [u8];
    fn content_valid(&self, content: &ConceptContent, context: &Context) -> bool;
    fn encode(&self, content: &ConceptContent, context: &Context) -> Result<ConnectionSet>;
    fn decode(&self, connections: &ConnectionSet, context: &Context) -> Result<ConceptContent>;
}

/// The single connection a codec emits for a functional relation:
/// (itself, predicate, object).
pub fn write_distinct_connection(object: ConceptRef, predicate: ConceptRef) -> Connection {
    Connection::about_itself(predicate, object)
}

/// Reads the object of a relation expected to hold exactly once among
/// `connections`. Zero or multiple matches are a distinct connection
/// violation.
pub fn read_distinct_connection(
    predicate: &ConceptRef,
    connections: &ConnectionSet,
) -> Result<ConceptRef> {
    let mut matches = connections
        .iter()
        .filter(|connection| connection.predicate() == *predicate);
    match (matches.next(), matches.next()) {
        (Some(only), None) => Ok(only.object()),
        (None, _) => Err(ConceptError::DistinctConnection {
            predicate: predicate.to_string(),
            found: 0,
        }),
        (Some(_), Some(_)) => Err(ConceptError::DistinctConnection {
            predicate: predicate.to_string(),
            found: 2 + matches.count(),
        }),
    }
}

fn wrong_shape(class: &[u8], content: &ConceptContent) -> ConceptError {
    ConceptError::ContentInvalid {
        class: printable(class),
        message: format!("content shape not encodable: {}", content),
    }
}

fn wrong_class(class: &[u8], message: &str) -> ConceptError {
    ConceptError::ConnectionsNotValid {
        class: printable(class),
        message: message.to_string(),
    }
}

// ------------- Assertion -------------
/// Reifies a concrete triple: the constructed abstraction stands for
/// "(subject, predicate, object) holds" and can itself be the subject or
/// object of other connections. This is the only way a triple becomes
/// embeddable in the graph.
pub struct AssertionCodec;

impl ConceptCodec for AssertionCodec {
    fn name(&self) -> &'static [u8] {
        ASSERTION
    }
    fn content_valid(&self, content: &ConceptContent, _context: &Context) -> bool {
        matches!(content, ConceptContent::Triple(_))
    }
    fn encode(&self, content: &ConceptContent, context: &Context) -> Result<ConnectionSet> {
        let ConceptContent::Triple([subject, predicate, object]) = content else {
            return Err(wrong_shape(ASSERTION, content));
        };
        let mut connections = ConnectionSet::default();
        connections.insert(write_distinct_connection(
            Arc::clone(subject),
            context.referenced(TRIPLE_SUBJECT, vec![])?,
        ));
        connections.insert(write_distinct_connection(
            Arc::clone(predicate),
            context.referenced(TRIPLE_PREDICATE, vec![])?,
        ));
        connections.insert(write_distinct_connection(
            Arc::clone(object),
            context.referenced(TRIPLE_OBJECT, vec![])?,
        ));
        Ok(connections)
    }
    fn decode(&self, connections: &ConnectionSet, context: &Context) -> Result<ConceptContent> {
        let subject =
            read_distinct_connection(&context.referenced(TRIPLE_SUBJECT, vec![])?, connections)?;
        let predicate =
            read_distinct_connection(&context.referenced(TRIPLE_PREDICATE, vec![])?, connections)?;
        let object =
            read_distinct_connection(&context.referenced(TRIPLE_OBJECT, vec![])?, connections)?;
        Ok(ConceptContent::Triple([subject, predicate, object]))
    }
}

// ------------- Authority -------------
/// An authority that can stand behind a claim. Its content is the opaque
/// byte identity of the authority.
pub struct AuthorityCodec;

impl ConceptCodec for AuthorityCodec {
    fn name(&self) -> &'static [u8] {
        AUTHORITY
    }
    fn content_valid(&self, content: &ConceptContent, _context: &Context) -> bool {
        matches!(content, ConceptContent::Bytes(_))
    }
    fn encode(&self, content: &ConceptContent, context: &Context) -> Result<ConnectionSet> {
        let ConceptContent::Bytes(id) = content else {
            return Err(wrong_shape(AUTHORITY, content));
        };
        let mut connections = ConnectionSet::default();
        connections.insert(write_distinct_connection(
            context.identity(id.clone())?,
            context.referenced(HAS_AUTHORITY_ID, vec![])?,
        ));
        Ok(connections)
    }
    fn decode(&self, connections: &ConnectionSet, context: &Context) -> Result<ConceptContent> {
        let id =
            read_distinct_connection(&context.referenced(HAS_AUTHORITY_ID, vec![])?, connections)?;
        let Concept::Identity(bytes) = id.as_ref() else {
            return Err(wrong_class(AUTHORITY, "authority id is not an identity"));
        };
        Ok(ConceptContent::Bytes(bytes.clone()))
    }
}

// ------------- SourceBasedClaim -------------
/// A claim about a claim: "authority X says assertion A is supported by
/// source S". Content is the ordered tuple (assertion, authority, source),
/// encoded as three independent functional relations.
pub struct SourceBasedClaimCodec;

impl ConceptCodec for SourceBasedClaimCodec {
    fn name(&self) -> &'static [u8] {
        SOURCE_BASED_CLAIM
    }
    fn content_valid(&self, content: &ConceptContent, _context: &Context) -> bool {
        match content {
            ConceptContent::Triple([_, authority, _]) => has_concept_class(authority, AUTHORITY),
            _ => false,
        }
    }
    fn encode(&self, content: &ConceptContent, context: &Context) -> Result<ConnectionSet> {
        let ConceptContent::Triple([assertion, authority, source]) = content else {
            return Err(wrong_shape(SOURCE_BASED_CLAIM, content));
        };
        let mut connections = ConnectionSet::default();
        connections.insert(write_distinct_connection(
            Arc::clone(assertion),
            context.referenced(CLAIMS, vec![])?,
        ));
        connections.insert(write_distinct_connection(
            Arc::clone(authority),
            context.referenced(AUTHORITY_OF, vec![])?,
        ));
        connections.insert(write_distinct_connection(
            Arc::clone(source),
            context.referenced(SOURCE_OF, vec![])?,
        ));
        Ok(connections)
    }
    fn decode(&self, connections: &ConnectionSet, context: &Context) -> Result<ConceptContent> {
        let assertion = read_distinct_connection(&context.referenced(CLAIMS, vec![])?, connections)?;
        let authority =
            read_distinct_connection(&context.referenced(AUTHORITY_OF, vec![])?, connections)?;
        if !has_concept_class(&authority, AUTHORITY) {
            return Err(wrong_class(
                SOURCE_BASED_CLAIM,
                "authority of claim is not an authority concept",
            ));
        }
        let source = read_distinct_connection(&context.referenced(SOURCE_OF, vec![])?, connections)?;
        Ok(ConceptContent::Triple([assertion, authority, source]))
    }
}

pub(crate) fn register_core_codecs(context: &Context) -> Result<()> {
    context.register_codec(Arc::new(AssertionCodec))?;
    context.register_codec(Arc::new(AuthorityCodec))?;
    context.register_codec(Arc::new(SourceBasedClaimCodec))?;
    Ok(())
}

// convenience constructors for the core classes
impl Context {
    /// The reified assertion that the triple (subject, predicate, object)
    /// holds. Content-addressed like any other constructed abstraction.
    pub fn assertion(
        &self,
        subject: ConceptRef,
        predicate: ConceptRef,
        object: ConceptRef,
    ) -> Result<ConceptRef> {
        self.construct(ASSERTION, ConceptContent::Triple([subject, predicate, object]))
    }

    pub fn authority(&self, id: impl Into<Vec<u8>>) -> Result<ConceptRef> {
        self.construct(AUTHORITY, ConceptContent::Bytes(id.into()))
    }

    pub fn source_based_claim(
        &self,
        assertion: ConceptRef,
        authority: ConceptRef,
        source: ConceptRef,
    ) -> Result<ConceptRef> {
        self.construct(
            SOURCE_BASED_CLAIM,
            ConceptContent::Triple([assertion, authority, source]),
        )
    }

    /// The type-marker predicate used by clients in defining connections.
    pub fn is_instance_of(&self) -> Result<ConceptRef> {
        self.referenced(IS_INSTANCE_OF, vec![])
    }
}
