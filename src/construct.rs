use std::sync::{Arc, Mutex, MutexGuard};

// keepers use HashSet or HashMap with a fast hasher
use core::hash::BuildHasherDefault;
use std::collections::{HashMap, HashSet};
use seahash::SeaHasher;

// used to print out readable forms of a construct
use std::fmt;

use tracing::debug;

use crate::codec::{self, ConceptCodec};
use crate::error::{ConceptError, Result};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

/// Canonical, shared handle to an interned concept. Two constructions with
/// equal defining data hand back clones of the same `Arc`.
pub type ConceptRef = Arc<Concept>;

/// An unordered, duplicate-free collection of connections.
pub type ConnectionSet = HashSet<Connection, OtherHasher>;

// ------------- Concept -------------
/// An immutable, identity-bearing value in the graph.
///
/// Equality is structural and doubles as the interning key:
/// * `Identity` compares by its opaque bytes.
/// * `String` and `Number` compare by literal.
/// * `Referenced` compares by name only. Its defining connections are
///   metadata kept in the [`Context`] definition table, never part of
///   the identity.
/// * `Constructed` compares by (class name, content).
///
/// The `Ord` impl exists so the serializer can emit a canonical order.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Debug)]
pub enum Concept {
    Identity(Vec<u8>),
    String(String),
    Number(i64),
    Referenced { name: Vec<u8> },
    Constructed { class: Vec<u8>, content: ConceptContent },
}

impl Concept {
    /// The class name of a constructed abstraction, if this is one.
    pub fn class(&self) -> Option<&[u8]> {
        match self {
            Concept::Constructed { class, .. } => Some(class),
            _ => None,
        }
    }
    pub fn content(&self) -> Option<&ConceptContent> {
        match self {
            Concept::Constructed { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// True when `concept` is a constructed abstraction of the given class.
pub fn has_concept_class(concept: &Concept, class: &[u8]) -> bool {
    matches!(concept, Concept::Constructed { class: c, .. } if c == class)
}

pub(crate) fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect()
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Concept::Identity(bytes) => write!(f, "b\"{}\"", printable(bytes)),
            Concept::String(s) => write!(f, "{:?}", s),
            Concept::Number(n) => write!(f, "{}", n),
            Concept::Referenced { name } => write!(f, "<{}>", printable(name)),
            Concept::Constructed { class, content } => {
                write!(f, "{}({})", printable(class), content)
            }
        }
    }
}

// ------------- Content -------------
/// The typed sum of content shapes a coded concept class can carry.
///
/// `Triple` is an ordered 3-tuple of concepts; assertions use it as
/// (subject, predicate, object) and source based claims as
/// (assertion, authority, source). `Opaque` holds the raw connections of a
/// class the context has no codec for, so the graph can be stored and
/// re-emitted without interpreting it.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Debug)]
pub enum ConceptContent {
    Text(String),
    Bytes(Vec<u8>),
    Triple([ConceptRef; 3]),
    Opaque(Vec<Connection>),
}

impl fmt::Display for ConceptContent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConceptContent::Text(s) => write!(f, "{:?}", s),
            ConceptContent::Bytes(bytes) => write!(f, "b\"{}\"", printable(bytes)),
            ConceptContent::Triple([s, p, o]) => write!(f, "({}, {}, {})", s, p, o),
            ConceptContent::Opaque(connections) => write!(f, "#{} connections", connections.len()),
        }
    }
}

// ------------- Connection -------------
/// The subject slot of a connection. `Itself` is the explicit sentinel for
/// "the concept currently being constructed"; it resolves to that concept's
/// own identity no later than serialization.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Debug)]
pub enum Subject {
    Itself,
    Is(ConceptRef),
}

/// An ordered (subject, predicate, object) fact linking concepts.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct Connection {
    subject: Subject,
    predicate: ConceptRef,
    object: ConceptRef,
}

impl Connection {
    pub fn new(subject: Subject, predicate: ConceptRef, object: ConceptRef) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
    /// A connection about the concept under construction.
    pub fn about_itself(predicate: ConceptRef, object: ConceptRef) -> Self {
        Self::new(Subject::Itself, predicate, object)
    }
    pub fn subject(&self) -> &Subject {
        &self.subject
    }
    pub fn predicate(&self) -> ConceptRef {
        Arc::clone(&self.predicate)
    }
    pub fn object(&self) -> ConceptRef {
        Arc::clone(&self.object)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.subject {
            Subject::Itself => write!(f, "(*, {}, {})", self.predicate, self.object),
            Subject::Is(s) => write!(f, "({}, {}, {})", s, self.predicate, self.object),
        }
    }
}

// ------------- ConceptKeeper -------------
/// Owns every interned concept and guarantees its uniqueness: keeping a
/// concept that compares equal to an already kept one returns the kept
/// instance.
#[derive(Debug)]
pub struct ConceptKeeper {
    kept: HashSet<ConceptRef, OtherHasher>,
}

impl ConceptKeeper {
    pub fn new() -> Self {
        Self {
            kept: HashSet::default(),
        }
    }
    pub fn keep(&mut self, concept: Concept) -> (ConceptRef, bool) {
        let keepsake = Arc::new(concept);
        let previously_kept = !self.kept.insert(Arc::clone(&keepsake));
        (
            Arc::clone(self.kept.get(&keepsake).unwrap()),
            previously_kept,
        )
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
}

impl Default for ConceptKeeper {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Context -------------
/// The identity context: one interning table, one loaded set, one codec
/// registry, one definition table. All four live behind their own mutex but
/// every read-then-maybe-write happens under a single lock, so concurrent
/// constructions of the same content cannot yield two distinct instances.
///
/// The context is append-only. Nothing is ever removed.
pub struct Context {
    concept_keeper: Mutex<ConceptKeeper>,
    loaded: Mutex<HashSet<ConceptRef, OtherHasher>>,
    codecs: Mutex<HashMap<Vec<u8>, Arc<dyn ConceptCodec>, OtherHasher>>,
    definitions: Mutex<HashMap<Vec<u8>, Vec<Connection>, OtherHasher>>,
}

fn guard<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| ConceptError::Lock(what.to_string()))
}

impl Context {
    /// Creates a fresh context with the core codecs (assertion, authority,
    /// source based claim) already registered.
    pub fn new() -> Result<Self> {
        let context = Self {
            concept_keeper: Mutex::new(ConceptKeeper::new()),
            loaded: Mutex::new(HashSet::default()),
            codecs: Mutex::new(HashMap::default()),
            definitions: Mutex::new(HashMap::default()),
        };
        codec::register_core_codecs(&context)?;
        Ok(context)
    }

    fn keep(&self, concept: Concept) -> Result<ConceptRef> {
        let (kept, previously_kept) = guard(&self.concept_keeper, "concept keeper")?.keep(concept);
        if !previously_kept {
            debug!(concept = %kept, "interned new concept");
        }
        Ok(kept)
    }

    // constructors for the concept variants
    pub fn identity(&self, bytes: impl Into<Vec<u8>>) -> Result<ConceptRef> {
        self.keep(Concept::Identity(bytes.into()))
    }
    pub fn string(&self, literal: impl Into<String>) -> Result<ConceptRef> {
        self.keep(Concept::String(literal.into()))
    }
    pub fn number(&self, literal: i64) -> Result<ConceptRef> {
        self.keep(Concept::Number(literal))
    }

    /// Interns a referenced abstraction by name. A non-empty `definition` is
    /// asserted once, at the first construction that supplies one; later
    /// definitions for the same name are ignored (the definition is metadata,
    /// not identity).
    pub fn referenced(
        &self,
        name: impl Into<Vec<u8>>,
        definition: Vec<Connection>,
    ) -> Result<ConceptRef> {
        let name = name.into();
        let kept = self.keep(Concept::Referenced { name: name.clone() })?;
        if !definition.is_empty() {
            guard(&self.definitions, "definition table")?
                .entry(name)
                .or_insert(definition);
        }
        Ok(kept)
    }

    /// Constructs (or returns the interned instance of) a constructed
    /// abstraction of the registered class `class`. The class codec's
    /// validity predicate runs first; on failure nothing is interned.
    pub fn construct(&self, class: &[u8], content: ConceptContent) -> Result<ConceptRef> {
        let codec = self.codec(class)?.ok_or_else(|| {
            ConceptError::Collision(format!(
                "no concept class registered under {}",
                printable(class)
            ))
        })?;
        if !codec.content_valid(&content, self) {
            return Err(ConceptError::ContentInvalid {
                class: printable(class),
                message: format!("rejected by validity predicate: {}", content),
            });
        }
        self.keep(Concept::Constructed {
            class: class.to_vec(),
            content,
        })
    }

    /// Interns a constructed abstraction of a class this context has no codec
    /// for, carrying its connections verbatim so they can be re-emitted.
    pub fn construct_opaque(
        &self,
        class: &[u8],
        connections: Vec<Connection>,
    ) -> Result<ConceptRef> {
        let mut connections = connections;
        connections.sort();
        connections.dedup();
        self.keep(Concept::Constructed {
            class: class.to_vec(),
            content: ConceptContent::Opaque(connections),
        })
    }

    // the loaded set marks top-level concepts that must be included in export
    pub fn register(&self, concept: &ConceptRef) -> Result<()> {
        guard(&self.loaded, "loaded set")?.insert(Arc::clone(concept));
        Ok(())
    }
    pub fn loaded_concepts(&self) -> Result<HashSet<ConceptRef, OtherHasher>> {
        Ok(guard(&self.loaded, "loaded set")?.clone())
    }

    /// Registers a codec under its namespace-prefixed class name. A second
    /// registration under the same name is a programming error in a codec or
    /// a namespace collision and is refused outright.
    pub fn register_codec(&self, codec: Arc<dyn ConceptCodec>) -> Result<()> {
        let name = codec.name().to_vec();
        let mut codecs = guard(&self.codecs, "codec registry")?;
        if codecs.contains_key(&name) {
            return Err(ConceptError::Collision(format!(
                "concept class {} is already registered",
                printable(&name)
            )));
        }
        codecs.insert(name, codec);
        Ok(())
    }
    pub fn codec(&self, class: &[u8]) -> Result<Option<Arc<dyn ConceptCodec>>> {
        Ok(guard(&self.codecs, "codec registry")?
            .get(class)
            .map(Arc::clone))
    }

    /// The defining connections of a referenced abstraction, empty when none
    /// were ever asserted.
    pub fn definition(&self, name: &[u8]) -> Result<Vec<Connection>> {
        Ok(guard(&self.definitions, "definition table")?
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    /// The connections a concept contributes to the graph: a constructed
    /// abstraction encodes its content through its class codec (or re-emits
    /// opaque connections), a referenced abstraction contributes its defining
    /// connections, literals contribute nothing.
    pub fn connections_of(&self, concept: &ConceptRef) -> Result<ConnectionSet> {
        match concept.as_ref() {
            Concept::Constructed { class, content } => {
                if let ConceptContent::Opaque(connections) = content {
                    return Ok(connections.iter().cloned().collect());
                }
                let codec = self.codec(class)?.ok_or_else(|| {
                    ConceptError::Collision(format!(
                        "no concept class registered under {}",
                        printable(class)
                    ))
                })?;
                codec.encode(content, self)
            }
            Concept::Referenced { name } => Ok(self.definition(name)?.into_iter().collect()),
            _ => Ok(ConnectionSet::default()),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(guard(&self.concept_keeper, "concept keeper")?.len())
    }
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
