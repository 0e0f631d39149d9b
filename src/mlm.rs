//! Model statistics ingestion: turns a YAML table of trained model
//! evaluation values into concepts, assertions and source based claims.
//!
//! The input maps a model name to optional `r30` and `param` tables, each
//! mapping a numeric value (as a string key) to a list of source citations of
//! the form `"Paper: arxiv.org/abs/<id> Table: <n> Row <n>"`. Each value
//! becomes a reified assertion, and every citation becomes a source based
//! claim tying that assertion to the extraction authority and the cited
//! arxiv paper.

use std::collections::BTreeMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::codec::{write_distinct_connection, ConceptCodec, read_distinct_connection};
use crate::construct::{
    Concept, ConceptContent, ConceptRef, Connection, ConnectionSet, Context,
};
use crate::error::{ConceptError, Result};

pub const MLM_PREFIX: &[u8] = b"masterThesis.MLM.";

pub const ARXIV_PAPER: &[u8] = b"masterThesis.MLM.arxivPaper";
const HAS_ARXIV_ID: &[u8] = b"masterThesis.MLM.hasArxivId";

pub const EXTRACTION_AUTHORITY: &[u8] = b"masterThesis.MLM.R30ExtractionAuthority";

// ------------- ArxivPaper -------------
/// A paper on arxiv.org, content-addressed by its arxiv id.
pub struct ArxivPaperCodec;

impl ConceptCodec for ArxivPaperCodec {
    fn name(&self) -> &'static [u8] {
        ARXIV_PAPER
    }
    fn content_valid(&self, content: &ConceptContent, _context: &Context) -> bool {
        matches!(content, ConceptContent::Text(_))
    }
    fn encode(&self, content: &ConceptContent, context: &Context) -> Result<ConnectionSet> {
        let ConceptContent::Text(arxiv_id) = content else {
            return Err(ConceptError::ContentInvalid {
                class: "masterThesis.MLM.arxivPaper".to_string(),
                message: format!("content shape not encodable: {}", content),
            });
        };
        let mut connections = ConnectionSet::default();
        connections.insert(write_distinct_connection(
            context.string(arxiv_id.clone())?,
            context.referenced(HAS_ARXIV_ID, vec![])?,
        ));
        Ok(connections)
    }
    fn decode(&self, connections: &ConnectionSet, context: &Context) -> Result<ConceptContent> {
        let arxiv_id =
            read_distinct_connection(&context.referenced(HAS_ARXIV_ID, vec![])?, connections)?;
        let Concept::String(arxiv_id) = arxiv_id.as_ref() else {
            return Err(ConceptError::ConnectionsNotValid {
                class: "masterThesis.MLM.arxivPaper".to_string(),
                message: "arxiv id is not a string concept".to_string(),
            });
        };
        Ok(ConceptContent::Text(arxiv_id.clone()))
    }
}

pub fn register_domain_codecs(context: &Context) -> Result<()> {
    context.register_codec(Arc::new(ArxivPaperCodec))
}

pub fn arxiv_paper(context: &Context, arxiv_id: &str) -> Result<ConceptRef> {
    context.construct(ARXIV_PAPER, ConceptContent::Text(arxiv_id.to_string()))
}

// ------------- citations -------------
lazy_static! {
    static ref CITATION: Regex =
        Regex::new(r"Paper: arxiv\.org/abs/([^ ]+) Table: [0-9]+ Row [0-9]+").unwrap();
}

/// Extracts the arxiv id from a source citation, or `None` when the citation
/// does not follow the expected shape.
pub fn arxiv_id(citation: &str) -> Option<&str> {
    CITATION
        .captures(citation)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}

// ------------- input records -------------
/// One model's statistics: numeric value (as given in the YAML, a string
/// key) to the citations backing it. Both tables are optional.
#[derive(Debug, Default, Deserialize)]
pub struct ModelRecord {
    #[serde(default)]
    pub r30: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub param: BTreeMap<String, Vec<String>>,
}

/// Model name to its record; a `BTreeMap` so ingestion order is stable.
pub type ModelStatistics = BTreeMap<String, ModelRecord>;

pub fn parse_statistics(yaml: &str) -> Result<ModelStatistics> {
    serde_yaml::from_str(yaml).map_err(|e| ConceptError::Parse {
        message: format!("model statistics YAML: {}", e),
        line: e.location().map(|l| l.line()),
    })
}

// ------------- vocabulary -------------
macro_rules! mlm_name {
    ($suffix:literal) => {
        concat!("masterThesis.MLM.", $suffix).as_bytes()
    };
}

/// The domain vocabulary: referenced abstractions interned once per context.
pub struct Vocabulary {
    pub has_name: ConceptRef,
    pub trained_parameters_format: ConceptRef,
    pub has_parameter_count: ConceptRef,
    pub trained_parameters: ConceptRef,
    pub has_trained_parameters_format: ConceptRef,
    pub trained_signal_value_classification_mlm: ConceptRef,
    pub includes_trained_mlm_data: ConceptRef,
    pub physics_based_top_quark_classification: ConceptRef,
    pub signal_value_classification_approximation: ConceptRef,
    pub function_used_for_signal_value_classification: ConceptRef,
    pub target_signal_value_classification_function: ConceptRef,
    pub r30_evaluation: ConceptRef,
    pub r30_evaluation_of: ConceptRef,
    pub has_r30_value: ConceptRef,
}

impl Vocabulary {
    pub fn new(context: &Context) -> Result<Self> {
        Ok(Self {
            has_name: context.referenced(mlm_name!("hasName"), vec![])?,
            trained_parameters_format: context
                .referenced(mlm_name!("trainedMLMParametersFormat"), vec![])?,
            has_parameter_count: context.referenced(mlm_name!("hasMLMParameterCount"), vec![])?,
            trained_parameters: context.referenced(mlm_name!("trainedMLMParameters"), vec![])?,
            has_trained_parameters_format: context
                .referenced(mlm_name!("hasTrainedMLMParametersFormat"), vec![])?,
            trained_signal_value_classification_mlm: context
                .referenced(mlm_name!("trainedSignalValueClassificationMLM"), vec![])?,
            includes_trained_mlm_data: context
                .referenced(mlm_name!("includesTrainedMLMData"), vec![])?,
            physics_based_top_quark_classification: context
                .referenced(mlm_name!("physicsBasedTopQuarkClassification"), vec![])?,
            signal_value_classification_approximation: context
                .referenced(mlm_name!("signalValueClassificationApproximation"), vec![])?,
            function_used_for_signal_value_classification: context
                .referenced(mlm_name!("functionUsedForSignalValueClassification"), vec![])?,
            target_signal_value_classification_function: context
                .referenced(mlm_name!("targetSignalValueClassificationFunction"), vec![])?,
            r30_evaluation: context.referenced(mlm_name!("r30Evaluation"), vec![])?,
            r30_evaluation_of: context.referenced(mlm_name!("r30EvaluationOf"), vec![])?,
            has_r30_value: context.referenced(mlm_name!("hasR30Value"), vec![])?,
        })
    }
}

/// The referenced abstractions describing one model: its parameters format,
/// parameters, the model itself, the classification approximation it
/// implements, and its r30 evaluation.
pub struct ModelConcepts {
    pub parameters_format: ConceptRef,
    pub parameters: ConceptRef,
    pub model: ConceptRef,
    pub approximation: ConceptRef,
    pub r30_evaluation: ConceptRef,
}

impl ModelConcepts {
    pub fn new(model_name: &str, vocabulary: &Vocabulary, context: &Context) -> Result<Self> {
        let is_instance_of = context.is_instance_of()?;
        let base = format!("masterThesis.MLM.models.{}", model_name);
        let parameters_format = context.referenced(
            format!("{}.parametersFormat", base).into_bytes(),
            vec![Connection::about_itself(
                Arc::clone(&is_instance_of),
                Arc::clone(&vocabulary.trained_parameters_format),
            )],
        )?;
        let parameters = context.referenced(
            format!("{}.parameters", base).into_bytes(),
            vec![
                Connection::about_itself(
                    Arc::clone(&is_instance_of),
                    Arc::clone(&vocabulary.trained_parameters),
                ),
                Connection::about_itself(
                    Arc::clone(&vocabulary.has_trained_parameters_format),
                    Arc::clone(&parameters_format),
                ),
            ],
        )?;
        let model = context.referenced(
            base.clone().into_bytes(),
            vec![
                Connection::about_itself(
                    Arc::clone(&is_instance_of),
                    Arc::clone(&vocabulary.trained_signal_value_classification_mlm),
                ),
                Connection::about_itself(
                    Arc::clone(&vocabulary.includes_trained_mlm_data),
                    Arc::clone(&parameters),
                ),
            ],
        )?;
        let approximation = context.referenced(
            format!("{}.approximation", base).into_bytes(),
            vec![
                Connection::about_itself(
                    Arc::clone(&is_instance_of),
                    Arc::clone(&vocabulary.signal_value_classification_approximation),
                ),
                Connection::about_itself(
                    Arc::clone(&vocabulary.function_used_for_signal_value_classification),
                    Arc::clone(&model),
                ),
                Connection::about_itself(
                    Arc::clone(&vocabulary.target_signal_value_classification_function),
                    Arc::clone(&vocabulary.physics_based_top_quark_classification),
                ),
            ],
        )?;
        let r30_evaluation = context.referenced(
            format!("{}.r30Evaluation", base).into_bytes(),
            vec![
                Connection::about_itself(
                    Arc::clone(&is_instance_of),
                    Arc::clone(&vocabulary.r30_evaluation),
                ),
                Connection::about_itself(
                    Arc::clone(&vocabulary.r30_evaluation_of),
                    Arc::clone(&approximation),
                ),
            ],
        )?;
        Ok(Self {
            parameters_format,
            parameters,
            model,
            approximation,
            r30_evaluation,
        })
    }
}

// ------------- ingestion -------------
fn claim_sources(
    assertion: &ConceptRef,
    authority: &ConceptRef,
    sources: &[String],
    context: &Context,
    claims: &mut Vec<ConceptRef>,
) -> Result<()> {
    for source in sources {
        let Some(id) = arxiv_id(source) else {
            // malformed citations are a client concern: skip and continue
            warn!(citation = %source, "skipping citation without an arxiv id");
            continue;
        };
        let paper = arxiv_paper(context, id)?;
        let claim = context.source_based_claim(
            Arc::clone(assertion),
            Arc::clone(authority),
            paper,
        )?;
        context.register(&claim)?;
        claims.push(claim);
    }
    Ok(())
}

fn numeric_value(raw: &str) -> Option<i64> {
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(value = %raw, "skipping non-integer statistic value");
            None
        }
    }
}

/// Builds the full concept graph for the given statistics and registers
/// every resulting claim as a top-level concept. Returns the claims.
pub fn ingest(statistics: &ModelStatistics, context: &Context) -> Result<Vec<ConceptRef>> {
    let vocabulary = Vocabulary::new(context)?;
    let authority = context.authority(EXTRACTION_AUTHORITY)?;
    let mut claims = Vec::new();
    for (model_name, record) in statistics {
        let concepts = ModelConcepts::new(model_name, &vocabulary, context)?;
        let name = context.string(model_name.clone())?;
        let has_name_assertion = context.assertion(
            Arc::clone(&concepts.model),
            Arc::clone(&vocabulary.has_name),
            name,
        )?;
        // every citation, from both tables, also backs the model's name
        let all_sources: Vec<String> = record
            .r30
            .values()
            .chain(record.param.values())
            .flatten()
            .cloned()
            .collect();
        claim_sources(
            &has_name_assertion,
            &authority,
            &all_sources,
            context,
            &mut claims,
        )?;
        for (value, sources) in &record.r30 {
            let Some(value) = numeric_value(value) else {
                continue;
            };
            let assertion = context.assertion(
                Arc::clone(&concepts.r30_evaluation),
                Arc::clone(&vocabulary.has_r30_value),
                context.number(value)?,
            )?;
            claim_sources(&assertion, &authority, sources, context, &mut claims)?;
        }
        for (value, sources) in &record.param {
            let Some(value) = numeric_value(value) else {
                continue;
            };
            let assertion = context.assertion(
                Arc::clone(&concepts.parameters_format),
                Arc::clone(&vocabulary.has_parameter_count),
                context.number(value)?,
            )?;
            claim_sources(&assertion, &authority, sources, context, &mut claims)?;
        }
        debug!(model = %model_name, claims = claims.len(), "ingested model");
    }
    Ok(claims)
}
