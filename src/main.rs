//! Batch workflow: load a YAML table of model statistics, build the concept
//! graph, export it as triple text, and verify the round trip by reading the
//! export back twice.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use conceptlogic::construct::{ConceptRef, Context, OtherHasher};
use conceptlogic::error::{ConceptError, Result};
use conceptlogic::mlm;
use conceptlogic::serialize::{read_triples, write_triples};

struct Settings {
    data: String,
    output: String,
}

fn settings() -> Result<Settings> {
    let settings = config::Config::builder()
        .set_default("data", "data/parameters.yaml")
        .map_err(|e| ConceptError::Config(e.to_string()))?
        .set_default("output", "r30.triples")
        .map_err(|e| ConceptError::Config(e.to_string()))?
        .add_source(config::File::with_name("conceptlogic").required(false))
        .add_source(config::Environment::with_prefix("CONCEPTLOGIC"))
        .build()
        .map_err(|e| ConceptError::Config(e.to_string()))?;
    Ok(Settings {
        data: settings
            .get_string("data")
            .map_err(|e| ConceptError::Config(e.to_string()))?,
        output: settings
            .get_string("output")
            .map_err(|e| ConceptError::Config(e.to_string()))?,
    })
}

fn run() -> Result<()> {
    let settings = settings()?;
    let yaml = std::fs::read_to_string(&settings.data)?;
    let statistics = mlm::parse_statistics(&yaml)?;
    info!(models = statistics.len(), data = %settings.data, "loaded model statistics");

    let context = Context::new()?;
    mlm::register_domain_codecs(&context)?;
    let claims = mlm::ingest(&statistics, &context)?;
    info!(
        claims = claims.len(),
        concepts = context.len()?,
        "built concept graph"
    );

    let registered = context.loaded_concepts()?;
    {
        let mut sink = BufWriter::new(File::create(&settings.output)?);
        write_triples(&registered, &mut sink, &context)?;
        sink.flush()?;
    }
    info!(output = %settings.output, "exported triples");

    // read the export back twice through the same context; content-addressing
    // must hand every registered concept back as the identical instance
    let first = read_triples(&mut BufReader::new(File::open(&settings.output)?), &context)?;
    let second = read_triples(&mut BufReader::new(File::open(&settings.output)?), &context)?;

    let first_concepts: HashSet<ConceptRef, OtherHasher> = first.values().cloned().collect();
    let second_concepts: HashSet<ConceptRef, OtherHasher> = second.values().cloned().collect();

    // report every concept that failed to reappear, not just the first
    let mut missing = 0usize;
    for concept in &registered {
        if !first_concepts.contains(concept) {
            warn!(concept = %concept, "registered concept missing after re-import");
            missing += 1;
        }
    }
    if missing > 0 {
        return Err(ConceptError::Verification(format!(
            "{} registered concepts missing after re-import",
            missing
        )));
    }
    if first_concepts != second_concepts {
        return Err(ConceptError::Verification(
            "two re-imports of the same export differ".to_string(),
        ));
    }
    info!(
        reimported = first_concepts.len(),
        "round trip verified: all registered concepts reappeared and both re-imports are equal"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}
