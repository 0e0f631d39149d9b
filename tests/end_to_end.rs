use std::collections::HashSet;

use conceptlogic::construct::{Concept, ConceptContent, ConceptRef, Context, OtherHasher};
use conceptlogic::mlm;
use conceptlogic::serialize::{read_triples_str, write_triples};

const YAML: &str = r#"
M:
  r30:
    "5":
      - "Paper: arxiv.org/abs/1234.5678 Table: 2 Row 3"
"#;

fn is_number(concept: &ConceptRef, value: i64) -> bool {
    matches!(concept.as_ref(), Concept::Number(n) if *n == value)
}

#[test]
fn one_model_builds_the_full_claim_chain() {
    let context = Context::new().unwrap();
    mlm::register_domain_codecs(&context).unwrap();
    let statistics = mlm::parse_statistics(YAML).unwrap();
    let claims = mlm::ingest(&statistics, &context).unwrap();
    assert_eq!(
        claims.len(),
        2,
        "one citation backs the model name and one backs the r30 value"
    );

    // the r30 claim references: the assertion (r30 evaluation, hasR30Value, 5),
    // the fixed extraction authority, and the cited arxiv paper
    let r30_claim = claims
        .iter()
        .find(|claim| {
            let Some(ConceptContent::Triple([assertion, _, _])) = claim.content() else {
                return false;
            };
            matches!(
                assertion.content(),
                Some(ConceptContent::Triple([_, _, object])) if is_number(object, 5)
            )
        })
        .expect("a claim backing the r30 value of 5");
    let Some(ConceptContent::Triple([assertion, authority, source])) = r30_claim.content() else {
        panic!("claim content is the (assertion, authority, source) tuple");
    };
    assert_eq!(
        source.content(),
        Some(&ConceptContent::Text("1234.5678".to_string())),
        "the source is the arxiv paper concept for the cited id"
    );
    assert_eq!(
        authority,
        &context.authority(mlm::EXTRACTION_AUTHORITY).unwrap(),
        "the authority is the fixed extraction authority"
    );
    let Some(ConceptContent::Triple([evaluation, predicate, _])) = assertion.content() else {
        panic!("the assertion names a concrete triple");
    };
    assert!(
        matches!(
            evaluation.as_ref(),
            Concept::Referenced { name } if name.ends_with(b".r30Evaluation")
        ),
        "the assertion subject is the model's r30 evaluation concept"
    );
    assert!(
        matches!(
            predicate.as_ref(),
            Concept::Referenced { name } if name.ends_with(b"hasR30Value")
        ),
        "the assertion predicate is the r30 relation"
    );
}

#[test]
fn the_claim_survives_two_independent_reimports() {
    let context = Context::new().unwrap();
    mlm::register_domain_codecs(&context).unwrap();
    let statistics = mlm::parse_statistics(YAML).unwrap();
    let claims = mlm::ingest(&statistics, &context).unwrap();

    let mut sink = Vec::new();
    write_triples(&context.loaded_concepts().unwrap(), &mut sink, &context).unwrap();
    let text = String::from_utf8(sink).unwrap();

    let fresh = Context::new().unwrap();
    mlm::register_domain_codecs(&fresh).unwrap();
    let first: HashSet<ConceptRef, OtherHasher> = read_triples_str(&text, &fresh)
        .unwrap()
        .values()
        .cloned()
        .collect();
    let second: HashSet<ConceptRef, OtherHasher> = read_triples_str(&text, &fresh)
        .unwrap()
        .values()
        .cloned()
        .collect();
    for claim in &claims {
        assert!(
            first.contains(claim),
            "claim must reappear in the first re-import"
        );
        assert!(
            second.contains(claim),
            "claim must reappear in the second re-import"
        );
    }
    assert_eq!(first, second, "two re-imports of the same text are equal");
}
