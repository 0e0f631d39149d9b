use std::collections::HashSet;
use std::sync::Arc;

use conceptlogic::construct::{ConceptRef, Connection, Context, OtherHasher, Subject};
use conceptlogic::error::ConceptError;
use conceptlogic::serialize::{read_triples_str, write_triples};

fn export(context: &Context) -> String {
    let mut sink = Vec::new();
    write_triples(&context.loaded_concepts().unwrap(), &mut sink, context).unwrap();
    String::from_utf8(sink).unwrap()
}

fn values(imported: &std::collections::HashMap<String, ConceptRef, OtherHasher>) -> HashSet<ConceptRef, OtherHasher> {
    imported.values().cloned().collect()
}

#[test]
fn self_reference_resolves_to_the_owning_identity() {
    let context = Context::new().unwrap();
    let marker = context.referenced(b"ns.marker".as_slice(), vec![]).unwrap();
    let term = context
        .referenced(
            b"ns.term".as_slice(),
            vec![Connection::about_itself(
                context.is_instance_of().unwrap(),
                marker,
            )],
        )
        .unwrap();
    context.register(&term).unwrap();
    let text = export(&context);
    assert!(
        text.lines().any(|line| line.starts_with("<ns.term> ")),
        "the Itself placeholder must resolve to the concept's own identity, got:\n{text}"
    );
}

#[test]
fn round_trip_preserves_registered_concepts() {
    let context = Context::new().unwrap();
    let authority = context.authority(b"ns.auth".as_slice()).unwrap();
    let model = context.referenced(b"ns.model".as_slice(), vec![]).unwrap();
    let has_name = context.referenced(b"ns.hasName".as_slice(), vec![]).unwrap();
    let name = context.string("M").unwrap();
    let assertion = context.assertion(model, has_name, name).unwrap();
    let source = context.referenced(b"ns.source".as_slice(), vec![]).unwrap();
    let claim = context
        .source_based_claim(assertion, authority, source)
        .unwrap();
    context.register(&claim).unwrap();
    let text = export(&context);

    // a fresh context with the same codecs reconstructs an isomorphic graph
    let fresh = Context::new().unwrap();
    let imported = read_triples_str(&text, &fresh).unwrap();
    assert!(
        values(&imported).contains(&claim),
        "every registered concept must reappear after import"
    );

    // importing into the same context hands back the identical instance
    let reimported = read_triples_str(&text, &context).unwrap();
    let kept = reimported
        .values()
        .find(|concept| **concept == claim)
        .expect("claim reappears");
    assert!(
        Arc::ptr_eq(kept, &claim),
        "a shared context must resolve to the already interned instance"
    );
}

#[test]
fn two_imports_of_the_same_text_are_equal() {
    let context = Context::new().unwrap();
    let authority = context.authority(b"ns.auth".as_slice()).unwrap();
    let subject = context.referenced(b"ns.subject".as_slice(), vec![]).unwrap();
    let predicate = context.referenced(b"ns.hasValue".as_slice(), vec![]).unwrap();
    let assertion = context
        .assertion(subject, predicate, context.number(5).unwrap())
        .unwrap();
    let claim = context
        .source_based_claim(
            assertion,
            authority,
            context.referenced(b"ns.source".as_slice(), vec![]).unwrap(),
        )
        .unwrap();
    context.register(&claim).unwrap();
    let text = export(&context);

    let fresh = Context::new().unwrap();
    let first = values(&read_triples_str(&text, &fresh).unwrap());
    let second = values(&read_triples_str(&text, &fresh).unwrap());
    assert_eq!(first, second, "independent imports must yield equal sets");
}

#[test]
fn the_export_is_canonical_and_order_independent() {
    let context = Context::new().unwrap();
    let authority = context.authority(b"ns.auth".as_slice()).unwrap();
    context.register(&authority).unwrap();
    let marker = context.referenced(b"ns.marker".as_slice(), vec![]).unwrap();
    let term = context
        .referenced(
            b"ns.term".as_slice(),
            vec![Connection::about_itself(
                context.is_instance_of().unwrap(),
                marker,
            )],
        )
        .unwrap();
    context.register(&term).unwrap();

    let text = export(&context);
    assert_eq!(text, export(&context), "two exports must be byte-identical");

    // the reader only relies on grouping by subject, never on line order
    let mut reversed: Vec<&str> = text.lines().collect();
    reversed.reverse();
    let reversed = reversed.join("\n");
    let fresh_a = Context::new().unwrap();
    let fresh_b = Context::new().unwrap();
    let straight = values(&read_triples_str(&text, &fresh_a).unwrap());
    let shuffled = values(&read_triples_str(&reversed, &fresh_b).unwrap());
    assert_eq!(straight, shuffled, "line order must not matter");
}

#[test]
fn connection_less_roots_survive_the_round_trip() {
    let context = Context::new().unwrap();
    let number = context.number(5).unwrap();
    let bare = context.referenced(b"ns.bare".as_slice(), vec![]).unwrap();
    context.register(&number).unwrap();
    context.register(&bare).unwrap();
    let text = export(&context);
    assert!(
        !text.is_empty(),
        "registered roots without connections must still leave a trace"
    );
    let fresh = Context::new().unwrap();
    let imported = values(&read_triples_str(&text, &fresh).unwrap());
    assert!(
        imported.contains(&number),
        "a registered literal must reappear after import, got:\n{text}"
    );
    assert!(
        imported.contains(&bare),
        "a registered bare reference must reappear after import, got:\n{text}"
    );
}

#[test]
fn a_constructed_predicate_is_refused_by_the_writer() {
    let context = Context::new().unwrap();
    let marker = context.referenced(b"ns.marker".as_slice(), vec![]).unwrap();
    let authority = context.authority(b"ns.auth".as_slice()).unwrap();
    // a constructed concept has no reference term to stand in predicate position
    let term = context
        .referenced(
            b"ns.term".as_slice(),
            vec![Connection::about_itself(authority, marker)],
        )
        .unwrap();
    context.register(&term).unwrap();
    let mut sink = Vec::new();
    let err = write_triples(&context.loaded_concepts().unwrap(), &mut sink, &context).unwrap_err();
    assert!(
        matches!(err, ConceptError::Unrepresentable(_)),
        "a constructed predicate must be refused instead of emitting unreadable text, got {err}"
    );
}

#[test]
fn a_literal_subject_is_refused_by_the_writer() {
    let context = Context::new().unwrap();
    let marker = context.referenced(b"ns.marker".as_slice(), vec![]).unwrap();
    let term = context
        .referenced(
            b"ns.term".as_slice(),
            vec![Connection::new(
                Subject::Is(context.number(1).unwrap()),
                context.is_instance_of().unwrap(),
                marker,
            )],
        )
        .unwrap();
    context.register(&term).unwrap();
    let mut sink = Vec::new();
    let err = write_triples(&context.loaded_concepts().unwrap(), &mut sink, &context).unwrap_err();
    assert!(
        matches!(err, ConceptError::Unrepresentable(_)),
        "a literal subject must be refused instead of emitting unreadable text, got {err}"
    );
}

#[test]
fn conflicting_coded_by_classes_are_a_parse_error() {
    let text = "_:0 <conceptLogic.codedBy> b\"a.class\" .\n\
                _:0 <conceptLogic.codedBy> b\"b.class\" .\n\
                _:0 <mystery.pred> 7 .\n";
    let context = Context::new().unwrap();
    let err = read_triples_str(text, &context).unwrap_err();
    assert!(
        matches!(err, ConceptError::Parse { .. }),
        "two different codedBy classes for one blank must fail, got {err}"
    );
}

#[test]
fn malformed_text_is_a_parse_error() {
    let context = Context::new().unwrap();
    for bad in [
        "this is not a triple",
        "<a> <b> 1",                 // missing terminator
        "<a> <b> \"unterminated .",  // bad literal
        "<a\\qb> <b> 1 .",           // unknown escape
        "_:0 <p> 1 .",               // blank node without a class
    ] {
        let err = read_triples_str(bad, &context).unwrap_err();
        assert!(
            matches!(err, ConceptError::Parse { .. }),
            "{bad:?} must be a parse error, got {err}"
        );
    }
}

#[test]
fn unknown_classes_are_stored_and_re_emitted_verbatim() {
    let text = "_:0 <conceptLogic.codedBy> b\"mystery.class\" .\n_:0 <mystery.pred> 7 .\n";
    let context = Context::new().unwrap();
    let imported = read_triples_str(text, &context).unwrap();
    let opaque = imported.get("_:0").expect("opaque concept imported");
    context.register(opaque).unwrap();
    let reexport = export(&context);
    assert!(
        reexport.contains("b\"mystery.class\""),
        "the class of an uninterpreted concept survives, got:\n{reexport}"
    );
    assert!(
        reexport.contains("<mystery.pred> 7 ."),
        "the connections of an uninterpreted concept survive, got:\n{reexport}"
    );
}

#[test]
fn escaped_literals_survive_the_round_trip() {
    let context = Context::new().unwrap();
    let subject = context.referenced(b"ns.subject".as_slice(), vec![]).unwrap();
    let predicate = context.referenced(b"ns.hasName".as_slice(), vec![]).unwrap();
    let tricky = context
        .string("a \"quoted\"\nmulti-line\tname \\ with <angles>")
        .unwrap();
    let assertion = context.assertion(subject, predicate, tricky).unwrap();
    context.register(&assertion).unwrap();
    let text = export(&context);
    let fresh = Context::new().unwrap();
    let imported = read_triples_str(&text, &fresh).unwrap();
    assert!(
        values(&imported).contains(&assertion),
        "escaping must be lossless, got:\n{text}"
    );
}
