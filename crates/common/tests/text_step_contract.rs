use quire_common::step::text::{TextDoc, TextStep};
use quire_common::step::{Mapping, Step};

fn apply_all(doc: &TextDoc, steps: &[TextStep]) -> (TextDoc, Mapping) {
    let mut doc = doc.clone();
    let mut mapping = Mapping::new();
    for step in steps {
        doc = step.apply(&doc).expect("step should apply");
        mapping.push(step.step_map());
    }
    (doc, mapping)
}

#[test]
fn composed_mapping_tracks_a_word_through_a_batch() {
    let doc = TextDoc::from("the quick fox");
    let steps = [
        TextStep::insert(0, ">> "),
        TextStep::replace(7, 12, "slow"),
        TextStep::insert(12, "brown "),
    ];
    let (doc, mapping) = apply_all(&doc, &steps);
    assert_eq!(doc.as_str(), ">> the slow brown fox");

    // "fox" spanned 10..13 before the batch.
    let from = mapping.map(10, 1);
    let to = mapping.map(13, -1);
    let fox: String = doc.as_str().chars().skip(from).take(to - from).collect();
    assert_eq!(fox, "fox");
}

#[test]
fn deleted_span_collapses_under_mapping() {
    let doc = TextDoc::from("keep drop keep");
    let (doc, mapping) = apply_all(&doc, &[TextStep::delete(5, 10)]);
    assert_eq!(doc.as_str(), "keep keep");
    assert!(mapping.map(5, 1) >= mapping.map(9, -1));
}

#[test]
fn failed_step_leaves_input_document_untouched() {
    let doc = TextDoc::from("abc");
    assert!(TextStep::delete(2, 9).apply(&doc).is_err());
    assert_eq!(doc.as_str(), "abc");
}
