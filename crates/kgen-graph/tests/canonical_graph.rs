use kgen_canonical::DigestAlg;
use kgen_graph::{canonicalize_graph, parse_ntriples, GraphCanonicalizer, Term, Triple};

const EX: &str = "http://example.org/";

fn p(local: &str) -> String {
    format!("{}{}", EX, local)
}

fn person_graph(alice: &str, addr: &str) -> Vec<Triple> {
    vec![
        Triple::new(Term::blank(alice), p("name"), Term::literal("Alice")),
        Triple::new(Term::blank(alice), p("address"), Term::blank(addr)),
        Triple::new(Term::blank(addr), p("city"), Term::literal("Paris")),
        Triple::new(Term::iri(p("doc")), p("about"), Term::blank(alice)),
    ]
}

#[test]
fn relabeled_graphs_share_canonical_bytes() {
    let first = canonicalize_graph(&person_graph("x", "y"));
    let second = canonicalize_graph(&person_graph("node42", "addr7"));

    assert_eq!(first.triples, second.triples);
    assert_eq!(first.cid(DigestAlg::Sha256), second.cid(DigestAlg::Sha256));
    assert!(!first.approximate);
}

#[test]
fn triple_order_does_not_matter() {
    let mut shuffled = person_graph("a", "b");
    shuffled.reverse();
    shuffled.swap(0, 2);

    assert_eq!(
        canonicalize_graph(&person_graph("a", "b")).to_bytes(),
        canonicalize_graph(&shuffled).to_bytes()
    );
}

#[test]
fn canonical_lines_are_sorted_and_labeled() {
    let graph = canonicalize_graph(&person_graph("x", "y"));

    let mut sorted = graph.triples.clone();
    sorted.sort();
    assert_eq!(graph.triples, sorted);
    assert!(graph.triples.iter().all(|line| line.ends_with(" .")));
    assert_eq!(graph.blank_node_map.len(), 2);
    let mut labels: Vec<_> = graph.blank_node_map.values().cloned().collect();
    labels.sort();
    assert_eq!(labels, ["b0", "b1"]);
    assert!(graph.to_ntriples().contains("_:b"));
    assert!(!graph.to_ntriples().contains("_:x"));
}

#[test]
fn duplicate_triples_collapse() {
    let mut triples = person_graph("x", "y");
    triples.push(triples[0].clone());

    let graph = canonicalize_graph(&triples);
    assert_eq!(graph.triples.len(), 4);
    assert_eq!(graph, canonicalize_graph(&person_graph("x", "y")));
}

#[test]
fn different_graphs_hash_differently() {
    let mut other = person_graph("x", "y");
    other[2] = Triple::new(Term::blank("y"), p("city"), Term::literal("Lyon"));

    assert_ne!(
        canonicalize_graph(&person_graph("x", "y")).cid(DigestAlg::Sha256),
        canonicalize_graph(&other).cid(DigestAlg::Sha256)
    );
}

#[test]
fn chains_need_refinement_rounds() {
    let chain = |labels: [&str; 4]| {
        vec![
            Triple::new(Term::blank(labels[0]), p("next"), Term::blank(labels[1])),
            Triple::new(Term::blank(labels[1]), p("next"), Term::blank(labels[2])),
            Triple::new(Term::blank(labels[2]), p("next"), Term::blank(labels[3])),
        ]
    };
    let first = canonicalize_graph(&chain(["a", "b", "c", "d"]));
    let second = canonicalize_graph(&chain(["q", "r", "s", "t"]));

    assert!(first.rounds >= 1);
    assert!(!first.approximate);
    assert_eq!(first.triples, second.triples);
}

#[test]
fn symmetric_nodes_are_flagged_approximate() {
    let triples = vec![
        Triple::new(Term::blank("a"), p("knows"), Term::blank("b")),
        Triple::new(Term::blank("b"), p("knows"), Term::blank("a")),
    ];

    let graph = canonicalize_graph(&triples);
    assert!(graph.approximate);
    assert_eq!(graph.triples.len(), 2);
}

#[test]
fn directed_cycles_are_approximate_in_any_order() {
    let cycle = |order: [usize; 4]| -> Vec<Triple> {
        let nodes = ["a", "b", "c", "d"];
        order
            .iter()
            .map(|&i| {
                Triple::new(
                    Term::blank(nodes[i]),
                    p("next"),
                    Term::blank(nodes[(i + 1) % 4]),
                )
            })
            .collect()
    };
    for order in [[0, 1, 2, 3], [3, 1, 0, 2], [2, 0, 3, 1]] {
        let graph = canonicalize_graph(&cycle(order));
        assert!(graph.approximate);
        assert_eq!(graph.triples.len(), 4);
    }
}

#[test]
fn equivalent_literal_spellings_do_not_shift_labels() {
    for n in 0..20 {
        let value = format!("v{}", n);
        let base = vec![
            Triple::new(Term::blank("a"), p("p"), Term::literal(value.clone())),
            Triple::new(Term::blank("b"), p("q"), Term::literal("y")),
        ];
        let mut respelled = base.clone();
        respelled.push(Triple::new(
            Term::blank("a"),
            p("p"),
            Term::typed(value.clone(), kgen_graph::XSD_STRING),
        ));
        assert_eq!(
            canonicalize_graph(&base).triples,
            canonicalize_graph(&respelled).triples,
            "{value}"
        );

        let tagged = vec![
            Triple::new(Term::blank("a"), p("p"), Term::lang(value.clone(), "en")),
            Triple::new(Term::blank("b"), p("q"), Term::literal("y")),
        ];
        let mut mixed_case = tagged.clone();
        mixed_case.push(Triple::new(
            Term::blank("a"),
            p("p"),
            Term::lang(value.clone(), "EN"),
        ));
        assert_eq!(
            canonicalize_graph(&tagged).to_bytes(),
            canonicalize_graph(&mixed_case).to_bytes(),
            "{value}"
        );
    }
}

#[test]
fn round_cap_is_reported() {
    let triples: Vec<Triple> = (0..30)
        .map(|i| {
            Triple::new(
                Term::blank(format!("n{}", i)),
                p("next"),
                Term::blank(format!("n{}", i + 1)),
            )
        })
        .collect();

    let capped = GraphCanonicalizer::new().with_max_rounds(2).canonicalize(&triples);
    assert_eq!(capped.rounds, 2);
    assert!(capped.approximate);
}

#[test]
fn literal_forms_are_normalized() {
    let triples = vec![
        Triple::new(
            Term::iri(p("s")),
            p("label"),
            Term::typed("plain", "http://www.w3.org/2001/XMLSchema#string"),
        ),
        Triple::new(Term::iri(p("s")), p("title"), Term::lang("Hallo", "DE-at")),
        Triple::new(Term::iri(p("s")), p("note"), Term::literal("line\n\"quoted\"")),
    ];

    let graph = canonicalize_graph(&triples);
    assert_eq!(
        graph.triples,
        vec![
            r#"<http://example.org/s> <http://example.org/label> "plain" ."#.to_string(),
            r#"<http://example.org/s> <http://example.org/note> "line\n\"quoted\"" ."#.to_string(),
            r#"<http://example.org/s> <http://example.org/title> "Hallo"@de-at ."#.to_string(),
        ]
    );
}

#[test]
fn parsed_documents_canonicalize_like_built_triples() {
    let document = r#"
# a person and an address
_:p1 <http://example.org/name> "Alice" .
_:p1 <http://example.org/address> _:h9 .
_:h9 <http://example.org/city> "Paris" .
<http://example.org/doc> <http://example.org/about> _:p1 . # trailing comment
"#;

    let parsed = parse_ntriples(document).unwrap();
    assert_eq!(parsed.len(), 4);
    assert_eq!(
        canonicalize_graph(&parsed).triples,
        canonicalize_graph(&person_graph("x", "y")).triples
    );
}

#[test]
fn parser_reports_positions() {
    let err = parse_ntriples("<http://example.org/s> <http://example.org/p> \"open").unwrap_err();
    assert_eq!(err.line, 1);
    assert!(err.message.contains("unterminated"));

    let err = parse_ntriples("\n\"literal\" <http://example.org/p> <http://example.org/o> .")
        .unwrap_err();
    assert_eq!(err.line, 2);
    assert_eq!(err.column, 1);
}

#[test]
fn parser_reads_escapes_and_datatypes() {
    let parsed = parse_ntriples(
        r#"<http://example.org/s> <http://example.org/p> "café\t"^^<http://example.org/dt> ."#,
    )
    .unwrap();
    assert_eq!(
        parsed[0].object,
        Term::typed("café\t", "http://example.org/dt")
    );
}

#[test]
fn canonical_graph_serializes_to_json() {
    let graph = canonicalize_graph(&person_graph("x", "y"));
    let json = serde_json::to_value(&graph).unwrap();
    assert_eq!(json["rounds"], graph.rounds);
    assert_eq!(json["approximate"], false);
    assert_eq!(json["triples"].as_array().unwrap().len(), 4);
}
