use kgen_canonical::{hash_bytes, hash_value, Canonicalizer, CanonicalValue, DigestAlg};
use kgen_render::{
    ConstructCategory, FunctionDef, FunctionTable, RenderError, Renderer, Template,
};
use serde_json::json;

fn render(template: &str, context: &serde_json::Value) -> Result<String, RenderError> {
    Renderer::default()
        .render(template, context)
        .map(|bytes| String::from_utf8(bytes).unwrap())
}

#[test]
fn substitution_is_identical_across_runs() {
    let context = json!({"z": "3", "a": "1"});
    let renderer = Renderer::default();
    let first = renderer.render("{{ z }}-{{ a }}", &context).unwrap();
    assert_eq!(first, b"3-1".to_vec());

    for _ in 0..100 {
        assert_eq!(renderer.render("{{ z }}-{{ a }}", &context).unwrap(), first);
    }
}

#[test]
fn rendering_is_identical_across_threads() {
    let context = json!({"title": "Report", "tags": ["x", "b", "m"], "meta": {"b": 1, "a": 2}});
    let template = "{{ title | upper }}: {{ tags | sort | join(\",\") }} {{ meta | json }}";
    let expected = render(template, &context).unwrap();
    assert_eq!(expected, r#"REPORT: b,m,x {"a":2,"b":1}"#);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| render(template, &context).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn time_functions_are_rejected_before_output() {
    let err = render("generated {{ now() }}", &json!({})).unwrap_err();
    assert_eq!(
        err,
        RenderError::NonDeterministicConstruct {
            name: "now".into(),
            category: ConstructCategory::Time,
            offset: 13,
        }
    );
}

#[test]
fn randomness_and_environment_are_rejected_in_any_position() {
    let context = json!({"items": [1, 2], "name": "x"});

    for (template, category) in [
        ("{{ items | shuffle }}", ConstructCategory::Randomness),
        ("{{ uuid() }}", ConstructCategory::Randomness),
        ("{{ name | default(random()) }}", ConstructCategory::Randomness),
        ("{{ env(\"HOME\") }}", ConstructCategory::Environment),
        ("{{ name }} then {{ hostname() }}", ConstructCategory::Environment),
        ("{{ items | sort | timestamp }}", ConstructCategory::Time),
    ] {
        for _ in 0..100 {
            match render(template, &context) {
                Err(RenderError::NonDeterministicConstruct { category: got, .. }) => {
                    assert_eq!(got, category, "{template}")
                }
                other => panic!("{template}: expected rejection, got {other:?}"),
            }
        }
    }
}

#[test]
fn unknown_functions_are_not_executable() {
    let err = render("{{ frobnicate(x) }}", &json!({"x": 1})).unwrap_err();
    assert!(matches!(err, RenderError::UnknownFunction { ref name, .. } if name == "frobnicate"));
}

#[test]
fn undefined_variables_fail_unless_defaulted() {
    let err = render("{{ missing.field }}", &json!({})).unwrap_err();
    assert_eq!(
        err,
        RenderError::UndefinedVariable {
            path: "missing.field".into(),
            offset: 3,
        }
    );
    assert_eq!(
        render("{{ missing | default('n/a') }}", &json!({})).unwrap(),
        "n/a"
    );
}

#[test]
fn get_reads_paths_from_the_context() {
    let context = json!({"user": {"name": "Ada", "roles": ["admin"]}});
    assert_eq!(
        render(r#"{{ get("user.name", "anon") }}"#, &context).unwrap(),
        "Ada"
    );
    assert_eq!(
        render(r#"{{ get("user.email", "anon") }}"#, &context).unwrap(),
        "anon"
    );
    assert_eq!(
        render(r#"{{ user | get("roles[0]") }}"#, &context).unwrap(),
        "admin"
    );
    assert_eq!(render("{{ user.roles[0] | upper }}", &context).unwrap(), "ADMIN");
}

#[test]
fn sort_by_orders_records_by_field() {
    let context = json!({"people": [{"name": "b", "age": 30}, {"name": "a", "age": 25}]});
    assert_eq!(
        render(r#"{{ people | sort_by("age") | json }}"#, &context).unwrap(),
        r#"[{"age":25,"name":"a"},{"age":30,"name":"b"}]"#
    );
}

#[test]
fn keys_and_length_reflect_canonical_order() {
    let context = json!({"config": {"z": 1, "a": 2}, "items": [1, 2, 3]});
    assert_eq!(
        render(r#"{{ config | keys | join(",") }}/{{ items | length }}"#, &context).unwrap(),
        "a,z/3"
    );
}

#[test]
fn stable_hash_matches_the_content_hasher() {
    let data = json!({"b": [1, 2], "a": "x"});
    let rendered = render("{{ data | stable_hash }}", &json!({ "data": data })).unwrap();
    assert_eq!(rendered, hash_value(&data).unwrap().digest);
}

#[test]
fn scalar_values_render_as_text() {
    let context = json!({"n": 2.0, "f": 0.5, "b": true, "z": null, "s": "plain"});
    assert_eq!(
        render("[{{ n }}|{{ f }}|{{ b }}|{{ z }}|{{ s }}]", &context).unwrap(),
        "[2|0.5|true||plain]"
    );
}

#[test]
fn primary_calls_take_their_first_argument_as_input() {
    let context = json!({"name": "  Ada  "});
    assert_eq!(render("{{ upper(trim(name)) }}", &context).unwrap(), "ADA");
    assert_eq!(render("{{ 'Lit' | lower }}", &context).unwrap(), "lit");
}

#[test]
fn output_whitespace_is_normalized() {
    let context = json!({"a": "x"});
    assert_eq!(
        render("line {{ a }}   \r\nsecond\t\rthird\n", &context).unwrap(),
        "line x\nsecond\nthird\n"
    );
    assert_eq!(render("no trailing newline", &context).unwrap(), "no trailing newline");
}

#[test]
fn comments_are_dropped() {
    assert_eq!(render("a{# note {{ now() }} #}b", &json!({})).unwrap(), "ab");
}

#[test]
fn syntax_errors_report_offsets() {
    assert!(matches!(
        render("{{ name ", &json!({"name": 1})),
        Err(RenderError::Syntax { offset: 8, .. })
    ));
    assert!(matches!(
        render("{# open", &json!({})),
        Err(RenderError::Syntax { offset: 0, .. })
    ));
}

#[test]
fn arity_is_checked_while_parsing() {
    let err = render(r#"{{ tags | join(",", "x") }}"#, &json!({"tags": []})).unwrap_err();
    assert!(matches!(err, RenderError::InvalidArgument { ref function, .. } if function == "join"));
}

#[test]
fn type_errors_name_the_function() {
    let err = render("{{ n | upper }}", &json!({"n": 3})).unwrap_err();
    assert_eq!(
        err,
        RenderError::InvalidArgument {
            function: "upper".into(),
            message: "expected string, found number".into(),
        }
    );
}

#[test]
fn ignored_context_fields_are_invisible() {
    let renderer = Renderer::default()
        .with_canonicalizer(Canonicalizer::default().with_ignored_fields(["generated_at"]));
    let context = json!({"generated_at": "2026-01-01T00:00:00Z", "name": "r"});
    let out = renderer
        .render("{{ name }} {{ generated_at | default(\"-\") }}", &context)
        .unwrap();
    assert_eq!(out, b"r -".to_vec());
}

#[test]
fn render_with_cid_hashes_the_output() {
    let (bytes, cid) = Renderer::default()
        .render_with_cid("{{ a }}", &json!({"a": "1"}), DigestAlg::Sha256)
        .unwrap();
    assert_eq!(bytes, b"1".to_vec());
    assert_eq!(cid, hash_bytes(b"1", DigestAlg::Sha256));
}

#[test]
fn custom_tables_limit_what_templates_can_call() {
    fn reverse(
        input: &CanonicalValue,
        _args: &[CanonicalValue],
    ) -> Result<CanonicalValue, String> {
        match input {
            CanonicalValue::String(s) => Ok(CanonicalValue::String(s.chars().rev().collect())),
            other => Err(format!("expected string, found {}", other.kind())),
        }
    }

    let mut table = FunctionTable::empty();
    table.register(FunctionDef::new("reverse", 0, 0, reverse)).unwrap();
    let renderer = Renderer::new(table);

    assert_eq!(
        renderer.render("{{ w | reverse }}", &json!({"w": "abc"})).unwrap(),
        b"cba".to_vec()
    );
    assert!(matches!(
        renderer.render("{{ w | upper }}", &json!({"w": "abc"})),
        Err(RenderError::UnknownFunction { .. })
    ));
}

#[test]
fn compiled_templates_can_be_reused() {
    let renderer = Renderer::default();
    let template = renderer.compile("{{ a }}+{{ b }}").unwrap();
    assert_eq!(template.substitutions(), 2);
    assert_eq!(
        renderer.render_compiled(&template, &json!({"a": 1, "b": 2})).unwrap(),
        b"1+2".to_vec()
    );
}

#[test]
fn templates_compiled_against_another_table_fail_cleanly() {
    fn identity(input: &CanonicalValue, _args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
        Ok(input.clone())
    }

    let mut table = FunctionTable::empty();
    for name in ["sort_by", "default", "get"] {
        table.register(FunctionDef::new(name, 0, 0, identity)).unwrap();
    }
    let context = json!({"xs": [{"k": 2}, {"k": 1}]});
    let renderer = Renderer::default();

    for source in ["{{ xs | sort_by }}", "{{ xs | default }}", "{{ xs | get }}"] {
        let template = Template::parse(source, &table).unwrap();
        assert!(matches!(
            renderer.render_compiled(&template, &context),
            Err(RenderError::InvalidArgument { .. })
        ));
    }
}
