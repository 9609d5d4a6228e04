use std::collections::BTreeSet;

const API_MOD_SOURCE: &str = include_str!("../src/api/mod.rs");
const DOCS_SOURCE: &str = include_str!("../src/api/docs.rs");
const MAIN_SOURCE: &str = include_str!("../src/main.rs");
const ERROR_SOURCE: &str = include_str!("../src/error.rs");

#[test]
fn rest_contract_declares_docs_endpoint_matrix() {
    let expected_paths = ["/healthz", "/docs", "/docs/{id}", "/docs/{id}/events"];

    let contract_surface = [API_MOD_SOURCE, MAIN_SOURCE].join("\n");

    let mut missing = BTreeSet::new();
    for path in expected_paths {
        if !contract_surface.contains(&format!("\"{path}\"")) {
            missing.insert(path);
        }
    }

    assert!(missing.is_empty(), "missing route declarations for: {missing:?}");
}

#[test]
fn rest_contract_declares_expected_http_method_bindings() {
    let expectations = [
        (MAIN_SOURCE, "/healthz", &["get(healthz)"][..]),
        (API_MOD_SOURCE, "\"/docs\"", &["get(docs::list_docs::<S>)"][..]),
        (API_MOD_SOURCE, "\"/docs/{id}\"", &["get(docs::get_doc::<S>)"][..]),
        (
            API_MOD_SOURCE,
            "\"/docs/{id}/events\"",
            &["get(docs::poll_events::<S>)", ".post(docs::submit_events::<S>)"][..],
        ),
    ];

    for (source, endpoint, required_tokens) in expectations {
        assert!(source.contains(endpoint), "route `{endpoint}` must exist");
        for token in required_tokens {
            assert!(source.contains(token), "route `{endpoint}` must include token `{token}`");
        }
    }
}

#[test]
fn rest_contract_wire_names_match_clients() {
    for token in ["\"commentVersion\"", "ValidatedJson<SubmitEventsRequest<S>>"] {
        assert!(DOCS_SOURCE.contains(token), "docs handlers must use `{token}`");
    }
}

#[test]
fn rest_contract_error_codes_are_stable() {
    for code in [
        "\"VALIDATION_FAILED\"",
        "\"NOT_FOUND\"",
        "\"VERSION_CONFLICT\"",
        "\"HISTORY_GONE\"",
        "\"PAYLOAD_TOO_LARGE\"",
        "\"INTERNAL_ERROR\"",
    ] {
        assert!(ERROR_SOURCE.contains(code), "error taxonomy must include {code}");
    }
}

#[test]
fn rest_contract_handlers_run_on_the_connection_task() {
    assert!(MAIN_SOURCE.contains("CatchPanicLayer::custom(panic_response)"));
    assert!(
        !MAIN_SOURCE.contains("tokio::spawn"),
        "handlers must not be detached from their connection, or dropped polls stay parked"
    );
}
