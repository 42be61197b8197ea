use serde_json::json;

use up_print_core::config::GraphConfig;
use up_print_core::contract::{GraphResponse, MockGraphTransport, TransportError};
use up_print_core::error::PrintError;
use up_print_core::share::ShareResolver;

fn share(id: &str, printer_id: &str) -> serde_json::Value {
    json!({"id": id, "displayName": format!("Share {id}"), "printer": {"id": printer_id}})
}

#[tokio::test(start_paused = true)]
async fn shares_of_other_printers_only_exhaust_all_attempts() {
    let mut transport = MockGraphTransport::new();
    transport.expect_get().times(3).returning(|url, _| {
        assert!(url.ends_with("/print/shares?$expand=printer"));
        Ok(GraphResponse::json_body(
            200,
            json!({"value": [share("s1", "other-a"), share("s2", "other-b")]}),
        ))
    });
    let config = GraphConfig::default();
    let resolver = ShareResolver::new(&transport, &config);

    let started = tokio::time::Instant::now();
    let shares = resolver.discover_shares_for_printer("p1").await;

    assert!(shares.is_empty());
    // Two backoffs between three attempts.
    assert_eq!(started.elapsed(), config.share_discovery.backoff * 2);
}

#[tokio::test(start_paused = true)]
async fn single_matching_share_is_returned_and_cached() {
    let mut transport = MockGraphTransport::new();
    transport.expect_get().times(1).returning(|_, _| {
        Ok(GraphResponse::json_body(
            200,
            json!({"value": [share("s1", "other"), share("s2", "P1")]}),
        ))
    });
    let config = GraphConfig::default();
    let resolver = ShareResolver::new(&transport, &config);

    let first = resolver.discover_shares_for_printer("p1").await;
    let second = resolver.discover_shares_for_printer("p1").await;

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, "s2");
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn failures_are_retried_and_never_raised() {
    let mut transport = MockGraphTransport::new();
    let mut calls = 0;
    transport.expect_get().times(3).returning(move |_, timeout| {
        calls += 1;
        match calls {
            1 => Err(TransportError::Timeout(timeout)),
            2 => Ok(GraphResponse::json_body(
                403,
                json!({"error": {"code": "Forbidden", "message": "denied"}}),
            )),
            _ => Ok(GraphResponse::json_body(200, json!({"value": [share("s9", "p1")]}))),
        }
    });
    let config = GraphConfig::default();
    let resolver = ShareResolver::new(&transport, &config);

    let shares = resolver.discover_shares_for_printer("p1").await;
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].id, "s9");
}

#[tokio::test]
async fn listing_follows_next_link() {
    let mut transport = MockGraphTransport::new();
    transport.expect_get().times(2).returning(|url, _| {
        if url.contains("skiptoken") {
            Ok(GraphResponse::json_body(200, json!({"value": [share("s2", "p1")]})))
        } else {
            Ok(GraphResponse::json_body(
                200,
                json!({
                    "value": [share("s1", "p1")],
                    "@odata.nextLink": "https://graph.microsoft.com/v1.0/print/shares?$skiptoken=abc"
                }),
            ))
        }
    });
    let config = GraphConfig::default();
    let resolver = ShareResolver::new(&transport, &config);

    let ids: Vec<String> = resolver
        .discover_shares_for_printer("p1")
        .await
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["s1", "s2"]);
}

#[tokio::test]
async fn explicit_share_lookup_maps_not_found() {
    let mut transport = MockGraphTransport::new();
    transport.expect_get().times(1).returning(|url, _| {
        assert!(url.contains("/print/shares/missing"));
        Ok(GraphResponse::json_body(
            404,
            json!({"error": {"code": "itemNotFound", "message": "no such share"}}),
        ))
    });
    let config = GraphConfig::default();
    let resolver = ShareResolver::new(&transport, &config);

    match resolver.get_share("missing").await {
        Err(PrintError::ShareNotFound(message)) => {
            assert_eq!(message, "Get share failed: 404 code=itemNotFound message=no such share")
        }
        other => panic!("expected ShareNotFound, got {other:?}"),
    }
}
