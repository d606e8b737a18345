use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use serde_json::json;

use super::*;
use crate::api::STOCK_ALERTS_PATH;
use crate::ledger::{DEFAULT_NOTIFICATIONS_KEY, SystemClock};
use crate::store::{FileBackend, LogNotice, Store};
use crate::test_support::{client, dead_base_url, spawn_router};

const TICK: Duration = Duration::from_millis(25);
/// Long enough that a test observes every tick of a scripted server.
const SLOW_TICK: Duration = Duration::from_millis(200);
const WAIT: Duration = Duration::from_secs(5);

fn local_ledger() -> Ledger {
    Ledger::new(Store::in_memory(), DEFAULT_NOTIFICATIONS_KEY, Arc::new(SystemClock))
}

/// Wait until a feed with at least `ticks` refreshes is published.
async fn feed_after(rx: &mut watch::Receiver<Feed>, ticks: u64) -> Feed {
    tokio::time::timeout(WAIT, rx.wait_for(|feed| feed.ticks >= ticks))
        .await
        .expect("timed out waiting for feed")
        .expect("poller stopped early")
        .clone()
}

/// Wait until the poller task has dropped its sender.
async fn wait_closed(rx: &mut watch::Receiver<Feed>) -> bool {
    tokio::time::timeout(WAIT, async {
        while rx.changed().await.is_ok() {}
    })
    .await
    .is_ok()
}

fn messages(feed: &Feed) -> Vec<&str> {
    feed.sorted().iter().map(|item| item.message.as_str()).collect()
}

/// Fake endpoint answering with `responses[n]` on the n-th call, repeating
/// the last one afterwards. `None` answers 500.
fn scripted_alerts(responses: Vec<Option<serde_json::Value>>) -> Router {
    let calls = Arc::new(AtomicUsize::new(0));
    let responses = Arc::new(responses);
    Router::new().route(
        STOCK_ALERTS_PATH,
        get(move || {
            let calls = calls.clone();
            let responses = responses.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst).min(responses.len() - 1);
                match &responses[n] {
                    Some(body) => Json(body.clone()).into_response(),
                    None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                }
            }
        }),
    )
}

// =============================================================================
// local mode
// =============================================================================

#[tokio::test]
async fn local_first_refresh_is_immediate() {
    let ledger = local_ledger();
    ledger.add("Estoque baixo: Parafuso");

    let poller = spawn(Source::Local(ledger), Duration::from_secs(3600));
    let mut rx = poller.subscribe();
    let feed = feed_after(&mut rx, 1).await;

    assert_eq!(messages(&feed), vec!["Estoque baixo: Parafuso"]);
    assert_eq!(feed.badge_count(), 1);
    poller.shutdown().await;
}

#[tokio::test]
async fn local_feed_follows_ledger_changes() {
    let ledger = local_ledger();
    let poller = spawn(Source::Local(ledger.clone()), TICK);
    let mut rx = poller.subscribe();

    assert!(feed_after(&mut rx, 1).await.is_empty());

    ledger.add("Correia");
    let feed = tokio::time::timeout(WAIT, rx.wait_for(|feed| feed.badge_count() == 1))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(messages(&feed), vec!["Correia"]);

    ledger.clear();
    tokio::time::timeout(WAIT, rx.wait_for(Feed::is_empty)).await.unwrap().unwrap();
    poller.shutdown().await;
}

#[tokio::test]
async fn local_feed_reads_file_backed_ledger() {
    let path = std::env::temp_dir().join(format!("stock-alerts-poller-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let store = Store::new(Arc::new(FileBackend::new(&path, None)), Arc::new(LogNotice));
    let ledger = Ledger::new(store, DEFAULT_NOTIFICATIONS_KEY, Arc::new(SystemClock));
    ledger.add("Estoque baixo: Rolamento");

    let poller = spawn(Source::Local(ledger), Duration::from_secs(3600));
    let mut rx = poller.subscribe();
    let feed = feed_after(&mut rx, 1).await;

    assert_eq!(messages(&feed), vec!["Estoque baixo: Rolamento"]);
    poller.shutdown().await;
    let _ = std::fs::remove_file(&path);
}

// =============================================================================
// remote mode
// =============================================================================

#[tokio::test]
async fn remote_feed_uses_server_alerts() {
    let router = scripted_alerts(vec![Some(json!([
        {"id": 2, "nome_peca": "Correia", "mensagem": "Peça 'Correia' abaixo do mínimo (1 un. restantes)", "qtd_min": 3},
        {"id": 1, "mensagem": "Peça 'Parafuso' abaixo do mínimo (0 un. restantes)"}
    ]))]);
    let api = client(&spawn_router(router).await);

    let poller = spawn(Source::Remote(api), TICK);
    let mut rx = poller.subscribe();
    let feed = feed_after(&mut rx, 1).await;

    assert_eq!(feed.badge_count(), 2);
    assert_eq!(feed.sorted()[0].id, 1);
    assert_eq!(feed.sorted()[1].part_name.as_deref(), Some("Correia"));
    poller.shutdown().await;
}

#[tokio::test]
async fn remote_feed_is_replaced_wholesale() {
    let router = scripted_alerts(vec![
        Some(json!([{"id": 1, "mensagem": "A"}, {"id": 2, "mensagem": "B"}])),
        Some(json!([{"id": 3, "mensagem": "C"}])),
    ]);
    let api = client(&spawn_router(router).await);

    let poller = spawn(Source::Remote(api), SLOW_TICK);
    let mut rx = poller.subscribe();

    assert_eq!(messages(&feed_after(&mut rx, 1).await), vec!["A", "B"]);
    assert_eq!(messages(&feed_after(&mut rx, 2).await), vec!["C"]);
    poller.shutdown().await;
}

#[tokio::test]
async fn remote_failure_resets_feed_to_empty() {
    let router = scripted_alerts(vec![Some(json!([{"id": 1, "mensagem": "A"}])), None]);
    let api = client(&spawn_router(router).await);

    let poller = spawn(Source::Remote(api), SLOW_TICK);
    let mut rx = poller.subscribe();

    assert_eq!(feed_after(&mut rx, 1).await.badge_count(), 1);
    let after_failure = feed_after(&mut rx, 2).await;
    assert!(after_failure.is_empty());
    poller.shutdown().await;
}

#[tokio::test]
async fn remote_unreachable_keeps_polling_with_empty_feed() {
    let api = client(&dead_base_url().await);

    let poller = spawn(Source::Remote(api), TICK);
    let mut rx = poller.subscribe();

    let feed = feed_after(&mut rx, 3).await;
    assert!(feed.is_empty());
    poller.shutdown().await;
}

// =============================================================================
// lifetime
// =============================================================================

#[tokio::test]
async fn shutdown_stops_publishing() {
    let poller = spawn(Source::Local(local_ledger()), TICK);
    let mut rx = poller.subscribe();
    feed_after(&mut rx, 1).await;

    tokio::time::timeout(WAIT, poller.shutdown()).await.unwrap();

    assert!(wait_closed(&mut rx).await);
}

#[tokio::test]
async fn dropping_handle_aborts_task() {
    let ledger = local_ledger();
    let poller = spawn(Source::Local(ledger), TICK);
    let mut rx = poller.subscribe();
    feed_after(&mut rx, 1).await;

    drop(poller);

    assert!(wait_closed(&mut rx).await);
}

#[tokio::test]
async fn current_reflects_latest_feed() {
    let ledger = local_ledger();
    ledger.add("A");
    let poller = spawn(Source::Local(ledger), Duration::from_secs(3600));
    let mut rx = poller.subscribe();
    feed_after(&mut rx, 1).await;

    assert_eq!(poller.current().ticks, 1);
    assert_eq!(poller.current().badge_count(), 1);
    poller.shutdown().await;
}
