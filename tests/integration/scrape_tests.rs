//! End-to-end scrape runs against the mock marketplace

use crate::harness::{CountingProvider, FlakyPhones, Market};
use ad_harvest::scraper::{RunOutcome, Scraper};
use ad_harvest::state::{ItemStore, ProgressStore};
use ad_harvest::ScrapeError;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn completed_ids(outcome: &RunOutcome) -> Vec<u64> {
    match outcome {
        RunOutcome::Completed(items) => items.iter().map(|item| item.id).collect(),
        RunOutcome::Stopped => panic!("run stopped instead of completing"),
    }
}

#[tokio::test]
async fn test_full_run_deduplicates_and_exports() {
    let market = Market::start().await;
    market.serve_results(vec![vec![1, 2], vec![2, 3]]).await;
    market.serve_offer(1, 5, Some(1)).await;
    market.serve_offer(2, 5, Some(1)).await;
    market.serve_offer(3, 5, Some(1)).await;

    let config = market.config(false);
    let provider = CountingProvider::default();
    let mut scraper = market.scraper(config, provider.clone(), CancellationToken::new());

    scraper.init().await.unwrap();
    let outcome = scraper.execute().await.unwrap();

    assert_eq!(completed_ids(&outcome), vec![1, 2, 3]);
    if let RunOutcome::Completed(items) = &outcome {
        assert_eq!(items[0].category, "Hobby >> Bikes");
        assert_eq!(items[0].state, "Used");
        assert_eq!(items[0].contact_phones, "N/A");
        assert_eq!(items[0].description, "Rideit");
    }

    let progress = ProgressStore::load(&market.file("progress.json")).unwrap();
    assert_eq!(progress.progress().cursor(), (0, 1, 1));

    let snapshot = ItemStore::load(&market.file("items.json")).unwrap();
    assert_eq!(snapshot.len(), 3);

    let csv = std::fs::read_to_string(market.file("items.csv")).unwrap();
    assert_eq!(csv.matches("\r\n").count(), 4);
    assert!(market.file("items.db").exists());
    assert_eq!(provider.login_count(), 1);
}

#[tokio::test]
async fn test_stop_request_then_resume() {
    let market = Market::start().await;
    market.serve_results(vec![vec![1], vec![2]]).await;
    market.serve_offer(1, 5, Some(1)).await;
    market.serve_offer(2, 5, Some(1)).await;

    // Stop is requested before the run even starts; it is honored after page 1
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut first = market.scraper(market.config(false), CountingProvider::default(), cancel);
    first.init().await.unwrap();
    assert_eq!(first.execute().await.unwrap(), RunOutcome::Stopped);

    let progress = ProgressStore::load(&market.file("progress.json")).unwrap();
    assert_eq!(progress.progress().cursor(), (0, 0, 2));
    let snapshot = ItemStore::load(&market.file("items.json")).unwrap();
    assert_eq!(snapshot.items().iter().map(|i| i.id).collect::<Vec<_>>(), vec![1]);
    assert!(!market.file("items.csv").exists());

    let mut second = market.scraper(
        market.config(false),
        CountingProvider::default(),
        CancellationToken::new(),
    );
    second.init().await.unwrap();
    let outcome = second.execute().await.unwrap();

    assert_eq!(completed_ids(&outcome), vec![1, 2]);
    assert!(market.file("items.csv").exists());
}

#[tokio::test]
async fn test_rate_limited_phones_refresh_token_each_time() {
    let market = Market::start().await;
    market.serve_results(vec![vec![7]]).await;
    market.serve_offer_with_phone(7).await;
    market
        .serve_phones(
            7,
            FlakyPhones {
                failures: 3,
                seen: AtomicUsize::new(0),
                phones: vec!["050 123 45 67", "(067) 111-22-33"],
            },
        )
        .await;

    // 429 is handled by the token refresh loop, never by the request retries
    let mut config = market.config(false);
    config.http.max_retries = 3;

    let provider = CountingProvider::default();
    let cancel = CancellationToken::new();
    let mut scraper = market.scraper(config, provider.clone(), cancel);
    scraper.init().await.unwrap();
    let outcome = scraper.execute().await.unwrap();

    match &outcome {
        RunOutcome::Completed(items) => {
            assert_eq!(items[0].contact_phones, "+380501234567, +380671112233")
        }
        RunOutcome::Stopped => panic!("run stopped"),
    }

    let phone_requests = market
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/api/offers/7/phones")
        .count();
    assert_eq!(phone_requests, 4);
    assert_eq!(provider.login_count(), 1);
    assert_eq!(provider.relogin_count(), 3);

    // Three rotations over two accounts, each checkpointed
    let progress = ProgressStore::load(&market.file("progress.json")).unwrap();
    assert_eq!(progress.progress().account_index, 1);
}

#[tokio::test]
async fn test_stop_request_cuts_forbidden_cooldown_short() {
    let market = Market::start().await;
    market.serve_results(vec![vec![7]]).await;
    market.serve_offer_with_phone(7).await;
    Mock::given(method("GET"))
        .and(path("/api/offers/7/phones"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&market.server)
        .await;

    let mut config = market.config(false);
    config.rate_limit.forbidden_cooldown_secs = 3600;

    let cancel = CancellationToken::new();
    let mut scraper = market.scraper(config, CountingProvider::default(), cancel.clone());
    scraper.init().await.unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });
    let outcome = tokio::time::timeout(Duration::from_secs(30), scraper.execute())
        .await
        .expect("stop request did not interrupt the cooldown")
        .unwrap();

    assert_eq!(outcome, RunOutcome::Stopped);
    let progress = ProgressStore::load(&market.file("progress.json")).unwrap();
    assert_eq!(progress.progress().cursor(), (0, 0, 1));
    assert!(!market.file("items.json").exists());
    assert!(!market.file("items.csv").exists());
}

#[tokio::test]
async fn test_anonymous_tier_uses_cookie_token() {
    let market = Market::start().await;
    market.serve_landing().await;
    market.serve_results(vec![vec![7]]).await;
    market.serve_unprotected_offer(7).await;
    Mock::given(method("GET"))
        .and(path("/api/offers/7/phones"))
        .and(header("Authorization", "Bearer anon-cookie"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": {"phones": ["050 123 45 67"]}})),
        )
        .expect(1)
        .mount(&market.server)
        .await;

    let provider = CountingProvider {
        anonymous_cookie: Some("anon-cookie".to_string()),
        ..Default::default()
    };
    let mut scraper = market.scraper_with_anonymous(
        market.config(false),
        provider.clone(),
        CancellationToken::new(),
    );
    scraper.init().await.unwrap();
    let outcome = scraper.execute().await.unwrap();

    match &outcome {
        RunOutcome::Completed(items) => assert_eq!(items[0].contact_phones, "+380501234567"),
        RunOutcome::Stopped => panic!("run stopped"),
    }
    assert_eq!(
        provider.visits(),
        vec![(
            format!("{}/item/bike-ID7.html", market.server.uri()),
            "socks5://unused".to_string()
        )]
    );
    assert_eq!(provider.login_count(), 1);
}

#[tokio::test]
async fn test_blocked_results_page_keeps_cursor() {
    let market = Market::start().await;
    market.serve_results_blocking(vec![vec![1], vec![2]], Some(2)).await;
    market.serve_offer(1, 5, Some(1)).await;
    market.serve_offer(2, 5, Some(0)).await;

    let mut scraper = market.scraper(
        market.config(false),
        CountingProvider::default(),
        CancellationToken::new(),
    );
    scraper.init().await.unwrap();
    let result = scraper.execute().await;

    assert!(matches!(result, Err(ScrapeError::Parse(_))));
    let progress = ProgressStore::load(&market.file("progress.json")).unwrap();
    assert_eq!(progress.progress().cursor(), (0, 0, 2));
    let snapshot = ItemStore::load(&market.file("items.json")).unwrap();
    assert_eq!(snapshot.items().iter().map(|i| i.id).collect::<Vec<_>>(), vec![1]);
    assert!(!market.file("items.csv").exists());
}

#[tokio::test]
async fn test_gone_items_are_skipped() {
    let market = Market::start().await;
    market.serve_results(vec![vec![1, 2, 3]]).await;
    market.serve_offer(1, 5, None).await;
    market.serve_offer_status(2, 404).await;
    market.serve_offer_status(3, 410).await;

    let mut scraper = market.scraper(
        market.config(false),
        CountingProvider::default(),
        CancellationToken::new(),
    );
    scraper.init().await.unwrap();
    let outcome = scraper.execute().await.unwrap();

    assert_eq!(completed_ids(&outcome), vec![1]);
}

#[tokio::test]
async fn test_unresolvable_category_is_fatal() {
    let market = Market::start().await;
    market.serve_results(vec![vec![1]]).await;
    market.serve_offer(1, 42, None).await;

    let mut scraper = market.scraper(
        market.config(false),
        CountingProvider::default(),
        CancellationToken::new(),
    );
    scraper.init().await.unwrap();
    let result = scraper.execute().await;

    assert!(matches!(result, Err(ScrapeError::Category(_))));
    let progress = ProgressStore::load(&market.file("progress.json")).unwrap();
    assert_eq!(progress.progress().cursor(), (0, 0, 1));
    assert!(!market.file("items.json").exists());
}

#[tokio::test]
async fn test_restart_after_fatal_error() {
    let market = Market::start().await;
    market.serve_results(vec![vec![1]]).await;
    Mock::given(method("GET"))
        .and(path("/api/offers/1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&market.server)
        .await;
    market.serve_offer(1, 5, None).await;

    let mut scraper = market.scraper(
        market.config(true),
        CountingProvider::default(),
        CancellationToken::new(),
    );
    scraper.init().await.unwrap();
    let outcome = scraper.execute().await.unwrap();

    assert_eq!(completed_ids(&outcome), vec![1]);
}

#[tokio::test]
async fn test_reset_progress_discards_saved_state() {
    let market = Market::start().await;
    let config = market.config(false);

    let mut progress = ProgressStore::load(&market.file("progress.json")).unwrap();
    progress.advance_page().unwrap();
    progress.advance_page().unwrap();
    std::fs::write(market.file("items.json"), "[]").unwrap();

    let kept = Scraper::from_config(
        config.clone(),
        vec![market.search_link()],
        CancellationToken::new(),
        false,
    )
    .await
    .unwrap();
    assert_eq!(kept.context().progress.progress().page, 3);

    let reset = Scraper::from_config(
        config,
        vec![market.search_link()],
        CancellationToken::new(),
        true,
    )
    .await
    .unwrap();
    assert_eq!(reset.context().progress.progress().cursor(), (0, 0, 1));
    assert!(!market.file("progress.json").exists());
    assert!(!market.file("items.json").exists());
}
