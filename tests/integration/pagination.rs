use crate::{crawl_settings, listing_page, mount_listing_page, query, TYPOLOGY};
use imoscout_core::{MetricsRecorder, StopPolicy};
use imoscout_scrapers::{CrawlOutcome, FetchError, ImovirtualScraper, Scraper, StopReason, Termination};
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_crawl_stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[("T1 Alfama", "/pt/anuncio/t1-alfama"), ("T2 Graça", "/pt/anuncio/t2-graca")], None)).await;
    mount_listing_page(&server, 2, listing_page(&[("T3 Belém", "/pt/anuncio/t3-belem")], None)).await;
    mount_listing_page(&server, 3, listing_page(&[], None)).await;

    let scraper = ImovirtualScraper::new(crawl_settings(false, StopPolicy::EmptyPage)).unwrap();
    let outcome = scraper.scrape_listing(query(&server), None).await;

    assert!(outcome.is_clean());
    assert_eq!(outcome.termination, Termination::Clean(StopReason::EmptyPage));
    assert_eq!(outcome.pages_fetched, 3);
    assert_eq!(outcome.stubs.len(), 3);
    assert_eq!(
        outcome.stubs[0].link.as_str(),
        format!("{}/pt/anuncio/t1-alfama", server.uri())
    );
}

#[tokio::test]
async fn test_crawl_stops_on_repeated_page() {
    let server = MockServer::start().await;
    let last = listing_page(&[("Moradia Sintra", "/pt/anuncio/sintra")], None);
    mount_listing_page(&server, 1, listing_page(&[("T1 Porto", "/pt/anuncio/porto")], None)).await;
    mount_listing_page(&server, 2, last.clone()).await;
    mount_listing_page(&server, 3, last).await;

    let scraper = ImovirtualScraper::new(crawl_settings(false, StopPolicy::RepeatPage)).unwrap();
    let outcome = scraper.scrape_listing(query(&server), None).await;

    assert_eq!(outcome.termination, Termination::Clean(StopReason::RepeatedPage));
    let titles: Vec<&str> = outcome.stubs.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["T1 Porto", "Moradia Sintra"]);
}

#[tokio::test]
async fn test_probe_reads_pagination_widget() {
    let server = MockServer::start().await;
    mount_listing_page(
        &server,
        1,
        listing_page(&[("T1 Porto", "/pt/anuncio/porto")], Some(&["1", "2", "3", "12"])),
    )
    .await;

    let scraper = ImovirtualScraper::new(crawl_settings(true, StopPolicy::RepeatPage)).unwrap();
    assert_eq!(scraper.probe_page_count(&query(&server)).await, Some(12));
}

#[tokio::test]
async fn test_probe_without_widget_is_unknown() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[("T1 Porto", "/pt/anuncio/porto")], None)).await;

    let scraper = ImovirtualScraper::new(crawl_settings(true, StopPolicy::RepeatPage)).unwrap();
    assert_eq!(scraper.probe_page_count(&query(&server)).await, None);
}

#[tokio::test]
async fn test_page_count_bounds_crawl() {
    let server = MockServer::start().await;
    mount_listing_page(
        &server,
        1,
        listing_page(&[("A", "/pt/anuncio/a")], Some(&["1", "2", "3", "4"])),
    )
    .await;
    for (page, title) in [(2, "B"), (3, "C"), (4, "D"), (5, "E")] {
        let href = format!("/pt/anuncio/{}", title.to_lowercase());
        mount_listing_page(&server, page, listing_page(&[(title, href.as_str())], None)).await;
    }

    let scraper = ImovirtualScraper::new(crawl_settings(true, StopPolicy::RepeatPage)).unwrap();
    let outcome = scraper.scrape_listing(query(&server), None).await;

    assert_eq!(outcome.termination, Termination::Clean(StopReason::LastKnownPage));
    assert_eq!(outcome.stubs.len(), 4);
}

#[tokio::test]
async fn test_server_error_keeps_partial_result() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[("T1 Porto", "/pt/anuncio/porto")], None)).await;
    Mock::given(method("GET"))
        .and(path(format!("/comprar/{}/", TYPOLOGY)))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let scraper = ImovirtualScraper::new(crawl_settings(false, StopPolicy::RepeatPage)).unwrap();
    let outcome = scraper.scrape_listing(query(&server), None).await;

    assert!(!outcome.is_clean());
    assert_eq!(outcome.stubs.len(), 1);
    match outcome.termination {
        Termination::Aborted { page, error } => {
            assert_eq!(page, 2);
            assert!(matches!(error, FetchError::Status { status: 503, .. }));
        }
        other => panic!("expected an aborted crawl, got {:?}", other),
    }
}

#[tokio::test]
async fn test_aborted_crawl_recorded_as_failed() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[("T2 Braga", "/pt/anuncio/braga")], None)).await;
    Mock::given(method("GET"))
        .and(path(format!("/comprar/{}/", TYPOLOGY)))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let data_dir = tempdir().unwrap();
    let metrics = MetricsRecorder::new(data_dir.path());
    let scraper = ImovirtualScraper::new(crawl_settings(false, StopPolicy::RepeatPage)).unwrap();
    let outcome = metrics
        .measure_outcome("crawl", scraper.scrape_listing(query(&server), None), CrawlOutcome::is_clean)
        .await;
    assert_eq!(outcome.stubs.len(), 1);

    let entry = std::fs::read_dir(data_dir.path().join("metrics"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    let record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(entry.path()).unwrap()).unwrap();
    assert_eq!(record["operation"], "crawl");
    assert_eq!(record["succeeded"], false);
}

#[tokio::test]
async fn test_start_page_and_budget() {
    let server = MockServer::start().await;
    for (page, title) in [(3, "C"), (4, "D"), (5, "E")] {
        let href = format!("/pt/anuncio/{}", title.to_lowercase());
        mount_listing_page(&server, page, listing_page(&[(title, href.as_str())], None)).await;
    }

    let scraper = ImovirtualScraper::new(crawl_settings(false, StopPolicy::RepeatPage)).unwrap();
    let mut q = query(&server);
    q.page = 3;
    let outcome = scraper.scrape_listing(q, Some(2)).await;

    assert_eq!(outcome.termination, Termination::Clean(StopReason::PageBudget));
    let titles: Vec<&str> = outcome.stubs.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["C", "D"]);
}
