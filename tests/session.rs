mod common;

use common::{config, detail_url, listing_url, FakeSite, MemoryBackend};
use listing_sync::engine::{SessionRunner, TerminationReason};
use listing_sync::models::PropertyRecord;
use listing_sync::scrapers::ZonapropExtractor;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn runner(site: &Arc<FakeSite>, backend: &Arc<MemoryBackend>) -> SessionRunner {
    SessionRunner::new(
        site.clone(),
        Arc::new(ZonapropExtractor),
        backend.clone(),
        backend.clone(),
        config(),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn two_page_site_emits_every_new_listing() {
    let site = Arc::new(FakeSite::new().listing(1, &["a", "b", "c"]));
    let backend = Arc::new(MemoryBackend::default());

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(result.termination, TerminationReason::NoLinksOnPage);
    assert_eq!(result.pages_walked, 2);
    assert_eq!(result.added, 3);
    assert_eq!(
        backend.created_hrefs(),
        vec![detail_url("a"), detail_url("b"), detail_url("c")]
    );
    assert_eq!(backend.published.lock().unwrap().len(), 3);
    assert_eq!(site.open_surfaces(), 0);

    let first = backend.created.lock().unwrap()[0].clone();
    assert_eq!(first.price, "USD 1.000");
    assert_eq!(first.views, "40");
    assert!(first.discount.is_empty());
}

#[tokio::test(start_paused = true)]
async fn listings_missing_from_the_site_are_deleted_by_remote_id() {
    let site = Arc::new(FakeSite::new().listing(1, &["a"]));
    let backend = Arc::new(MemoryBackend::with_truth(vec![
        (1, detail_url("a")),
        (2, detail_url("b")),
    ]));

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(*backend.deleted.lock().unwrap(), vec!["2".to_string()]);
    assert_eq!(result.removed, 1);
    assert_eq!(result.existing, 1);
    assert_eq!(result.added, 0);
    assert!(result.reconciled);
    assert_eq!(site.detail_navigations(), 0);
}

#[tokio::test(start_paused = true)]
async fn unreachable_detail_page_is_skipped_without_counting() {
    let site = Arc::new(
        FakeSite::new()
            .listing(1, &["a", "b", "c"])
            .unreachable(detail_url("c")),
    );
    let backend = Arc::new(MemoryBackend::default());

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(result.added, 2);
    assert_eq!(result.failed_navigations, 1);
    assert_eq!(site.navigations_to(&detail_url("c")), 3);
    assert_eq!(backend.created_hrefs(), vec![detail_url("a"), detail_url("b")]);
    assert!(!backend
        .published
        .lock()
        .unwrap()
        .contains(&detail_url("c")));
    assert_eq!(site.open_surfaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn redirect_to_a_walked_page_stops_without_redispatch() {
    let site = Arc::new(FakeSite::new().listing(1, &["a", "b"]).redirect(2, 1));
    let backend = Arc::new(MemoryBackend::default());

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(result.termination, TerminationReason::LoopDetected);
    assert_eq!(result.pages_walked, 2);
    assert_eq!(result.added, 2);
    assert_eq!(site.detail_navigations(), 2);
    assert_eq!(site.navigations_to(&listing_url(3)), 0);
}

#[tokio::test(start_paused = true)]
async fn three_pages_without_news_end_the_walk() {
    let mut site = FakeSite::new();
    for page in 1..=5 {
        site = site.listing(page, &["a", "b"]);
    }
    let site = Arc::new(site);
    let backend = Arc::new(MemoryBackend::with_truth(vec![
        (1, detail_url("a")),
        (2, detail_url("b")),
    ]));

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(result.termination, TerminationReason::Stagnation);
    assert_eq!(result.pages_walked, 3);
    assert_eq!(site.navigations_to(&listing_url(4)), 0);
    assert!(backend.deleted.lock().unwrap().is_empty());
    assert_eq!(result.existing, 2);
}

#[tokio::test(start_paused = true)]
async fn unreadable_truth_degrades_to_an_empty_snapshot() {
    let site = Arc::new(FakeSite::new().listing(1, &["a"]));
    let backend = Arc::new(MemoryBackend::unreadable());

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(backend.reads.load(Ordering::SeqCst), 3);
    assert_eq!(result.truth_count, 0);
    assert_eq!(result.added, 1);
    assert!(backend.deleted.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unreachable_listing_page_aborts_without_reconciling() {
    let site = Arc::new(FakeSite::new().unreachable(listing_url(1)));
    let backend = Arc::new(MemoryBackend::with_truth(vec![(1, detail_url("a"))]));

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(result.termination, TerminationReason::NavigationFailed);
    assert_eq!(site.navigations_to(&listing_url(1)), 3);
    assert!(!result.reconciled);
    assert!(backend.deleted.lock().unwrap().is_empty());
    assert_eq!(site.open_surfaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn seeded_listings_are_not_extracted_again() {
    let site = Arc::new(FakeSite::new().listing(1, &["a", "b"]));
    let backend = Arc::new(MemoryBackend::default());
    let seed = vec![
        PropertyRecord {
            href: detail_url("a"),
            ..Default::default()
        },
        PropertyRecord {
            href: detail_url("a"),
            ..Default::default()
        },
    ];

    let result = runner(&site, &backend).with_seed(seed).run_one_session().await;

    assert_eq!(result.added, 1);
    assert_eq!(backend.created_hrefs(), vec![detail_url("b")]);
}

#[tokio::test(start_paused = true)]
async fn a_failed_listing_read_is_retried() {
    let site = Arc::new(FakeSite::new().listing(1, &["a"]).flaky_snapshots(1));
    let backend = Arc::new(MemoryBackend::default());

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(result.termination, TerminationReason::NoLinksOnPage);
    assert_eq!(result.pages_walked, 2);
    assert_eq!(result.added, 1);
    assert!(result.reconciled);
    assert_eq!(site.navigations_to(&listing_url(1)), 1);
}

#[tokio::test(start_paused = true)]
async fn redirected_listing_is_stored_under_its_listed_href() {
    let moved = format!("{}/propiedades/a-renovado.html", common::BASE);
    let site = Arc::new(FakeSite::new().listing(1, &["a"]).moved("a", &moved));
    let backend = Arc::new(MemoryBackend::default());

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(result.added, 1);
    assert_eq!(backend.created_hrefs(), vec![detail_url("a")]);
    assert_eq!(*backend.published.lock().unwrap(), vec![detail_url("a")]);
}

#[tokio::test(start_paused = true)]
async fn redirected_listing_is_not_extracted_again_next_session() {
    let moved = format!("{}/propiedades/a-renovado.html", common::BASE);
    let site = Arc::new(FakeSite::new().listing(1, &["a"]).moved("a", &moved));
    let backend = Arc::new(MemoryBackend::with_truth(vec![(1, detail_url("a"))]));

    let result = runner(&site, &backend).run_one_session().await;

    assert_eq!(result.added, 0);
    assert_eq!(result.existing, 1);
    assert_eq!(site.detail_navigations(), 0);
    assert!(backend.deleted.lock().unwrap().is_empty());
}
