mod common;

use common::fakes::{Failure, FakePageData, FakeSource};
use common::fixtures::entity;
use vesselscout::entity::Entity;
use vesselscout::identity::{Identity, IdentityResolver, Strategy};
use vesselscout::source::SearchMode;

const LABEL: &str = "Company Website";

#[tokio::test]
async fn test_domain_match_after_stripping_www() {
    let source = FakeSource::new()
        .with_search("acme.com", SearchMode::Exact, &["https://app.example.com/importers/1"])
        .with_page("https://app.example.com/importers/1", FakePageData::new().website("www.acme.com"));

    let identity = IdentityResolver::new(&source, LABEL, true)
        .resolve(&entity("Acme", "acme.com"))
        .await;

    assert_eq!(identity.url(), Some("https://app.example.com/importers/1"));
    match identity {
        Identity::Found { step, .. } => assert_eq!(step.strategy, Strategy::Domain),
        Identity::NotFound => panic!("expected a match"),
    }
}

#[tokio::test]
async fn test_unverified_candidates_are_rejected() {
    // Name search returns a look-alike first, then the real company
    let source = FakeSource::new()
        .with_search("Acme", SearchMode::Exact, &["/importers/9", "/importers/1"])
        .with_page("/importers/9", FakePageData::new().website("https://acme-industrial.com"))
        .with_page("/importers/1", FakePageData::new().website("http://www.acme.com/"));

    let identity = IdentityResolver::new(&source, LABEL, false)
        .resolve(&entity("Acme", "acme.com"))
        .await;

    assert_eq!(identity.url(), Some("/importers/1"));
    assert_eq!(source.opened(), vec!["/importers/9", "/importers/1"]);
}

#[tokio::test]
async fn test_variants_tried_in_order_after_timeouts() {
    let e = Entity::new("Acme Widgets", "Acme Widgets Holdings", "acme.com", "US");
    let source = FakeSource::new()
        .with_failing_search("acme.com", SearchMode::Exact, Failure::Timeout)
        .with_search("AcmeWidgets", SearchMode::Exact, &["/importers/3"])
        .with_page("/importers/3", FakePageData::new().website("acme.com"));

    let identity = IdentityResolver::new(&source, LABEL, true).resolve(&e).await;

    assert_eq!(identity.url(), Some("/importers/3"));
    let terms: Vec<String> = source.searches().into_iter().map(|(t, _)| t).collect();
    assert_eq!(terms, vec!["acme.com", "Acme Widgets Holdings", "Acme Widgets", "AcmeWidgets"]);
}

#[tokio::test]
async fn test_fuzzy_pass_runs_after_exact_variants() {
    let source = FakeSource::new()
        .with_search("Acme", SearchMode::Fuzzy, &["/importers/5"])
        .with_page("/importers/5", FakePageData::new().website("acme.com"));

    let identity = IdentityResolver::new(&source, LABEL, true)
        .resolve(&entity("Acme", "acme.com"))
        .await;

    assert_eq!(identity.url(), Some("/importers/5"));
    assert_eq!(
        source.searches(),
        vec![
            ("acme.com".to_string(), SearchMode::Exact),
            ("Acme".to_string(), SearchMode::Exact),
            ("Acme".to_string(), SearchMode::Fuzzy),
        ]
    );
}

#[tokio::test]
async fn test_fuzzy_disabled() {
    let source = FakeSource::new()
        .with_search("Acme", SearchMode::Fuzzy, &["/importers/5"])
        .with_page("/importers/5", FakePageData::new().website("acme.com"));

    let identity = IdentityResolver::new(&source, LABEL, false)
        .resolve(&entity("Acme", "acme.com"))
        .await;

    assert_eq!(identity, Identity::NotFound);
    assert!(source.searches().iter().all(|(_, mode)| *mode == SearchMode::Exact));
}

#[tokio::test]
async fn test_unreadable_website_is_not_a_match() {
    let source = FakeSource::new()
        .with_search("acme.com", SearchMode::Exact, &["/importers/1"])
        .with_page("/importers/1", FakePageData::new().fields_fail(Failure::Timeout));

    let identity = IdentityResolver::new(&source, LABEL, false)
        .resolve(&entity("Acme", "acme.com"))
        .await;

    assert_eq!(identity, Identity::NotFound);
}

#[tokio::test]
async fn test_entity_without_domain_is_never_searched() {
    let source = FakeSource::new();
    let identity = IdentityResolver::new(&source, LABEL, true)
        .resolve(&entity("Acme", "N/A"))
        .await;

    assert_eq!(identity, Identity::NotFound);
    assert!(source.searches().is_empty());
}
