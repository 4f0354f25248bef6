//! Semantic product search.

use bloomify_chat::testing::{scored_product, FixedEmbedder, MockCatalog, MockDeps, TEST_EMBEDDING_DIM};
use bloomify_chat::{ProductSearch, SearchRequest, TurnError, TurnStage};

fn request(q: &str) -> SearchRequest {
    SearchRequest {
        q: q.to_string(),
        ..SearchRequest::default()
    }
}

#[tokio::test]
async fn blank_query_touches_nothing() {
    let mocks = MockDeps::new();
    let search = ProductSearch::new(mocks.chat_deps());

    let hits = search.search(&request("   ")).await.unwrap();
    assert!(hits.is_empty());
    assert!(mocks.embedder.calls().is_empty());
    assert!(mocks.catalog.search_calls().is_empty());
}

#[tokio::test]
async fn graduation_query_is_expanded_and_reranked() {
    let mocks = MockDeps::new().catalog(MockCatalog::new().on_search(vec![
        scored_product("sympathy-wreath", "Sympathy Wreath", 0.81),
        scored_product("toga-bouquet", "Toga Bouquet", 0.62),
    ]));
    let search = ProductSearch::new(mocks.chat_deps());

    let hits = search.search(&request("bunga wisuda")).await.unwrap();

    let embedded = mocks.embedder.calls();
    assert_eq!(embedded.len(), 1);
    assert!(embedded[0].starts_with("bunga wisuda "));
    assert!(embedded[0].contains("kelulusan"));

    let slugs: Vec<_> = hits.iter().map(|h| h.slug.as_str()).collect();
    assert_eq!(slugs, vec!["toga-bouquet", "sympathy-wreath"]);
}

#[tokio::test]
async fn plain_query_is_embedded_verbatim() {
    let mocks = MockDeps::new();
    let search = ProductSearch::new(mocks.chat_deps());

    search.search(&request("  mawar merah  ")).await.unwrap();
    assert_eq!(mocks.embedder.calls(), vec!["mawar merah".to_string()]);
}

#[tokio::test]
async fn k_defaults_and_is_clamped() {
    let mocks = MockDeps::new();
    let search = ProductSearch::new(mocks.chat_deps());

    search.search(&request("mawar")).await.unwrap();
    search
        .search(&SearchRequest {
            k: Some(0),
            ..request("mawar")
        })
        .await
        .unwrap();
    search
        .search(&SearchRequest {
            k: Some(10_000),
            max_price: Some(300_000.0),
            ..request("mawar")
        })
        .await
        .unwrap();

    let calls = mocks.catalog.search_calls();
    let ks: Vec<usize> = calls.iter().map(|c| c.limit).collect();
    assert_eq!(ks, vec![24, 1, 100]);
    assert_eq!(calls[2].max_price, Some(300_000.0));
}

#[tokio::test]
async fn non_positive_price_ceiling_is_rejected() {
    let mocks = MockDeps::new();
    let search = ProductSearch::new(mocks.chat_deps());

    for max_price in [0.0, -5.0, f64::NAN] {
        let err = search
            .search(&SearchRequest {
                max_price: Some(max_price),
                ..request("mawar")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Validation(_)));
    }
    assert!(mocks.embedder.calls().is_empty());
}

#[tokio::test]
async fn embedding_outage_reports_stage() {
    let mocks = MockDeps::new().embedder(FixedEmbedder::new(TEST_EMBEDDING_DIM).failing());
    let search = ProductSearch::new(mocks.chat_deps());

    let err = search.search(&request("mawar")).await.unwrap_err();
    assert_eq!(err.stage(), Some(TurnStage::EmbedQuery));
    assert!(mocks.catalog.search_calls().is_empty());
}
