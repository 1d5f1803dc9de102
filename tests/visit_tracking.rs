use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use linkdir::config::{Config, VisitSubstrate};
use linkdir::db;
use linkdir::db::repository::{CategoryRepository, SqliteCategoryRepository};
use linkdir::extractors::MaybeUser;
use linkdir::routes::home;
use linkdir::search::{SearchProvider, SearchResult};
use linkdir::state::AppState;

struct NoSearch;

#[async_trait::async_trait]
impl SearchProvider for NoSearch {
    async fn search(&self, _query: &str) -> Vec<SearchResult> {
        Vec::new()
    }
}

fn test_state(substrate: VisitSubstrate) -> (AppState, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let pool = db::create_pool(&db_path).unwrap();
    db::run_migrations(&pool).unwrap();

    let mut config = Config::default();
    config.database.path = Some(db_path);
    config.storage.path = Some(temp_dir.path().join("uploads"));
    config.tracking.substrate = substrate;
    config.tracking.threshold_secs = 3600;

    let state = AppState {
        db: pool,
        config,
        search: Arc::new(NoSearch),
    };
    (state, temp_dir)
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Turn the Set-Cookie headers of a response into a Cookie request header.
fn cookies_from(response: &Response) -> HeaderMap {
    let pairs: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(|v| v.to_string())
        .collect();

    let mut headers = HeaderMap::new();
    if !pairs.is_empty() {
        headers.insert(header::COOKIE, pairs.join("; ").parse().unwrap());
    }
    headers
}

#[tokio::test]
async fn first_visit_counts_one_and_issues_a_visitor_cookie() {
    let (state, _temp) = test_state(VisitSubstrate::Session);

    let response = home::index(State(state.clone()), MaybeUser(None), HeaderMap::new())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("linkdir_visitor="));

    assert!(body_string(response).await.contains("visited this site 1 time"));
}

#[tokio::test]
async fn repeat_visit_within_the_window_does_not_increment() {
    let (state, _temp) = test_state(VisitSubstrate::Session);

    let first = home::index(State(state.clone()), MaybeUser(None), HeaderMap::new())
        .await
        .unwrap();
    let cookies = cookies_from(&first);

    let second = home::index(State(state.clone()), MaybeUser(None), cookies).await.unwrap();
    assert!(body_string(second).await.contains("visited this site 1 time"));
}

#[tokio::test]
async fn about_peeks_without_advancing() {
    let (state, _temp) = test_state(VisitSubstrate::Session);

    // Before any tracked visit the count reads zero
    let response = home::about(State(state.clone()), HeaderMap::new())
        .await
        .unwrap();
    assert!(body_string(response).await.contains("0 time"));

    let first = home::index(State(state.clone()), MaybeUser(None), HeaderMap::new())
        .await
        .unwrap();
    let cookies = cookies_from(&first);

    for _ in 0..2 {
        let response = home::about(State(state.clone()), cookies.clone())
            .await
            .unwrap();
        assert!(body_string(response).await.contains("1 time"));
    }
}

#[tokio::test]
async fn cookie_substrate_round_trips_through_the_index_page() {
    let (state, _temp) = test_state(VisitSubstrate::Cookie);

    let first = home::index(State(state.clone()), MaybeUser(None), HeaderMap::new())
        .await
        .unwrap();
    let values: Vec<String> = first
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(values.iter().any(|v| v.starts_with("visits=1;")));
    assert!(values.iter().any(|v| v.starts_with("last_visit=")));

    // A stale last_visit past the window increments the count
    let stale = (Utc::now() - Duration::seconds(7200)).timestamp();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        format!("visits=1; last_visit={}", stale).parse().unwrap(),
    );
    let response = home::index(State(state.clone()), MaybeUser(None), headers).await.unwrap();
    assert!(body_string(response).await.contains("visited this site 2 time"));
}

#[tokio::test]
async fn malformed_cookie_state_reinitializes_instead_of_failing() {
    let (state, _temp) = test_state(VisitSubstrate::Cookie);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        "visits=banana; last_visit=2014-07-08 12:00:00".parse().unwrap(),
    );
    let response = home::index(State(state.clone()), MaybeUser(None), headers).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("visited this site 1 time"));
}

#[tokio::test]
async fn index_lists_top_categories_by_likes() {
    let (state, _temp) = test_state(VisitSubstrate::Session);
    let repo = SqliteCategoryRepository::new(state.db.clone());

    let python = repo.insert("Python").await.unwrap();
    repo.insert("Other Frameworks").await.unwrap();
    for _ in 0..2 {
        repo.increment_likes(python.id).await.unwrap();
    }

    let response = home::index(State(state.clone()), MaybeUser(None), HeaderMap::new())
        .await
        .unwrap();
    let body = body_string(response).await;
    assert!(body.contains("Python"));
    assert!(body.contains("Other Frameworks"));
    // Slugged link for the multi-word category
    assert!(body.contains("/category/Other_Frameworks"));
    assert!(body.contains("(2 likes)"));
}
