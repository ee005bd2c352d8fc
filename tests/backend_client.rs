use memorial_park::{Action, MapState, ParkError, PlotChange, PlotQuery, PlotStatus};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod test_utils;
use test_utils::shared::{MockBackend, MockResponse};

fn plot_rows() -> serde_json::Value {
    json!([
        {"id": 1, "name": "Lô A-01", "status": "Trống", "location": "10.762622,106.660172", "zone": "Khu A", "price": 120000000},
        {"id": 2, "name": "Lô A-02", "status": "da an tang", "location": null, "zone": "Khu A", "customer_name": "Trần Văn Bình"}
    ])
}

fn token_response(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": refresh,
        "user": {"id": "staff-1", "email": "staff@example.com", "role": "authenticated"}
    })
}

#[tokio::test]
async fn lists_plots_with_api_key_credentials() {
    let backend = MockBackend::start(|_| MockResponse::json(200, plot_rows())).await;
    let client = backend.client();

    let mut query = PlotQuery::new();
    query.equal_to("zone", "A").order_by_ascending("id");
    let plots = client.list_plots(&query).await.expect("list_plots failed");

    assert_eq!(plots.len(), 2);
    assert_eq!(plots[0].id, "1");
    assert_eq!(plots[0].status(), PlotStatus::Available);
    assert_eq!(plots[0].price, Some(120_000_000.0));
    assert_eq!(plots[1].status(), PlotStatus::Buried);
    assert!(plots[1].coordinate().is_none());
    assert_eq!(
        plots[0].directions_url(client.directions_base()).as_deref(),
        Some("https://www.google.com/maps/dir/?destination=10.762622,106.660172")
    );

    let requests = backend.recorded();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.path(), "/rest/v1/plots");
    assert!(request.target.contains("select=*"));
    assert!(request.target.contains("zone=eq.A"));
    assert!(request.target.contains("order=id.asc"));
    assert_eq!(request.header("apikey"), Some("anon-key"));
    assert_eq!(request.header("authorization"), Some("Bearer anon-key"));
}

#[tokio::test]
async fn get_plot_by_id() {
    let backend = MockBackend::start(|req| {
        if req.target.contains("id=eq.1") {
            MockResponse::json(200, json!([plot_rows()[0].clone()]))
        } else {
            MockResponse::json(200, json!([]))
        }
    })
    .await;
    let client = backend.client();

    let found = client.get_plot("1").await.unwrap();
    assert_eq!(found.map(|p| p.display_name().to_string()), Some("Lô A-01".to_string()));
    assert!(client.get_plot("999").await.unwrap().is_none());
    assert!(matches!(client.get_plot(" ").await, Err(ParkError::InvalidInput(_))));

    let requests = backend.recorded();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].target.contains("limit=1"));
}

#[tokio::test]
async fn counts_from_content_range() {
    let backend = MockBackend::start(|req| {
        assert_eq!(req.method, "HEAD");
        assert_eq!(req.header("prefer"), Some("count=exact"));
        MockResponse::empty(200).with_header("Content-Range", "0-1/42")
    })
    .await;
    let client = backend.client();

    let count = PlotQuery::new().count(&client).await.unwrap();
    assert_eq!(count, 42);
}

#[tokio::test]
async fn backend_errors_are_mapped() {
    let backend = MockBackend::start(|_| {
        MockResponse::json(
            404,
            json!({"code": "42P01", "message": "relation \"public.plots\" does not exist"}),
        )
    })
    .await;
    let client = backend.client();

    let err = client.all_plots().await.unwrap_err();
    assert!(matches!(err, ParkError::NotFound(msg) if msg.contains("42P01")));
}

#[tokio::test]
async fn sign_in_uses_session_for_later_requests_and_sign_out_clears_it() {
    let backend = MockBackend::start(|req| match req.path() {
        "/auth/v1/token" => MockResponse::json(200, token_response("access-1", "refresh-1")),
        "/auth/v1/logout" => MockResponse::empty(204),
        "/auth/v1/user" => MockResponse::json(200, json!({"id": "staff-1", "email": "staff@example.com"})),
        _ => MockResponse::json(200, json!([])),
    })
    .await;
    let mut client = backend.client();

    let session = client
        .auth()
        .sign_in_with_password("staff@example.com", "secret")
        .await
        .expect("sign in failed");
    assert_eq!(session.access_token, "access-1");
    assert!(session.expires_at.is_some());
    assert!(client.is_authenticated());
    assert_eq!(client.session().and_then(|s| s.user_id()), Some("staff-1"));

    let user = client.auth().get_user().await.unwrap();
    assert_eq!(user.email.as_deref(), Some("staff@example.com"));

    client.all_plots().await.unwrap();
    client.auth().sign_out().await.unwrap();
    assert!(!client.is_authenticated());
    assert!(client.session().is_none());

    let requests = backend.recorded();
    let token_request = &requests[0];
    assert_eq!(token_request.method, "POST");
    assert!(token_request.target.contains("grant_type=password"));
    assert_eq!(token_request.header("authorization"), Some("Bearer anon-key"));
    let body: serde_json::Value = serde_json::from_str(&token_request.body).unwrap();
    assert_eq!(body, json!({"email": "staff@example.com", "password": "secret"}));

    assert_eq!(requests[1].header("authorization"), Some("Bearer access-1"));
    assert_eq!(requests[2].header("authorization"), Some("Bearer access-1"));
    assert_eq!(requests[3].path(), "/auth/v1/logout");
    assert_eq!(requests[3].header("authorization"), Some("Bearer access-1"));
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let backend = MockBackend::start(|_| {
        MockResponse::json(
            400,
            json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}),
        )
    })
    .await;
    let mut client = backend.client();

    let err = client
        .auth()
        .sign_in_with_password("staff@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, ParkError::InvalidCredentials(_)));
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn expired_session_is_refreshed_on_get_session() {
    let backend = MockBackend::start(|req| {
        if req.target.contains("grant_type=password") {
            let mut expired = token_response("access-1", "refresh-1");
            expired["expires_at"] = json!(1);
            MockResponse::json(200, expired)
        } else {
            MockResponse::json(200, token_response("access-2", "refresh-2"))
        }
    })
    .await;
    let mut client = backend.client();

    client
        .auth()
        .sign_in_with_password("staff@example.com", "secret")
        .await
        .unwrap();
    assert!(!client.is_authenticated());

    let session = client.auth().get_session().await.unwrap().expect("session");
    assert_eq!(session.access_token, "access-2");
    assert!(client.is_authenticated());

    let requests = backend.recorded();
    assert!(requests[1].target.contains("grant_type=refresh_token"));
    let body: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(body, json!({"refresh_token": "refresh-1"}));
}

#[tokio::test]
async fn expired_session_falls_back_to_api_key_for_reads() {
    let backend = MockBackend::start(|req| {
        if req.path() == "/auth/v1/token" {
            let mut expired = token_response("stale", "refresh-1");
            expired["expires_at"] = json!(1);
            MockResponse::json(200, expired)
        } else if req.header("authorization") == Some("Bearer stale") {
            MockResponse::json(401, json!({"code": "PGRST301", "message": "JWT expired"}))
        } else {
            MockResponse::json(200, plot_rows())
        }
    })
    .await;
    let mut client = backend.client();

    client
        .auth()
        .sign_in_with_password("staff@example.com", "secret")
        .await
        .unwrap();
    assert!(!client.is_authenticated());

    let plots = client.all_plots().await;
    assert!(plots.is_ok(), "Reading with an expired session failed: {:?}", plots.err());
    assert_eq!(plots.unwrap().len(), 2);

    let mut subscription = client
        .subscribe_plots(PlotQuery::new(), Duration::from_millis(20))
        .await
        .expect("subscribing with an expired session failed");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(subscription.try_recv().is_none());
    subscription.unsubscribe();

    // The user endpoint still receives the stored token.
    let err = client.auth().get_user().await.unwrap_err();
    assert!(matches!(err, ParkError::SessionExpired(_)));

    let requests = backend.recorded();
    let reads: Vec<_> = requests
        .iter()
        .filter(|r| r.path() == "/rest/v1/plots")
        .collect();
    assert!(reads.len() >= 2);
    assert!(reads
        .iter()
        .all(|r| r.header("authorization") == Some("Bearer anon-key")));
    let user_request = requests
        .iter()
        .find(|r| r.path() == "/auth/v1/user")
        .expect("user endpoint not called");
    assert_eq!(user_request.header("authorization"), Some("Bearer stale"));
}

#[tokio::test]
async fn writes_require_a_session() {
    let backend = MockBackend::start(|_| MockResponse::json(200, json!([]))).await;
    let client = backend.client();

    let err = client
        .update_plot("1", &json!({"status": "Đã bán"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ParkError::SessionMissing));
    assert!(backend.recorded().is_empty());
}

#[tokio::test]
async fn subscription_delivers_changes_into_map_state() {
    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    let backend = MockBackend::start(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        // Initial listing and subscription snapshot see the original rows.
        if n <= 1 {
            MockResponse::json(200, plot_rows())
        } else {
            MockResponse::json(
                200,
                json!([
                    {"id": 1, "name": "Lô A-01", "status": "Đặt cọc", "zone": "Khu A"},
                    {"id": 2, "name": "Lô A-02", "status": "da an tang", "location": null, "zone": "Khu A", "customer_name": "Trần Văn Bình"}
                ]),
            )
        }
    })
    .await;
    let client = backend.client();

    let mut state = MapState::new();
    state.dispatch(Action::SetPlots(client.all_plots().await.unwrap()));

    let mut subscription = client
        .subscribe_plots(PlotQuery::new(), Duration::from_millis(20))
        .await
        .unwrap();
    let change = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("no change within timeout")
        .expect("subscription ended");

    assert_eq!(change.plot_id(), "1");
    assert!(matches!(&change, PlotChange::Updated { new, .. } if new.status() == PlotStatus::Deposited));

    state.dispatch(Action::Apply(change));
    assert_eq!(state.plot("1").map(|p| p.status()), Some(PlotStatus::Deposited));
    subscription.unsubscribe();

    assert!(polls.load(Ordering::SeqCst) >= 3);
}
