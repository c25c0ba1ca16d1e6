use convoy_config::Credentials;
use convoy_harness::{HttpError, Method, RequestOptions};

use super::harness::{HarnessConfig, MockApi, RetryingClient, client};

#[tokio::test]
async fn retries_until_success() {
    let api = MockApi::start().await;
    api.on("GET", "/services/server/info", 503, "starting")
        .on("GET", "/services/server/info", 503, "starting")
        .on("GET", "/services/server/info", 200, r#"{"entry":[]}"#);

    let resp = client().get(&format!("{}/services/server/info", api.url())).await.unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(api.hits("GET", "/services/server/info"), 3);
}

#[tokio::test]
async fn exhausted_retries_keep_last_status_and_body() {
    let api = MockApi::start().await;
    api.on("GET", "/services/cluster/config", 500, "first")
        .on("GET", "/services/cluster/config", 500, "still broken");

    let err = client().get(&format!("{}/services/cluster/config", api.url())).await.unwrap_err();

    match &err {
        HttpError::Status { attempts, status, body, .. } => {
            assert_eq!(*attempts, 3);
            assert_eq!(*status, 500);
            assert_eq!(body, "still broken");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert_eq!(api.hits("GET", "/services/cluster/config"), 3);
}

#[tokio::test]
async fn once_disables_retry() {
    let api = MockApi::start().await;
    api.on("GET", "/x", 502, "");

    let url = format!("{}/x", api.url());
    let err = client().request(Method::GET, &url, &RequestOptions::new().once()).await.unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert_eq!(api.hits("GET", "/x"), 1);
}

#[tokio::test]
async fn sends_basic_auth_query_and_form() {
    let api = MockApi::start().await;
    api.on("POST", "/services/search/jobs", 201, r#"{"sid":"1"}"#);
    let mut http = HarnessConfig::fast().http;
    http.auth = Some(Credentials { username: "admin".into(), password: "helloworld".into() });
    let client = RetryingClient::new(http).unwrap();

    let opts = RequestOptions::new()
        .query("output_mode", "json")
        .form([("search", "search index=main"), ("exec_mode", "blocking")]);
    let url = format!("{}/services/search/jobs", api.url());
    client.request(Method::POST, &url, &opts).await.unwrap();

    let req = &api.requests()[0];
    assert_eq!(req.authorization.as_deref(), Some("Basic YWRtaW46aGVsbG93b3JsZA=="));
    assert_eq!(req.query.as_deref(), Some("output_mode=json"));
    assert_eq!(req.body, "search=search+index%3Dmain&exec_mode=blocking");
}

#[tokio::test]
async fn get_json_reports_undecodable_body() {
    let api = MockApi::start().await;
    api.on("GET", "/services/server/info", 200, "<html>login</html>");

    let err = client().get_json(&format!("{}/services/server/info", api.url())).await.unwrap_err();

    assert!(matches!(err, HttpError::Decode { .. }), "{err:?}");
    assert_eq!(api.requests()[0].query.as_deref(), Some("output_mode=json"));
}
