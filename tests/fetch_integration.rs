//! Integration tests for the redirect-following fetch client.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use sharelink_core::{CookieJar, FetchError, RedirectingClient};
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn client(max_hops: usize) -> RedirectingClient {
    RedirectingClient::with_settings(Duration::from_secs(2), Duration::from_secs(2), max_hops)
        .expect("client should build")
}

#[tokio::test]
async fn test_cookies_are_replayed_on_every_hop() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/start"))
        .and(header("cookie", "seed=1"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/middle")
                .insert_header("set-cookie", "a=1; Path=/; HttpOnly"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/middle"))
        .and(header("cookie", "a=1; seed=1"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/end", server.uri()))
                .insert_header("set-cookie", "b=2; Expires=Wed, 21 Oct 2026 07:28:00 GMT"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/end"))
        .and(header("cookie", "a=1; b=2; seed=1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .expect(1)
        .mount(&server)
        .await;

    let mut jar = CookieJar::from_header("seed=1");
    let response = client(10)
        .resolve(
            &format!("{}/start", server.uri()),
            &HeaderMap::new(),
            Method::GET,
            &mut jar,
        )
        .await
        .expect("chain should resolve");

    assert_eq!(response.final_url().path(), "/end");
    assert_eq!(response.hops().len(), 3);
    assert_eq!(response.hops()[0].set_cookies.len(), 1);
    assert_eq!(jar.to_header_value(), "a=1; b=2; seed=1");
    assert_eq!(response.text().await.expect("body"), "done");
}

#[tokio::test]
async fn test_caller_headers_sent_on_each_hop() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/a"))
        .and(header("user-agent", "Browser/1.0"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .and(header("user-agent", "Browser/1.0"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("Browser/1.0"));
    let response = client(10)
        .resolve(
            &format!("{}/a", server.uri()),
            &headers,
            Method::GET,
            &mut CookieJar::new(),
        )
        .await
        .expect("chain should resolve");
    assert_eq!(response.status().as_u16(), 204);
}

#[tokio::test]
async fn test_redirect_loop_exhausts_hop_budget() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(3)
        .resolve(
            &format!("{}/loop", server.uri()),
            &HeaderMap::new(),
            Method::GET,
            &mut CookieJar::new(),
        )
        .await
        .expect_err("loop must fail");
    assert!(
        matches!(err, FetchError::TooManyRedirects { max_hops: 3, .. }),
        "got {err:?}"
    );
}

async fn mount_three_request_chain(server: &wiremock::MockServer) {
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/b"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/c"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_string("end"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_chain_of_exactly_max_hops_requests_succeeds() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_three_request_chain(&server).await;

    let response = client(3)
        .resolve(
            &format!("{}/a", server.uri()),
            &HeaderMap::new(),
            Method::GET,
            &mut CookieJar::new(),
        )
        .await
        .expect("three requests fit a budget of three");
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.hops().len(), 3);
    assert_eq!(response.final_url().path(), "/c");
}

#[tokio::test]
async fn test_chain_one_longer_than_budget_fails() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_three_request_chain(&server).await;

    let err = client(2)
        .resolve(
            &format!("{}/a", server.uri()),
            &HeaderMap::new(),
            Method::GET,
            &mut CookieJar::new(),
        )
        .await
        .expect_err("three requests exceed a budget of two");
    assert!(
        matches!(err, FetchError::TooManyRedirects { max_hops: 2, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_slow_hop_times_out() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client =
        RedirectingClient::with_settings(Duration::from_secs(1), Duration::from_secs(1), 5)
            .expect("client should build");
    let err = client
        .resolve(
            &format!("{}/slow", server.uri()),
            &HeaderMap::new(),
            Method::GET,
            &mut CookieJar::new(),
        )
        .await
        .expect_err("hop must time out");
    assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_redirect_without_location_is_terminal() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/odd"))
        .respond_with(ResponseTemplate::new(302).insert_header("set-cookie", "k=v"))
        .mount(&server)
        .await;

    let mut jar = CookieJar::new();
    let response = client(5)
        .resolve(
            &format!("{}/odd", server.uri()),
            &HeaderMap::new(),
            Method::GET,
            &mut jar,
        )
        .await
        .expect("terminal 302 is returned");
    assert_eq!(response.status().as_u16(), 302);
    assert_eq!(jar.get("k"), Some("v"));
}

#[tokio::test]
async fn test_head_method_is_used_for_every_hop() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("HEAD"))
        .and(path("/dl"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/cdn?sig=1"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/cdn"))
        .and(header_regex("cookie", "^s=1$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let response = client(5)
        .resolve(
            &format!("{}/dl", server.uri()),
            &HeaderMap::new(),
            Method::HEAD,
            &mut CookieJar::from_header("s=1"),
        )
        .await
        .expect("HEAD chain should resolve");
    assert_eq!(response.final_url().query(), Some("sig=1"));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let err = client(3)
        .resolve(
            "http://127.0.0.1:9/",
            &HeaderMap::new(),
            Method::GET,
            &mut CookieJar::new(),
        )
        .await
        .expect_err("nothing listens on the discard port");
    assert!(
        matches!(err, FetchError::Network { .. } | FetchError::Timeout { .. }),
        "got {err:?}"
    );
}
