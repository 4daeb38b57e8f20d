//! Mock upstream share site: share page, listing API, download link and CDN.

use serde_json::{Value, json};
use wiremock::matchers::{header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "7F3C2A9B01D4E5F60718293A4B5C6D7E";
pub const SHARE_ID: &str = "abc";
pub const FILE_SIZE: u64 = 5_767_168;

pub fn share_link(server: &MockServer) -> String {
    format!("{}/s/1{SHARE_ID}", server.uri())
}

pub fn dlink(server: &MockServer) -> String {
    format!("{}/file/dl?fid=1", server.uri())
}

pub fn direct_link(server: &MockServer) -> String {
    format!("{}/cdn/movie.mp4?sign=xyz", server.uri())
}

pub fn page_with_token() -> String {
    format!(
        r#"<html><head><script>try{{eval(fn("{TOKEN}"))}}catch(e){{}}</script></head><body></body></html>"#
    )
}

pub fn page_with_encoded_token() -> String {
    format!(
        "<html><script>eval(decodeURIComponent(`var%20a%3D1%3Bfn%28%5C%22{TOKEN}%5C%22%29`))</script></html>"
    )
}

pub fn page_without_token() -> String {
    "<html><body><h1>Please sign in</h1></body></html>".to_string()
}

pub fn listing(server: &MockServer) -> Value {
    json!({
        "errno": 0,
        "list": [
            {
                "server_filename": "movie.mp4",
                "size": FILE_SIZE.to_string(),
                "dlink": dlink(server),
                "thumbs": {
                    "url1": format!("{}/thumb/small.jpg", server.uri()),
                    "url3": format!("{}/thumb/large.jpg", server.uri())
                }
            },
            {
                "server_filename": "other.bin",
                "size": 10,
                "dlink": format!("{}/file/dl?fid=2", server.uri())
            }
        ]
    })
}

/// Short link that redirects to the share page and sets the session cookie.
pub fn short_link_mock() -> Mock {
    Mock::given(method("GET"))
        .and(path(format!("/s/1{SHARE_ID}")))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("/sharing/link?surl={SHARE_ID}"))
                .insert_header("set-cookie", "ndus=fresh; Path=/; HttpOnly"),
        )
}

/// Share page carrying `html`, reachable only with the cookie from the short link.
pub fn share_page_mock(html: String) -> Mock {
    Mock::given(method("GET"))
        .and(path("/sharing/link"))
        .and(query_param("surl", SHARE_ID))
        .and(header_regex("cookie", "ndus=fresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .insert_header("set-cookie", "csrfToken=xyz; Path=/; Secure")
                .set_body_string(html),
        )
}

/// Listing API answering `body` for the expected token and share id.
pub fn listing_mock(body: Value) -> Mock {
    Mock::given(method("GET"))
        .and(path("/share/list"))
        .and(query_param("jsToken", TOKEN))
        .and(query_param("shorturl", SHARE_ID))
        .and(query_param("app_id", "250528"))
        .and(header_regex("cookie", "csrfToken=xyz"))
        .and(header_regex("cookie", "ndus=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
}

/// Download link that redirects HEAD requests to the CDN.
pub fn dlink_head_mock(server: &MockServer) -> Mock {
    Mock::given(method("HEAD"))
        .and(path("/file/dl"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", direct_link(server)))
}

/// CDN answering HEAD probes.
pub fn cdn_head_mock() -> Mock {
    Mock::given(method("HEAD"))
        .and(path("/cdn/movie.mp4"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "video/mp4"))
}

/// Mounts the full happy-path negotiation.
pub async fn mount_share_flow(server: &MockServer) {
    short_link_mock().mount(server).await;
    share_page_mock(page_with_token()).mount(server).await;
    listing_mock(listing(server)).mount(server).await;
    dlink_head_mock(server).mount(server).await;
    cdn_head_mock().mount(server).await;
}
