//! HTTP endpoint tests against a mock server.

use conduit_core::{Cookie, Message, Status};
use conduit_plug::{CookieJar, Plug, PlugConfig, PlugEnvironment};
use http::Method;
use serde_json::json;
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn plug(uri: &str) -> Plug {
    let env = Arc::new(PlugEnvironment::new(PlugConfig::default()));
    Plug::new_in(Url::parse(uri).unwrap(), env)
}

#[tokio::test]
async fn test_get_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/42"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "name": "ada"})))
        .mount(&server)
        .await;

    let mut response = plug(&server.uri())
        .at(["users", "42"])
        .with_header("X-Api-Key", "secret")
        .get()
        .await
        .unwrap();

    assert_eq!(response.status(), Status::OK);
    assert_eq!(response.to_document().unwrap()["name"], "ada");
}

#[tokio::test]
async fn test_post_body_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_string(r#"{"item":"widget"}"#))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let response = plug(&server.uri())
        .at(["orders"])
        .post(Message::ok_json(json!({"item": "widget"})))
        .await
        .unwrap();
    assert_eq!(response.status(), Status::CREATED);
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .expect(1)
        .mount(&server)
        .await;

    let mut response = plug(&server.uri())
        .at(["old"])
        .invoke(Method::GET, Message::ok())
        .await;
    assert_eq!(response.status(), Status::OK);
    assert_eq!(response.to_text().unwrap(), "moved here");
}

#[tokio::test]
async fn test_set_cookie_lands_in_jar() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "sid=xyz; Path=/"))
        .mount(&server)
        .await;

    let jar = Arc::new(CookieJar::new());
    let base = plug(&server.uri()).with_cookie_jar(jar.clone());
    base.at(["login"]).get().await.unwrap();

    let cookies = jar.fetch(&Url::parse(&format!("{}/profile", server.uri())).unwrap());
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].value, "xyz");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = plug(&server.uri()).at(["users", "1"]).delete().await.unwrap_err();
    assert_eq!(err.status(), Some(Status::NOT_FOUND));
}

#[tokio::test]
async fn test_ext_scheme_is_rewritten() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;

    let external = server.uri().replacen("http://", "ext-http://", 1);
    let mut response = plug(&external).at(["ping"]).get().await.unwrap();
    assert_eq!(response.to_text().unwrap(), "pong");
}

#[tokio::test]
async fn test_unreachable_host_is_request_failed() {
    // nothing listens on port 9 of the loopback interface
    let response = plug("http://127.0.0.1:9/")
        .invoke(Method::GET, Message::ok())
        .await;
    assert_eq!(response.status(), Status::REQUEST_FAILED);
}

#[tokio::test]
async fn test_raw_and_jar_cookies_share_one_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prefs"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let base = Url::parse(&server.uri()).unwrap();
    let jar = Arc::new(CookieJar::new());
    jar.update(&[Cookie::new("sid", "1")], &base);

    let response = plug(&server.uri())
        .with_cookie_jar(jar)
        .with_header("Cookie", "theme=dark")
        .at(["prefs"])
        .get()
        .await;
    tokio_test::assert_ok!(response);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let values: Vec<_> = requests[0].headers.get_all("cookie").iter().collect();
    assert_eq!(values.len(), 1);
    let value = values[0].to_str().unwrap();
    assert!(value.contains("theme=dark"));
    assert!(value.contains("sid=1"));
}
