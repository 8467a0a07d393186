//! Integration tests for common Conduit workflows.
//!
//! These tests wire plugs, endpoints and the dispatcher together the way an
//! application does.

use conduit::prelude::*;
use conduit::{RedirectHeaders, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn environment(dispatcher: Arc<Dispatcher>) -> Arc<PlugEnvironment> {
    let env = PlugEnvironment::new(PlugConfig::default());
    let local = LocalEndpoint::new("app", dispatcher)
        .unwrap()
        .with_alias(Url::parse("http://public.example/api").unwrap());
    env.registry().add(Arc::new(local));
    Arc::new(env)
}

fn plug(uri: &str, env: &Arc<PlugEnvironment>) -> Plug {
    Plug::new_in(Url::parse(uri).unwrap(), env.clone())
}

fn shop() -> Service {
    Service::new("shop", "/shop")
        .feature(Feature::builder("POST", "cart").handler(sync_handler(|_| {
            let mut response = Message::ok_json(json!({"items": 0}));
            response
                .cookies_mut()
                .push(Cookie::new("cart", "c-1").with_uri(Url::parse("local://app/shop").unwrap()));
            Ok(response)
        })))
        .feature(
            Feature::builder("GET", "cart")
                .param(ParamSpec::cookie("cart", ParamKind::Text))
                .handler(sync_handler(|args| Ok(Message::ok_json(json!({ "cart": args.text("cart") }))))),
        )
        .feature(
            Feature::builder("GET", "old")
                .handler(sync_handler(|_| Ok(Message::redirect("local://app/shop/new")))),
        )
        .feature(Feature::builder("GET", "new").handler(sync_handler(|_| Ok(Message::ok_text("new home")))))
}

// =============================================================================
// Local dispatch
// =============================================================================

#[tokio::test]
async fn test_cookies_round_trip_through_local_dispatch() {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(shop()).unwrap();
    let env = environment(dispatcher);
    let jar = Arc::new(CookieJar::new());

    let base = plug("local://app/shop", &env).with_cookie_jar(jar.clone());
    base.at(["cart"]).post(Message::ok()).await.unwrap();

    let stored = jar.fetch(&Url::parse("local://app/shop/cart").unwrap());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].uri.as_ref().unwrap().scheme(), "local");

    let mut response = base.at(["cart"]).get().await.unwrap();
    assert_eq!(response.to_document().unwrap()["cart"], "c-1");
}

#[tokio::test]
async fn test_public_alias_translates_cookies() {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(shop()).unwrap();
    let env = environment(dispatcher);
    let jar = Arc::new(CookieJar::new());

    let response = plug("http://public.example/api/shop/cart", &env)
        .with_cookie_jar(jar.clone())
        .invoke(Method::POST, Message::ok())
        .await;
    assert_eq!(response.status(), Status::OK);

    let public = jar.fetch(&Url::parse("http://public.example/api/shop/cart").unwrap());
    assert_eq!(public.len(), 1);
    let scope = public[0].uri.as_ref().unwrap();
    assert_eq!(scope.scheme(), "http");
    assert_eq!(scope.host_str(), Some("public.example"));
    assert_eq!(scope.path(), "/api/shop");
    assert!(jar.fetch(&Url::parse("local://app/shop/cart").unwrap()).is_empty());
}

#[tokio::test]
async fn test_local_redirect_is_followed() {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(shop()).unwrap();
    let env = environment(dispatcher);

    let mut response = plug("local://app/shop/old", &env).get().await.unwrap();
    assert_eq!(response.to_text().unwrap(), "new home");

    let response = plug("local://app/shop/old", &env)
        .without_auto_redirects()
        .invoke(Method::GET, Message::ok())
        .await;
    assert_eq!(response.status(), Status::FOUND);
}

#[tokio::test]
async fn test_introspection_counts_hits() {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(shop()).unwrap();
    let env = environment(dispatcher.clone());

    for _ in 0..3 {
        plug("local://app/shop/new", &env).get().await.unwrap();
    }

    let features = dispatcher.features();
    assert_eq!(features.len(), 4);
    let new = features.iter().find(|f| f.signature == "/shop/new").unwrap();
    assert_eq!(new.hits, 3);
    assert_eq!(new.verb, "GET");
    assert_eq!(new.access, AccessLevel::Public);
}

#[test]
fn test_unregistered_service_stops_answering() {
    let dispatcher = Arc::new(Dispatcher::new());
    tokio_test::assert_ok!(dispatcher.register(shop()));
    let env = environment(dispatcher.clone());
    let target = plug("local://app/shop/new", &env);

    let response = tokio_test::block_on(target.invoke(Method::GET, Message::ok()));
    assert_eq!(response.status(), Status::OK);

    assert_eq!(dispatcher.unregister("shop"), 4);
    let response = tokio_test::block_on(target.invoke(Method::GET, Message::ok()));
    assert_eq!(response.status(), Status::NOT_FOUND);
}

// =============================================================================
// Local features calling remote services
// =============================================================================

#[tokio::test]
async fn test_feature_proxies_to_remote_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rates/eur"))
        .and(header("x-caller", "conduit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rate": 1.08})))
        .mount(&server)
        .await;

    let dispatcher = Arc::new(Dispatcher::new());
    let env = environment(dispatcher.clone());
    let remote = plug(&server.uri(), &env).with_header("X-Caller", "conduit");

    dispatcher
        .register(
            Service::new("fx", "fx").feature(
                Feature::builder("GET", "{currency}")
                    .param(ParamSpec::auto("currency", ParamKind::Text))
                    .handler(async_handler(move |args| {
                        let remote = remote.clone();
                        async move {
                            let currency = args.text("currency").unwrap_or_default().to_lowercase();
                            let mut upstream = remote
                                .at(["rates", currency.as_str()])
                                .get()
                                .await
                                .map_err(|e| FeatureError::Handler(e.to_string()))?;
                            let rate: Value = upstream.to_document()?["rate"].clone();
                            Ok(Message::ok_json(json!({ "currency": currency, "rate": rate })))
                        }
                    })),
            ),
        )
        .unwrap();

    let mut response = plug("local://app/fx/EUR", &env).get().await.unwrap();
    assert_eq!(
        response.to_document().unwrap(),
        json!({"currency": "eur", "rate": 1.08})
    );

    let response = plug("local://app/fx/usd", &env)
        .invoke(Method::GET, Message::ok())
        .await;
    assert_eq!(response.status(), Status::INTERNAL_ERROR);
}

#[tokio::test]
async fn test_cross_origin_redirect_drops_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("leaked"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("clean"))
        .mount(&server)
        .await;

    let target = format!("{}/landing", server.uri());
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher
        .register(Service::new("go", "go").feature(
            Feature::builder("GET", "/").handler(sync_handler(move |_| Ok(Message::redirect(&target)))),
        ))
        .unwrap();
    let env = environment(dispatcher);

    let mut response = plug("local://app/go", &env)
        .with_header("Authorization", "Bearer secret")
        .get()
        .await
        .unwrap();
    assert_eq!(response.to_text().unwrap(), "clean");

    let mut response = plug("local://app/go", &env)
        .with_header("Authorization", "Bearer secret")
        .with_redirect_headers(RedirectHeaders::All)
        .get()
        .await
        .unwrap();
    assert_eq!(response.to_text().unwrap(), "leaked");
}
