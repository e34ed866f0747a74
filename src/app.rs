use axum::{middleware, routing::get, Router};
use tower::Layer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{billing, domains, posts, search, state::AppState, tenant::tenant_rewrite, users};

fn routes(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(search::router())
                .merge(domains::router())
                .merge(billing::router())
                .merge(users::me_router())
                .merge(posts::router())
                .route("/health", get(|| async { "ok" })),
        )
        .merge(users::profile_router())
        .with_state(state)
}

/// The tenant rewrite wraps the routed service so it runs before route matching.
pub fn build_app(state: AppState) -> Router {
    let rewrite = middleware::from_fn_with_state(state.clone(), tenant_rewrite);
    Router::new()
        .fallback_service(rewrite.layer(routes(state)))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let host = req
                        .headers()
                        .get(axum::http::header::HOST)
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        host = %host,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let app = build_app(state.clone());
    let listener =
        tokio::net::TcpListener::bind((state.config.host.as_str(), state.config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.close().await;
    tracing::info!("store closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        billing::SubscriptionStatus,
        domains::dns::RecordType,
        testing::{bearer, harness, published_post, seed_subscriber, seed_user_with_domain},
    };

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn get(uri: &str, host: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, host)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, auth: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::HOST, "bublr.life")
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health() {
        let app = build_app(AppState::fake());
        let res = app.oneshot(get("/api/v1/health", "localhost")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, get("/api/v1/me", "localhost")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn custom_domain_serves_the_profile() {
        let h = harness();
        let ada = seed_user_with_domain(&h, "ada", "blog.example.com", SubscriptionStatus::Active).await;
        let mut post = published_post(ada.id, "Hello World", "", "");
        post.slug = "hello".into();
        h.store.seed_post(post).await;
        let app = build_app(h.state.clone());

        let (status, body) = call(&app, get("/", "blog.example.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "ada");
        assert_eq!(body["posts"][0]["slug"], "hello");

        let (status, body) = call(&app, get("/hello", "blog.example.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["title"], "Hello World");

        // API paths are never rewritten
        let (status, body) = call(&app, get("/api/v1/search?q=hello", "blog.example.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Hello World");
    }

    #[tokio::test]
    async fn lookup_endpoint() {
        let h = harness();
        seed_user_with_domain(&h, "ada", "blog.example.com", SubscriptionStatus::Active).await;
        let app = build_app(h.state.clone());

        let (status, body) = call(&app, get("/api/v1/domain/lookup?domain=Blog.Example.com", "bublr.life")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], true);
        assert_eq!(body["user"]["name"], "ada");
        assert_eq!(body["user"]["displayName"], "ADA");

        let (status, body) = call(&app, get("/api/v1/domain/lookup?domain=nope.example.com", "bublr.life")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "active": false, "error": "Domain not found" }));

        let (status, _) = call(&app, get("/api/v1/domain/lookup", "bublr.life")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn domain_flow_over_http() {
        let h = harness();
        let ada = seed_subscriber(&h, "ada", SubscriptionStatus::Active).await;
        let auth = bearer(&h, ada.id);
        let app = build_app(h.state.clone());

        let (status, body) = call(
            &app,
            post_json("/api/v1/domain/set", &auth, json!({ "domain": "https://Blog.Example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["domain"], "blog.example.com");
        assert_eq!(body["status"], "pending");

        h.dns.answer("blog.example.com", RecordType::Cname, &["somewhere.else.net"]);
        let (status, body) = call(&app, post_json("/api/v1/domain/verify", &auth, json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["verified"], false);
        assert_eq!(body["domain"], "blog.example.com");
        assert_eq!(
            body["error"],
            "CNAME found but doesn't point to bublr.life. Points to: somewhere.else.net"
        );

        h.dns.answer("blog.example.com", RecordType::A, &["203.0.113.7"]);
        let (status, body) = call(&app, post_json("/api/v1/domain/verify", &auth, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recordType"], "A");

        let (status, body) = call(&app, get("/", "blog.example.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "ada");

        let (status, body) = call(&app, post_json("/api/v1/domain/set", &auth, json!({ "domain": "a b" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Domain cannot contain spaces");
    }

    #[tokio::test]
    async fn subscription_refresh_over_http() {
        let h = harness();
        let ada = seed_user_with_domain(&h, "ada", "blog.example.com", SubscriptionStatus::Active).await;
        let auth = bearer(&h, ada.id);
        let app = build_app(h.state.clone());
        h.billing.set("sub_ada", SubscriptionStatus::Cancelled);

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/subscription/refresh")
            .header(header::AUTHORIZATION, &auth)
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subscriptionStatus"], "cancelled");
        assert_eq!(body["isActive"], false);
        assert_eq!(body["customDomainActive"], false);
        assert_eq!(body["domainStatus"], "inactive");

        // lapsed domain no longer resolves
        let (status, _) = call(&app, get("/", "blog.example.com")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_lifecycle_over_http() {
        let h = harness();
        let ada = seed_subscriber(&h, "ada", SubscriptionStatus::None).await;
        let auth = bearer(&h, ada.id);
        let app = build_app(h.state.clone());

        let (status, draft) = call(&app, post_json("/api/v1/posts", &auth, json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = draft["id"].as_str().unwrap().to_string();

        let req = Request::builder()
            .method("PUT")
            .uri(format!("/api/v1/posts/{id}"))
            .header(header::AUTHORIZATION, &auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "title": "Sourdough", "excerpt": "Bread", "content": "<p>flour</p>", "slug": "sourdough", "published": true })
                    .to_string(),
            ))
            .unwrap();
        let (status, saved) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["slug"], "sourdough");

        let (_, found) = call(&app, get("/api/v1/search?q=sourdogh", "localhost")).await;
        assert_eq!(found[0]["id"], id.as_str());

        let (status, body) = call(&app, get("/ada/sourdough", "localhost")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["content"], "<p>flour</p>");

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/posts/{id}"))
            .header(header::AUTHORIZATION, &auth)
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&app, req).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
