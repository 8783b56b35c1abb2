// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, blog, health, interaction, nucleus, providers, roundrobin},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Public routes: health, model listings, plans, blog reads.
/// * Signed-in routes sit behind `auth_middleware`; admin routes add `admin_middleware`.
/// * Trace and CORS wrap everything.
pub fn create_router(state: AppState) -> Router {
    let require_auth = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .route_layer(require_auth()),
        );

    let ollama_routes = Router::new()
        .route("/health", get(health::ollama_health))
        .route("/models", get(providers::ollama_models))
        .merge(
            Router::new()
                .route("/chat", post(providers::ollama_chat))
                .route_layer(require_auth()),
        );

    let blog_routes = Router::new()
        .route("/posts", get(blog::list_posts))
        .route("/posts/{slug}", get(blog::get_post))
        .route("/posts/{slug}/comments", get(interaction::list_comments))
        .merge(
            Router::new()
                .route("/posts/{slug}/comments", post(interaction::create_comment))
                .route("/posts/{slug}/vote", put(interaction::vote))
                .route("/comments/{id}", delete(interaction::delete_comment))
                .route_layer(require_auth()),
        )
        .merge(
            Router::new()
                .route("/posts", post(blog::create_post))
                .route(
                    "/posts/{slug}",
                    put(blog::update_post).delete(blog::delete_post),
                )
                // Auth first, then the admin check
                .route_layer(middleware::from_fn(admin_middleware))
                .route_layer(require_auth()),
        );

    let nucleus_routes = Router::new()
        .route("/plans", get(nucleus::list_plans))
        .merge(
            Router::new()
                .route("/credits", get(nucleus::get_credits))
                .route("/credits/claim", post(nucleus::claim_allowance))
                .route("/subscription", get(nucleus::get_subscription))
                .route("/chat", post(nucleus::billed_chat))
                .route_layer(require_auth()),
        );

    let roundrobin_routes = Router::new()
        .route(
            "/sessions",
            post(roundrobin::create_session).get(roundrobin::list_sessions),
        )
        .route("/sessions/{id}", get(roundrobin::get_session))
        .route_layer(require_auth());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/credits", post(admin::grant_credits))
        .route("/users/{id}/subscription", put(admin::update_subscription))
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(require_auth());

    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/models", get(providers::all_models))
        .route("/api/openai/models", get(providers::openai_models))
        .nest("/api/auth", auth_routes)
        .nest("/api/ollama", ollama_routes)
        .nest("/api/blog", blog_routes)
        .nest("/api/nucleus", nucleus_routes)
        .nest("/api/roundrobin", roundrobin_routes)
        .nest("/api/admin", admin_routes)
        .layer(layers)
        .with_state(state)
}
