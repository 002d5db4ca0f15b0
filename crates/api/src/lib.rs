//! HTTP API server with observability for the storefront system.
//!
//! Exposes the cart and invoice workflows plus administrative product
//! management, with structured logging (tracing) and Prometheus metrics.
//! Identity arrives from the upstream identity collaborator as trusted
//! headers; see [`extract::Identity`].

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::CheckoutFlow;
use domain::{CartService, CatalogService, InvoiceService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CartStore, InvoiceStore, ProductStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Combined storage bound required by the handlers.
pub trait Store: ProductStore + CartStore + InvoiceStore + Clone + 'static {}
impl<T: ProductStore + CartStore + InvoiceStore + Clone + 'static> Store for T {}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cart",
            post(routes::cart::create::<S>)
                .get(routes::cart::get::<S>)
                .delete(routes::cart::cancel::<S>),
        )
        .route("/cart/add", put(routes::cart::add::<S>))
        .route(
            "/invoices",
            post(routes::invoices::commit::<S>).get(routes::invoices::list::<S>),
        )
        .route("/invoices/{id}", put(routes::invoices::amend::<S>))
        .route("/products", post(routes::products::create::<S>))
        .route("/products/{id}", put(routes::products::update::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given store.
pub fn create_default_state<S: Store>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        cart_service: CartService::new(store.clone()),
        invoice_service: InvoiceService::new(store.clone()),
        catalog_service: CatalogService::new(store.clone()),
        checkout: CheckoutFlow::new(store),
    })
}
