//! # criminalidad
//!
//! Read-only JSON API over the Spanish crime-statistics database, serving the
//! map front-end: aggregates by municipality, province, autonomous community
//! or the whole country, time series per geography, and the lists of periods
//! and crime types to filter by.
//!
//! ## Routes
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /api/mapa/delitos/{nivel}` | [`mapa::delitos`] |
//! | `GET /api/mapa/delitos/agregado/{nivel}` | [`mapa::agregado`] |
//! | `GET /api/mapa/delitos/evolucion/{nivel}` | [`mapa::evolucion`] |
//! | `GET /api/mapa/periodos` | [`mapa::periodos`] |
//! | `GET /api/mapa/tipologias` | [`mapa::tipologias`] |
//! | `GET /health` | [`health::health`] |
//! | `GET /`, `/static/*`, `/data/*` | [`statics`] |
//!
//! ## Running
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use criminalidad::{app, AppState, Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), criminalidad::Error> {
//!     let config = Config::from_env()?;
//!     let state = Arc::new(AppState::from_config(&config));
//!     Server::bind(config.bind_addr).serve(app::router(state)).await
//! }
//! ```
//!
//! Each request opens its own database connection and closes it before the
//! response is written. There is no pool and no cache.

mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod app;
pub mod config;
pub mod db;
pub mod health;
pub mod logging;
pub mod mapa;
pub mod middleware;
pub mod nivel;
pub mod sql;
pub mod statics;

pub use app::AppState;
pub use config::Config;
pub use error::{ApiError, Error};
pub use handler::{with_state, Handler};
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use status::Status;
