//! Application wiring: shared state and the route table.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::handler::with_state;
use crate::method::Method;
use crate::router::Router;
use crate::{health, mapa, statics};

/// Read-only state shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub db: Database,
    pub frontend_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            db: Database::new(config.pg.clone()),
            frontend_dir: config.frontend_dir.clone(),
            data_dir: config.data_dir.clone(),
        }
    }
}

/// Every route the service answers.
pub fn router(state: Arc<AppState>) -> Router {
    let s = || Arc::clone(&state);
    Router::new()
        .on(Method::Get, "/",                                  with_state(s(), statics::index))
        .on(Method::Get, "/static/{*path}",                    with_state(s(), statics::frontend))
        .on(Method::Get, "/data/{*path}",                      with_state(s(), statics::data))
        .on(Method::Get, "/health",                            with_state(s(), health::health))
        .on(Method::Get, "/api/mapa/periodos",                 with_state(s(), mapa::periodos))
        .on(Method::Get, "/api/mapa/tipologias",               with_state(s(), mapa::tipologias))
        .on(Method::Get, "/api/mapa/delitos/{nivel}",          with_state(s(), mapa::delitos))
        .on(Method::Get, "/api/mapa/delitos/agregado/{nivel}", with_state(s(), mapa::agregado))
        .on(Method::Get, "/api/mapa/delitos/evolucion/{nivel}", with_state(s(), mapa::evolucion))
}

#[cfg(test)]
pub(crate) fn test_state() -> Arc<AppState> {
    Arc::new(AppState {
        db: crate::db::unreachable_db(),
        frontend_dir: PathBuf::from("/nonexistent/frontend"),
        data_dir: PathBuf::from("/nonexistent/data"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Route;

    #[test]
    fn every_endpoint_is_routed() {
        let app = router(test_state());
        for path in [
            "/",
            "/health",
            "/static/js/app.js",
            "/data/municipios.geojson",
            "/api/mapa/periodos",
            "/api/mapa/tipologias",
            "/api/mapa/delitos/ccaa",
            "/api/mapa/delitos/agregado/provincia",
            "/api/mapa/delitos/evolucion/municipio",
        ] {
            assert!(matches!(app.lookup(Method::Get, path), Route::Found(..)), "{path}");
        }
    }

    #[test]
    fn level_lands_in_nivel_param() {
        let app = router(test_state());
        match app.lookup(Method::Get, "/api/mapa/delitos/evolucion/ccaa") {
            Route::Found(_, params) => assert_eq!(params["nivel"], "ccaa"),
            _ => panic!("expected match"),
        }
    }
}
