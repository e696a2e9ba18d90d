//! `/api/mapa/*` handlers: crime aggregates by geography and period.
//!
//! Each handler validates its parameters, opens one connection, runs one
//! statement and shapes the rows. Parameter errors are returned before any
//! connection is opened. The connection guard is dropped on every return.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio_postgres::Row;
use tracing::debug;

use crate::app::AppState;
use crate::error::ApiError;
use crate::nivel::{Endpoint, Nivel};
use crate::request::Request;
use crate::response::Json;
use crate::sql::Statement;

/// Period used by the aggregate view when the client names none.
pub const DEFAULT_PERIODO: &str = "2024-06-01";

/// Row cap of the raw listing.
pub const LISTADO_LIMIT: u32 = 10;

/// Period labels in `delitos` starting with this are deltas, not counts.
pub const VARIACION_PREFIX: &str = "Variación";

const PERIODO_FORMAT: &str = "%Y-%m-%d";

// ── Response bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Listado {
    pub nivel: Nivel,
    pub total_registros: usize,
    pub datos: Vec<DelitoRow>,
}

#[derive(Debug, Serialize)]
pub struct DelitoRow {
    pub geografia: Option<String>,
    pub tipologia_penal: Option<String>,
    pub periodo: Option<String>,
    pub total: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Agregado {
    pub nivel: Nivel,
    pub periodo: String,
    pub tipologia: Option<String>,
    pub total_registros: usize,
    pub datos: Vec<AgregadoRow>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct AgregadoRow {
    pub geo: String,
    pub total_delitos: i64,
    pub num_tipologias: i64,
    pub poblacion: i64,
    pub tasa_por_mil: f64,
}

#[derive(Debug, Serialize)]
pub struct Periodos {
    pub periodos: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Tipologias {
    pub tipologias: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Evolucion {
    pub nivel: Nivel,
    pub tipologia: Option<String>,
    pub datos: Vec<Serie>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Serie {
    pub geo: String,
    pub evolucion: Vec<Punto>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Punto {
    pub periodo: String,
    pub total_delitos: i64,
    pub poblacion: i64,
    pub tasa_por_mil: f64,
}

// ── Derived values ────────────────────────────────────────────────────────────

fn parse_periodo(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, PERIODO_FORMAT)
        .map_err(|_| ApiError::InvalidPeriodo(raw.to_owned()))
}

fn format_periodo(date: NaiveDate) -> String {
    date.format(PERIODO_FORMAT).to_string()
}

/// Reads a nullable numeric column as `f64`, with null as zero.
fn number(row: &Row, idx: &str) -> Result<f64, tokio_postgres::Error> {
    Ok(row.try_get::<_, Option<f64>>(idx)?.unwrap_or(0.0))
}

// ── Statements ────────────────────────────────────────────────────────────────

/// Incidents per 1,000 inhabitants over the group, as a select-list item.
///
/// Rounded in `numeric` so half-cent values round up, not to the nearest
/// binary float. Zero when the population is zero or unknown.
pub(crate) fn tasa_por_mil_sql(sum_column: &str) -> String {
    format!(
        "CASE WHEN MAX(pob) > 0 \
              THEN ROUND(SUM({sum_column})::numeric / MAX(pob) * 1000, 2)::float8 \
              ELSE 0 END AS tasa_por_mil"
    )
}

pub(crate) fn listado_statement() -> Statement {
    Statement::new(
        "SELECT geografia, tipologia_penal, periodo, total::bigint AS total FROM delitos",
    )
    .filter(&format!("periodo NOT LIKE '{VARIACION_PREFIX}%'"))
    .tail(&format!("LIMIT {LISTADO_LIMIT}"))
}

pub(crate) fn agregado_statement(nivel: Nivel, periodo: NaiveDate, tipologia: Option<String>) -> Statement {
    Statement::new(&format!(
        "SELECT geo, \
                SUM(valor_acumulado)::float8 AS total_delitos, \
                COUNT(DISTINCT tipo) AS num_tipologias, \
                MAX(pob)::float8 AS poblacion, \
                {} \
         FROM delitos_aux",
        tasa_por_mil_sql("valor_acumulado"),
    ))
    .eq("periodo", periodo)
    .filter(nivel.geo_predicate())
    .eq_opt("tipo", tipologia)
    .tail("GROUP BY geo ORDER BY total_delitos DESC NULLS LAST")
}

pub(crate) fn evolucion_statement(geos: Vec<String>, tipologia: Option<String>) -> Statement {
    Statement::new(&format!(
        "SELECT geo, periodo, \
                SUM(valor)::float8 AS total_delitos, \
                MAX(pob)::float8 AS poblacion, \
                {} \
         FROM delitos_aux",
        tasa_por_mil_sql("valor"),
    ))
    .any_of("geo", geos)
    .eq_opt("tipo", tipologia)
    .tail("GROUP BY geo, periodo ORDER BY geo, periodo")
}

pub(crate) fn periodos_statement() -> Statement {
    Statement::new("SELECT DISTINCT periodo FROM delitos_aux")
        .filter("periodo IS NOT NULL")
        .tail("ORDER BY periodo DESC")
}

pub(crate) fn tipologias_statement() -> Statement {
    Statement::new("SELECT DISTINCT tipo FROM delitos_aux")
        .filter("tipo IS NOT NULL")
        .tail("ORDER BY tipo")
}

// ── Row shaping ───────────────────────────────────────────────────────────────

/// One `(geo, periodo)` bucket of the time series.
#[derive(Debug, PartialEq)]
pub(crate) struct SerieRow {
    pub geo: String,
    pub periodo: NaiveDate,
    pub total: f64,
    pub poblacion: f64,
    pub tasa: f64,
}

pub(crate) fn agregado_row(
    geo: String,
    total: f64,
    num_tipologias: i64,
    poblacion: f64,
    tasa: f64,
) -> AgregadoRow {
    AgregadoRow {
        geo,
        total_delitos: total as i64,
        num_tipologias,
        poblacion: poblacion as i64,
        tasa_por_mil: tasa,
    }
}

/// Groups rows by geography in order of first appearance. Rows arrive sorted
/// by `(geo, periodo)`; each series is additionally sorted by period so the
/// output never depends on that.
pub(crate) fn group_series(rows: impl IntoIterator<Item = SerieRow>) -> Vec<Serie> {
    let mut grouped: Vec<(String, Vec<(NaiveDate, Punto)>)> = Vec::new();
    for row in rows {
        let punto = Punto {
            periodo: format_periodo(row.periodo),
            total_delitos: row.total as i64,
            poblacion: row.poblacion as i64,
            tasa_por_mil: row.tasa,
        };
        match grouped.iter_mut().find(|(geo, _)| *geo == row.geo) {
            Some((_, puntos)) => puntos.push((row.periodo, punto)),
            None => grouped.push((row.geo, vec![(row.periodo, punto)])),
        }
    }
    grouped
        .into_iter()
        .map(|(geo, mut puntos)| {
            puntos.sort_by_key(|(periodo, _)| *periodo);
            Serie { geo, evolucion: puntos.into_iter().map(|(_, p)| p).collect() }
        })
        .collect()
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /api/mapa/delitos/{nivel}`
///
/// Raw sample of the fine-grained table. `nivel` is validated and echoed;
/// `tipologia` and `periodo` are accepted but do not filter.
pub async fn delitos(state: Arc<AppState>, req: Request) -> Result<Json<Listado>, ApiError> {
    let nivel = Endpoint::Listado.resolve(req.param("nivel"))?;
    for ignored in ["tipologia", "periodo"] {
        if let Some(value) = req.query_filter(ignored) {
            debug!(param = ignored, value, "raw listing does not filter on this parameter");
        }
    }

    let st = listado_statement();
    let conn = state.db.connect().await?;
    let rows = conn.query(st.sql(), &st.params()).await?;

    let datos = rows
        .iter()
        .map(|row| {
            Ok(DelitoRow {
                geografia: row.try_get("geografia")?,
                tipologia_penal: row.try_get("tipologia_penal")?,
                periodo: row.try_get("periodo")?,
                total: row.try_get("total")?,
            })
        })
        .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

    Ok(Json(Listado { nivel, total_registros: datos.len(), datos }))
}

/// `GET /api/mapa/delitos/agregado/{nivel}?periodo=&tipologia=`
pub async fn agregado(state: Arc<AppState>, req: Request) -> Result<Json<Agregado>, ApiError> {
    let nivel = Endpoint::Agregado.resolve(req.param("nivel"))?;
    let periodo = parse_periodo(req.query_filter("periodo").unwrap_or(DEFAULT_PERIODO))?;
    let tipologia = req.query_filter("tipologia").map(str::to_owned);

    let st = agregado_statement(nivel, periodo, tipologia.clone());
    let conn = state.db.connect().await?;
    let rows = conn.query(st.sql(), &st.params()).await?;

    let datos = rows
        .iter()
        .map(|row| {
            Ok(agregado_row(
                row.try_get("geo")?,
                number(row, "total_delitos")?,
                row.try_get("num_tipologias")?,
                number(row, "poblacion")?,
                number(row, "tasa_por_mil")?,
            ))
        })
        .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

    Ok(Json(Agregado {
        nivel,
        periodo: format_periodo(periodo),
        tipologia,
        total_registros: datos.len(),
        datos,
    }))
}

/// `GET /api/mapa/periodos`, newest first.
pub async fn periodos(state: Arc<AppState>, _req: Request) -> Result<Json<Periodos>, ApiError> {
    let st = periodos_statement();
    let conn = state.db.connect().await?;
    let rows = conn.query(st.sql(), &st.params()).await?;

    let periodos = rows
        .iter()
        .map(|row| row.try_get::<_, NaiveDate>(0).map(format_periodo))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(Periodos { periodos }))
}

/// `GET /api/mapa/tipologias`, ascending.
pub async fn tipologias(state: Arc<AppState>, _req: Request) -> Result<Json<Tipologias>, ApiError> {
    let st = tipologias_statement();
    let conn = state.db.connect().await?;
    let rows = conn.query(st.sql(), &st.params()).await?;

    let tipologias = rows
        .iter()
        .map(|row| row.try_get::<_, String>(0))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(Tipologias { tipologias }))
}

/// `GET /api/mapa/delitos/evolucion/{nivel}?geo1=&geo2=&tipologia=`
///
/// Per-period series for one geography, or two side by side. `nivel` is
/// validated and echoed; the labels select the rows.
pub async fn evolucion(state: Arc<AppState>, req: Request) -> Result<Json<Evolucion>, ApiError> {
    let nivel = Endpoint::Evolucion.resolve(req.param("nivel"))?;
    let geo1 = req.query_filter("geo1").ok_or(ApiError::MissingParam("geo1"))?;
    let mut geos = vec![geo1.to_owned()];
    if let Some(geo2) = req.query_filter("geo2").filter(|g| *g != geo1) {
        geos.push(geo2.to_owned());
    }
    let tipologia = req.query_filter("tipologia").map(str::to_owned);

    let st = evolucion_statement(geos, tipologia.clone());
    let conn = state.db.connect().await?;
    let rows = conn.query(st.sql(), &st.params()).await?;

    let rows = rows
        .iter()
        .map(|row| {
            Ok(SerieRow {
                geo: row.try_get("geo")?,
                periodo: row.try_get("periodo")?,
                total: number(row, "total_delitos")?,
                poblacion: number(row, "poblacion")?,
                tasa: number(row, "tasa_por_mil")?,
            })
        })
        .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

    Ok(Json(Evolucion { nivel, tipologia, datos: group_series(rows) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_state;
    use crate::request::test_request;
    use crate::response::IntoResponse;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, PERIODO_FORMAT).unwrap()
    }

    #[test]
    fn rate_is_rounded_in_numeric_with_zero_fallback() {
        let sql = tasa_por_mil_sql("valor_acumulado");
        assert!(sql.contains(
            "CASE WHEN MAX(pob) > 0 THEN ROUND(SUM(valor_acumulado)::numeric / MAX(pob) * 1000, 2)::float8"
        ));
        assert!(sql.ends_with("ELSE 0 END AS tasa_por_mil"));
        assert!(!sql.contains("::float8 /"), "division must not happen in float8");
    }

    #[test]
    fn both_rate_statements_select_the_rounded_rate() {
        let st = agregado_statement(Nivel::Ccaa, date("2024-06-01"), None);
        assert!(st.sql().contains("ROUND(SUM(valor_acumulado)::numeric / MAX(pob) * 1000, 2)"));
        let st = evolucion_statement(vec!["A".into()], None);
        assert!(st.sql().contains("ROUND(SUM(valor)::numeric / MAX(pob) * 1000, 2)"));
    }

    #[test]
    fn half_cent_rate_is_passed_through_unchanged() {
        // 1001 / 8000 * 1000 = 125.125 exactly; numeric rounds it to 125.13,
        // binary float rounding would give 125.12.
        let row = agregado_row("Provincia 28 Madrid".into(), 1001.0, 2, 8000.0, 125.13);
        assert_eq!(row.tasa_por_mil, 125.13);
        assert_eq!(row.total_delitos, 1001);
        assert_eq!(row.poblacion, 8000);
    }

    #[test]
    fn aggregate_row_degrades_null_population_to_zero() {
        let row = agregado_row("CCAA 01 Andalucía".into(), 1234.0, 3, 0.0, 0.0);
        assert_eq!(row.poblacion, 0);
        assert_eq!(row.tasa_por_mil, 0.0);
        assert_eq!(row.total_delitos, 1234);
    }

    #[test]
    fn periodos_are_distinct_newest_first() {
        let st = periodos_statement();
        assert_eq!(
            st.sql(),
            "SELECT DISTINCT periodo FROM delitos_aux WHERE periodo IS NOT NULL ORDER BY periodo DESC"
        );
        assert_eq!(st.param_count(), 0);
    }

    #[test]
    fn tipologias_are_distinct_ascending() {
        let st = tipologias_statement();
        assert_eq!(
            st.sql(),
            "SELECT DISTINCT tipo FROM delitos_aux WHERE tipo IS NOT NULL ORDER BY tipo"
        );
        assert_eq!(st.param_count(), 0);
    }

    #[test]
    fn listado_excludes_variation_rows_and_caps() {
        let st = listado_statement();
        assert!(st.sql().contains("WHERE periodo NOT LIKE 'Variación%'"));
        assert!(st.sql().ends_with("LIMIT 10"));
        assert_eq!(st.param_count(), 0);
    }

    #[test]
    fn agregado_binds_period_and_optional_type() {
        let st = agregado_statement(Nivel::Ccaa, date("2024-06-01"), None);
        assert!(st.sql().contains("WHERE periodo = $1 AND geo LIKE 'CCAA%' GROUP BY geo"));
        assert!(st.sql().contains("ORDER BY total_delitos DESC"));
        assert_eq!(st.param_count(), 1);

        let st = agregado_statement(Nivel::Nacional, date("2024-06-01"), Some("1.1".into()));
        assert!(st.sql().contains("AND geo = 'NACIONAL' AND tipo = $2"));
        assert_eq!(st.param_count(), 2);
    }

    #[test]
    fn evolucion_binds_each_geography() {
        let st = evolucion_statement(vec!["A".into(), "B".into()], Some("t".into()));
        assert!(st.sql().contains("WHERE geo IN ($1, $2) AND tipo = $3"));
        assert!(st.sql().ends_with("GROUP BY geo, periodo ORDER BY geo, periodo"));
    }

    #[test]
    fn series_group_by_geo_in_period_order() {
        let row = |geo: &str, periodo: &str, total: f64| SerieRow {
            geo: geo.into(),
            periodo: date(periodo),
            total,
            poblacion: 1000.0,
            tasa: total,
        };
        let series = group_series(vec![
            row("Provincia 08 Barcelona", "2024-03-01", 4.0),
            row("Provincia 28 Madrid", "2024-01-01", 1.0),
            row("Provincia 08 Barcelona", "2024-01-01", 2.0),
            row("Provincia 28 Madrid", "2024-03-01", 3.0),
        ]);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].geo, "Provincia 08 Barcelona");
        let periodos: Vec<&str> = series[0].evolucion.iter().map(|p| p.periodo.as_str()).collect();
        assert_eq!(periodos, ["2024-01-01", "2024-03-01"]);
        assert_eq!(series[0].evolucion[0].tasa_por_mil, 2.0);
        assert_eq!(series[1].evolucion[1].total_delitos, 3);
    }

    #[test]
    fn no_rows_means_no_groups() {
        assert!(group_series(Vec::new()).is_empty());
    }

    fn status_of(resp: impl IntoResponse) -> u16 {
        resp.into_response().status_code()
    }

    #[tokio::test]
    async fn invalid_level_rejected_without_database() {
        // test_state points at a refused port: reaching it would yield 500.
        let state = test_state();
        for nivel in ["pais", "CCAA", ""] {
            let req = || test_request("/", &[("nivel", nivel)], None);
            assert_eq!(status_of(delitos(state.clone(), req()).await), 400);
            assert_eq!(status_of(agregado(state.clone(), req()).await), 400);
            assert_eq!(status_of(evolucion(state.clone(), req()).await), 400);
        }
    }

    #[tokio::test]
    async fn bad_periodo_and_missing_geo_are_client_errors() {
        let state = test_state();
        let req = test_request("/", &[("nivel", "ccaa")], Some("periodo=junio"));
        assert_eq!(status_of(agregado(state.clone(), req).await), 400);

        let req = test_request("/", &[("nivel", "ccaa")], Some("geo2=CCAA%2001"));
        assert_eq!(status_of(evolucion(state, req).await), 400);
    }

    #[tokio::test]
    async fn database_failure_is_a_server_error() {
        let req = test_request("/", &[("nivel", "ccaa")], Some("periodo=2024-06-01"));
        let resp = agregado(test_state(), req).await.into_response();
        assert_eq!(resp.status_code(), 500);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert!(body["detail"].as_str().unwrap().starts_with("Error conectando a PostgreSQL"));
    }
}
