//! Geography levels and the per-level row predicates.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ApiError;

/// Aggregation level of a geography label.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Nivel {
    Municipio,
    Provincia,
    Ccaa,
    Nacional,
}

impl Nivel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Municipio => "municipio",
            Self::Provincia => "provincia",
            Self::Ccaa      => "ccaa",
            Self::Nacional  => "nacional",
        }
    }

    /// SQL predicate over `delitos_aux.geo` selecting rows at this level.
    ///
    /// Constant fragments only; user input is never spliced in here.
    pub fn geo_predicate(self) -> &'static str {
        match self {
            Self::Ccaa      => "geo LIKE 'CCAA%'",
            Self::Provincia => "geo LIKE 'Provincia%'",
            // municipalities are keyed by postal code
            Self::Municipio => "geo ~ '^[0-9]'",
            Self::Nacional  => "geo = 'NACIONAL'",
        }
    }
}

impl FromStr for Nivel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "municipio" => Ok(Self::Municipio),
            "provincia" => Ok(Self::Provincia),
            "ccaa"      => Ok(Self::Ccaa),
            "nacional"  => Ok(Self::Nacional),
            _           => Err(()),
        }
    }
}

impl fmt::Display for Nivel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The level-taking endpoints. Each one validates against its own list, in
/// its own order, so its 400 message reads the way the front-end expects.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endpoint {
    Listado,
    Agregado,
    Evolucion,
}

impl Endpoint {
    pub fn allowed(self) -> &'static [Nivel] {
        use Nivel::*;
        match self {
            Self::Listado                    => &[Municipio, Provincia, Ccaa, Nacional],
            Self::Agregado | Self::Evolucion => &[Ccaa, Provincia, Municipio, Nacional],
        }
    }

    /// `"a, b, c o d"`.
    pub fn allowed_message(self) -> String {
        let names: Vec<&str> = self.allowed().iter().map(|n| n.as_str()).collect();
        match names.split_last() {
            Some((last, [])) => (*last).to_owned(),
            Some((last, rest)) => format!("{} o {last}", rest.join(", ")),
            None => String::new(),
        }
    }

    /// Validates a raw `nivel` path segment for this endpoint.
    pub fn resolve(self, raw: Option<&str>) -> Result<Nivel, ApiError> {
        raw.and_then(|s| s.parse::<Nivel>().ok())
            .filter(|n| self.allowed().contains(n))
            .ok_or(ApiError::InvalidNivel { endpoint: self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_round_trips_through_its_name() {
        for n in [Nivel::Municipio, Nivel::Provincia, Nivel::Ccaa, Nivel::Nacional] {
            assert_eq!(n.as_str().parse::<Nivel>(), Ok(n));
        }
    }

    #[test]
    fn rejects_unknown_and_miscased_levels() {
        for raw in ["", "CCAA", "pais", "region", "municipios", " ccaa"] {
            for ep in [Endpoint::Listado, Endpoint::Agregado, Endpoint::Evolucion] {
                assert!(ep.resolve(Some(raw)).is_err(), "{raw:?} accepted by {ep:?}");
            }
        }
        assert!(Endpoint::Agregado.resolve(None).is_err());
    }

    #[test]
    fn nacional_is_accepted_everywhere() {
        for ep in [Endpoint::Listado, Endpoint::Agregado, Endpoint::Evolucion] {
            assert_eq!(ep.resolve(Some("nacional")).unwrap(), Nivel::Nacional);
        }
    }

    #[test]
    fn messages_follow_endpoint_order() {
        assert_eq!(Endpoint::Listado.allowed_message(), "municipio, provincia, ccaa o nacional");
        assert_eq!(Endpoint::Agregado.allowed_message(), "ccaa, provincia, municipio o nacional");
        assert_eq!(Endpoint::Evolucion.allowed_message(), "ccaa, provincia, municipio o nacional");
    }

    #[test]
    fn predicates_are_distinct_constants() {
        assert_eq!(Nivel::Ccaa.geo_predicate(), "geo LIKE 'CCAA%'");
        assert_eq!(Nivel::Provincia.geo_predicate(), "geo LIKE 'Provincia%'");
        assert_eq!(Nivel::Municipio.geo_predicate(), "geo ~ '^[0-9]'");
        assert_eq!(Nivel::Nacional.geo_predicate(), "geo = 'NACIONAL'");
    }
}
