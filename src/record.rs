use crate::confidence::{self, Confidence};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Family or genus reference inside a species record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonRef {
    #[serde(default)]
    pub scientific_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    #[serde(default)]
    pub scientific_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<TaxonRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genus: Option<TaxonRef>,
    /// Upstream fields we do not interpret but keep when persisting
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One ranked species suggestion from the identification endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentificationCandidate {
    #[serde(default)]
    pub score: f64,
    pub species: Species,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentificationCandidate {
    pub fn new(scientific_name: &str, score: f64) -> Self {
        Self {
            score,
            species: Species {
                scientific_name: scientific_name.to_string(),
                ..Species::default()
            },
            extra: Map::new(),
        }
    }

    pub fn scientific_name(&self) -> &str {
        &self.species.scientific_name
    }

    pub fn percent(&self) -> f64 {
        confidence::score_to_percent(self.score)
    }

    pub fn confidence(&self) -> Confidence {
        confidence::classify(self.percent())
    }

    pub fn common_names_display(&self) -> String {
        match &self.species.common_names {
            Some(names) if !names.is_empty() => names.join(", "),
            _ => "Desconocido".to_string(),
        }
    }

    pub fn family_display(&self) -> &str {
        taxon_or(&self.species.family, "Desconocida")
    }

    pub fn genus_display(&self) -> &str {
        taxon_or(&self.species.genus, "Desconocido")
    }
}

fn taxon_or<'a>(taxon: &'a Option<TaxonRef>, fallback: &'a str) -> &'a str {
    match taxon {
        Some(t) if !t.scientific_name.is_empty() => &t.scientific_name,
        _ => fallback,
    }
}

/// Response body of the identification endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentificationResponse {
    #[serde(default)]
    pub results: Vec<IdentificationCandidate>,
}

/// A saved candidate plus the moment it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    #[serde(flatten)]
    pub candidate: IdentificationCandidate,
    #[serde(
        rename = "fechaFavorito",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub fecha_favorito: Option<String>,
}

impl FavoriteEntry {
    pub fn scientific_name(&self) -> &str {
        self.candidate.scientific_name()
    }

    /// Timestamp to show as the observation date. Older documents stored it
    /// under `fecha` or `timestamp`.
    pub fn observed_at(&self) -> Option<&str> {
        self.fecha_favorito
            .as_deref()
            .or_else(|| self.legacy_field("fecha"))
            .or_else(|| self.legacy_field("timestamp"))
    }

    fn legacy_field(&self, key: &str) -> Option<&str> {
        self.candidate.extra.get(key).and_then(Value::as_str)
    }
}

/// Flat row used when exporting favorites to CSV.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteRow {
    pub scientific_name: String,
    pub common_names: String,
    pub family: String,
    pub genus: String,
    pub score_percent: f64,
    pub saved_at: String,
}

impl From<&FavoriteEntry> for FavoriteRow {
    fn from(entry: &FavoriteEntry) -> Self {
        let c = &entry.candidate;
        Self {
            scientific_name: c.scientific_name().to_string(),
            common_names: c.common_names_display(),
            family: c.family_display().to_string(),
            genus: c.genus_display().to_string(),
            score_percent: c.percent(),
            saved_at: entry.observed_at().unwrap_or_default().to_string(),
        }
    }
}

/// Geolocated occurrence reduced to its coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OccurrencePoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Initial map framing for a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    pub fn for_points(points: &[OccurrencePoint]) -> Self {
        match points.first() {
            Some(first) => Self {
                latitude: first.latitude,
                longitude: first.longitude,
                latitude_delta: 30.0,
                longitude_delta: 30.0,
            },
            None => Self {
                latitude: 20.0,
                longitude: 0.0,
                latitude_delta: 90.0,
                longitude_delta: 90.0,
            },
        }
    }
}

/// Plant species observed near a location.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbySpecies {
    pub name: String,
    pub image: String,
    pub scientific_name: String,
}
