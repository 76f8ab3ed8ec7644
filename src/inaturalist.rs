//! Nearby plant observations and their reduction to one entry per species.

use crate::error::Result;
use crate::record::NearbySpecies;
use log::info;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;

pub const NEARBY_PAGE_SIZE: u32 = 50;
pub const PLANT_TAXON_FILTER: &str = "Plantae";

#[derive(Debug, Default, Deserialize)]
pub struct ObservationResponse {
    #[serde(default)]
    pub results: Vec<RawObservation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawObservation {
    pub taxon: Option<RawTaxon>,
    #[serde(default)]
    pub photos: Vec<RawPhoto>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawTaxon {
    pub name: Option<String>,
    #[serde(default)]
    pub common_names: Vec<LocalizedName>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalizedName {
    pub locale: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawPhoto {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

impl NearbyQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("lat", self.latitude.to_string()),
            ("lng", self.longitude.to_string()),
            ("radius", self.radius_km.to_string()),
            ("iconic_taxa", PLANT_TAXON_FILTER.to_string()),
            ("photos", "true".to_string()),
            ("per_page", NEARBY_PAGE_SIZE.to_string()),
            ("order", "desc".to_string()),
            ("order_by", "observed_on".to_string()),
        ]
    }
}

pub struct ObservationClient {
    client: Client,
    endpoint: String,
    locale: String,
}

impl ObservationClient {
    pub fn new(client: Client, endpoint: &str, locale: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            locale: locale.to_string(),
        }
    }

    pub async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<NearbySpecies>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&query.params())
            .send()
            .await?
            .error_for_status()?;
        let body: ObservationResponse = response.json().await?;
        let species = normalize(&body.results, &self.locale);
        info!(
            "{} observations near ({}, {}) cover {} species",
            body.results.len(),
            query.latitude,
            query.longitude,
            species.len()
        );
        Ok(species)
    }
}

/// One entry per taxon name, first record wins. Records without a taxon
/// name or without a photo are skipped.
pub fn normalize(records: &[RawObservation], locale: &str) -> Vec<NearbySpecies> {
    // Output order is insertion order; `seen` only answers membership
    let mut seen: HashSet<&str> = HashSet::new();
    let mut species: Vec<NearbySpecies> = Vec::new();

    for record in records {
        let Some(taxon) = &record.taxon else { continue };
        let Some(scientific_name) = taxon.name.as_deref().filter(|n| !n.is_empty()) else {
            continue;
        };
        let Some(photo) = record.photos.first().and_then(|p| p.url.as_deref()) else {
            continue;
        };
        if !seen.insert(scientific_name) {
            continue;
        }

        species.push(NearbySpecies {
            name: display_name(taxon, scientific_name, locale),
            image: medium_photo_url(photo),
            scientific_name: scientific_name.to_string(),
        });
    }

    species
}

/// Swap the thumbnail size for the medium rendition. Only the file name is
/// touched; hosts and directories may contain the same word.
pub fn medium_photo_url(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((dir, file)) => format!("{}/{}", dir, file.replacen("square", "medium", 1)),
        None => url.replacen("square", "medium", 1),
    }
}

fn display_name(taxon: &RawTaxon, scientific_name: &str, locale: &str) -> String {
    taxon
        .common_names
        .iter()
        .find(|n| n.locale.as_deref() == Some(locale))
        .and_then(|n| n.name.as_deref())
        .filter(|n| !n.is_empty())
        .unwrap_or(scientific_name)
        .to_string()
}
