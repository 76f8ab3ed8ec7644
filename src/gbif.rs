//! Occurrence lookups: distribution points and photo galleries.

use crate::error::Result;
use crate::record::OccurrencePoint;
use csv::Writer;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::fs::File;

/// Records requested for a distribution map. Only this first page is read.
pub const DISTRIBUTION_PAGE_SIZE: u32 = 100;
/// Records requested when collecting gallery photos.
pub const GALLERY_PAGE_SIZE: u32 = 4;
/// Photos kept per gallery.
pub const GALLERY_MAX_IMAGES: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct OccurrenceResponse {
    #[serde(default)]
    pub results: Vec<OccurrenceRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceRecord {
    pub decimal_latitude: Option<f64>,
    pub decimal_longitude: Option<f64>,
    #[serde(default)]
    pub media: Vec<Media>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Media {
    pub identifier: Option<String>,
}

pub struct OccurrenceClient {
    client: Client,
    endpoint: String,
}

impl OccurrenceClient {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    async fn search(&self, params: &[(&str, String)]) -> Result<OccurrenceResponse> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Coordinates for the first page of occurrences of a species.
    pub async fn occurrences(&self, scientific_name: &str) -> Result<Vec<OccurrencePoint>> {
        let body = self
            .search(&distribution_params(scientific_name))
            .await?;
        let total = body.results.len();
        let points = extract_points(&body.results);
        info!(
            "{} of {} occurrences of {} have coordinates",
            points.len(),
            total,
            scientific_name
        );
        Ok(points)
    }

    /// Photo URLs for a species. Failures give an empty gallery.
    pub async fn gallery(&self, scientific_name: &str) -> Vec<String> {
        match self.search(&gallery_params(scientific_name)).await {
            Ok(body) => extract_images(&body.results),
            Err(e) => {
                warn!("Gallery lookup for {} failed: {}", scientific_name, e);
                Vec::new()
            }
        }
    }
}

pub fn distribution_params(scientific_name: &str) -> Vec<(&'static str, String)> {
    vec![
        ("scientificName", scientific_name.to_string()),
        ("limit", DISTRIBUTION_PAGE_SIZE.to_string()),
    ]
}

pub fn gallery_params(scientific_name: &str) -> Vec<(&'static str, String)> {
    vec![
        ("mediaType", "StillImage".to_string()),
        ("scientificName", scientific_name.to_string()),
        ("limit", GALLERY_PAGE_SIZE.to_string()),
    ]
}

/// Keep only records exposing both coordinates.
pub fn extract_points(records: &[OccurrenceRecord]) -> Vec<OccurrencePoint> {
    records
        .iter()
        .filter_map(|r| match (r.decimal_latitude, r.decimal_longitude) {
            (Some(latitude), Some(longitude)) => Some(OccurrencePoint {
                latitude,
                longitude,
            }),
            _ => None,
        })
        .collect()
}

pub fn extract_images(records: &[OccurrenceRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.media.iter())
        .filter_map(|m| m.identifier.as_deref())
        .filter(|url| !url.is_empty())
        .take(GALLERY_MAX_IMAGES)
        .map(str::to_string)
        .collect()
}

/// Save occurrence points to a CSV file
pub fn save_points_csv(points: &[OccurrencePoint], filename: &str) -> Result<()> {
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);

    for point in points {
        writer.serialize(point)?;
    }

    writer.flush()?;
    info!("Points saved to {}", filename);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> OccurrenceResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_record_missing_longitude_yields_no_point() {
        let body = parse(json!({
            "results": [
                {"decimalLatitude": 43.2},
                {"decimalLatitude": 40.4, "decimalLongitude": -3.7}
            ]
        }));
        let points = extract_points(&body.results);
        assert_eq!(
            points,
            vec![OccurrencePoint { latitude: 40.4, longitude: -3.7 }]
        );
    }

    #[test]
    fn test_only_missing_longitude_gives_nothing() {
        let body = parse(json!({"results": [{"decimalLatitude": 43.2, "decimalLongitude": null}]}));
        assert!(extract_points(&body.results).is_empty());
    }

    #[test]
    fn test_zero_coordinates_are_kept() {
        let body = parse(json!({"results": [{"decimalLatitude": 0.0, "decimalLongitude": 0.0}]}));
        assert_eq!(extract_points(&body.results).len(), 1);
    }

    #[test]
    fn test_missing_results_array() {
        let body = parse(json!({"count": 0}));
        assert!(extract_points(&body.results).is_empty());
        assert!(extract_images(&body.results).is_empty());
    }

    #[test]
    fn test_images_are_flattened_and_capped() {
        let body = parse(json!({
            "results": [
                {"media": [{"identifier": "a.jpg"}, {"identifier": ""}, {"type": "StillImage"}]},
                {"media": [{"identifier": "b.jpg"}, {"identifier": "c.jpg"}]},
                {},
                {"media": [{"identifier": "d.jpg"}, {"identifier": "e.jpg"}, {"identifier": "f.jpg"}]}
            ]
        }));
        assert_eq!(
            extract_images(&body.results),
            vec!["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]
        );
    }

    #[test]
    fn test_query_params() {
        let params = distribution_params("Quercus robur");
        assert!(params.contains(&("scientificName", "Quercus robur".to_string())));
        assert!(params.contains(&("limit", "100".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "mediaType"));

        let params = gallery_params("Quercus robur");
        assert!(params.contains(&("mediaType", "StillImage".to_string())));
        assert!(params.contains(&("limit", "4".to_string())));
    }

    #[test]
    fn test_save_points_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let points = [OccurrencePoint { latitude: 40.4, longitude: -3.7 }];
        save_points_csv(&points, path.to_str().unwrap()).unwrap();
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "latitude,longitude\n40.4,-3.7\n"
        );
    }

    #[tokio::test]
    async fn test_gallery_failure_is_empty() {
        let client = OccurrenceClient::new(Client::new(), "http://127.0.0.1:9/occurrence/search");
        assert!(client.gallery("Rosa canina").await.is_empty());
    }
}
