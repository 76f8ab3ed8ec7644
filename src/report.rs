//! Plain-text rendering of results for the terminal.

use crate::favorites::format_observation_date;
use crate::record::{FavoriteEntry, IdentificationCandidate, MapRegion, NearbySpecies, OccurrencePoint};

/// Result cards shown after an identification.
pub const MAX_CARDS: usize = 4;

pub fn candidate_card(index: usize, candidate: &IdentificationCandidate, gallery: &[String]) -> String {
    let mut lines = Vec::new();
    if index == 0 {
        lines.push("🔍 Coincidencia más probable".to_string());
    }
    lines.push(format!("{}. {}", index + 1, candidate.scientific_name()));
    lines.push(format!("   Nombre común: {}", candidate.common_names_display()));
    lines.push(format!("   Familia: {}", candidate.family_display()));
    lines.push(format!("   Género: {}", candidate.genus_display()));
    lines.push(format!("   Confianza: {}", candidate.confidence()));
    for url in gallery {
        lines.push(format!("   📷 {}", url));
    }
    lines.join("\n")
}

pub fn favorite_card(entry: &FavoriteEntry) -> String {
    let c = &entry.candidate;
    [
        c.scientific_name().to_string(),
        format!("   Nombre común: {}", c.common_names_display()),
        format!("   Familia: {}", c.family_display()),
        format!("   Género: {}", c.genus_display()),
        format!(
            "   Fecha de observación: {}",
            format_observation_date(entry.observed_at())
        ),
    ]
    .join("\n")
}

pub fn distribution_summary(scientific_name: &str, points: &[OccurrencePoint]) -> String {
    if points.is_empty() {
        return format!("Distribución: {}\nNo hay datos de distribución.", scientific_name);
    }
    let region = MapRegion::for_points(points);
    let mut lines = vec![
        format!("Distribución: {} ({} puntos)", scientific_name, points.len()),
        format!(
            "Centro: {:.4}, {:.4} (±{}°)",
            region.latitude, region.longitude, region.latitude_delta
        ),
    ];
    lines.extend(
        points
            .iter()
            .map(|p| format!("   {:.5}, {:.5}", p.latitude, p.longitude)),
    );
    lines.join("\n")
}

pub fn nearby_line(species: &NearbySpecies) -> String {
    if species.name == species.scientific_name {
        format!("{} - {}", species.name, species.image)
    } else {
        format!("{} ({}) - {}", species.name, species.scientific_name, species.image)
    }
}
