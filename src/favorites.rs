use crate::error::Result;
use crate::record::{FavoriteEntry, FavoriteRow, IdentificationCandidate};
use crate::store::KeyValueStore;
use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use csv::Writer;
use log::{info, warn};
use std::fs::File;
use std::sync::{Arc, Mutex};

/// Storage slot holding the serialized favorites list.
pub const FAVORITES_KEY: &str = "favoritos";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// Favorites persisted as one JSON array in a single key-value slot.
///
/// Every mutation reads the whole document, edits it and writes it back.
/// The cycle runs under `lock`, so two calls on the same store cannot both
/// pass the duplicate check. Separate processes sharing the slot are not
/// coordinated.
pub struct FavoritesStore {
    store: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl FavoritesStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Load the list. An absent or malformed document reads as empty.
    pub fn list(&self) -> Result<Vec<FavoriteEntry>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.load()
    }

    pub fn add(&self, candidate: &IdentificationCandidate) -> Result<AddOutcome> {
        self.add_at(candidate, Utc::now())
    }

    /// Add with an explicit save time.
    pub fn add_at(
        &self,
        candidate: &IdentificationCandidate,
        saved_at: DateTime<Utc>,
    ) -> Result<AddOutcome> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut favorites = self.load()?;

        let name = candidate.scientific_name();
        if favorites.iter().any(|f| f.scientific_name() == name) {
            info!("{} is already a favorite", name);
            return Ok(AddOutcome::AlreadyPresent);
        }

        favorites.push(FavoriteEntry {
            candidate: candidate.clone(),
            fecha_favorito: Some(saved_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        });
        self.save(&favorites)?;
        info!("Added {} to favorites ({} total)", name, favorites.len());
        Ok(AddOutcome::Added)
    }

    /// Drop every entry with this scientific name. Absent names are a no-op.
    pub fn remove(&self, scientific_name: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let favorites = self.load()?;
        let before = favorites.len();
        let kept: Vec<FavoriteEntry> = favorites
            .into_iter()
            .filter(|f| f.scientific_name() != scientific_name)
            .collect();

        info!("Removed {} favorite(s) named {}", before - kept.len(), scientific_name);
        self.save(&kept)
    }

    /// Save favorites to a CSV file
    pub fn export_csv(&self, filename: &str) -> Result<usize> {
        let favorites = self.list()?;
        let file = File::create(filename)?;
        let mut writer = Writer::from_writer(file);

        for entry in &favorites {
            writer.serialize(FavoriteRow::from(entry))?;
        }

        writer.flush()?;
        info!("Favorites saved to {}", filename);
        Ok(favorites.len())
    }

    fn load(&self) -> Result<Vec<FavoriteEntry>> {
        let Some(raw) = self.store.get(FAVORITES_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(favorites) => Ok(favorites),
            Err(e) => {
                warn!("Stored favorites are unreadable, starting empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, favorites: &[FavoriteEntry]) -> Result<()> {
        let json = serde_json::to_string(favorites)?;
        self.store.set(FAVORITES_KEY, &json)
    }
}

/// Render a stored timestamp as `dd/mm/yyyy` in the local timezone.
pub fn format_observation_date(timestamp: Option<&str>) -> String {
    format_observation_date_in(timestamp, &Local)
}

pub fn format_observation_date_in<Tz: TimeZone>(timestamp: Option<&str>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(raw) = timestamp.filter(|s| !s.is_empty()) else {
        return "Sin fecha".to_string();
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(date) => date.with_timezone(tz).format("%d/%m/%Y").to_string(),
        Err(_) => "Sin fecha".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};
    use std::thread;

    fn memory_favorites() -> (Arc<MemoryStore>, FavoritesStore) {
        let backing = Arc::new(MemoryStore::new());
        let favorites = FavoritesStore::new(backing.clone());
        (backing, favorites)
    }

    #[test]
    fn test_distinct_adds_are_all_kept() {
        let (_, favorites) = memory_favorites();
        for name in ["Quercus robur", "Rosa canina", "Bellis perennis"] {
            let outcome = favorites.add(&IdentificationCandidate::new(name, 0.5)).unwrap();
            assert_eq!(outcome, AddOutcome::Added);
        }

        let list = favorites.list().unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.iter().all(|f| f.fecha_favorito.is_some()));
        assert_eq!(list[0].scientific_name(), "Quercus robur");
        assert_eq!(list[2].scientific_name(), "Bellis perennis");
    }

    #[test]
    fn test_duplicate_add_is_reported_not_stored() {
        let (_, favorites) = memory_favorites();
        let rose = IdentificationCandidate::new("Rosa canina", 0.52);
        assert_eq!(favorites.add(&rose).unwrap(), AddOutcome::Added);

        let rescored = IdentificationCandidate::new("Rosa canina", 0.9);
        assert_eq!(favorites.add(&rescored).unwrap(), AddOutcome::AlreadyPresent);

        let list = favorites.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].candidate.score, 0.52);
    }

    #[test]
    fn test_timestamp_format() {
        let (_, favorites) = memory_favorites();
        let saved_at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap();
        favorites
            .add_at(&IdentificationCandidate::new("Rosa canina", 0.5), saved_at)
            .unwrap();
        let list = favorites.list().unwrap();
        assert_eq!(list[0].fecha_favorito.as_deref(), Some("2024-03-05T12:30:00.000Z"));
    }

    #[test]
    fn test_remove() {
        let (_, favorites) = memory_favorites();
        favorites.add(&IdentificationCandidate::new("Rosa canina", 0.5)).unwrap();
        favorites.add(&IdentificationCandidate::new("Quercus robur", 0.5)).unwrap();

        favorites.remove("Rosa canina").unwrap();
        let list = favorites.list().unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.iter().all(|f| f.scientific_name() != "Rosa canina"));

        favorites.remove("Not there").unwrap();
        assert_eq!(favorites.list().unwrap(), list);
    }

    #[test]
    fn test_remove_drops_every_match() {
        let (backing, favorites) = memory_favorites();
        // Duplicates can exist in documents written by other clients
        backing
            .set(
                FAVORITES_KEY,
                r#"[{"score":0.1,"species":{"scientificName":"A"}},
                    {"score":0.2,"species":{"scientificName":"A"}},
                    {"score":0.3,"species":{"scientificName":"B"}}]"#,
            )
            .unwrap();
        favorites.remove("A").unwrap();
        let list = favorites.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].scientific_name(), "B");
    }

    #[test]
    fn test_absent_and_corrupt_read_as_empty() {
        let (backing, favorites) = memory_favorites();
        assert!(favorites.list().unwrap().is_empty());

        backing.set(FAVORITES_KEY, "{not json").unwrap();
        assert!(favorites.list().unwrap().is_empty());

        // A corrupt document is replaced on the next successful add
        favorites.add(&IdentificationCandidate::new("Rosa canina", 0.5)).unwrap();
        assert_eq!(favorites.list().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_adds_of_same_name() {
        let (_, favorites) = memory_favorites();
        let favorites = Arc::new(favorites);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let favorites = Arc::clone(&favorites);
                thread::spawn(move || {
                    favorites
                        .add(&IdentificationCandidate::new("Rosa canina", 0.5))
                        .unwrap()
                })
            })
            .collect();
        let outcomes: Vec<AddOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outcomes.iter().filter(|o| **o == AddOutcome::Added).count(), 1);
        assert_eq!(favorites.list().unwrap().len(), 1);
    }

    #[test]
    fn test_file_backed_persistence_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let backing: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));

        FavoritesStore::new(backing.clone())
            .add(&IdentificationCandidate::new("Quercus robur", 0.81))
            .unwrap();

        let reopened = FavoritesStore::new(backing);
        assert_eq!(reopened.list().unwrap().len(), 1);

        let out = dir.path().join("favorites.csv");
        let written = reopened.export_csv(out.to_str().unwrap()).unwrap();
        assert_eq!(written, 1);
        let csv = std::fs::read_to_string(out).unwrap();
        assert!(csv.starts_with("scientific_name,common_names,family,genus,score_percent,saved_at"));
        assert!(csv.contains("Quercus robur,Desconocido,Desconocida,Desconocido,81.0,"));
    }

    #[test]
    fn test_format_observation_date() {
        assert_eq!(
            format_observation_date_in(Some("2024-03-05T12:30:00.000Z"), &Utc),
            "05/03/2024"
        );
        assert_eq!(format_observation_date_in(None, &Utc), "Sin fecha");
        assert_eq!(format_observation_date_in(Some(""), &Utc), "Sin fecha");
        assert_eq!(format_observation_date_in(Some("yesterday"), &Utc), "Sin fecha");
    }
}
