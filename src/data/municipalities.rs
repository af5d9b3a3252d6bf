//! Municipality table: loaded once from JSON at process start, indexed in
//! memory, read-only thereafter.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use crate::domain::city::{City, Coordinates};

#[derive(Debug, Deserialize)]
struct MunicipalityRecord {
    id: String,
    name: String,
    state: String,
    #[serde(default)]
    region: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// In-memory municipality repository with O(1) id lookup.
pub struct CityRepository {
    cities: Vec<City>,
    by_id: HashMap<String, usize>,
    by_state: HashMap<String, Vec<usize>>,
}

impl CityRepository {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read municipality table at {path:?}"))?;
        let records: Vec<MunicipalityRecord> =
            serde_json::from_str(&raw).context("failed to parse municipality table")?;

        let cities = records
            .into_iter()
            .map(|record| City {
                coordinates: match (record.latitude, record.longitude) {
                    (Some(lat), Some(lon)) => Coordinates::new(lat, lon),
                    _ => None,
                },
                id: record.id,
                name: record.name,
                state: record.state,
                region: record.region,
            })
            .collect();

        let repository = Self::from_cities(cities);
        info!(
            "loaded {} municipalities ({} with coordinates)",
            repository.count(),
            repository.with_coordinates().count()
        );
        Ok(repository)
    }

    #[must_use]
    pub fn from_cities(cities: Vec<City>) -> Self {
        let mut by_id = HashMap::with_capacity(cities.len());
        let mut by_state: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, city) in cities.iter().enumerate() {
            by_id.insert(city.id.clone(), index);
            by_state
                .entry(city.state.to_uppercase())
                .or_default()
                .push(index);
        }
        Self {
            cities,
            by_id,
            by_state,
        }
    }

    #[must_use]
    pub fn get_by_id(&self, city_id: &str) -> Option<&City> {
        self.by_id.get(city_id).map(|index| &self.cities[*index])
    }

    #[must_use]
    pub fn get_by_state(&self, state: &str) -> Vec<&City> {
        self.by_state
            .get(&state.to_uppercase())
            .map(|indexes| indexes.iter().map(|i| &self.cities[*i]).collect())
            .unwrap_or_default()
    }

    /// Case-insensitive name lookup, optionally narrowed to a state.
    #[must_use]
    pub fn search_by_name(&self, name: &str, state: Option<&str>) -> Option<&City> {
        let name_lower = name.to_lowercase();
        let candidates: Vec<&City> = match state {
            Some(state) => self.get_by_state(state),
            None => self.cities.iter().collect(),
        };
        candidates
            .into_iter()
            .find(|city| city.name.to_lowercase() == name_lower)
    }

    pub fn with_coordinates(&self) -> impl Iterator<Item = &City> {
        self.cities.iter().filter(|city| city.has_coordinates())
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.cities.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_repository() -> CityRepository {
        let make = |id: &str, name: &str, lat: f64, lon: f64| City {
            id: id.to_string(),
            name: name.to_string(),
            state: "SP".to_string(),
            region: "Sudeste".to_string(),
            coordinates: Coordinates::new(lat, lon),
        };
        CityRepository::from_cities(vec![
            make("3543204", "Ribeirão do Sul", -22.7572, -49.9439),
            make("3534708", "Ourinhos", -22.9797, -49.8699),
            make("3550308", "São Paulo", -23.5505, -46.6333),
            City {
                id: "9999999".to_string(),
                name: "Sem Coordenadas".to_string(),
                state: "SP".to_string(),
                region: "Sudeste".to_string(),
                coordinates: None,
            },
        ])
    }

    #[test]
    fn id_lookup_and_state_index() {
        let repository = sample_repository();
        assert_eq!(
            repository.get_by_id("3543204").expect("found").name,
            "Ribeirão do Sul"
        );
        assert!(repository.get_by_id("0000000").is_none());
        assert_eq!(repository.get_by_state("sp").len(), 4);
        assert!(repository.get_by_state("MG").is_empty());
    }

    #[test]
    fn name_search_is_case_insensitive() {
        let repository = sample_repository();
        let city = repository
            .search_by_name("são paulo", Some("SP"))
            .expect("found");
        assert_eq!(city.id, "3550308");
        assert!(repository.search_by_name("Atlantis", None).is_none());
    }

    #[test]
    fn coordinates_filter_excludes_bare_records() {
        let repository = sample_repository();
        assert_eq!(repository.with_coordinates().count(), 3);
        assert_eq!(repository.count(), 4);
    }

    #[test]
    fn load_parses_json_table() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("municipalities.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "3543204", "name": "Ribeirão do Sul", "state": "SP",
                 "region": "Sudeste", "latitude": -22.7572, "longitude": -49.9439},
                {"id": "9999999", "name": "Sem Coordenadas", "state": "SP",
                 "region": "Sudeste", "latitude": null, "longitude": null}
            ]"#,
        )
        .expect("write table");

        let repository = CityRepository::load(&path).expect("load");
        assert_eq!(repository.count(), 2);
        assert!(repository.get_by_id("3543204").expect("found").has_coordinates());
        assert!(!repository.get_by_id("9999999").expect("found").has_coordinates());
    }
}
