//! Radius search over the municipality mesh.

use std::sync::Arc;

use serde::Serialize;

use super::city_weather::lookup_city;
use crate::data::municipalities::CityRepository;
use crate::domain::city::{City, NeighborCity};
use crate::domain::errors::WeatherError;

pub const MIN_RADIUS_KM: f64 = 10.0;
pub const MAX_RADIUS_KM: f64 = 150.0;
pub const DEFAULT_RADIUS_KM: f64 = 50.0;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborSearch {
    pub center_city: City,
    pub neighbors: Vec<NeighborCity>,
}

pub struct GetNeighborCities {
    cities: Arc<CityRepository>,
}

impl GetNeighborCities {
    #[must_use]
    pub fn new(cities: Arc<CityRepository>) -> Self {
        Self { cities }
    }

    /// Cities with coordinates within `radius_km` of the center, sorted
    /// by ascending distance. The center itself is excluded.
    pub fn execute(
        &self,
        center_city_id: &str,
        radius_km: f64,
    ) -> Result<NeighborSearch, WeatherError> {
        if !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&radius_km) {
            return Err(WeatherError::InvalidRadius {
                radius: radius_km,
                min: MIN_RADIUS_KM,
                max: MAX_RADIUS_KM,
            });
        }

        let center = lookup_city(&self.cities, center_city_id)?;
        let center_coordinates = center
            .coordinates
            .expect("lookup_city guarantees coordinates");

        let mut neighbors: Vec<NeighborCity> = self
            .cities
            .with_coordinates()
            .filter(|city| city.id != center.id)
            .filter_map(|city| {
                let distance = center_coordinates.distance_km(&city.coordinates?);
                (distance <= radius_km).then(|| NeighborCity::new(city, distance))
            })
            .collect();
        neighbors.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        Ok(NeighborSearch {
            center_city: center.clone(),
            neighbors,
        })
    }
}
