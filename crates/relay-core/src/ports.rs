use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{domain::Coordinates, errors::Error, Result};

/// Current conditions at a point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurrentWeather {
    /// Degrees Celsius.
    pub temperature: f64,
    /// km/h.
    pub windspeed: f64,
}

/// Hexagonal port for the geocoding + weather service used by `!weather`.
///
/// Implementations must bound each call in time; a slow provider surfaces as
/// `Error::Timeout`, any other failure as `Error::External`.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// Resolve a free-text place name. `Ok(None)` means "no such place".
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>>;

    async fn current_weather(&self, at: Coordinates) -> Result<CurrentWeather>;
}

/// Deterministic in-memory lookup.
///
/// Knows a fixed table of places, always reports the same weather and counts
/// calls. Used by tests and for offline runs.
#[derive(Debug)]
pub struct StaticLookup {
    places: HashMap<String, Coordinates>,
    weather: CurrentWeather,
    fail_with: Mutex<Option<String>>,
    geocode_calls: AtomicUsize,
    weather_calls: AtomicUsize,
    last_weather_at: Mutex<Option<Coordinates>>,
}

impl StaticLookup {
    pub fn new(weather: CurrentWeather) -> Self {
        Self {
            places: HashMap::new(),
            weather,
            fail_with: Mutex::new(None),
            geocode_calls: AtomicUsize::new(0),
            weather_calls: AtomicUsize::new(0),
            last_weather_at: Mutex::new(None),
        }
    }

    /// Register a place; lookups are case-insensitive.
    pub fn with_place(mut self, name: &str, at: Coordinates) -> Self {
        self.places.insert(name.to_lowercase(), at);
        self
    }

    /// Make every subsequent call fail with `Error::External(reason)`.
    pub fn fail_with(&self, reason: &str) {
        if let Ok(mut slot) = self.fail_with.lock() {
            *slot = Some(reason.to_string());
        }
    }

    pub fn geocode_calls(&self) -> usize {
        self.geocode_calls.load(Ordering::SeqCst)
    }

    pub fn weather_calls(&self) -> usize {
        self.weather_calls.load(Ordering::SeqCst)
    }

    pub fn last_weather_at(&self) -> Option<Coordinates> {
        self.last_weather_at.lock().ok().and_then(|g| *g)
    }

    fn check_failure(&self) -> Result<()> {
        match self.fail_with.lock().ok().and_then(|g| g.clone()) {
            Some(reason) => Err(Error::External(reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WeatherLookup for StaticLookup {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.places.get(&place.trim().to_lowercase()).copied())
    }

    async fn current_weather(&self, at: Coordinates) -> Result<CurrentWeather> {
        self.weather_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        if let Ok(mut last) = self.last_weather_at.lock() {
            *last = Some(at);
        }
        Ok(self.weather)
    }
}
