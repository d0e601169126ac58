//! GeoIP helpers
//!
//! Most callers only want a country code and name for an address. [`GeoLookup`]
//! wraps a [`Database`] with the usual GeoIP2/GeoLite2 record paths and keeps
//! an LRU cache of country answers keyed by address.

use crate::database::{Database, Entry};
use crate::error::{MmdbError, Result};
use lru::LruCache;
use serde::Serialize;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;

/// Default number of cached country answers
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Country of an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Country {
    /// ISO 3166-1 alpha-2 code
    pub iso_code: String,
    /// English name
    pub name: String,
}

/// Continent of an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Continent {
    /// Two-letter continent code, e.g. `EU`
    pub code: String,
    /// English name
    pub name: String,
}

/// Approximate coordinates of an address
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

/// Country/continent/location lookups over a GeoIP database
pub struct GeoLookup {
    db: Database,
    cache: Option<Mutex<LruCache<IpAddr, Option<Country>>>>,
}

impl GeoLookup {
    /// Wrap `db`, caching up to `cache_capacity` country answers (0 disables
    /// the cache)
    pub fn new(db: Database, cache_capacity: usize) -> Self {
        let cache = NonZeroUsize::new(cache_capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        GeoLookup { db, cache }
    }

    /// Open the database at `path` with the default cache
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Database::open(path)?, DEFAULT_CACHE_CAPACITY))
    }

    /// The underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Country code and English name for `ip`.
    ///
    /// `Ok(None)` when the address has no record or the record lacks either
    /// field.
    pub fn country(&self, ip: IpAddr) -> Result<Option<Country>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = lock(cache).get(&ip) {
                return Ok(hit.clone());
            }
        }

        let country = match self.entry(ip)? {
            Some(entry) => {
                let iso_code = string_at(&entry, &["country", "iso_code"])?;
                let name = string_at(&entry, &["country", "names", "en"])?;
                iso_code
                    .zip(name)
                    .map(|(iso_code, name)| Country { iso_code, name })
            }
            None => None,
        };

        if let Some(cache) = &self.cache {
            lock(cache).put(ip, country.clone());
        }
        Ok(country)
    }

    /// Continent code and English name for `ip`
    pub fn continent(&self, ip: IpAddr) -> Result<Option<Continent>> {
        let Some(entry) = self.entry(ip)? else {
            return Ok(None);
        };
        let code = string_at(&entry, &["continent", "code"])?;
        let name = string_at(&entry, &["continent", "names", "en"])?;
        Ok(code.zip(name).map(|(code, name)| Continent { code, name }))
    }

    /// Latitude and longitude for `ip`
    pub fn location(&self, ip: IpAddr) -> Result<Option<Location>> {
        let Some(entry) = self.entry(ip)? else {
            return Ok(None);
        };
        let latitude = f64_at(&entry, &["location", "latitude"])?;
        let longitude = f64_at(&entry, &["location", "longitude"])?;
        Ok(latitude
            .zip(longitude)
            .map(|(latitude, longitude)| Location {
                latitude,
                longitude,
            }))
    }

    /// Drop every cached country answer
    pub fn flush_cache(&self) {
        if let Some(cache) = &self.cache {
            lock(cache).clear();
        }
    }

    /// Number of cached country answers
    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| lock(cache).len())
    }

    fn entry(&self, ip: IpAddr) -> Result<Option<Entry<'_>>> {
        match self.db.lookup_addr(ip) {
            Ok(result) => Ok(result.entry()),
            // An IPv4-only database simply has nothing for IPv6 peers
            Err(MmdbError::Ipv6LookupInIpv4Db(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Ignore poisoning
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The string at `path`, or `None` if the path is absent or not a string
fn string_at(entry: &Entry<'_>, path: &[&str]) -> Result<Option<String>> {
    match entry.get_value(path) {
        Ok(data) => Ok(data.value.as_str().map(str::to_owned)),
        Err(MmdbError::PathMismatch(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn f64_at(entry: &Entry<'_>, path: &[&str]) -> Result<Option<f64>> {
    match entry.get_value(path) {
        Ok(data) => Ok(data.value.as_f64()),
        Err(MmdbError::PathMismatch(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
