//! Worker identity and registration records.

use base64::{decode, encode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;


/***** LIBRARY *****/
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn generate() -> Self { Self(Uuid::new_v4().to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// The body a worker sends the controller to register itself. `url_base64`
/// avoids any ambiguity a bare URL could introduce as an HTTP form/query
/// value (slashes, colons).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerRegistration {
    pub url_base64: String,
    pub memory_mb: u64,
}

impl WorkerRegistration {
    pub fn from_raw(url: &str, memory_mb: u64) -> Self { Self { url_base64: encode(url), memory_mb } }

    pub fn url_raw(&self) -> Result<String, String> {
        let bytes = decode(&self.url_base64).map_err(|e| e.to_string())?;
        String::from_utf8(bytes).map_err(|e| e.to_string())
    }
}

/// A worker as tracked by the controller's registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Worker {
    pub url: String,
    pub memory_mb: u64,
    pub last_seen: DateTime<Utc>,
}

impl Worker {
    pub fn from_registration(reg: &WorkerRegistration, now: DateTime<Utc>) -> Result<Self, String> {
        Ok(Self { url: reg.url_raw()?, memory_mb: reg.memory_mb, last_seen: now })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_round_trips_url() {
        let reg = WorkerRegistration::from_raw("http://10.0.0.5:8080", 4096);
        assert_eq!(reg.url_raw().unwrap(), "http://10.0.0.5:8080");
    }

    #[test]
    fn worker_from_registration_carries_memory_and_timestamp() {
        let now = Utc::now();
        let reg = WorkerRegistration::from_raw("http://10.0.0.5:8080", 4096);
        let worker = Worker::from_registration(&reg, now).unwrap();
        assert_eq!(worker.memory_mb, 4096);
        assert_eq!(worker.last_seen, now);
    }
}
