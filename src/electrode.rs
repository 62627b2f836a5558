//! Electrode source table
//!
//! Shared per-electrode state written by ingestion and read by the fusion
//! tick. Readers always work on a cloned snapshot, never on live state.

use crate::types::ElectrodeReading;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Latest state of one named channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectrodeSource {
    pub name: String,
    /// Stress intensity (0-1)
    pub intensity: f64,
    /// Time of the last accepted reading; `None` until the first one
    pub last_update_ms: Option<i64>,
}

impl ElectrodeSource {
    pub fn idle(name: &str) -> Self {
        Self {
            name: name.to_string(),
            intensity: 0.0,
            last_update_ms: None,
        }
    }

    /// Milliseconds since the last reading, floored at 0
    pub fn elapsed_ms(&self, now_ms: i64) -> Option<i64> {
        self.last_update_ms.map(|t| now_ms.saturating_sub(t).max(0))
    }
}

/// Thread-safe table of electrode sources in registration order
#[derive(Debug, Clone, Default)]
pub struct ElectrodeTable {
    inner: Arc<RwLock<Vec<ElectrodeSource>>>,
}

impl ElectrodeTable {
    /// Create a table with every named electrode idle at intensity 0
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut sources: Vec<ElectrodeSource> = Vec::new();
        for name in names {
            if !sources.iter().any(|s| s.name == name) {
                sources.push(ElectrodeSource::idle(name));
            }
        }
        Self {
            inner: Arc::new(RwLock::new(sources)),
        }
    }

    /// Record a reading for `name`.
    ///
    /// Unknown names are registered on first sight. Readings older than the
    /// stored one are ignored; returns whether the reading was applied.
    pub fn update(&self, name: &str, intensity: f64, timestamp_ms: i64) -> bool {
        let reading = ElectrodeReading::new(name, intensity, timestamp_ms);
        let mut sources = self.write();

        match sources.iter_mut().find(|s| s.name == name) {
            Some(source) => {
                if matches!(source.last_update_ms, Some(last) if timestamp_ms < last) {
                    return false;
                }
                source.intensity = reading.intensity;
                source.last_update_ms = Some(timestamp_ms);
            }
            None => sources.push(ElectrodeSource {
                name: reading.electrode,
                intensity: reading.intensity,
                last_update_ms: Some(timestamp_ms),
            }),
        }
        true
    }

    pub fn apply(&self, reading: &ElectrodeReading) -> bool {
        self.update(&reading.electrode, reading.intensity, reading.timestamp_ms)
    }

    /// Consistent copy of every source
    pub fn snapshot(&self) -> Vec<ElectrodeSource> {
        self.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<ElectrodeSource> {
        self.read().iter().find(|s| s.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A poisoned lock still holds plain numbers; keep serving them.
    fn read(&self) -> RwLockReadGuard<'_, Vec<ElectrodeSource>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ElectrodeSource>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_starts_idle() {
        let table = ElectrodeTable::new(["AF7", "AF8", "AF7"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("AF7"), Some(ElectrodeSource::idle("AF7")));
    }

    #[test]
    fn test_update_and_snapshot() {
        let table = ElectrodeTable::new(["AF7", "TP9"]);
        assert!(table.update("TP9", 0.6, 1_000));

        let snapshot = table.snapshot();
        assert_eq!(snapshot[1].intensity, 0.6);
        assert_eq!(snapshot[1].last_update_ms, Some(1_000));

        // snapshot is detached from later writes
        table.update("TP9", 0.1, 2_000);
        assert_eq!(snapshot[1].intensity, 0.6);
        assert_eq!(table.get("TP9").unwrap().intensity, 0.1);
    }

    #[test]
    fn test_stale_reading_ignored() {
        let table = ElectrodeTable::new(["AF8"]);
        table.update("AF8", 0.9, 5_000);
        assert!(!table.update("AF8", 0.1, 4_000));
        assert_eq!(table.get("AF8").unwrap().intensity, 0.9);
    }

    #[test]
    fn test_unknown_electrode_registered() {
        let table = ElectrodeTable::new(["AF7"]);
        table.update("FPZ", 1.4, 10);
        let source = table.get("FPZ").unwrap();
        assert_eq!(source.intensity, 1.0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_shared_across_threads() {
        let table = ElectrodeTable::new(["AF7"]);
        let writer = table.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                writer.update("AF7", 0.5, i);
            }
        });
        handle.join().unwrap();
        assert_eq!(table.get("AF7").unwrap().last_update_ms, Some(99));
    }

    #[test]
    fn test_elapsed_floors_at_zero() {
        let mut source = ElectrodeSource::idle("AF7");
        assert_eq!(source.elapsed_ms(10), None);
        source.last_update_ms = Some(100);
        assert_eq!(source.elapsed_ms(50), Some(0));
        assert_eq!(source.elapsed_ms(400), Some(300));
    }
}
