// Simulated crowding per stop.

use crate::gtfs_models::{Result, TransitError};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub const STOP_CAPACITY: u32 = 40;
pub const DEFAULT_OCCUPANTS: u32 = 10;

const SEED_OCCUPANTS_MIN: u32 = 5;
const SEED_OCCUPANTS_MAX: u32 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyRecord {
    pub capacity: u32,
    pub occupants: u32,
}

impl Default for OccupancyRecord {
    fn default() -> Self {
        OccupancyRecord {
            capacity: STOP_CAPACITY,
            occupants: DEFAULT_OCCUPANTS,
        }
    }
}

/// Crowd level reported by riders. Anything unrecognised is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrowdStatus {
    Red,
    Yellow,
    Green,
    Unknown,
}

impl CrowdStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "red" => CrowdStatus::Red,
            "yellow" => CrowdStatus::Yellow,
            "green" => CrowdStatus::Green,
            _ => CrowdStatus::Unknown,
        }
    }

    /// Not clamped to capacity: `Red` deliberately reports more riders than fit.
    pub fn occupants(self) -> u32 {
        match self {
            CrowdStatus::Red => 45,
            CrowdStatus::Yellow => 25,
            CrowdStatus::Green => 5,
            CrowdStatus::Unknown => DEFAULT_OCCUPANTS,
        }
    }
}

type Records = HashMap<String, OccupancyRecord>;

/// One lock guards the whole map, so concurrent updates to a stop serialize.
#[derive(Debug, Default)]
pub struct OccupancyStore {
    records: Mutex<Records>,
}

// Inserts under the caller's guard; shared by get_or_init and set_from_status.
fn record_or_init<'g>(records: &'g mut Records, stop_id: &str) -> &'g mut OccupancyRecord {
    records.entry(stop_id.to_string()).or_default()
}

impl OccupancyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>> {
        self.records.lock().map_err(|_| TransitError::LockPoisoned)
    }

    /// Stored record or the default. The default is not persisted.
    pub fn get(&self, stop_id: &str) -> Result<OccupancyRecord> {
        Ok(self.lock()?.get(stop_id).copied().unwrap_or_default())
    }

    /// Stored record, inserting the default first if the stop is unknown.
    pub fn get_or_init(&self, stop_id: &str) -> Result<OccupancyRecord> {
        let mut records = self.lock()?;
        Ok(*record_or_init(&mut records, stop_id))
    }

    /// Overwrites occupants from a status string; capacity is untouched.
    pub fn set_from_status(&self, stop_id: &str, status: &str) -> Result<OccupancyRecord> {
        let occupants = CrowdStatus::parse(status).occupants();
        let mut records = self.lock()?;
        let record = record_or_init(&mut records, stop_id);
        record.occupants = occupants;
        Ok(*record)
    }

    /// Gives every id a full-capacity record with a random occupant count.
    pub fn seed_random<'a, I, R>(&self, stop_ids: I, rng: &mut R) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
        R: Rng,
    {
        let mut records = self.lock()?;
        for id in stop_ids {
            records.insert(
                id.to_string(),
                OccupancyRecord {
                    capacity: STOP_CAPACITY,
                    occupants: rng.random_range(SEED_OCCUPANTS_MIN..=SEED_OCCUPANTS_MAX),
                },
            );
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
