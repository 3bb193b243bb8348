//! One-day content cache (`/joke_cache.json`).

use alloc::string::String;
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::{
    clock::{format_iso_date, parse_iso_date},
    storage::{BlobStore, StorageError, StorageOp},
};

pub const CACHE_BLOB: &str = "/joke_cache.json";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CacheEntry {
    pub date: NaiveDate,
    pub text: String,
    pub fetched_at_epoch: u64,
    pub source: String,
}

impl CacheEntry {
    pub fn is_valid_for(&self, today: NaiveDate) -> bool {
        self.date == today
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct CacheRecord {
    date: String,
    #[serde(deserialize_with = "epoch_secs")]
    timestamp: u64,
    #[serde(rename = "jokeText")]
    joke_text: String,
    source: String,
}

/// Older records carry the epoch as a decimal string.
fn epoch_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Epoch {
        Number(u64),
        Text(String),
    }

    match Epoch::deserialize(deserializer)? {
        Epoch::Number(secs) => Ok(secs),
        Epoch::Text(text) => text.trim().parse().map_err(de::Error::custom),
    }
}

/// Missing or undecodable records load as `None`.
pub fn load_cache<S: BlobStore>(store: &mut S) -> Result<Option<CacheEntry>, StorageError> {
    let Some(bytes) = store
        .read(CACHE_BLOB)
        .map_err(|err| StorageError::backend(StorageOp::Read, CACHE_BLOB, err))?
    else {
        return Ok(None);
    };

    let record = match serde_json::from_slice::<CacheRecord>(&bytes) {
        Ok(record) => record,
        Err(err) => {
            warn!("cache: record unreadable err={}", err);
            return Ok(None);
        }
    };
    let Some(date) = parse_iso_date(&record.date) else {
        warn!("cache: record has invalid date={}", record.date);
        return Ok(None);
    };

    Ok(Some(CacheEntry {
        date,
        text: record.joke_text,
        fetched_at_epoch: record.timestamp,
        source: record.source,
    }))
}

/// Overwrites the previous entry wholesale.
pub fn store_cache<S: BlobStore>(store: &mut S, entry: &CacheEntry) -> Result<(), StorageError> {
    let record = CacheRecord {
        date: String::from(format_iso_date(entry.date).as_str()),
        timestamp: entry.fetched_at_epoch,
        joke_text: entry.text.clone(),
        source: entry.source.clone(),
    };
    let bytes =
        serde_json::to_vec(&record).map_err(|_| StorageError::Encode { blob: CACHE_BLOB })?;
    store
        .write(CACHE_BLOB, &bytes)
        .map_err(|err| StorageError::backend(StorageOp::Write, CACHE_BLOB, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;

    fn entry(day: u32) -> CacheEntry {
        CacheEntry {
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            text: String::from("Kommt ein Pferd in die Bar."),
            fetched_at_epoch: 1_792_150_000,
            source: String::from("https://example.invalid/witz.txt"),
        }
    }

    #[test]
    fn validity_is_exactly_today() {
        let cached = entry(16);
        assert!(cached.is_valid_for(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()));
        assert!(!cached.is_valid_for(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()));
        assert!(!cached.is_valid_for(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()));
    }

    #[test]
    fn stored_entry_loads_back() {
        let mut store = MemoryBlobStore::new();
        store_cache(&mut store, &entry(16)).unwrap();
        assert_eq!(load_cache(&mut store).unwrap(), Some(entry(16)));

        store_cache(&mut store, &entry(17)).unwrap();
        assert_eq!(load_cache(&mut store).unwrap(), Some(entry(17)));
    }

    #[test]
    fn record_uses_wire_field_names() {
        let mut store = MemoryBlobStore::new();
        store_cache(&mut store, &entry(16)).unwrap();
        let raw = store.read(CACHE_BLOB).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["date"], "2026-10-16");
        assert_eq!(json["jokeText"], "Kommt ein Pferd in die Bar.");
        assert_eq!(json["timestamp"], 1_792_150_000u64);
    }

    #[test]
    fn string_timestamps_are_accepted() {
        let mut store = MemoryBlobStore::new();
        store
            .write(
                CACHE_BLOB,
                br#"{"date":"2026-10-16","timestamp":"1792150000","jokeText":"Kommt ein Pferd in die Bar.","source":"https://example.invalid/witz.txt"}"#,
            )
            .unwrap();
        assert_eq!(load_cache(&mut store).unwrap(), Some(entry(16)));

        store
            .write(
                CACHE_BLOB,
                br#"{"date":"2026-10-16","timestamp":"gestern","jokeText":"x","source":"y"}"#,
            )
            .unwrap();
        assert_eq!(load_cache(&mut store).unwrap(), None);
    }

    #[test]
    fn garbage_reads_as_missing() {
        let mut store = MemoryBlobStore::new();
        assert_eq!(load_cache(&mut store).unwrap(), None);

        store.write(CACHE_BLOB, b"\x00\x01").unwrap();
        assert_eq!(load_cache(&mut store).unwrap(), None);

        store
            .write(
                CACHE_BLOB,
                br#"{"date":"yesterday","timestamp":1,"jokeText":"x","source":"y"}"#,
            )
            .unwrap();
        assert_eq!(load_cache(&mut store).unwrap(), None);
    }
}
