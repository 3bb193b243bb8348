//! Durable device record: network credentials and the daily schedule.
//!
//! Both live in one JSON object (`/config.json`). Every write is a
//! read-modify-write over the raw object so fields this firmware does not
//! know about survive, and clearing credentials never touches the schedule.

use alloc::string::{String as AllocString, ToString};
use chrono::{NaiveDate, NaiveTime, Timelike};
use core::fmt;
use heapless::String;
use log::warn;
use serde_json::{Map, Value};

use crate::{
    clock::{format_iso_date, parse_iso_date},
    storage::{BlobStore, StorageError, StorageOp},
};

pub const CONFIG_BLOB: &str = "/config.json";

pub const SSID_MAX_BYTES: usize = 32;
pub const PASSWORD_MIN_BYTES: usize = 8;
pub const PASSWORD_MAX_BYTES: usize = 63;

const SSID_KEY: &str = "ssid";
const PASSWORD_KEY: &str = "password";
const FIRE_TIME_KEY: &str = "dailyPrintTime";
const LAST_FIRE_DATE_KEY: &str = "lastJokePrintDate";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CredentialsError {
    SsidLength(usize),
    PasswordLength(usize),
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidLength(len) => write!(
                f,
                "SSID must be 1-{} bytes (got {})",
                SSID_MAX_BYTES, len
            ),
            Self::PasswordLength(len) => write!(
                f,
                "Password must be {}-{} bytes (got {})",
                PASSWORD_MIN_BYTES, PASSWORD_MAX_BYTES, len
            ),
        }
    }
}

/// Network identity. Lengths are validated in bytes.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    ssid: String<SSID_MAX_BYTES>,
    password: String<PASSWORD_MAX_BYTES>,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialsError> {
        if ssid.is_empty() || ssid.len() > SSID_MAX_BYTES {
            return Err(CredentialsError::SsidLength(ssid.len()));
        }
        if !(PASSWORD_MIN_BYTES..=PASSWORD_MAX_BYTES).contains(&password.len()) {
            return Err(CredentialsError::PasswordLength(password.len()));
        }

        let mut owned_ssid = String::new();
        owned_ssid
            .push_str(ssid)
            .map_err(|_| CredentialsError::SsidLength(ssid.len()))?;
        let mut owned_password = String::new();
        owned_password
            .push_str(password)
            .map_err(|_| CredentialsError::PasswordLength(password.len()))?;

        Ok(Self {
            ssid: owned_ssid,
            password: owned_password,
        })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FireTimeError {
    Format,
    OutOfRange,
}

impl fmt::Display for FireTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format => f.write_str("Invalid time format. Use HH:MM"),
            Self::OutOfRange => f.write_str("Invalid time. Hours 00-23, minutes 00-59"),
        }
    }
}

/// Local time of day at which the daily job becomes due.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct FireTime {
    hour: u8,
    minute: u8,
}

impl Default for FireTime {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FireTime {
    pub const DEFAULT: Self = Self { hour: 9, minute: 0 };

    pub const fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    /// Parses exactly `HH:MM`.
    pub fn parse(text: &str) -> Result<Self, FireTimeError> {
        let bytes = text.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(FireTimeError::Format);
        }
        let hour = two_digits(bytes[0], bytes[1]).ok_or(FireTimeError::Format)?;
        let minute = two_digits(bytes[3], bytes[4]).ok_or(FireTimeError::Format)?;
        Self::new(hour, minute).ok_or(FireTimeError::OutOfRange)
    }

    pub const fn hour(self) -> u8 {
        self.hour
    }

    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// Minute resolution, seconds are ignored.
    pub fn is_reached_by(self, time: NaiveTime) -> bool {
        (time.hour(), time.minute()) >= (u32::from(self.hour), u32::from(self.minute))
    }
}

fn two_digits(tens: u8, ones: u8) -> Option<u8> {
    if !tens.is_ascii_digit() || !ones.is_ascii_digit() {
        return None;
    }
    Some((tens - b'0') * 10 + (ones - b'0'))
}

impl fmt::Display for FireTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScheduleConfig {
    pub daily_fire_time: FireTime,
    pub last_fire_date: Option<NaiveDate>,
}

impl ScheduleConfig {
    pub fn fired_on(&self, date: NaiveDate) -> bool {
        self.last_fire_date == Some(date)
    }
}

/// In-memory view of `/config.json`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceRecord {
    fields: Map<AllocString, Value>,
}

impl DeviceRecord {
    /// Missing or undecodable records load as empty.
    pub fn load<S: BlobStore>(store: &mut S) -> Result<Self, StorageError> {
        let raw = store
            .read(CONFIG_BLOB)
            .map_err(|err| StorageError::backend(StorageOp::Read, CONFIG_BLOB, err))?;
        let fields = match raw {
            None => Map::new(),
            Some(bytes) => match serde_json::from_slice::<Map<AllocString, Value>>(&bytes) {
                Ok(fields) => fields,
                Err(err) => {
                    warn!("config: record unreadable, starting empty err={}", err);
                    Map::new()
                }
            },
        };
        Ok(Self { fields })
    }

    pub fn save<S: BlobStore>(&self, store: &mut S) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(&self.fields)
            .map_err(|_| StorageError::Encode { blob: CONFIG_BLOB })?;
        store
            .write(CONFIG_BLOB, &bytes)
            .map_err(|err| StorageError::backend(StorageOp::Write, CONFIG_BLOB, err))
    }

    /// Loads, applies `edit`, and writes back.
    pub fn update<S: BlobStore>(
        store: &mut S,
        edit: impl FnOnce(&mut Self),
    ) -> Result<(), StorageError> {
        let mut record = Self::load(store)?;
        edit(&mut record);
        record.save(store)
    }

    /// Stored credentials that fail validation read as absent.
    pub fn credentials(&self) -> Option<Credentials> {
        let ssid = self.text(SSID_KEY)?;
        let password = self.text(PASSWORD_KEY).unwrap_or("");
        if ssid.is_empty() {
            return None;
        }
        match Credentials::new(ssid, password) {
            Ok(credentials) => Some(credentials),
            Err(err) => {
                warn!("config: stored credentials rejected err={}", err);
                None
            }
        }
    }

    pub fn set_credentials(&mut self, credentials: &Credentials) {
        self.set_text(SSID_KEY, credentials.ssid());
        self.set_text(PASSWORD_KEY, credentials.password());
    }

    pub fn clear_credentials(&mut self) {
        self.fields.remove(SSID_KEY);
        self.fields.remove(PASSWORD_KEY);
    }

    pub fn schedule(&self) -> ScheduleConfig {
        let daily_fire_time = match self.text(FIRE_TIME_KEY) {
            None => FireTime::DEFAULT,
            Some(text) => FireTime::parse(text).unwrap_or_else(|err| {
                warn!("config: dailyPrintTime={} ignored err={}", text, err);
                FireTime::DEFAULT
            }),
        };
        let last_fire_date = self.text(LAST_FIRE_DATE_KEY).and_then(parse_iso_date);
        ScheduleConfig {
            daily_fire_time,
            last_fire_date,
        }
    }

    pub fn set_schedule(&mut self, schedule: &ScheduleConfig) {
        self.set_text(FIRE_TIME_KEY, &schedule.daily_fire_time.to_string());
        self.set_last_fire_date(schedule.last_fire_date);
    }

    pub fn set_daily_fire_time(&mut self, fire_time: FireTime) {
        self.set_text(FIRE_TIME_KEY, &fire_time.to_string());
    }

    pub fn set_last_fire_date(&mut self, date: Option<NaiveDate>) {
        match date {
            Some(date) => self.set_text(LAST_FIRE_DATE_KEY, &format_iso_date(date)),
            None => self.set_text(LAST_FIRE_DATE_KEY, ""),
        }
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    fn set_text(&mut self, key: &str, value: &str) {
        self.fields
            .insert(AllocString::from(key), Value::String(AllocString::from(value)));
    }
}

/// Read failures count as "no credentials".
pub fn load_credentials<S: BlobStore>(store: &mut S) -> Option<Credentials> {
    match DeviceRecord::load(store) {
        Ok(record) => record.credentials(),
        Err(err) => {
            warn!("config: credentials unavailable err={}", err);
            None
        }
    }
}

pub fn save_credentials<S: BlobStore>(
    store: &mut S,
    credentials: &Credentials,
) -> Result<(), StorageError> {
    DeviceRecord::update(store, |record| record.set_credentials(credentials))
}

pub fn clear_credentials<S: BlobStore>(store: &mut S) -> Result<(), StorageError> {
    DeviceRecord::update(store, DeviceRecord::clear_credentials)
}

/// Read failures fall back to the default schedule.
pub fn load_schedule<S: BlobStore>(store: &mut S) -> ScheduleConfig {
    match DeviceRecord::load(store) {
        Ok(record) => record.schedule(),
        Err(err) => {
            warn!("config: schedule unavailable, using defaults err={}", err);
            ScheduleConfig::default()
        }
    }
}

pub fn save_daily_fire_time<S: BlobStore>(
    store: &mut S,
    fire_time: FireTime,
) -> Result<(), StorageError> {
    DeviceRecord::update(store, |record| record.set_daily_fire_time(fire_time))
}

pub fn save_last_fire_date<S: BlobStore>(
    store: &mut S,
    date: NaiveDate,
) -> Result<(), StorageError> {
    DeviceRecord::update(store, |record| record.set_last_fire_date(Some(date)))
}
