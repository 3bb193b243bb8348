//! Operator requests applied to the shared context.

use alloc::string::String;
use chrono::NaiveDate;
use core::fmt;
use log::{info, warn};

use crate::{
    clock::parse_custom_date,
    connectivity::RestartReason,
    context::AppContext,
    job::{JobOrigin, ReceiptJob},
    settings::{FireTime, FireTimeError, ScheduleConfig, clear_credentials, save_daily_fire_time},
    storage::{BlobStore, StorageError},
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OperatorCommand {
    PrintNow,
    ReadSchedule,
    SetDailyFireTime(String),
    ReadLastFireDate,
    ForgetCredentials,
    SubmitReceipt {
        message: String,
        date: Option<String>,
    },
    ReadWifiInfo,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OperatorError {
    InvalidFireTime(FireTimeError),
    InvalidDate,
    EmptyMessage,
    Storage(StorageError),
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFireTime(err) => write!(f, "{}", err),
            Self::InvalidDate => f.write_str("Invalid date. Use YYYY-MM-DD or DD/MM/YYYY"),
            Self::EmptyMessage => f.write_str("Missing message parameter"),
            Self::Storage(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OperatorReply {
    PrintQueued,
    Schedule(ScheduleConfig),
    ScheduleUpdated(FireTime),
    LastFireDate(Option<NaiveDate>),
    ReceiptQueued,
    WifiInfo {
        ssid: Option<String>,
        address: Option<String>,
    },
    /// Acknowledge, then reboot.
    Restart(RestartReason),
    Rejected(OperatorError),
}

/// Applies `command` to `ctx`, persisting through `store` where needed.
pub fn apply<S: BlobStore>(
    ctx: &mut AppContext,
    store: &mut S,
    command: OperatorCommand,
) -> OperatorReply {
    match command {
        OperatorCommand::PrintNow => {
            if !ctx.jobs.request(JobOrigin::Manual) {
                info!("operator: print requested, job already pending");
            } else {
                info!("operator: print requested");
            }
            OperatorReply::PrintQueued
        }
        OperatorCommand::ReadSchedule => OperatorReply::Schedule(ctx.schedule),
        OperatorCommand::SetDailyFireTime(text) => {
            let fire_time = match FireTime::parse(text.trim()) {
                Ok(fire_time) => fire_time,
                Err(err) => return OperatorReply::Rejected(OperatorError::InvalidFireTime(err)),
            };
            if let Err(err) = save_daily_fire_time(store, fire_time) {
                warn!("operator: saving schedule failed err={}", err);
                return OperatorReply::Rejected(OperatorError::Storage(err));
            }
            ctx.schedule.daily_fire_time = fire_time;
            info!("operator: daily print time set to {}", fire_time);
            OperatorReply::ScheduleUpdated(fire_time)
        }
        OperatorCommand::ReadLastFireDate => {
            OperatorReply::LastFireDate(ctx.schedule.last_fire_date)
        }
        OperatorCommand::ForgetCredentials => {
            if let Err(err) = clear_credentials(store) {
                warn!("operator: forgetting credentials failed err={}", err);
                return OperatorReply::Rejected(OperatorError::Storage(err));
            }
            ctx.ssid = None;
            info!("operator: credentials forgotten");
            OperatorReply::Restart(RestartReason::CredentialsForgotten)
        }
        OperatorCommand::SubmitReceipt { message, date } => {
            if message.trim().is_empty() {
                return OperatorReply::Rejected(OperatorError::EmptyMessage);
            }
            let custom_date = match date.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(text) => match parse_custom_date(text) {
                    Some(date) => Some(date),
                    None => return OperatorReply::Rejected(OperatorError::InvalidDate),
                },
            };
            if ctx.receipt.is_some() {
                info!("operator: replacing queued receipt");
            }
            info!("operator: receipt queued bytes={}", message.len());
            ctx.receipt = Some(ReceiptJob {
                custom_date,
                message,
            });
            OperatorReply::ReceiptQueued
        }
        OperatorCommand::ReadWifiInfo => OperatorReply::WifiInfo {
            ssid: ctx.ssid.clone(),
            address: ctx.address.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        settings::{Credentials, load_credentials, load_schedule, save_credentials},
        storage::MemoryBlobStore,
    };

    #[test]
    fn print_now_raises_manual_job() {
        let mut ctx = AppContext::default();
        let mut store = MemoryBlobStore::new();
        assert_eq!(
            apply(&mut ctx, &mut store, OperatorCommand::PrintNow),
            OperatorReply::PrintQueued
        );
        assert!(ctx.jobs.wants_render());
        assert!(!ctx.jobs.is_scheduled());
    }

    #[test]
    fn fire_time_update_is_validated_and_persisted() {
        let mut ctx = AppContext::default();
        let mut store = MemoryBlobStore::new();

        let reply = apply(
            &mut ctx,
            &mut store,
            OperatorCommand::SetDailyFireTime("7:30".into()),
        );
        assert_eq!(
            reply,
            OperatorReply::Rejected(OperatorError::InvalidFireTime(FireTimeError::Format))
        );
        let reply = apply(
            &mut ctx,
            &mut store,
            OperatorCommand::SetDailyFireTime("25:00".into()),
        );
        assert_eq!(
            reply,
            OperatorReply::Rejected(OperatorError::InvalidFireTime(FireTimeError::OutOfRange))
        );
        assert_eq!(ctx.schedule.daily_fire_time, FireTime::DEFAULT);

        let seven_thirty = FireTime::new(7, 30).unwrap();
        assert_eq!(
            apply(
                &mut ctx,
                &mut store,
                OperatorCommand::SetDailyFireTime("07:30".into())
            ),
            OperatorReply::ScheduleUpdated(seven_thirty)
        );
        assert_eq!(ctx.schedule.daily_fire_time, seven_thirty);
        assert_eq!(load_schedule(&mut store).daily_fire_time, seven_thirty);
    }

    #[test]
    fn forget_clears_credentials_and_requests_restart() {
        let mut ctx = AppContext {
            ssid: Some("home".into()),
            ..AppContext::default()
        };
        let mut store = MemoryBlobStore::new();
        save_credentials(&mut store, &Credentials::new("home", "12345678").unwrap()).unwrap();
        save_daily_fire_time(&mut store, FireTime::new(6, 0).unwrap()).unwrap();

        assert_eq!(
            apply(&mut ctx, &mut store, OperatorCommand::ForgetCredentials),
            OperatorReply::Restart(RestartReason::CredentialsForgotten)
        );
        assert_eq!(load_credentials(&mut store), None);
        assert_eq!(
            load_schedule(&mut store).daily_fire_time,
            FireTime::new(6, 0).unwrap()
        );
        assert_eq!(ctx.ssid, None);
    }

    #[test]
    fn receipts_accept_custom_dates() {
        let mut ctx = AppContext::default();
        let mut store = MemoryBlobStore::new();

        let reply = apply(
            &mut ctx,
            &mut store,
            OperatorCommand::SubmitReceipt {
                message: "Milch kaufen".into(),
                date: Some("24/12/2026".into()),
            },
        );
        assert_eq!(reply, OperatorReply::ReceiptQueued);
        assert_eq!(
            ctx.receipt,
            Some(ReceiptJob {
                custom_date: NaiveDate::from_ymd_opt(2026, 12, 24),
                message: "Milch kaufen".into(),
            })
        );

        let reply = apply(
            &mut ctx,
            &mut store,
            OperatorCommand::SubmitReceipt {
                message: "x".into(),
                date: Some("morgen".into()),
            },
        );
        assert_eq!(reply, OperatorReply::Rejected(OperatorError::InvalidDate));

        let reply = apply(
            &mut ctx,
            &mut store,
            OperatorCommand::SubmitReceipt {
                message: "  ".into(),
                date: None,
            },
        );
        assert_eq!(reply, OperatorReply::Rejected(OperatorError::EmptyMessage));
    }
}
