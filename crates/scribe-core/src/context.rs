//! State shared by the connectivity manager, the pipeline and the operator.

use alloc::string::String;

use crate::{
    connectivity::ConnectivityState,
    job::{PendingJobRequest, ReceiptJob},
    settings::{ScheduleConfig, load_schedule},
    storage::BlobStore,
};

/// Owned by the main loop and passed by `&mut` to whichever machine is
/// running; nothing in here is shared across an await point.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AppContext {
    pub connectivity: ConnectivityState,
    pub schedule: ScheduleConfig,
    pub jobs: PendingJobRequest,
    pub receipt: Option<ReceiptJob>,
    pub ssid: Option<String>,
    pub address: Option<String>,
}

impl AppContext {
    pub fn new(schedule: ScheduleConfig) -> Self {
        Self {
            schedule,
            ..Self::default()
        }
    }

    pub fn load<S: BlobStore>(store: &mut S) -> Self {
        Self::new(load_schedule(store))
    }

    pub fn is_online(&self) -> bool {
        self.connectivity == ConnectivityState::AttachedOnline
    }
}
