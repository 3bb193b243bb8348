//! Network attachment state machine.
//!
//! Startup walks `Unattached → AttachingSaved → AttachedUnverified →
//! AttachedOnline`, detouring through `Provisioning` whenever there are no
//! usable credentials. Every wait is bounded by [`ConnectivityConfig`]. The
//! conditions that can only be cleared by rebooting are returned as
//! [`RestartReason`] and acted on by the firmware.

use alloc::string::String;
use core::fmt;

use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use crate::{
    context::AppContext,
    retry::with_deadline,
    settings::{
        Credentials, CredentialsError, clear_credentials, load_credentials, save_credentials,
    },
    storage::BlobStore,
    transport::ReachabilityProbe,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectivityState {
    #[default]
    Unattached,
    AttachingSaved,
    Provisioning,
    AttachedUnverified,
    AttachedOnline,
}

impl ConnectivityState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unattached => "unattached",
            Self::AttachingSaved => "attaching",
            Self::Provisioning => "provisioning",
            Self::AttachedUnverified => "unverified",
            Self::AttachedOnline => "online",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectivityConfig {
    pub attach_timeout_ms: u32,
    pub probe_timeout_ms: u32,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            attach_timeout_ms: 10_000,
            probe_timeout_ms: 5_000,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RestartReason {
    FreshCredentialsAttachFailed,
    FreshCredentialsUnreachable,
    PortalUnavailable,
    LinkLost,
    CredentialsForgotten,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FreshCredentialsAttachFailed => "new credentials did not attach",
            Self::FreshCredentialsUnreachable => "new credentials attached without upstream",
            Self::PortalUnavailable => "provisioning portal failed to start",
            Self::LinkLost => "network attachment lost",
            Self::CredentialsForgotten => "credentials forgotten by operator",
        })
    }
}

/// Station-mode radio link.
#[allow(async_fn_in_trait)]
pub trait WifiStation {
    type Error: fmt::Debug;

    /// Associates and waits for an address. Cancelled by the caller's
    /// deadline.
    async fn attach(&mut self, credentials: &Credentials) -> Result<(), Self::Error>;
    async fn detach(&mut self);
    /// Cheap, non-blocking liveness check.
    fn is_attached(&mut self) -> bool;
}

/// Raw, unvalidated provisioning form fields.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Submission {
    pub ssid: String,
    pub password: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PortalReply {
    Accepted,
    Rejected(CredentialsError),
}

/// Local access point plus setup form.
#[allow(async_fn_in_trait)]
pub trait ProvisioningPortal {
    type Error: fmt::Debug;

    async fn start(&mut self) -> Result<(), Self::Error>;

    /// Serves the form, answering each submission with `review`'s verdict,
    /// until one is accepted. `None` means the portal was told to stop.
    async fn next_submission<F>(&mut self, review: F) -> Option<Submission>
    where
        F: FnMut(&Submission) -> PortalReply;

    async fn stop(&mut self);
}

/// Borrowed collaborators for one connectivity step.
pub struct ConnectivityIo<'a, S, W, P, Q, D> {
    pub store: &'a mut S,
    pub station: &'a mut W,
    pub portal: &'a mut P,
    pub probe: &'a mut Q,
    pub delay: &'a mut D,
}

pub struct ConnectivityManager {
    config: ConnectivityConfig,
    state: ConnectivityState,
    candidate: Option<Credentials>,
    fresh: bool,
}

impl ConnectivityManager {
    pub const fn new(config: ConnectivityConfig) -> Self {
        Self {
            config,
            state: ConnectivityState::Unattached,
            candidate: None,
            fresh: false,
        }
    }

    pub const fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Ssid of the credentials currently attached or being attached.
    pub fn ssid(&self) -> Option<&str> {
        self.candidate.as_ref().map(Credentials::ssid)
    }

    /// Drives the machine until `AttachedOnline` or a restart condition.
    pub async fn establish<S, W, P, Q, D>(
        &mut self,
        ctx: &mut AppContext,
        io: &mut ConnectivityIo<'_, S, W, P, Q, D>,
    ) -> Result<(), RestartReason>
    where
        S: BlobStore,
        W: WifiStation,
        P: ProvisioningPortal,
        Q: ReachabilityProbe,
        D: DelayNs,
    {
        loop {
            let state = self.step(io).await?;
            ctx.connectivity = state;
            if state == ConnectivityState::AttachedOnline {
                ctx.ssid = self.ssid().map(String::from);
                return Ok(());
            }
        }
    }

    /// Performs one transition and returns the new state.
    pub async fn step<S, W, P, Q, D>(
        &mut self,
        io: &mut ConnectivityIo<'_, S, W, P, Q, D>,
    ) -> Result<ConnectivityState, RestartReason>
    where
        S: BlobStore,
        W: WifiStation,
        P: ProvisioningPortal,
        Q: ReachabilityProbe,
        D: DelayNs,
    {
        let next = match self.state {
            ConnectivityState::Unattached => self.load_saved(io),
            ConnectivityState::AttachingSaved => self.attach(io).await?,
            ConnectivityState::AttachedUnverified => self.verify(io).await?,
            ConnectivityState::Provisioning => self.provision(io).await?,
            ConnectivityState::AttachedOnline => ConnectivityState::AttachedOnline,
        };
        if next != self.state {
            info!(
                "wifi: state {} -> {}",
                self.state.as_str(),
                next.as_str()
            );
        }
        self.state = next;
        Ok(next)
    }

    /// Liveness check for the main loop. Losing the link once online is a
    /// restart condition.
    pub fn check_link<W: WifiStation>(
        &mut self,
        ctx: &mut AppContext,
        station: &mut W,
    ) -> Result<(), RestartReason> {
        if self.state != ConnectivityState::AttachedOnline || station.is_attached() {
            return Ok(());
        }
        warn!("wifi: link lost while online");
        self.state = ConnectivityState::Unattached;
        ctx.connectivity = ConnectivityState::Unattached;
        Err(RestartReason::LinkLost)
    }

    fn load_saved<S, W, P, Q, D>(
        &mut self,
        io: &mut ConnectivityIo<'_, S, W, P, Q, D>,
    ) -> ConnectivityState
    where
        S: BlobStore,
    {
        match load_credentials(io.store) {
            Some(credentials) => {
                info!("wifi: saved credentials found ssid={}", credentials.ssid());
                self.candidate = Some(credentials);
                self.fresh = false;
                ConnectivityState::AttachingSaved
            }
            None => {
                info!("wifi: no saved credentials");
                self.candidate = None;
                ConnectivityState::Provisioning
            }
        }
    }

    async fn attach<S, W, P, Q, D>(
        &mut self,
        io: &mut ConnectivityIo<'_, S, W, P, Q, D>,
    ) -> Result<ConnectivityState, RestartReason>
    where
        W: WifiStation,
        D: DelayNs,
    {
        let Some(credentials) = self.candidate.clone() else {
            return Ok(ConnectivityState::Unattached);
        };

        info!(
            "wifi: attaching ssid={} fresh={} timeout_ms={}",
            credentials.ssid(),
            self.fresh,
            self.config.attach_timeout_ms
        );
        let attached = match with_deadline(
            io.delay,
            self.config.attach_timeout_ms,
            io.station.attach(&credentials),
        )
        .await
        {
            Some(Ok(())) => true,
            Some(Err(err)) => {
                warn!("wifi: attach failed err={:?}", err);
                false
            }
            None => {
                warn!("wifi: attach timed out");
                false
            }
        };

        if attached {
            return Ok(ConnectivityState::AttachedUnverified);
        }

        io.station.detach().await;
        if self.fresh {
            return Err(RestartReason::FreshCredentialsAttachFailed);
        }
        Ok(ConnectivityState::Provisioning)
    }

    async fn verify<S, W, P, Q, D>(
        &mut self,
        io: &mut ConnectivityIo<'_, S, W, P, Q, D>,
    ) -> Result<ConnectivityState, RestartReason>
    where
        S: BlobStore,
        W: WifiStation,
        Q: ReachabilityProbe,
        D: DelayNs,
    {
        let reachable = with_deadline(io.delay, self.config.probe_timeout_ms, io.probe.probe())
            .await
            .unwrap_or(false);
        if reachable {
            self.fresh = false;
            return Ok(ConnectivityState::AttachedOnline);
        }

        warn!("wifi: attached but upstream unreachable, discarding credentials");
        io.station.detach().await;
        if let Err(err) = clear_credentials(io.store) {
            warn!("wifi: clearing credentials failed err={}", err);
        }
        self.candidate = None;
        if self.fresh {
            return Err(RestartReason::FreshCredentialsUnreachable);
        }
        Ok(ConnectivityState::Provisioning)
    }

    async fn provision<S, W, P, Q, D>(
        &mut self,
        io: &mut ConnectivityIo<'_, S, W, P, Q, D>,
    ) -> Result<ConnectivityState, RestartReason>
    where
        S: BlobStore,
        P: ProvisioningPortal,
    {
        if let Err(err) = io.portal.start().await {
            warn!("provisioning: portal start failed err={:?}", err);
            return Err(RestartReason::PortalUnavailable);
        }
        info!("provisioning: portal up, waiting for credentials");

        let submission = io
            .portal
            .next_submission(|submission| {
                match Credentials::new(&submission.ssid, &submission.password) {
                    Ok(_) => PortalReply::Accepted,
                    Err(err) => {
                        info!("provisioning: submission rejected err={}", err);
                        PortalReply::Rejected(err)
                    }
                }
            })
            .await;
        io.portal.stop().await;

        let Some(submission) = submission else {
            info!("provisioning: stopped without credentials");
            return Ok(ConnectivityState::Unattached);
        };
        let credentials = match Credentials::new(&submission.ssid, &submission.password) {
            Ok(credentials) => credentials,
            Err(err) => {
                warn!("provisioning: accepted submission failed validation err={}", err);
                return Ok(ConnectivityState::Provisioning);
            }
        };

        if let Err(err) = save_credentials(io.store, &credentials) {
            warn!("provisioning: saving credentials failed err={}", err);
        }
        info!("provisioning: credentials received ssid={}", credentials.ssid());
        self.candidate = Some(credentials);
        self.fresh = true;
        Ok(ConnectivityState::AttachingSaved)
    }
}
