use embassy_net::{Stack, dns::DnsQueryType};
use log::{debug, warn};
use scribe_core::transport::ReachabilityProbe;

/// Resolves a well-known host through the station's DNS servers.
pub struct DnsProbe<'a> {
    stack: Stack<'a>,
    host: &'a str,
}

impl<'a> DnsProbe<'a> {
    pub fn new(stack: Stack<'a>, host: &'a str) -> Self {
        Self { stack, host }
    }
}

impl ReachabilityProbe for DnsProbe<'_> {
    async fn probe(&mut self) -> bool {
        match self.stack.dns_query(self.host, DnsQueryType::A).await {
            Ok(addresses) if !addresses.is_empty() => {
                debug!("probe: {} -> {:?}", self.host, addresses[0]);
                true
            }
            Ok(_) => {
                warn!("probe: {} resolved to nothing", self.host);
                false
            }
            Err(err) => {
                warn!("probe: {} lookup failed err={:?}", self.host, err);
                false
            }
        }
    }
}
