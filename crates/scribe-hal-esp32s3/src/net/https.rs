use embassy_net::{
    Stack,
    dns::DnsSocket,
    tcp::client::{TcpClient, TcpClientState},
};
use log::{debug, info};
use reqwless::{
    client::{HttpClient, TlsConfig, TlsVerify},
    request::Method,
};
use scribe_core::transport::{ContentTransport, PayloadBuffer};

pub const TLS_READ_BUF_SIZE: usize = 16_640;
pub const TLS_WRITE_BUF_SIZE: usize = 4_096;
const RESPONSE_HEAD_BYTES: usize = 2_048;

pub const TCP_RX_BYTES: usize = 1_024;
pub const TCP_TX_BYTES: usize = 1_024;
pub type HttpsSocketState = TcpClientState<1, TCP_RX_BYTES, TCP_TX_BYTES>;

/// HTTPS GET over reqwless. The server certificate is not verified.
pub struct HttpsTransport<'a> {
    tcp: TcpClient<'a, 1, TCP_RX_BYTES, TCP_TX_BYTES>,
    dns: DnsSocket<'a>,
    tls_read: &'a mut [u8],
    tls_write: &'a mut [u8],
    seed: u64,
}

impl<'a> HttpsTransport<'a> {
    pub fn new(
        stack: Stack<'a>,
        state: &'a HttpsSocketState,
        tls_read: &'a mut [u8],
        tls_write: &'a mut [u8],
        seed: u64,
    ) -> Self {
        Self {
            tcp: TcpClient::new(stack, state),
            dns: DnsSocket::new(stack),
            tls_read,
            tls_write,
            seed,
        }
    }

    fn next_seed(&mut self) -> u64 {
        self.seed = self
            .seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.seed
    }
}

impl ContentTransport for HttpsTransport<'_> {
    type Error = reqwless::Error;

    async fn get(&mut self, url: &str, payload: &mut PayloadBuffer) -> Result<u16, Self::Error> {
        let seed = self.next_seed();
        let tls = TlsConfig::new(seed, self.tls_read, self.tls_write, TlsVerify::None);
        let mut client = HttpClient::new_with_tls(&self.tcp, &self.dns, tls);

        info!("https: GET {}", url);
        let mut head = [0u8; RESPONSE_HEAD_BYTES];
        let mut request = client.request(Method::GET, url).await?;
        let response = request.send(&mut head).await?;

        let status = response.status.0;
        let content_length = response.content_length;
        debug!("https: status={} content_length={:?}", status, content_length);
        if status != 200 {
            return Ok(status);
        }

        let mut body = response.body().reader();
        payload.fill_from(&mut body, content_length).await;
        info!("https: received bytes={}", payload.len());
        Ok(status)
    }
}
