//! One-request-per-connection HTTP plumbing shared by the setup portal and
//! the operator server.

use alloc::string::{String, ToString};

use embassy_net::tcp::{self, TcpSocket};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write;
use log::{debug, warn};
use scribe_core::http::{self, HttpError, MAX_BODY_BYTES, MAX_HEAD_BYTES, Method, Response};

pub const HTTP_PORT: u16 = 80;
pub const REQUEST_BYTES: usize = MAX_HEAD_BYTES + MAX_BODY_BYTES;
pub const SOCKET_TIMEOUT_SECS: u64 = 10;
const CLOSE_LINGER_MS: u64 = 50;

#[derive(Debug)]
pub enum ServeError {
    Http(HttpError),
    Socket(tcp::Error),
    /// Peer closed before the request was complete.
    Closed,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: String,
}

impl Request {
    /// Form fields: the body for POST, the query string otherwise.
    pub fn form(&self) -> &str {
        match self.method {
            Method::Post => &self.body,
            _ => &self.query,
        }
    }
}

/// Reads one request head and its declared body.
pub async fn read_request(
    socket: &mut TcpSocket<'_>,
    buf: &mut [u8; REQUEST_BYTES],
) -> Result<Request, ServeError> {
    let mut filled = 0usize;

    let (method, path, query, head_len, content_length) = loop {
        let read = socket
            .read(&mut buf[filled..MAX_HEAD_BYTES])
            .await
            .map_err(ServeError::Socket)?;
        if read == 0 {
            return Err(ServeError::Closed);
        }
        filled += read;

        match http::parse_head(&buf[..filled]) {
            Ok(head) => {
                break (
                    head.method,
                    head.path.to_string(),
                    head.query.to_string(),
                    head.head_len,
                    head.content_length,
                );
            }
            Err(HttpError::Incomplete) if filled < MAX_HEAD_BYTES => continue,
            Err(HttpError::Incomplete) => return Err(ServeError::Http(HttpError::TooLarge)),
            Err(err) => return Err(ServeError::Http(err)),
        }
    };

    let total = head_len + content_length;
    while filled < total {
        let read = socket
            .read(&mut buf[filled..total])
            .await
            .map_err(ServeError::Socket)?;
        if read == 0 {
            return Err(ServeError::Closed);
        }
        filled += read;
    }

    let body = core::str::from_utf8(&buf[head_len..total])
        .map_err(|_| ServeError::Http(HttpError::Malformed))?;
    debug!("http: {:?} {} body_bytes={}", method, path, body.len());

    Ok(Request {
        method,
        path,
        query,
        body: body.to_string(),
    })
}

pub async fn respond(socket: &mut TcpSocket<'_>, response: &Response) {
    if let Err(err) = write_response(socket, response).await {
        warn!("http: response write failed status={} err={:?}", response.status, err);
    }
}

async fn write_response(socket: &mut TcpSocket<'_>, response: &Response) -> Result<(), tcp::Error> {
    socket.write_all(response.head().as_bytes()).await?;
    socket.write_all(response.body.as_bytes()).await?;
    socket.flush().await
}

/// Half-closes and gives the peer a moment to read the tail before the
/// socket is dropped.
pub async fn close(socket: &mut TcpSocket<'_>) {
    socket.close();
    Timer::after(Duration::from_millis(CLOSE_LINGER_MS)).await;
    socket.abort();
    let _ = socket.flush().await;
}
