//! Operator HTTP server on the station interface.
//!
//! Requests that touch shared state are handed to the main loop over
//! `requests` and answered from `replies`; one connection is served at a
//! time, so replies pair up with requests in order.

use embassy_net::{Stack, tcp::TcpSocket};
use embassy_sync::{blocking_mutex::raw::NoopRawMutex, channel::Channel};
use embassy_time::Duration;
use log::{debug, warn};
use scribe_core::{
    http::{Response, Route, reply_response, route},
    operator::{OperatorCommand, OperatorReply},
};
use scribe_hal_esp32s3::net::serve::{
    self, HTTP_PORT, REQUEST_BYTES, SOCKET_TIMEOUT_SECS, ServeError,
};

use crate::logging;

pub type OperatorRequests = Channel<NoopRawMutex, OperatorCommand, 1>;
pub type OperatorReplies = Channel<NoopRawMutex, OperatorReply, 1>;

pub async fn run(
    stack: Stack<'_>,
    requests: &OperatorRequests,
    replies: &OperatorReplies,
) -> ! {
    let mut rx = [0u8; 1_536];
    let mut tx = [0u8; 4_096];
    let mut buf = [0u8; REQUEST_BYTES];

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx, &mut tx);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));
        if let Err(err) = socket.accept(HTTP_PORT).await {
            warn!("operator: accept failed err={:?}", err);
            continue;
        }

        let response = match serve::read_request(&mut socket, &mut buf).await {
            Ok(request) => match route(request.method, &request.path, request.form()) {
                Route::Command(command) => {
                    requests.send(command).await;
                    reply_response(&replies.receive().await)
                }
                Route::Logs => Response::text(200, &logging::recent()),
                Route::Respond(response) => response,
            },
            Err(ServeError::Http(err)) => Response::from(err),
            Err(err) => {
                debug!("operator: request dropped err={:?}", err);
                serve::close(&mut socket).await;
                continue;
            }
        };

        serve::respond(&mut socket, &response).await;
        serve::close(&mut socket).await;
    }
}
