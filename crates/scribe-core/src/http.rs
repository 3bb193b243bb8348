//! Minimal HTTP/1.1 request parsing and routing for the operator server and
//! the provisioning portal. One request per connection; bodies are
//! `application/x-www-form-urlencoded`.

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};
use core::{fmt, str};

use serde_json::json;

use crate::{
    clock::format_iso_date,
    connectivity::{PortalReply, RestartReason, Submission},
    operator::{OperatorCommand, OperatorError, OperatorReply},
};

pub const MAX_HEAD_BYTES: usize = 1024;
pub const MAX_BODY_BYTES: usize = 1024;

const CONTENT_TEXT: &str = "text/plain";
const CONTENT_JSON: &str = "application/json";
const CONTENT_HTML: &str = "text/html";

const OPERATOR_PAGE: &str = concat!(
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
    "<meta name=\"viewport\" content=\"width=device-width\"><title>Scribe</title></head><body>",
    "<h1>Scribe</h1>",
    "<form method=\"post\" action=\"/submit\"><textarea name=\"message\" rows=\"4\"></textarea><br>",
    "<input name=\"date\" placeholder=\"YYYY-MM-DD\"><button>Print receipt</button></form>",
    "<form method=\"post\" action=\"/printJoke\"><button>Print today's joke</button></form>",
    "<form method=\"post\" action=\"/api/schedule\"><input name=\"dailyPrintTime\" placeholder=\"HH:MM\">",
    "<button>Set daily print time</button></form>",
    "<form method=\"post\" action=\"/forgetWifi\"><button>Forget WiFi</button></form>",
    "<p><a href=\"/logs\">Logs</a></p></body></html>",
);

const SETUP_PAGE: &str = concat!(
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
    "<meta name=\"viewport\" content=\"width=device-width\"><title>Scribe setup</title></head><body>",
    "<h1>WiFi setup</h1>",
    "<form method=\"post\" action=\"/api/setupWiFi\">",
    "<input name=\"ssid\" list=\"networks\" placeholder=\"SSID\" maxlength=\"32\">",
    "<datalist id=\"networks\"></datalist><br>",
    "<input name=\"password\" type=\"password\" placeholder=\"Password\" maxlength=\"63\"><br>",
    "<button>Connect</button></form>",
    "<script>fetch('/api/scan').then(r=>r.json()).then(l=>{",
    "const d=document.getElementById('networks');",
    "l.forEach(s=>{const o=document.createElement('option');o.value=s;d.appendChild(o);});",
    "});</script></body></html>",
);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Other,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HttpError {
    /// The blank line ending the head has not arrived yet.
    Incomplete,
    Malformed,
    TooLarge,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Incomplete => "incomplete request head",
            Self::Malformed => "malformed request",
            Self::TooLarge => "request too large",
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RequestHead<'a> {
    pub method: Method,
    pub path: &'a str,
    pub query: &'a str,
    pub content_length: usize,
    /// Bytes up to and including the blank line.
    pub head_len: usize,
}

pub fn parse_head(buf: &[u8]) -> Result<RequestHead<'_>, HttpError> {
    let Some(end) = buf.windows(4).position(|window| window == b"\r\n\r\n") else {
        return Err(if buf.len() >= MAX_HEAD_BYTES {
            HttpError::TooLarge
        } else {
            HttpError::Incomplete
        });
    };
    let head = str::from_utf8(&buf[..end]).map_err(|_| HttpError::Malformed)?;
    let mut lines = head.split("\r\n");

    let mut request_line = lines.next().unwrap_or("").split(' ');
    let method = match request_line.next() {
        Some("GET") => Method::Get,
        Some("POST") => Method::Post,
        Some(token) if !token.is_empty() => Method::Other,
        _ => return Err(HttpError::Malformed),
    };
    let target = request_line.next().ok_or(HttpError::Malformed)?;
    if !request_line.next().is_some_and(|version| version.starts_with("HTTP/")) {
        return Err(HttpError::Malformed);
    }
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    let mut content_length = 0usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(HttpError::Malformed);
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse().map_err(|_| HttpError::Malformed)?;
        }
    }
    if content_length > MAX_BODY_BYTES {
        return Err(HttpError::TooLarge);
    }

    Ok(RequestHead {
        method,
        path,
        query,
        content_length,
        head_len: end + 4,
    })
}

/// Decodes `+` and `%XX`; malformed escapes are kept literally.
pub fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => match (hex_value(bytes.get(i + 1)), hex_value(bytes.get(i + 2))) {
                (Some(high), Some(low)) => {
                    out.push((high << 4) | low);
                    i += 3;
                    continue;
                }
                _ => out.push(b'%'),
            },
            byte => out.push(byte),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: Option<&u8>) -> Option<u8> {
    match *byte? {
        digit @ b'0'..=b'9' => Some(digit - b'0'),
        lower @ b'a'..=b'f' => Some(lower - b'a' + 10),
        upper @ b'A'..=b'F' => Some(upper - b'A' + 10),
        _ => None,
    }
}

/// First value of `key` in a urlencoded form.
pub fn form_value(form: &str, key: &str) -> Option<String> {
    form.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(name, _)| percent_decode(name) == key)
        .map(|(_, value)| percent_decode(value))
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: CONTENT_TEXT,
            body: body.to_string(),
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_JSON,
            body: serde_json::to_string(value).unwrap_or_default(),
        }
    }

    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_HTML,
            body: body.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::text(404, "Page not found")
    }

    /// Status line and headers, ending with the blank line.
    pub fn head(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len()
        )
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

impl From<HttpError> for Response {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::TooLarge => Self::text(413, "Request too large"),
            HttpError::Incomplete | HttpError::Malformed => Self::text(400, "Bad request"),
        }
    }
}

/// What the operator server should do with one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Route {
    Command(OperatorCommand),
    Logs,
    Respond(Response),
}

pub fn route(method: Method, path: &str, form: &str) -> Route {
    match (method, path) {
        (Method::Get, "/") => Route::Respond(Response::html(OPERATOR_PAGE)),
        (Method::Get, "/logs") => Route::Logs,
        (Method::Post, "/submit") => match form_value(form, "message") {
            Some(message) => Route::Command(OperatorCommand::SubmitReceipt {
                message,
                date: form_value(form, "date"),
            }),
            None => Route::Respond(Response::text(400, "Missing message parameter")),
        },
        (Method::Post, "/printJoke") => Route::Command(OperatorCommand::PrintNow),
        (Method::Get, "/wifiInfo") => Route::Command(OperatorCommand::ReadWifiInfo),
        (Method::Post, "/forgetWifi") => Route::Command(OperatorCommand::ForgetCredentials),
        (Method::Get, "/api/schedule") => Route::Command(OperatorCommand::ReadSchedule),
        (Method::Post, "/api/schedule") => match form_value(form, "dailyPrintTime") {
            Some(text) => Route::Command(OperatorCommand::SetDailyFireTime(text)),
            None => Route::Respond(Response::text(400, "Missing dailyPrintTime parameter")),
        },
        (Method::Get, "/api/lastPrint") => Route::Command(OperatorCommand::ReadLastFireDate),
        _ => Route::Respond(Response::not_found()),
    }
}

fn date_field(date: Option<chrono::NaiveDate>) -> String {
    date.map(|date| format_iso_date(date).as_str().to_string())
        .unwrap_or_default()
}

pub fn reply_response(reply: &OperatorReply) -> Response {
    match reply {
        OperatorReply::PrintQueued => Response::text(200, "Joke will be printed!"),
        OperatorReply::Schedule(schedule) => Response::json(&json!({
            "dailyPrintTime": schedule.daily_fire_time.to_string(),
            "lastJokePrintDate": date_field(schedule.last_fire_date),
        })),
        OperatorReply::ScheduleUpdated(_) => Response::json(&json!({ "success": true })),
        OperatorReply::LastFireDate(date) => Response::json(&json!({
            "lastJokePrintDate": date_field(*date),
        })),
        OperatorReply::ReceiptQueued => {
            Response::text(200, "Receipt received and will be printed!")
        }
        OperatorReply::WifiInfo { ssid, address } => Response::json(&json!({
            "ssid": ssid.as_deref().unwrap_or(""),
            "ip": address.as_deref().unwrap_or(""),
        })),
        OperatorReply::Restart(RestartReason::CredentialsForgotten) => {
            Response::text(200, "Forgetting WiFi and restarting...")
        }
        OperatorReply::Restart(_) => Response::text(200, "Restarting..."),
        OperatorReply::Rejected(OperatorError::InvalidFireTime(_)) => {
            Response::text(400, "Invalid time format (use HH:MM)")
        }
        OperatorReply::Rejected(err @ OperatorError::Storage(_)) => {
            Response::text(500, &err.to_string())
        }
        OperatorReply::Rejected(err) => Response::text(400, &err.to_string()),
    }
}

/// What the provisioning portal should do with one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PortalRoute {
    Submit(Submission),
    Respond(Response),
}

/// SSIDs worth offering in the setup form: non-empty, at most 32 bytes, not
/// the portal's own network, first occurrence only.
pub fn visible_networks<'a>(
    scanned: impl IntoIterator<Item = &'a str>,
    own_ssid: &str,
) -> Vec<String> {
    let mut networks: Vec<String> = Vec::new();
    for ssid in scanned {
        if ssid.is_empty() || ssid.len() > 32 || ssid == own_ssid {
            continue;
        }
        if !networks.iter().any(|known| known == ssid) {
            networks.push(ssid.to_string());
        }
    }
    networks
}

/// `/api/scan` lists `networks`; every other GET gets the setup form so
/// captive-portal checks land on it.
pub fn portal_route(method: Method, path: &str, form: &str, networks: &[String]) -> PortalRoute {
    match (method, path) {
        (Method::Get, "/api/scan") => PortalRoute::Respond(Response::json(&json!(networks))),
        (Method::Post, "/api/setupWiFi") => {
            match (form_value(form, "ssid"), form_value(form, "password")) {
                (Some(ssid), Some(password)) => PortalRoute::Submit(Submission { ssid, password }),
                _ => PortalRoute::Respond(Response::text(400, "Missing parameters")),
            }
        }
        (Method::Get, _) => PortalRoute::Respond(Response::html(SETUP_PAGE)),
        _ => PortalRoute::Respond(Response::not_found()),
    }
}

pub fn portal_reply_response(reply: PortalReply) -> Response {
    match reply {
        PortalReply::Accepted => Response::text(
            200,
            "WiFi credentials received and saved. This Portal will close now.",
        ),
        PortalReply::Rejected(_) => Response::text(400, "Invalid parameters"),
    }
}
