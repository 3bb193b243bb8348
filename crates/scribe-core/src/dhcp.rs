//! DHCPv4 server side for the provisioning access point.
//!
//! Only what a phone or laptop needs to join the setup network: DISCOVER →
//! OFFER, REQUEST → ACK/NAK, RELEASE. Leases are keyed by hardware address
//! and never expire while the portal is up.

use core::fmt;

use heapless::Vec;
use log::{debug, info};

pub const SERVER_PORT: u16 = 67;
pub const CLIENT_PORT: u16 = 68;

const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];
const HEADER_BYTES: usize = 236;
const OPTIONS_OFFSET: usize = HEADER_BYTES + MAGIC_COOKIE.len();
/// BOOTP minimum message size; some clients drop shorter replies.
pub const MIN_REPLY_BYTES: usize = 300;
pub const MAX_REPLY_BYTES: usize = 576;

const OP_BOOTREQUEST: u8 = 1;
const OP_BOOTREPLY: u8 = 2;
const HTYPE_ETHERNET: u8 = 1;

const OPT_PAD: u8 = 0;
const OPT_SUBNET_MASK: u8 = 1;
const OPT_ROUTER: u8 = 3;
const OPT_DNS: u8 = 6;
const OPT_REQUESTED_IP: u8 = 50;
const OPT_LEASE_TIME: u8 = 51;
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_SERVER_ID: u8 = 54;
const OPT_END: u8 = 255;

pub const MAX_LEASES: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Inform,
}

impl MessageType {
    const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Discover,
            2 => Self::Offer,
            3 => Self::Request,
            4 => Self::Decline,
            5 => Self::Ack,
            6 => Self::Nak,
            7 => Self::Release,
            8 => Self::Inform,
            _ => return None,
        })
    }

    const fn code(self) -> u8 {
        match self {
            Self::Discover => 1,
            Self::Offer => 2,
            Self::Request => 3,
            Self::Decline => 4,
            Self::Ack => 5,
            Self::Nak => 6,
            Self::Release => 7,
            Self::Inform => 8,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DhcpError {
    Short(usize),
    NotRequest,
    BadCookie,
    MissingMessageType,
    BadOption,
}

impl fmt::Display for DhcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short(len) => write!(f, "packet too short ({} bytes)", len),
            Self::NotRequest => f.write_str("not a BOOTREQUEST"),
            Self::BadCookie => f.write_str("missing DHCP magic cookie"),
            Self::MissingMessageType => f.write_str("missing message type option"),
            Self::BadOption => f.write_str("truncated option"),
        }
    }
}

/// Fields of a client message the server acts on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClientMessage {
    pub kind: MessageType,
    pub xid: u32,
    pub flags: u16,
    pub ciaddr: [u8; 4],
    pub chaddr: [u8; 6],
    pub requested_ip: Option<[u8; 4]>,
    pub server_id: Option<[u8; 4]>,
}

pub fn parse_client(packet: &[u8]) -> Result<ClientMessage, DhcpError> {
    if packet.len() < OPTIONS_OFFSET {
        return Err(DhcpError::Short(packet.len()));
    }
    if packet[0] != OP_BOOTREQUEST {
        return Err(DhcpError::NotRequest);
    }
    if packet[HEADER_BYTES..OPTIONS_OFFSET] != MAGIC_COOKIE {
        return Err(DhcpError::BadCookie);
    }

    let mut kind = None;
    let mut requested_ip = None;
    let mut server_id = None;

    let mut options = &packet[OPTIONS_OFFSET..];
    while let Some((&code, rest)) = options.split_first() {
        match code {
            OPT_PAD => {
                options = rest;
                continue;
            }
            OPT_END => break,
            _ => {}
        }
        let (&len, rest) = rest.split_first().ok_or(DhcpError::BadOption)?;
        let len = usize::from(len);
        if rest.len() < len {
            return Err(DhcpError::BadOption);
        }
        let (value, rest) = rest.split_at(len);
        match (code, value) {
            (OPT_MESSAGE_TYPE, [code]) => kind = MessageType::from_code(*code),
            (OPT_REQUESTED_IP, &[a, b, c, d]) => requested_ip = Some([a, b, c, d]),
            (OPT_SERVER_ID, &[a, b, c, d]) => server_id = Some([a, b, c, d]),
            _ => {}
        }
        options = rest;
    }

    let mut chaddr = [0u8; 6];
    chaddr.copy_from_slice(&packet[28..34]);

    Ok(ClientMessage {
        kind: kind.ok_or(DhcpError::MissingMessageType)?,
        xid: u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]),
        flags: u16::from_be_bytes([packet[10], packet[11]]),
        ciaddr: [packet[12], packet[13], packet[14], packet[15]],
        chaddr,
        requested_ip,
        server_id,
    })
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DhcpConfig {
    pub server_ip: [u8; 4],
    pub subnet_mask: [u8; 4],
    /// Host part of the first address handed out.
    pub first_host: u8,
    pub lease_secs: u32,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            server_ip: [192, 168, 4, 1],
            subnet_mask: [255, 255, 255, 0],
            first_host: 2,
            lease_secs: 7_200,
        }
    }
}

pub struct DhcpServer {
    config: DhcpConfig,
    leases: Vec<([u8; 6], u8), MAX_LEASES>,
}

impl DhcpServer {
    pub const fn new(config: DhcpConfig) -> Self {
        Self {
            config,
            leases: Vec::new(),
        }
    }

    pub const fn config(&self) -> &DhcpConfig {
        &self.config
    }

    fn address(&self, host: u8) -> [u8; 4] {
        let [a, b, c, _] = self.config.server_ip;
        [a, b, c, host]
    }

    fn lease_for(&mut self, chaddr: [u8; 6]) -> Option<[u8; 4]> {
        if let Some((_, host)) = self.leases.iter().find(|(mac, _)| *mac == chaddr) {
            return Some(self.address(*host));
        }
        let server_host = self.config.server_ip[3];
        let host = (self.config.first_host..=254).find(|candidate| {
            *candidate != server_host && !self.leases.iter().any(|(_, host)| host == candidate)
        })?;
        self.leases.push((chaddr, host)).ok()?;
        Some(self.address(host))
    }

    fn release(&mut self, chaddr: [u8; 6]) {
        self.leases.retain(|(mac, _)| *mac != chaddr);
    }

    /// Handles one client packet, writing any reply into `out` and returning
    /// its length. `out` must hold at least [`MIN_REPLY_BYTES`].
    pub fn handle(&mut self, packet: &[u8], out: &mut [u8]) -> Result<Option<usize>, DhcpError> {
        let message = parse_client(packet)?;
        debug!(
            "dhcp: {:?} xid={:08x} mac={:02x?}",
            message.kind, message.xid, message.chaddr
        );

        let reply = match message.kind {
            MessageType::Discover => self
                .lease_for(message.chaddr)
                .map(|yiaddr| (MessageType::Offer, yiaddr)),
            MessageType::Request => {
                if message
                    .server_id
                    .is_some_and(|server_id| server_id != self.config.server_ip)
                {
                    return Ok(None);
                }
                let wanted = message.requested_ip.unwrap_or(message.ciaddr);
                match self.lease_for(message.chaddr) {
                    Some(yiaddr) if yiaddr == wanted => {
                        info!("dhcp: lease {:?} -> {:02x?}", yiaddr, message.chaddr);
                        Some((MessageType::Ack, yiaddr))
                    }
                    _ => Some((MessageType::Nak, [0; 4])),
                }
            }
            MessageType::Release | MessageType::Decline => {
                self.release(message.chaddr);
                None
            }
            _ => None,
        };

        Ok(reply.map(|(kind, yiaddr)| self.encode_reply(&message, kind, yiaddr, out)))
    }

    fn encode_reply(
        &self,
        request: &ClientMessage,
        kind: MessageType,
        yiaddr: [u8; 4],
        out: &mut [u8],
    ) -> usize {
        let len = MIN_REPLY_BYTES.min(out.len());
        out[..len].fill(0);

        out[0] = OP_BOOTREPLY;
        out[1] = HTYPE_ETHERNET;
        out[2] = 6;
        out[4..8].copy_from_slice(&request.xid.to_be_bytes());
        out[10..12].copy_from_slice(&request.flags.to_be_bytes());
        out[16..20].copy_from_slice(&yiaddr);
        out[20..24].copy_from_slice(&self.config.server_ip);
        out[28..34].copy_from_slice(&request.chaddr);
        out[HEADER_BYTES..OPTIONS_OFFSET].copy_from_slice(&MAGIC_COOKIE);

        let mut cursor = OptionWriter {
            out,
            at: OPTIONS_OFFSET,
        };
        cursor.put(OPT_MESSAGE_TYPE, &[kind.code()]);
        cursor.put(OPT_SERVER_ID, &self.config.server_ip);
        if kind != MessageType::Nak {
            cursor.put(OPT_LEASE_TIME, &self.config.lease_secs.to_be_bytes());
            cursor.put(OPT_SUBNET_MASK, &self.config.subnet_mask);
            cursor.put(OPT_ROUTER, &self.config.server_ip);
            cursor.put(OPT_DNS, &self.config.server_ip);
        }
        cursor.out[cursor.at] = OPT_END;

        (cursor.at + 1).max(len)
    }
}

struct OptionWriter<'a> {
    out: &'a mut [u8],
    at: usize,
}

impl OptionWriter<'_> {
    fn put(&mut self, code: u8, value: &[u8]) {
        self.out[self.at] = code;
        self.out[self.at + 1] = value.len() as u8;
        self.out[self.at + 2..self.at + 2 + value.len()].copy_from_slice(value);
        self.at += 2 + value.len();
    }
}
