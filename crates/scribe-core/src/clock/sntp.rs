//! SNTP (RFC 4330) client packet codec.

pub const PACKET_LEN: usize = 48;
pub const PORT: u16 = 123;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

const LEAP_NOT_SYNCED: u8 = 0b11;
const VERSION: u8 = 4;
const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;
const TRANSMIT_OFFSET: usize = 40;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SntpError {
    Short(usize),
    NotServerReply(u8),
    Unsynchronized,
    KissOfDeath,
    ZeroTimestamp,
}

pub fn request() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = (VERSION << 3) | MODE_CLIENT;
    packet
}

/// Extracts the server transmit timestamp as Unix epoch seconds.
pub fn parse_reply(packet: &[u8]) -> Result<u64, SntpError> {
    if packet.len() < PACKET_LEN {
        return Err(SntpError::Short(packet.len()));
    }

    let leap = packet[0] >> 6;
    let mode = packet[0] & 0b111;
    let stratum = packet[1];
    if mode != MODE_SERVER {
        return Err(SntpError::NotServerReply(mode));
    }
    if leap == LEAP_NOT_SYNCED {
        return Err(SntpError::Unsynchronized);
    }
    if stratum == 0 {
        return Err(SntpError::KissOfDeath);
    }

    let seconds = u32::from_be_bytes([
        packet[TRANSMIT_OFFSET],
        packet[TRANSMIT_OFFSET + 1],
        packet[TRANSMIT_OFFSET + 2],
        packet[TRANSMIT_OFFSET + 3],
    ]);
    if seconds == 0 {
        return Err(SntpError::ZeroTimestamp);
    }

    // Era 1 starts in 2036; anything below the 1970 offset has wrapped.
    let seconds = u64::from(seconds);
    let ntp_secs = if seconds < NTP_UNIX_OFFSET {
        seconds + (1u64 << 32)
    } else {
        seconds
    };
    Ok(ntp_secs - NTP_UNIX_OFFSET)
}
