use crc16::{State, XMODEM};

// Bytes the protocol reserves for framing. A computed checksum byte that
// collides with one of these is incremented by the device, so we must do the
// same on our side or every affected frame fails verification.
const RESERVED: [u8; 3] = [b'(', b'\r', b'\n'];

/// CRC-16/XMODEM over `data`, big-endian, with the PI18 reserved-byte
/// adjustment applied to each half.
pub fn checksum(data: &[u8]) -> [u8; 2] {
    let crc = State::<XMODEM>::calculate(data);
    let mut hi = (crc >> 8) as u8;
    let mut lo = crc as u8;
    if RESERVED.contains(&hi) {
        hi = hi.wrapping_add(1);
    }
    if RESERVED.contains(&lo) {
        lo = lo.wrapping_add(1);
    }
    [hi, lo]
}

/// True when `trailer` matches the checksum of `body`.
pub fn verify(body: &[u8], trailer: &[u8]) -> bool {
    trailer == checksum(body)
}
