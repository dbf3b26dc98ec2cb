// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The transmit side: serialising one message into the TX ring.
//!
//! The frame size is computed up front and checked against the ring's free
//! space before the first byte goes in, so a frame is either written whole
//! or not at all. A transport draining the TX ring concurrently can only
//! increase the free space, never shrink it, so the check cannot be
//! invalidated mid-write.

use crate::crc::WireCrc;
use crate::vlq;
use crate::{EncodeError, Event, Link, Message, START_BYTE, STOP_BYTE};

impl<'a, const MAX_DATA: usize> Link<'a, MAX_DATA> {
    /// Serialises `msg` as one frame into the TX ring.
    ///
    /// Message fields whose feature is disabled in the current [`Config`]
    /// are not placed on the wire. Returns [`EncodeError::BufferFull`]
    /// without touching the ring when the complete frame would not fit.
    ///
    /// [`Config`]: crate::Config
    pub fn write(&mut self, msg: &Message<'_>) -> Result<(), EncodeError> {
        self.notify(Event::PreWrite);
        let res = self.write_frame(msg);
        self.notify(Event::PostWrite);
        if res.is_ok() {
            self.notify(Event::Write);
        }
        res
    }

    fn write_frame(&mut self, msg: &Message<'_>) -> Result<(), EncodeError> {
        let cfg = self.cfg;
        let Ok(wire_len) = u32::try_from(msg.data.len()) else {
            // Longer than the length field can describe; no ring this
            // side of absurd could hold it anyway.
            return Err(EncodeError::BufferFull);
        };

        let mut crc = WireCrc::for_config(cfg);

        // Exact on-wire size of the frame as configured.
        let mut needed = 2; // START + STOP
        if cfg.addr {
            if cfg.addr_extended {
                needed += vlq::encoded_len(self.addr) + vlq::encoded_len(msg.to);
            } else {
                needed += 2;
            }
        }
        if cfg.flags {
            needed += vlq::encoded_len(msg.flags);
        }
        if cfg.cmd {
            needed += 1;
        }
        needed += vlq::encoded_len(wire_len) + msg.data.len();
        needed += crc.width();

        if self.tx.free() < needed {
            return Err(EncodeError::BufferFull);
        }

        self.tx.write(&[START_BYTE]);
        if cfg.addr {
            if cfg.addr_extended {
                self.put_vlq(&mut crc, self.addr);
                self.put_vlq(&mut crc, msg.to);
            } else {
                // Single-byte mode: the low byte of each address goes on
                // the wire.
                self.put(&mut crc, &[self.addr as u8, msg.to as u8]);
            }
        }
        if cfg.flags {
            self.put_vlq(&mut crc, msg.flags);
        }
        if cfg.cmd {
            self.put(&mut crc, &[msg.cmd]);
        }
        self.put_vlq(&mut crc, wire_len);
        self.put(&mut crc, msg.data);

        let crc_width = crc.width();
        if crc_width > 0 {
            let value = crc.finalize();
            self.tx.write(&value.to_le_bytes()[..crc_width]);
        }
        self.tx.write(&[STOP_BYTE]);
        Ok(())
    }

    /// Writes bytes to the TX ring and folds them into the running CRC.
    fn put(&mut self, crc: &mut WireCrc, bytes: &[u8]) {
        self.tx.write(bytes);
        crc.update(bytes);
    }

    fn put_vlq(&mut self, crc: &mut WireCrc, value: u32) {
        let (bytes, len) = vlq::encode(value);
        self.put(crc, &bytes[..len]);
    }
}
