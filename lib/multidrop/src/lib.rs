// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point-to-multipoint framing for byte-oriented serial transports.
//!
//! This crate frames logical messages for links like UART, RS-485 or a pair
//! of pipes, where several devices may share one medium and bytes arrive in
//! arbitrary chunks. A [`Link`] owns the producer half of a TX ring and the
//! consumer half of an RX ring (see the `spsc-ring` crate); the transport
//! driver drains the TX ring onto the wire and feeds received bytes into the
//! RX ring, from an interrupt handler if it likes.
//!
//! A frame on the wire looks like this, with every bracketed field present
//! or absent according to the link's [`Config`]:
//!
//! ```text
//! START | [from | to] | [flags] | [cmd] | len | payload | [crc] | STOP
//!  0xAA                                                           0x55
//! ```
//!
//! `len` is always a variable-length 7-bit integer; `from`/`to` and `flags`
//! use the same encoding when their extended forms are enabled, and plain
//! single bytes otherwise. The CRC (8- or 32-bit, little-endian) covers
//! everything between START and the CRC itself. Two peers interoperate
//! exactly when their configurations agree.
//!
//! # Example
//!
//! ```
//! use multidrop::{Link, Message, ReadStatus, Ring};
//!
//! let mut tx_storage = [0u8; 128];
//! let mut rx_storage = [0u8; 128];
//! let mut tx = Ring::new(&mut tx_storage);
//! let mut rx = Ring::new(&mut rx_storage);
//! let (tx_prod, mut tx_cons) = tx.split();
//! let (mut rx_prod, rx_cons) = rx.split();
//!
//! let mut link: Link<'_> = Link::new(tx_prod, rx_cons);
//! link.set_addr(0x12);
//!
//! link.write(&Message {
//!     to: 0x11,
//!     cmd: 0x85,
//!     data: b"hello",
//!     ..Message::default()
//! })?;
//!
//! // Loop the encoded bytes straight back, as if the wire echoed them.
//! while let Some(byte) = tx_cons.pop() {
//!     rx_prod.write(&[byte]);
//! }
//!
//! assert_eq!(link.read(), Ok(ReadStatus::Valid));
//! let frame = link.frame().unwrap();
//! assert_eq!(frame.data(), b"hello");
//! assert_eq!(frame.cmd(), Some(0x85));
//! # Ok::<(), multidrop::EncodeError>(())
//! ```
//!
//! # What this crate does not do
//!
//! No retransmission, flow control, encryption or multiplexing: one frame
//! carries one message, and a damaged frame is simply dropped. The decoder
//! resynchronises on the next START byte.

#![cfg_attr(not(test), no_std)]

mod crc;
mod decode;
mod encode;
mod vlq;

pub use spsc_ring::{Consumer, Producer, Ring, RingEvent, RingEventFn};

use decode::Machine;

/// Frame delimiter values. `START` opens a frame; the decoder ignores
/// everything else while hunting for it.
pub const START_BYTE: u8 = 0xAA;
/// Closes a frame; anything else in that position discards the frame.
pub const STOP_BYTE: u8 = 0x55;

/// Destination address meaning "all devices on the bus".
pub const BROADCAST_ADDR: u32 = 0xFF;

/// Default payload capacity of a [`Link`], in bytes.
pub const MAX_DATA_LEN: usize = 256;

/// Default inactivity timeout for [`Link::process`], in milliseconds.
pub const INPROG_TIMEOUT_MS: u32 = 100;

/// Which optional fields a link puts on (and expects from) the wire.
///
/// Both peers must agree on this for frames to be intelligible. The fields
/// can be changed at runtime through the setters on [`Link`]; the decoder
/// latches a copy at each START byte, so a change only applies from the next
/// frame boundary onward.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Carry `from`/`to` device addresses.
    pub addr: bool,
    /// Encode addresses as variable-length integers (up to 32 bits) instead
    /// of single bytes.
    pub addr_extended: bool,
    /// Carry an opaque 32-bit flags field.
    pub flags: bool,
    /// Carry a one-byte command.
    pub cmd: bool,
    /// Carry an integrity code.
    pub crc: bool,
    /// Use the 32-bit CRC instead of the 8-bit one. Ignored unless `crc` is
    /// set.
    pub crc32: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: true,
            addr_extended: false,
            flags: false,
            cmd: true,
            crc: true,
            crc32: false,
        }
    }
}

/// Non-terminal outcome of [`Link::read`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadStatus {
    /// A complete, integrity-checked frame was decoded; its fields are
    /// available through [`Link::frame`] until the next frame starts.
    Valid,
    /// Mid-frame: some bytes consumed, more needed.
    InProgress,
    /// Nothing buffered, or nothing but noise before a START byte.
    WaitData,
}

/// Terminal decode failure. The parser has been fully reset when one of
/// these is returned; the next byte received is treated as potential START.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// The received integrity code did not match the computed one.
    Crc,
    /// The STOP byte was absent where the frame should have ended.
    Stop,
    /// The advertised payload length exceeds the link's payload buffer.
    Overflow,
    /// A variable-length field ran past the width of its target.
    Malformed,
}

/// Encode failure. The TX ring is left untouched.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EncodeError {
    /// The TX ring does not have room for the complete frame.
    BufferFull,
}

/// Notifications delivered to the link's event callback.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// A read pass is about to start.
    PreRead,
    /// A read pass finished (any outcome).
    PostRead,
    /// The read pass consumed at least one byte from the RX ring.
    Read,
    /// A write is about to start.
    PreWrite,
    /// A write finished (any outcome).
    PostWrite,
    /// A frame was fully written to the TX ring.
    Write,
    /// [`Link::process`] decoded a valid frame.
    Packet,
    /// [`Link::process`] abandoned a stalled partial frame.
    Timeout,
}

/// An outgoing message for [`Link::write`].
///
/// Fields whose feature is disabled in the link's [`Config`] are ignored, so
/// `..Message::default()` is the usual way to fill the rest in.
#[derive(Copy, Clone, Debug, Default)]
pub struct Message<'a> {
    /// Destination device address.
    pub to: u32,
    /// Opaque flags value.
    pub flags: u32,
    /// Command byte.
    pub cmd: u8,
    /// Payload.
    pub data: &'a [u8],
}

/// One endpoint of a framed serial link: encoder, decoder and session state.
///
/// The `MAX_DATA` parameter bounds the payload a received frame may carry;
/// the buffer lives inside the `Link` value, so no allocation happens at
/// runtime. The default matches [`MAX_DATA_LEN`].
///
/// A `Link` is driven entirely by its caller: [`Link::write`] to send,
/// [`Link::read`] or [`Link::process`] to receive. Nothing blocks and no
/// internal threads or timers exist; `process` takes the current time as an
/// argument instead.
pub struct Link<'a, const MAX_DATA: usize = 256> {
    tx: Producer<'a, 'a>,
    rx: Consumer<'a, 'a>,
    addr: u32,
    cfg: Config,
    timeout_ms: u32,
    last_rx_time: u32,
    /// Whether the accumulators in `m` hold a completely decoded frame.
    valid: bool,
    evt_fn: Option<&'a mut dyn FnMut(Event)>,
    m: Machine<MAX_DATA>,
}

impl<'a, const MAX_DATA: usize> Link<'a, MAX_DATA> {
    /// Creates a link with the default [`Config`] over the given ring
    /// halves: the producer side of the TX ring and the consumer side of
    /// the RX ring. The opposite halves belong to the transport driver.
    pub fn new(tx: Producer<'a, 'a>, rx: Consumer<'a, 'a>) -> Self {
        Self::with_config(tx, rx, Config::default())
    }

    /// Creates a link with an explicit feature configuration.
    pub fn with_config(tx: Producer<'a, 'a>, rx: Consumer<'a, 'a>, cfg: Config) -> Self {
        Self {
            tx,
            rx,
            addr: 0,
            cfg,
            timeout_ms: INPROG_TIMEOUT_MS,
            last_rx_time: 0,
            valid: false,
            evt_fn: None,
            m: Machine::idle(),
        }
    }

    /// Sets this device's address, used as `from` when encoding and for
    /// [`Frame::is_for_me`]. In single-byte address mode only the low byte
    /// goes on the wire.
    pub fn set_addr(&mut self, addr: u32) {
        self.addr = addr;
    }

    /// This device's address.
    pub fn addr(&self) -> u32 {
        self.addr
    }

    /// The current feature configuration.
    pub fn config(&self) -> Config {
        self.cfg
    }

    /// Enables or disables addressing. Like all feature toggles, this takes
    /// effect on decode at the next frame boundary; do not toggle while a
    /// peer is mid-frame.
    pub fn set_addr_enabled(&mut self, enabled: bool) {
        self.cfg.addr = enabled;
    }

    /// Enables or disables variable-length addresses.
    pub fn set_addr_extended_enabled(&mut self, enabled: bool) {
        self.cfg.addr_extended = enabled;
    }

    /// Enables or disables the flags field.
    pub fn set_flags_enabled(&mut self, enabled: bool) {
        self.cfg.flags = enabled;
    }

    /// Enables or disables the command byte.
    pub fn set_cmd_enabled(&mut self, enabled: bool) {
        self.cfg.cmd = enabled;
    }

    /// Enables or disables the integrity code.
    pub fn set_crc_enabled(&mut self, enabled: bool) {
        self.cfg.crc = enabled;
    }

    /// Selects the 32-bit CRC instead of the 8-bit one.
    pub fn set_crc32_enabled(&mut self, enabled: bool) {
        self.cfg.crc32 = enabled;
    }

    /// Overrides the inactivity timeout used by [`Link::process`].
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    /// Sets or clears the event callback. The callback must not reenter the
    /// link it is observing; it receives only the [`Event`] and reaches its
    /// own state through its captures.
    pub fn set_event_fn(&mut self, evt_fn: Option<&'a mut dyn FnMut(Event)>) {
        self.evt_fn = evt_fn;
    }

    /// Drops any partially decoded frame and returns the parser to hunting
    /// for a START byte. Buffered RX bytes are not discarded.
    pub fn reset(&mut self) {
        self.m = Machine::idle();
        self.valid = false;
    }

    /// Runs one receive pass and maintains the inactivity timeout.
    ///
    /// `now_ms` is a free-running millisecond counter; it may wrap, and the
    /// elapsed-time check is performed with modular arithmetic so intervals
    /// under half the counter range are measured correctly.
    ///
    /// On a valid frame this emits [`Event::Packet`]. If a partial frame has
    /// made no progress for the configured timeout, the parser is reset and
    /// [`Event::Timeout`] is emitted; the bytes of the abandoned frame are
    /// already consumed and are not replayed.
    pub fn process(&mut self, now_ms: u32) -> Result<ReadStatus, DecodeError> {
        let res = self.read();
        match res {
            Ok(ReadStatus::Valid) => {
                self.last_rx_time = now_ms;
                self.notify(Event::Packet);
            }
            Ok(ReadStatus::InProgress) => {
                if now_ms.wrapping_sub(self.last_rx_time) >= self.timeout_ms {
                    self.reset();
                    self.last_rx_time = now_ms;
                    self.notify(Event::Timeout);
                }
            }
            _ => {
                self.last_rx_time = now_ms;
            }
        }
        res
    }

    /// The last decoded frame, if the most recent verdict was
    /// [`ReadStatus::Valid`] and no new frame has started since.
    pub fn frame(&self) -> Option<Frame<'_>> {
        if !self.valid {
            return None;
        }
        Some(Frame {
            cfg: self.m.cfg,
            from: self.m.from,
            to: self.m.to,
            flags: self.m.flags,
            cmd: self.m.cmd,
            data: &self.m.data[..],
            device_addr: self.addr,
        })
    }

    fn notify(&mut self, event: Event) {
        if let Some(evt_fn) = self.evt_fn.as_mut() {
            evt_fn(event);
        }
    }
}

/// Read-only view of a decoded frame, returned by [`Link::frame`].
///
/// Field accessors return `None` for fields the frame did not carry (per the
/// configuration that was active when it was decoded).
#[derive(Copy, Clone, Debug)]
pub struct Frame<'l> {
    cfg: Config,
    from: u32,
    to: u32,
    flags: u32,
    cmd: u8,
    data: &'l [u8],
    device_addr: u32,
}

impl<'l> Frame<'l> {
    /// Address of the sending device.
    pub fn from_addr(&self) -> Option<u32> {
        self.cfg.addr.then_some(self.from)
    }

    /// Address the frame was sent to.
    pub fn to_addr(&self) -> Option<u32> {
        self.cfg.addr.then_some(self.to)
    }

    /// The opaque flags value.
    pub fn flags(&self) -> Option<u32> {
        self.cfg.flags.then_some(self.flags)
    }

    /// The command byte.
    pub fn cmd(&self) -> Option<u8> {
        self.cfg.cmd.then_some(self.cmd)
    }

    /// The payload.
    pub fn data(&self) -> &'l [u8] {
        self.data
    }

    /// Whether the frame was addressed to this device specifically.
    pub fn is_for_me(&self) -> bool {
        self.cfg.addr && self.to == self.device_addr
    }

    /// Whether the frame was addressed to every device on the bus.
    pub fn is_broadcast(&self) -> bool {
        self.cfg.addr && self.to == BROADCAST_ADDR
    }
}
