// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The receive-side state machine.
//!
//! Decoding is resumable at any byte boundary: [`Link::read`] pulls bytes
//! from the RX ring one at a time and walks the machine until the ring runs
//! dry or a frame reaches a terminal verdict. Anything left in the ring
//! stays there for the next call, so the transport may deliver bytes in
//! whatever chunks it likes.

use crate::crc::WireCrc;
use crate::vlq;
use crate::{Config, DecodeError, Event, Link, ReadStatus, START_BYTE, STOP_BYTE};

impl From<vlq::Overlong> for DecodeError {
    fn from(_: vlq::Overlong) -> Self {
        DecodeError::Malformed
    }
}

/// Position within the frame. The field states are only entered when the
/// latched config carries the field; [`Machine::advance`] skips disabled
/// ones.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum State {
    /// Hunting for a START byte; everything else is discarded.
    Start,
    From,
    To,
    Flags,
    Cmd,
    Len,
    Data,
    Crc,
    Stop,
}

/// Per-frame decoding state. Replaced wholesale on terminal errors; after a
/// valid frame the accumulators survive (they back the [`crate::Frame`]
/// view) until the next START byte replaces them.
pub(crate) struct Machine<const MAX_DATA: usize> {
    pub(crate) state: State,
    /// Feature set latched at the START byte. Runtime toggles on the link
    /// take effect at the next frame boundary, never mid-frame.
    pub(crate) cfg: Config,
    pub(crate) crc: WireCrc,
    /// Received CRC bytes, collected little-endian.
    pub(crate) crc_data: u32,
    pub(crate) from: u32,
    pub(crate) to: u32,
    pub(crate) flags: u32,
    pub(crate) cmd: u8,
    /// Advertised payload length.
    pub(crate) len: u32,
    /// Byte position within the current multi-byte field.
    pub(crate) index: usize,
    pub(crate) data: heapless::Vec<u8, MAX_DATA>,
}

impl<const MAX_DATA: usize> Machine<MAX_DATA> {
    pub(crate) fn idle() -> Self {
        Self {
            state: State::Start,
            cfg: Config::default(),
            crc: WireCrc::Disabled,
            crc_data: 0,
            from: 0,
            to: 0,
            flags: 0,
            cmd: 0,
            len: 0,
            index: 0,
            data: heapless::Vec::new(),
        }
    }

    /// Arms the machine for a new frame: latches the instance config,
    /// initialises the CRC and enters the first enabled field state.
    fn begin(cfg: Config) -> Self {
        let mut m = Self::idle();
        m.cfg = cfg;
        m.crc = WireCrc::for_config(cfg);
        m.state = Self::after_start(cfg);
        m
    }

    fn enter(&mut self, state: State) {
        self.state = state;
        self.index = 0;
    }

    // The canonical field order is From, To, Flags, Cmd, Len, Data, Crc,
    // Stop; each helper names the first enabled state after a group.
    fn after_start(cfg: Config) -> State {
        if cfg.addr {
            State::From
        } else {
            Self::after_addr(cfg)
        }
    }

    fn after_addr(cfg: Config) -> State {
        if cfg.flags {
            State::Flags
        } else {
            Self::after_flags(cfg)
        }
    }

    fn after_flags(cfg: Config) -> State {
        if cfg.cmd {
            State::Cmd
        } else {
            State::Len
        }
    }

    fn after_data(cfg: Config) -> State {
        if cfg.crc {
            State::Crc
        } else {
            State::Stop
        }
    }

    /// Moves to the next enabled state once the current field is complete.
    fn advance(&mut self) {
        let next = match self.state {
            State::Start => Self::after_start(self.cfg),
            State::From => State::To,
            State::To => Self::after_addr(self.cfg),
            State::Flags => Self::after_flags(self.cfg),
            State::Cmd => State::Len,
            State::Len => {
                if self.len > 0 {
                    State::Data
                } else {
                    Self::after_data(self.cfg)
                }
            }
            State::Data => Self::after_data(self.cfg),
            State::Crc => State::Stop,
            State::Stop => State::Start,
        };
        self.enter(next);
    }
}

impl<'a, const MAX_DATA: usize> Link<'a, MAX_DATA> {
    /// Consumes buffered RX bytes and advances the frame decoder.
    ///
    /// Returns as soon as a frame reaches a terminal verdict, leaving any
    /// further buffered bytes for the next call:
    ///
    /// - `Ok(Valid)`: a complete frame passed its integrity check and is
    ///   readable through [`Link::frame`].
    /// - `Err(_)`: the frame in progress was discarded and the parser
    ///   reset; the error says why.
    /// - `Ok(InProgress)` / `Ok(WaitData)`: the ring ran dry mid-frame /
    ///   while hunting for a START byte.
    pub fn read(&mut self) -> Result<ReadStatus, DecodeError> {
        self.notify(Event::PreRead);
        let mut consumed_any = false;
        let res = loop {
            let Some(byte) = self.rx.pop() else {
                break Ok(match self.m.state {
                    State::Start => ReadStatus::WaitData,
                    _ => ReadStatus::InProgress,
                });
            };
            consumed_any = true;
            match self.step(byte) {
                Ok(None) => {}
                Ok(Some(status)) => break Ok(status),
                Err(err) => {
                    // The terminal-error reset lives here so every failure
                    // path below gets it.
                    self.reset();
                    break Err(err);
                }
            }
        };
        self.notify(Event::PostRead);
        if consumed_any {
            self.notify(Event::Read);
        }
        res
    }

    /// Feeds one byte to the machine. `Ok(Some(_))` and `Err(_)` are
    /// terminal for the current frame.
    fn step(&mut self, byte: u8) -> Result<Option<ReadStatus>, DecodeError> {
        let m = &mut self.m;
        match m.state {
            State::Start => {
                if byte == START_BYTE {
                    self.valid = false;
                    self.m = Machine::begin(self.cfg);
                }
                Ok(None)
            }
            State::From => {
                m.crc.update(&[byte]);
                let done = if m.cfg.addr_extended {
                    vlq::accumulate(&mut m.from, &mut m.index, byte)?
                } else {
                    m.from = u32::from(byte);
                    true
                };
                if done {
                    m.advance();
                }
                Ok(None)
            }
            State::To => {
                m.crc.update(&[byte]);
                let done = if m.cfg.addr_extended {
                    vlq::accumulate(&mut m.to, &mut m.index, byte)?
                } else {
                    m.to = u32::from(byte);
                    true
                };
                if done {
                    m.advance();
                }
                Ok(None)
            }
            State::Flags => {
                m.crc.update(&[byte]);
                if vlq::accumulate(&mut m.flags, &mut m.index, byte)? {
                    m.advance();
                }
                Ok(None)
            }
            State::Cmd => {
                m.crc.update(&[byte]);
                m.cmd = byte;
                m.advance();
                Ok(None)
            }
            State::Len => {
                m.crc.update(&[byte]);
                if vlq::accumulate(&mut m.len, &mut m.index, byte)? {
                    m.advance();
                }
                Ok(None)
            }
            State::Data => {
                if m.data.push(byte).is_err() {
                    // The advertised length exceeds our payload buffer. The
                    // remaining payload bytes are not consumed; if one of
                    // them equals START it will be mistaken for a new frame
                    // opening, which the integrity check then catches.
                    return Err(DecodeError::Overflow);
                }
                m.crc.update(&[byte]);
                if m.data.len() == m.len as usize {
                    m.advance();
                }
                Ok(None)
            }
            State::Crc => {
                m.crc_data |= u32::from(byte) << (8 * m.index);
                m.index += 1;
                if m.index == m.crc.width() {
                    let computed =
                        core::mem::replace(&mut m.crc, WireCrc::Disabled).finalize();
                    if computed != m.crc_data {
                        return Err(DecodeError::Crc);
                    }
                    m.enter(State::Stop);
                }
                Ok(None)
            }
            State::Stop => {
                if byte == STOP_BYTE {
                    // Keep the decoded fields for the accessor window; only
                    // the state itself returns to hunting for START.
                    m.enter(State::Start);
                    self.valid = true;
                    Ok(Some(ReadStatus::Valid))
                } else {
                    Err(DecodeError::Stop)
                }
            }
        }
    }
}
