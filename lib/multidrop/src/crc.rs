// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CRC maintenance for the wire format.
//!
//! Frames carry either a CRC-8 (reflected polynomial `0x8C`, zero init) or a
//! CRC-32 (reflected polynomial `0xEDB88320`, all-ones init and final XOR),
//! chosen by the instance configuration. The covered region is every field
//! between the START byte and the CRC itself: addresses, flags, command,
//! length and payload. The CRC is fed incrementally as the codec moves
//! bytes, so no second pass over the frame is needed.

use crc::{Crc, CRC_32_ISO_HDLC, CRC_8_MAXIM_DOW};

use crate::Config;

static CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Incremental CRC accumulator over the covered fields of one frame.
pub(crate) enum WireCrc {
    Disabled,
    Crc8(crc::Digest<'static, u8>),
    Crc32(crc::Digest<'static, u32>),
}

impl WireCrc {
    pub(crate) fn for_config(cfg: Config) -> Self {
        if !cfg.crc {
            Self::Disabled
        } else if cfg.crc32 {
            Self::Crc32(CRC32.digest())
        } else {
            Self::Crc8(CRC8.digest())
        }
    }

    /// Number of bytes the CRC occupies on the wire.
    pub(crate) fn width(&self) -> usize {
        match self {
            Self::Disabled => 0,
            Self::Crc8(_) => 1,
            Self::Crc32(_) => 4,
        }
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Disabled => {}
            Self::Crc8(digest) => digest.update(bytes),
            Self::Crc32(digest) => digest.update(bytes),
        }
    }

    /// Finalised value, widened to `u32`. The low [`Self::width`] bytes in
    /// little-endian order are the wire representation.
    pub(crate) fn finalize(self) -> u32 {
        match self {
            Self::Disabled => 0,
            Self::Crc8(digest) => u32::from(digest.finalize()),
            Self::Crc32(digest) => digest.finalize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The bitwise forms of the two polynomials, as a cross-check that the
    // catalog algorithms are the ones the wire format wants.
    fn crc8_bitwise(data: &[u8]) -> u8 {
        let mut crc: u8 = 0;
        for &byte in data {
            let mut byte = byte;
            for _ in 0..8 {
                let mix = (crc ^ byte) & 0x01;
                crc >>= 1;
                if mix != 0 {
                    crc ^= 0x8C;
                }
                byte >>= 1;
            }
        }
        crc
    }

    fn crc32_bitwise(data: &[u8]) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;
        for &byte in data {
            let mut byte = u32::from(byte);
            for _ in 0..8 {
                let mix = (crc ^ byte) & 0x01;
                crc >>= 1;
                if mix != 0 {
                    crc ^= 0xEDB8_8320;
                }
                byte >>= 1;
            }
        }
        crc ^ 0xFFFF_FFFF
    }

    #[test]
    fn crc8_catalog_check_value() {
        assert_eq!(CRC8.checksum(b"123456789"), 0xA1);
    }

    #[test]
    fn crc32_catalog_check_value() {
        assert_eq!(CRC32.checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc8_matches_bitwise_definition() {
        for data in [&b""[..], b"\x00", b"\xFF", b"Hello World\r\n", b"\xAA\x55"] {
            assert_eq!(CRC8.checksum(data), crc8_bitwise(data));
        }
    }

    #[test]
    fn crc32_matches_bitwise_definition() {
        for data in [&b""[..], b"\x00", b"\xFF", b"Hello World\r\n", b"\xAA\x55"] {
            assert_eq!(CRC32.checksum(data), crc32_bitwise(data));
        }
    }

    #[test]
    fn incremental_update_equals_oneshot() {
        let cfg = Config {
            crc: true,
            crc32: true,
            ..Config::default()
        };
        let mut acc = WireCrc::for_config(cfg);
        acc.update(b"Hello ");
        acc.update(b"");
        acc.update(b"World");
        assert_eq!(acc.finalize(), CRC32.checksum(b"Hello World"));
    }

    #[test]
    fn width_follows_config() {
        let narrow = Config {
            crc: true,
            crc32: false,
            ..Config::default()
        };
        let wide = Config {
            crc: true,
            crc32: true,
            ..Config::default()
        };
        let off = Config {
            crc: false,
            ..Config::default()
        };
        assert_eq!(WireCrc::for_config(narrow).width(), 1);
        assert_eq!(WireCrc::for_config(wide).width(), 4);
        assert_eq!(WireCrc::for_config(off).width(), 0);
    }
}
