//! Logical channel coding in the class byte
//!
//! ISO/IEC 7816-4 defines two interindustry codings of CLA. The first one
//! (`0b0x0x_xxcc`) carries channels 0 to 3 in its two low bits. The further
//! one (`0b01xx_cccc`, bit 7 set) carries channels 4 to 19 as an offset in its
//! low nibble. Bit 8 set with bit 7 clear is the proprietary class used by
//! GlobalPlatform and friends, which follows the first coding.

use crate::{Error, Result};

/// Highest channel number a class byte can address
pub const MAX_CHANNEL: u8 = 19;

/// Bit 7 set selects the further interindustry coding
const FURTHER_INTERINDUSTRY: u8 = 0x40;
/// First channel expressible only in the further coding
const FIRST_FURTHER_CHANNEL: u8 = 4;
/// Reserved by ISO/IEC 7816-3 (PPSS), never a valid class byte
const INVALID_CLASS: u8 = 0xFF;

const PROPRIETARY: u8 = 0x80;
const CHAINING: u8 = 0x10;
const FIRST_SM_MASK: u8 = 0x0C;
const FIRST_SM_NO_HEADER_AUTH: u8 = 0x08;
const FURTHER_SM: u8 = 0x20;

const FIRST_CHANNEL_MASK: u8 = 0x03;
const FURTHER_CHANNEL_MASK: u8 = 0x0F;

/// Whether the class byte uses the further interindustry coding
pub const fn is_further_interindustry(cla: u8) -> bool {
    cla != INVALID_CLASS && cla & FURTHER_INTERINDUSTRY != 0
}

/// Extract the logical channel number from a class byte
///
/// A class byte matching neither coding is treated as addressing the basic
/// channel.
pub const fn decode_channel_number(cla: u8) -> u8 {
    if cla == INVALID_CLASS {
        0
    } else if is_further_interindustry(cla) {
        FIRST_FURTHER_CHANNEL + (cla & FURTHER_CHANNEL_MASK)
    } else {
        cla & FIRST_CHANNEL_MASK
    }
}

/// Return the class byte with its channel bits zeroed
pub const fn clear_channel_number(cla: u8) -> u8 {
    if cla == INVALID_CLASS {
        cla
    } else if is_further_interindustry(cla) {
        cla & !FURTHER_CHANNEL_MASK
    } else {
        cla & !FIRST_CHANNEL_MASK
    }
}

/// Encode a logical channel number into a class byte
///
/// Within one coding every bit but the channel number is kept. Chaining and
/// secure messaging indications are carried over when the channel forces a
/// switch between the two codings. The proprietary bit only survives for
/// channels 0 to 3.
pub fn encode_channel_number(cla: u8, channel: u8) -> Result<u8> {
    let further = is_further_interindustry(cla);
    let secure_messaging = if further {
        cla & FURTHER_SM != 0
    } else {
        cla & FIRST_SM_MASK != 0
    };
    let chaining = cla & CHAINING;

    match channel {
        // Same coding: only the channel bits change
        0..FIRST_FURTHER_CHANNEL if !further => Ok(clear_channel_number(cla) | channel),
        FIRST_FURTHER_CHANNEL..=MAX_CHANNEL if further => {
            Ok(clear_channel_number(cla) | (channel - FIRST_FURTHER_CHANNEL))
        }
        0..FIRST_FURTHER_CHANNEL => {
            let proprietary = if further { 0 } else { cla & PROPRIETARY };
            let sm = match (further, secure_messaging) {
                (false, _) => cla & FIRST_SM_MASK,
                (true, true) => FIRST_SM_NO_HEADER_AUTH,
                (true, false) => 0,
            };
            Ok(proprietary | chaining | sm | channel)
        }
        FIRST_FURTHER_CHANNEL..=MAX_CHANNEL => {
            let sm = if secure_messaging { FURTHER_SM } else { 0 };
            Ok(FURTHER_INTERINDUSTRY | sm | chaining | (channel - FIRST_FURTHER_CHANNEL))
        }
        _ => Err(Error::InvalidChannelNumber(channel)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_first_interindustry() {
        assert_eq!(decode_channel_number(0x00), 0);
        assert_eq!(decode_channel_number(0x01), 1);
        assert_eq!(decode_channel_number(0x02), 2);
        assert_eq!(decode_channel_number(0x03), 3);
        // Secure messaging and chaining bits do not leak into the channel
        assert_eq!(decode_channel_number(0x1E), 2);
        // Proprietary class follows the first coding
        assert_eq!(decode_channel_number(0x80), 0);
        assert_eq!(decode_channel_number(0x83), 3);
    }

    #[test]
    fn test_decode_further_interindustry() {
        assert_eq!(decode_channel_number(0x40), 4);
        assert_eq!(decode_channel_number(0x4F), 19);
        assert_eq!(decode_channel_number(0x65), 9);
    }

    #[test]
    fn test_decode_invalid_class_falls_back_to_basic() {
        assert_eq!(decode_channel_number(0xFF), 0);
        assert_eq!(clear_channel_number(0xFF), 0xFF);
    }

    #[test]
    fn test_clear_channel_number() {
        assert_eq!(clear_channel_number(0x03), 0x00);
        assert_eq!(clear_channel_number(0x0D), 0x0C);
        assert_eq!(clear_channel_number(0x81), 0x80);
        assert_eq!(clear_channel_number(0x4A), 0x40);
        assert_eq!(clear_channel_number(0x7F), 0x70);
    }

    #[test]
    fn test_encode_round_trip() {
        for channel in 0..=MAX_CHANNEL {
            let cla = encode_channel_number(0x00, channel).unwrap();
            assert_eq!(decode_channel_number(cla), channel, "cla {cla:#04X}");

            let cla = encode_channel_number(0x80, channel).unwrap();
            assert_eq!(decode_channel_number(cla), channel, "cla {cla:#04X}");

            let cla = encode_channel_number(0x6C, channel).unwrap();
            assert_eq!(decode_channel_number(cla), channel, "cla {cla:#04X}");
        }
    }

    #[test]
    fn test_encode_keeps_secure_messaging() {
        // First coding with SM moves to the further coding's SM bit
        assert_eq!(encode_channel_number(0x0C, 5).unwrap(), 0x61);
        // And back again
        assert_eq!(encode_channel_number(0x61, 2).unwrap(), 0x0A);
        // Chaining survives both ways
        assert_eq!(encode_channel_number(0x10, 4).unwrap(), 0x50);
        assert_eq!(encode_channel_number(0x50, 1).unwrap(), 0x11);
        // Proprietary class keeps its high bit on low channels
        assert_eq!(encode_channel_number(0x80, 3).unwrap(), 0x83);
    }

    #[test]
    fn test_encode_keeps_class_within_coding() {
        // GSM class
        assert_eq!(encode_channel_number(0xA0, 0).unwrap(), 0xA0);
        assert_eq!(encode_channel_number(0xA0, 2).unwrap(), 0xA2);
        assert_eq!(encode_channel_number(0x0D, 0).unwrap(), 0x0C);
        assert_eq!(encode_channel_number(0x6A, 19).unwrap(), 0x6F);
    }

    #[test]
    fn test_encode_out_of_range() {
        assert_eq!(
            encode_channel_number(0x00, 20),
            Err(Error::InvalidChannelNumber(20))
        );
    }
}
