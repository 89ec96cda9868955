//! Decodes one candidate frame (as produced by [`crate::framer`]) into a
//! [`Record`], or rejects it with a [`RejectReason`].
//!
//! The five phases below follow the wire layout directly: prefix, header,
//! format-dispatched body, checksum, trailer. Each phase can only reject,
//! never partially succeed; a rejected frame is dropped by the caller and
//! the receive loop continues, per the non-fatal error taxonomy.

use bitmatch::bitmatch;

use crate::bcd::bcd_to_u64;
use crate::config::Config;
use crate::record::{Body, DisplayItem, Level, Record, Snapshot, WarrantReference};

const ESC: u8 = 0x1b;
const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

const FORMAT_SNAPSHOT_4B_VOLUME: [u8; 2] = [0x06, 0x17];
const FORMAT_SNAPSHOT_6B_VOLUME: u8 = 0x23;
const FORMAT_WARRANT_REFERENCE: u8 = 0x14;

/// Why a candidate frame was rejected. All variants are non-fatal: the
/// receive loop drops the frame and continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("first byte is {0:#04x}, not the ESC prefix 0x1b")]
    BadPrefix(u8),
    #[error("frame is {0} bytes, shorter than the minimum 10-byte header")]
    ShortHeader(usize),
    #[error("format code {0:#04x} is not in the configured allow-list")]
    UnsupportedFormat(u8),
    #[error("remaining body length ({remaining}) does not match the format's expected layout")]
    ShortBody { remaining: usize },
    #[error("checksum mismatch: computed {computed:#04x}, frame has {stored:#04x}")]
    BadChecksum { computed: u8, stored: u8 },
    #[error("trailer bytes are {0:#04x} {1:#04x}, not CRLF")]
    BadTrailer(u8, u8),
    #[error("message_length {declared} does not match actual frame length {actual}")]
    LengthMismatch { declared: u16, actual: usize },
}

/// Decodes one candidate frame. `frame` is expected to already be
/// CRLF-terminated, as produced by [`crate::framer::frames`]; this function
/// re-validates the trailer regardless, since a decoder used standalone
/// (e.g. in tests) should not rely on the framer having done so.
pub fn decode(frame: &[u8], config: &Config) -> Result<Record, RejectReason> {
    if frame.first() != Some(&ESC) {
        return Err(RejectReason::BadPrefix(frame.first().copied().unwrap_or(0)));
    }
    if frame.len() < 10 {
        return Err(RejectReason::ShortHeader(frame.len()));
    }
    // 10-byte header + 1-byte checksum + 2-byte CRLF trailer, with zero body.
    if frame.len() < 13 {
        return Err(RejectReason::ShortBody { remaining: 0 });
    }

    let message_length = bcd_to_u64(&frame[1..3]) as u16;
    let business_type = bcd_to_u64(&frame[3..4]) as u8;
    let format_code = frame[4];
    let format_version = bcd_to_u64(&frame[5..6]) as u8;
    let transmission_number = bcd_to_u64(&frame[6..10]) as u32;

    if !config.accepts_format_code(format_code) {
        return Err(RejectReason::UnsupportedFormat(format_code));
    }

    if config.strict && usize::from(message_length) != frame.len() {
        return Err(RejectReason::LengthMismatch {
            declared: message_length,
            actual: frame.len(),
        });
    }

    let body_bytes = &frame[10..frame.len() - 3];
    let body = if FORMAT_SNAPSHOT_4B_VOLUME.contains(&format_code) {
        decode_snapshot(body_bytes, VolumeWidth::Four)?
    } else if format_code == FORMAT_SNAPSHOT_6B_VOLUME {
        decode_snapshot(body_bytes, VolumeWidth::Six)?
    } else if format_code == FORMAT_WARRANT_REFERENCE {
        decode_warrant(body_bytes)?
    } else {
        // Reached only if the allow-list was configured with an unrecognized
        // code; there is no body layout to dispatch to.
        return Err(RejectReason::UnsupportedFormat(format_code));
    };

    verify_checksum(frame)?;
    verify_trailer(frame)?;

    Ok(Record {
        message_length,
        business_type,
        format_code,
        format_version,
        transmission_number,
        body,
    })
}

enum VolumeWidth {
    Four,
    Six,
}

fn decode_snapshot(body: &[u8], volume_width: VolumeWidth) -> Result<Body, RejectReason> {
    let volume_len = match volume_width {
        VolumeWidth::Four => 4,
        VolumeWidth::Six => 6,
    };
    // stock_code(6) + match_time(6) + display_item(1) + limit_up_limit_down(1)
    // + status_note(1) + cumulative_volume(volume_len)
    let fixed_len = 6 + 6 + 1 + 1 + 1 + volume_len;
    if body.len() < fixed_len {
        return Err(RejectReason::ShortBody { remaining: body.len() });
    }

    let mut stock_code = [0u8; 6];
    stock_code.copy_from_slice(&body[0..6]);
    let match_time = bcd_to_u64(&body[6..12]);
    let display_item = decode_display_item(body[12]);
    let limit_up_limit_down = body[13];
    let status_note = body[14];
    let cumulative_volume = bcd_to_u64(&body[15..15 + volume_len]);

    let levels = decode_levels(&body[fixed_len..], display_item.level_count())?;

    Ok(Body::Snapshot(Snapshot {
        stock_code,
        match_time,
        display_item,
        limit_up_limit_down,
        status_note,
        cumulative_volume,
        levels,
    }))
}

/// Extracts the deal-present/bid-count/ask-count/reserved fields packed
/// into `display_item`. Bid and ask counts are taken verbatim from their
/// 3-bit fields: a producer may legally set either above the TWSE-documented
/// cap of 5, and this function does not clamp them.
#[bitmatch]
fn decode_display_item(byte: u8) -> DisplayItem {
    #[bitmatch]
    let "dbbb_aaar" = byte;
    let _ = r;
    DisplayItem {
        deal_present: d == 1,
        bid_count: b as u8,
        ask_count: a as u8,
    }
}

/// Parses exactly `expected_count` price/quantity tuples from `body`, which
/// must contain precisely that many 9-byte tuples and nothing else — any
/// other remaining length is a body-length violation.
fn decode_levels(body: &[u8], expected_count: usize) -> Result<Vec<Level>, RejectReason> {
    const LEVEL_LEN: usize = 5 + 4;
    if body.len() != expected_count * LEVEL_LEN {
        return Err(RejectReason::ShortBody { remaining: body.len() });
    }
    let mut levels = Vec::with_capacity(expected_count);
    for chunk in body.chunks_exact(LEVEL_LEN) {
        let price = bcd_to_u64(&chunk[0..5]);
        let quantity = bcd_to_u64(&chunk[5..9]);
        levels.push(Level { price, quantity });
    }
    Ok(levels)
}

fn decode_warrant(body: &[u8]) -> Result<Body, RejectReason> {
    const LEN: usize = 16 + 2 + 16 + 8 + 2 + 2 + 2 + 2;
    if body.len() != LEN {
        return Err(RejectReason::ShortBody { remaining: body.len() });
    }

    let mut brief_name = [0u8; 16];
    brief_name.copy_from_slice(&body[0..16]);
    // bytes[16..18] are a fixed separator, not retained.
    let mut underlying_asset = [0u8; 16];
    underlying_asset.copy_from_slice(&body[18..34]);
    let mut expiration_date = [0u8; 8];
    expiration_date.copy_from_slice(&body[34..42]);
    let mut warrant_type_d = [0u8; 2];
    warrant_type_d.copy_from_slice(&body[42..44]);
    let mut warrant_type_e = [0u8; 2];
    warrant_type_e.copy_from_slice(&body[44..46]);
    let mut warrant_type_f = [0u8; 2];
    warrant_type_f.copy_from_slice(&body[46..48]);
    // bytes[48..50] are reserved, not retained.

    Ok(Body::Warrant(WarrantReference {
        brief_name,
        underlying_asset,
        expiration_date,
        warrant_type_d,
        warrant_type_e,
        warrant_type_f,
    }))
}

/// XOR of the bytes from the first post-ESC byte through the byte before
/// the checksum. The ESC byte itself is excluded from the sum.
fn verify_checksum(frame: &[u8]) -> Result<(), RejectReason> {
    let l = frame.len();
    let computed = frame[1..l - 3].iter().fold(0u8, |acc, b| acc ^ b);
    let stored = frame[l - 3];
    if computed != stored {
        return Err(RejectReason::BadChecksum { computed, stored });
    }
    Ok(())
}

fn verify_trailer(frame: &[u8]) -> Result<(), RejectReason> {
    let l = frame.len();
    let (cr, lf) = (frame[l - 2], frame[l - 1]);
    if cr != CR || lf != LF {
        return Err(RejectReason::BadTrailer(cr, lf));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a well-formed 0x06 snapshot frame with the given display_item
    /// byte and a matching number of (price, quantity) level tuples, with a
    /// correct checksum and trailer.
    fn build_snapshot_frame(display_item: u8, levels: &[(u64, u64)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"2330  "); // stock_code, space-padded
        body.extend_from_slice(&[0x09, 0x30, 0x15, 0x00, 0x00, 0x00]); // match_time
        body.push(display_item);
        body.push(0x00); // limit_up_limit_down
        body.push(0x00); // status_note
        body.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]); // cumulative_volume (4B)
        for (price, qty) in levels {
            body.extend_from_slice(&bcd_encode(*price, 5));
            body.extend_from_slice(&bcd_encode(*qty, 4));
        }

        let mut frame = vec![ESC];
        frame.extend_from_slice(&bcd_encode(0, 2)); // message_length placeholder
        frame.extend_from_slice(&bcd_encode(1, 1)); // business_type
        frame.push(0x06); // format_code
        frame.extend_from_slice(&bcd_encode(4, 1)); // format_version
        frame.extend_from_slice(&bcd_encode(1, 4)); // transmission_number
        frame.extend_from_slice(&body);

        let checksum = frame[1..].iter().fold(0u8, |acc, b| acc ^ b);
        frame.push(checksum);
        frame.push(CR);
        frame.push(LF);
        frame
    }

    fn bcd_encode(mut value: u64, width: usize) -> Vec<u8> {
        let mut digits = vec![0u8; width * 2];
        for i in (0..digits.len()).rev() {
            digits[i] = (value % 10) as u8;
            value /= 10;
        }
        digits
            .chunks_exact(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect()
    }

    #[test]
    fn scenario_a_minimal_snapshot_deal_only() {
        let frame = build_snapshot_frame(0b1_000_000_0, &[(100, 5)]);
        let record = decode(&frame, &Config::default()).unwrap();
        match record.body {
            Body::Snapshot(s) => {
                assert_eq!(s.levels.len(), 1);
                assert_eq!(s.stock_code_str(), "2330");
                assert_eq!(s.levels[0].price, 100);
            }
            Body::Warrant(_) => panic!("expected snapshot body"),
        }
    }

    #[test]
    fn scenario_b_permissive_overcount_is_accepted() {
        // display_item = 0xFE: deal=1, bids=7, asks=7 -- not TWSE-legal, but
        // the decoder trusts the bit fields as long as the body length
        // agrees with 1 + 7 + 7 = 15 levels.
        let display_item = 0xFE;
        let levels: Vec<(u64, u64)> = (0..15).map(|i| (100 + i as u64, 1)).collect();
        let frame = build_snapshot_frame(display_item, &levels);
        let record = decode(&frame, &Config::default()).unwrap();
        match record.body {
            Body::Snapshot(s) => assert_eq!(s.levels.len(), 15),
            Body::Warrant(_) => panic!("expected snapshot body"),
        }
    }

    #[test]
    fn scenario_c_truncated_trailer_is_rejected() {
        let mut frame = build_snapshot_frame(0b1_000_000_0, &[(100, 5)]);
        frame.pop();
        // Now too short or missing the LF; either BadTrailer or ShortHeader
        // depending on how short it got, but it must not be accepted.
        assert!(decode(&frame, &Config::default()).is_err());
    }

    #[test]
    fn scenario_c_dropped_final_trailer_byte_is_bad_trailer() {
        let mut frame = build_snapshot_frame(0b1_000_000_0, &[(100, 5)]);
        let last = frame.len() - 1;
        frame[last] = 0xff; // corrupt LF without changing frame length
        assert_eq!(
            decode(&frame, &Config::default()),
            Err(RejectReason::BadTrailer(CR, 0xff))
        );
    }

    #[test]
    fn scenario_d_flipped_checksum_bit_is_rejected() {
        let mut frame = build_snapshot_frame(0b1_000_000_0, &[(100, 5)]);
        let checksum_idx = frame.len() - 3;
        frame[checksum_idx] ^= 0x01;
        assert!(matches!(
            decode(&frame, &Config::default()),
            Err(RejectReason::BadChecksum { .. })
        ));
    }

    #[test]
    fn scenario_f_unsupported_format_code_under_default_allow_list() {
        let mut frame = build_snapshot_frame(0b1_000_000_0, &[(100, 5)]);
        frame[4] = 0x17;
        let checksum_idx = frame.len() - 3;
        frame[checksum_idx] = frame[1..checksum_idx].iter().fold(0u8, |acc, b| acc ^ b);
        assert_eq!(
            decode(&frame, &Config::default()),
            Err(RejectReason::UnsupportedFormat(0x17))
        );
    }

    #[test]
    fn bad_prefix_is_rejected() {
        let mut frame = build_snapshot_frame(0b1_000_000_0, &[(100, 5)]);
        frame[0] = 0x00;
        assert_eq!(decode(&frame, &Config::default()), Err(RejectReason::BadPrefix(0x00)));
    }

    #[test]
    fn header_length_frame_with_no_body_is_rejected_not_panicked() {
        // 10-byte header + format code accepted by the default allow-list,
        // but nothing past it: no checksum byte, no CRLF trailer.
        let mut config = Config::default();
        config.format_allow_list = vec![0x06];
        for len in 10..13 {
            let mut frame = vec![0u8; len];
            frame[0] = ESC;
            frame[4] = 0x06;
            assert!(decode(&frame, &config).is_err());
        }
    }

    #[test]
    fn mutating_any_single_non_checksum_byte_is_rejected() {
        let frame = build_snapshot_frame(0b1_000_000_0, &[(100, 5)]);
        let checksum_idx = frame.len() - 3;
        for i in 0..frame.len() {
            if i == checksum_idx {
                continue;
            }
            let mut mutated = frame.clone();
            mutated[i] ^= 0xff;
            assert!(
                decode(&mutated, &Config::default()).is_err(),
                "byte {} mutation was unexpectedly accepted",
                i
            );
        }
    }

    #[test]
    fn prices_and_quantities_lengths_always_match() {
        let frame = build_snapshot_frame(0b1_001_000_0, &[(1, 2), (3, 4)]);
        let record = decode(&frame, &Config::default()).unwrap();
        match record.body {
            Body::Snapshot(s) => assert_eq!(s.levels.len(), 2),
            Body::Warrant(_) => panic!("expected snapshot body"),
        }
    }

    #[test]
    fn display_item_bit_layout() {
        let d = decode_display_item(0b1_011_010_1);
        assert!(d.deal_present);
        assert_eq!(d.bid_count, 0b011);
        assert_eq!(d.ask_count, 0b010);
    }

    #[test]
    fn strict_mode_rejects_length_mismatch() {
        let frame = build_snapshot_frame(0b1_000_000_0, &[(100, 5)]);
        let mut cfg = Config::default();
        cfg.strict = true;
        // message_length was left as the placeholder 0 in build_snapshot_frame.
        assert!(matches!(
            decode(&frame, &cfg),
            Err(RejectReason::LengthMismatch { .. })
        ));
    }
}
