//! The decoded representation of one TWSE frame.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One price/quantity level, either the last-matched deal or one book level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Level {
    pub price: u64,
    pub quantity: u64,
}

/// The `display_item` bitmap: which tuples follow in [`Record::levels`] and
/// in what order (deal, then bids best-to-worst, then asks best-to-worst).
///
/// Bid and ask counts are taken directly from their 3-bit fields and are
/// *not* clamped to the TWSE-documented maximum of 5: a malformed or
/// non-conformant producer can set either field to 6 or 7, and the decoder
/// trusts it as long as the remaining body length agrees. Rejecting values
/// above 5 is left to the consumer, not the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayItem {
    pub deal_present: bool,
    pub bid_count: u8,
    pub ask_count: u8,
}

impl DisplayItem {
    pub fn level_count(&self) -> usize {
        self.deal_present as usize + self.bid_count as usize + self.ask_count as usize
    }
}

/// The market-snapshot body shared by format codes 0x06, 0x17 and 0x23.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    pub stock_code: [u8; 6],
    pub match_time: u64,
    pub display_item: DisplayItem,
    pub limit_up_limit_down: u8,
    pub status_note: u8,
    pub cumulative_volume: u64,
    /// Deal tuple (if any) followed by bid levels, then ask levels, in
    /// best-to-worst order within each group.
    pub levels: Vec<Level>,
}

impl Snapshot {
    /// `stock_code` as a string with trailing ASCII spaces trimmed.
    pub fn stock_code_str(&self) -> &str {
        let raw = std::str::from_utf8(&self.stock_code).unwrap_or("");
        raw.trim_end_matches(' ')
    }
}

/// One warrant type field (D, E, or F), each a 2-byte ASCII code.
pub type WarrantType = [u8; 2];

/// The fixed ASCII body for format code 0x14.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WarrantReference {
    pub brief_name: [u8; 16],
    pub underlying_asset: [u8; 16],
    pub expiration_date: [u8; 8],
    pub warrant_type_d: WarrantType,
    pub warrant_type_e: WarrantType,
    pub warrant_type_f: WarrantType,
}

/// A body decoded from the frame, shaped by `format_code`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Body {
    Snapshot(Snapshot),
    Warrant(WarrantReference),
}

/// One fully decoded, checksum- and trailer-verified TWSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record {
    pub message_length: u16,
    pub business_type: u8,
    pub format_code: u8,
    pub format_version: u8,
    pub transmission_number: u32,
    pub body: Body,
}

impl Record {
    /// The stock code of the underlying [`Snapshot`] body, if this record
    /// carries one. Warrant-reference records have no stock code.
    pub fn stock_code(&self) -> Option<&[u8; 6]> {
        match &self.body {
            Body::Snapshot(s) => Some(&s.stock_code),
            Body::Warrant(_) => None,
        }
    }
}
