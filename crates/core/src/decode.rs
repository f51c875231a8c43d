//! Decoding helpers for wide strings, multi-strings, GUIDs and trigger payloads

use crate::models::TriggerDataType;
use uuid::Uuid;

/// Convert a null-terminated wide char slice to String
pub fn wide_to_string(wchars: &[u16]) -> String {
    let len = wchars.iter().position(|&c| c == 0).unwrap_or(wchars.len());
    String::from_utf16_lossy(&wchars[..len])
}

/// Split a double-null-terminated wide multi-string into its entries
pub fn split_multi_sz(wchars: &[u16]) -> Vec<String> {
    wchars
        .split(|&c| c == 0)
        .take_while(|entry| !entry.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

/// Encode a Rust string as a null-terminated wide string
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// `None` for empty strings
pub fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Render GUID fields as `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}` in lower case
pub fn format_guid(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> String {
    let uuid = Uuid::from_fields(data1, data2, data3, &data4);
    format!("{{{}}}", uuid.hyphenated())
}

/// The nil GUID in the same rendering
pub fn nil_guid() -> String {
    format!("{{{}}}", Uuid::nil().hyphenated())
}

/// Decode a trigger data item payload according to its data type.
///
/// Strings are UTF-16 multi-strings joined with `;`, binary data is lower-case
/// hex, levels are the decimal byte value and keywords are 64-bit hex masks.
/// An empty payload decodes to `None`.
pub fn decode_trigger_data(data_type: TriggerDataType, bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    match data_type {
        TriggerDataType::String => {
            let wchars: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            non_empty(split_multi_sz(&wchars).join(";"))
        }
        TriggerDataType::Level => Some(bytes[0].to_string()),
        TriggerDataType::KeywordAny | TriggerDataType::KeywordAll => {
            let mut word = [0u8; 8];
            let n = bytes.len().min(8);
            word[..n].copy_from_slice(&bytes[..n]);
            Some(format!("0x{:016x}", u64::from_le_bytes(word)))
        }
        TriggerDataType::Binary | TriggerDataType::Other(_) => Some(hex(bytes)),
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16_bytes(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
    }

    #[test]
    fn test_wide_to_string_stops_at_nul() {
        let wide = to_wide("Spooler");
        assert_eq!(wide.last(), Some(&0));
        assert_eq!(wide_to_string(&wide), "Spooler");
        assert_eq!(wide_to_string(&[0x41, 0x42]), "AB");
    }

    #[test]
    fn test_split_multi_sz() {
        let raw: Vec<u16> = "RpcSs\0+TDI\0\0".encode_utf16().collect();
        assert_eq!(split_multi_sz(&raw), vec!["RpcSs", "+TDI"]);
        assert!(split_multi_sz(&[0, 0]).is_empty());
        assert!(split_multi_sz(&[]).is_empty());
    }

    #[test]
    fn test_format_guid_lower_case_braced() {
        let guid = format_guid(
            0x1CE20ABA,
            0x9851,
            0x4421,
            [0x94, 0x30, 0x1D, 0xDE, 0xB7, 0x66, 0xE8, 0x09],
        );
        assert_eq!(guid, "{1ce20aba-9851-4421-9430-1ddeb766e809}");
        assert_eq!(nil_guid(), "{00000000-0000-0000-0000-000000000000}");
    }

    #[test]
    fn test_decode_string_payload() {
        let bytes = utf16_bytes("USB\\VID_0000\0USB\\CLASS_03\0\0");
        assert_eq!(
            decode_trigger_data(TriggerDataType::String, &bytes).as_deref(),
            Some("USB\\VID_0000;USB\\CLASS_03")
        );
    }

    #[test]
    fn test_decode_other_payloads() {
        assert_eq!(
            decode_trigger_data(TriggerDataType::Binary, &[0xde, 0xad, 0x01]).as_deref(),
            Some("dead01")
        );
        assert_eq!(
            decode_trigger_data(TriggerDataType::Level, &[4]).as_deref(),
            Some("4")
        );
        assert_eq!(
            decode_trigger_data(TriggerDataType::KeywordAny, &0x8000u64.to_le_bytes()).as_deref(),
            Some("0x0000000000008000")
        );
        assert_eq!(decode_trigger_data(TriggerDataType::Binary, &[]), None);
    }
}
