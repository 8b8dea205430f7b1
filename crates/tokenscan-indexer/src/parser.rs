use std::str::FromStr;

use alloy::primitives::{b256, Address, B256, U256};
use alloy::rpc::types::Log;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokenscan_common::Transfer;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_EVENT_SIGNATURE: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("not a Transfer event")]
    NotTransferEvent,

    #[error("invalid number of topics: expected 3, got {0}")]
    InvalidTopicCount(usize),

    #[error("invalid data length: expected 32, got {0}")]
    InvalidDataLength(usize),

    #[error("log is missing {0}")]
    MissingField(&'static str),

    #[error("response too short: {0} bytes")]
    ResponseTooShort(usize),
}

/// Decode a raw log into a canonical `Transfer`.
///
/// Topics 1 and 2 are 32-byte left-padded addresses; the data word is a
/// big-endian 256-bit unsigned integer. All addresses in the result are
/// lowercase hex with a `0x` prefix.
pub fn parse_transfer_log(
    log: &Log,
    block_timestamp: DateTime<Utc>,
) -> Result<Transfer, ParseError> {
    let topics = log.topics();
    if topics.len() != 3 {
        return Err(ParseError::InvalidTopicCount(topics.len()));
    }
    if topics[0] != TRANSFER_EVENT_SIGNATURE {
        return Err(ParseError::NotTransferEvent);
    }

    let data = &log.data().data;
    if data.len() != 32 {
        return Err(ParseError::InvalidDataLength(data.len()));
    }

    let tx_hash = log
        .transaction_hash
        .ok_or(ParseError::MissingField("transaction hash"))?;
    let log_index = log.log_index.ok_or(ParseError::MissingField("log index"))?;
    let block_number = log
        .block_number
        .ok_or(ParseError::MissingField("block number"))?;

    let from = Address::from_slice(&topics[1][12..]);
    let to = Address::from_slice(&topics[2][12..]);
    let value = U256::from_be_slice(data);

    Ok(Transfer {
        tx_hash: format!("{tx_hash:?}"),
        log_index: log_index as i32,
        block_number: block_number as i64,
        block_timestamp,
        token_address: hex_address(log.address()),
        from_address: hex_address(from),
        to_address: hex_address(to),
        // A U256 decimal string always parses.
        value: BigDecimal::from_str(&value.to_string()).unwrap_or_default(),
    })
}

fn hex_address(address: Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Decode a `name()`/`symbol()` return value. Tokens answer in one of two
/// shapes:
///
/// 1. ABI-encoded string: offset word (32), length word, then data padded
///    to 32 bytes.
/// 2. A raw 32-byte left-aligned ASCII literal (older tokens such as MKR).
///
/// The ABI form is tried first, triggered by the first word equaling 32.
/// Otherwise the first 32 bytes are trimmed of trailing NULs and accepted
/// iff every byte is printable ASCII; non-printable content is returned as
/// its hex representation.
pub fn decode_string_or_bytes32(data: &[u8]) -> Result<String, ParseError> {
    if data.len() < 32 {
        return Err(ParseError::ResponseTooShort(data.len()));
    }

    if data.len() >= 64 {
        let offset = U256::from_be_slice(&data[..32]);
        if offset == U256::from(32) {
            let length = U256::from_be_slice(&data[32..64]).to::<u64>() as usize;
            if length == 0 {
                return Ok(String::new());
            }
            if data.len() >= 64 + length {
                let raw = &data[64..64 + length];
                let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
                if let Ok(s) = String::from_utf8(raw[..end].to_vec()) {
                    return Ok(s);
                }
            }
        }
    }

    let word = &data[..32];
    let end = word.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    let trimmed = &word[..end];

    if !trimmed.is_empty() && trimmed.iter().all(|b| (0x20..=0x7e).contains(b)) {
        // Trimmed printable ASCII is valid UTF-8 by construction.
        return Ok(String::from_utf8_lossy(trimmed).into_owned());
    }

    Ok(format!("0x{}", hex::encode(word)))
}

/// Decode a `decimals()` return value: a 32-byte big-endian integer of
/// which only the low byte is taken.
pub fn decode_decimals(data: &[u8]) -> Result<u8, ParseError> {
    if data.len() < 32 {
        return Err(ParseError::ResponseTooShort(data.len()));
    }
    Ok(data[31])
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, Bytes, LogData};

    use super::*;

    const TOKEN: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
    const FROM: Address = address!("1234567890123456789012345678901234567890");
    const TO: Address = address!("abcdefabcdefabcdefabcdefabcdefabcdefabcd");

    fn address_topic(addr: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(addr.as_slice());
        B256::from(word)
    }

    fn value_word(value: U256) -> Bytes {
        Bytes::from(value.to_be_bytes::<32>().to_vec())
    }

    fn transfer_log(topics: Vec<B256>, data: Bytes) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: TOKEN,
                data: LogData::new_unchecked(topics, data),
            },
            block_hash: None,
            block_number: Some(12_345_678),
            block_timestamp: None,
            transaction_hash: Some(b256!(
                "1111111111111111111111111111111111111111111111111111111111111111"
            )),
            transaction_index: Some(0),
            log_index: Some(5),
            removed: false,
        }
    }

    fn valid_log(value: U256) -> Log {
        transfer_log(
            vec![TRANSFER_EVENT_SIGNATURE, address_topic(FROM), address_topic(TO)],
            value_word(value),
        )
    }

    #[test]
    fn parses_valid_transfer() {
        let ts = Utc::now();
        let transfer = parse_transfer_log(&valid_log(U256::from(1_000_000u64)), ts).unwrap();

        assert_eq!(
            transfer.tx_hash,
            "0x1111111111111111111111111111111111111111111111111111111111111111"
        );
        assert_eq!(transfer.log_index, 5);
        assert_eq!(transfer.block_number, 12_345_678);
        assert_eq!(transfer.block_timestamp, ts);
        assert_eq!(transfer.token_address, "0xdac17f958d2ee523a2206206994597c13d831ec7");
        assert_eq!(transfer.from_address, "0x1234567890123456789012345678901234567890");
        assert_eq!(transfer.to_address, "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
        assert_eq!(transfer.value.to_string(), "1000000");
    }

    #[test]
    fn parses_max_uint256_value() {
        let transfer = parse_transfer_log(&valid_log(U256::MAX), Utc::now()).unwrap();
        assert_eq!(
            transfer.value.to_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }

    #[test]
    fn parses_zero_value() {
        let transfer = parse_transfer_log(&valid_log(U256::ZERO), Utc::now()).unwrap();
        assert_eq!(transfer.value.to_string(), "0");
    }

    #[test]
    fn rejects_wrong_topic_count() {
        let log = transfer_log(
            vec![TRANSFER_EVENT_SIGNATURE, address_topic(FROM)],
            value_word(U256::from(1u64)),
        );
        assert!(matches!(
            parse_transfer_log(&log, Utc::now()),
            Err(ParseError::InvalidTopicCount(2))
        ));
    }

    #[test]
    fn rejects_foreign_event() {
        let other = b256!("8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925");
        let log = transfer_log(
            vec![other, address_topic(FROM), address_topic(TO)],
            value_word(U256::from(1u64)),
        );
        assert!(matches!(
            parse_transfer_log(&log, Utc::now()),
            Err(ParseError::NotTransferEvent)
        ));
    }

    #[test]
    fn rejects_short_data() {
        let log = transfer_log(
            vec![TRANSFER_EVENT_SIGNATURE, address_topic(FROM), address_topic(TO)],
            Bytes::from(vec![0u8; 16]),
        );
        assert!(matches!(
            parse_transfer_log(&log, Utc::now()),
            Err(ParseError::InvalidDataLength(16))
        ));
    }

    fn abi_string(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&U256::from(32u64).to_be_bytes::<32>());
        out.extend_from_slice(&U256::from(s.len() as u64).to_be_bytes::<32>());
        let mut payload = s.as_bytes().to_vec();
        while payload.len() % 32 != 0 {
            payload.push(0);
        }
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn decodes_abi_encoded_string() {
        assert_eq!(decode_string_or_bytes32(&abi_string("Tether USD")).unwrap(), "Tether USD");
    }

    #[test]
    fn decodes_empty_abi_string() {
        assert_eq!(decode_string_or_bytes32(&abi_string("")).unwrap(), "");
    }

    #[test]
    fn decodes_bytes32_literal() {
        // MKR answers symbol() with a raw left-aligned literal.
        let mut word = vec![0u8; 32];
        word[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_string_or_bytes32(&word).unwrap(), "MKR");
    }

    #[test]
    fn non_printable_bytes32_falls_back_to_hex() {
        let mut word = vec![0u8; 32];
        word[0] = 0x01;
        word[1] = 0x02;
        let decoded = decode_string_or_bytes32(&word).unwrap();
        assert!(decoded.starts_with("0x0102"));
        assert_eq!(decoded.len(), 2 + 64);
    }

    #[test]
    fn short_response_is_an_error() {
        assert!(matches!(
            decode_string_or_bytes32(&[0u8; 8]),
            Err(ParseError::ResponseTooShort(8))
        ));
    }

    #[test]
    fn decodes_decimals_low_byte() {
        let mut word = [0u8; 32];
        word[31] = 6;
        assert_eq!(decode_decimals(&word).unwrap(), 6);
        assert!(decode_decimals(&[0u8; 4]).is_err());
    }
}
