use std::{
    borrow::Cow,
    io::{self, Write},
};

use assert_into::AssertInto;

/// Length of the `:CCAAAATT` record header
pub const HEADER_LEN: usize = 9;

/// Longest legal record line, a full 255 byte data record without its line terminator
pub const MAX_RECORD_LEN: usize = HEADER_LEN + 2 * 255 + 2;

// See https://en.wikipedia.org/wiki/Intel_HEX#Record_types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Payload bytes placed at the record address within the current bank
    Data = 0x00,

    /// Marks the end of the file, anything after it is ignored
    EndOfFile = 0x01,

    /// 16 bit segment, the bank becomes the segment shifted left by 4
    ExtendedSegmentAddress = 0x02,

    /// CS:IP start address, parsed and discarded
    StartSegmentAddress = 0x03,

    /// Upper 16 bits of the 32 bit address
    ExtendedLinearAddress = 0x04,
}

/// A record type byte that has no [`RecordType`], start linear address (0x05) included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedRecordType(pub u8);

impl TryFrom<u8> for RecordType {
    type Error = UnsupportedRecordType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Data),
            0x01 => Ok(Self::EndOfFile),
            0x02 => Ok(Self::ExtendedSegmentAddress),
            0x03 => Ok(Self::StartSegmentAddress),
            0x04 => Ok(Self::ExtendedLinearAddress),
            other => Err(UnsupportedRecordType(other)),
        }
    }
}

/// The fixed fields in front of every record's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub byte_count: u8,
    pub address: u16,
    pub record_type: u8,
}

/// One line of an Intel HEX file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    pub record_type: RecordType,
    pub address: u16,
    pub data: Cow<'a, [u8]>,
}

impl<'a> Record<'a> {
    pub fn data(address: u16, data: &'a [u8]) -> Self {
        Self {
            record_type: RecordType::Data,
            address,
            data: Cow::Borrowed(data),
        }
    }

    pub fn end_of_file() -> Self {
        Self {
            record_type: RecordType::EndOfFile,
            address: 0,
            data: Cow::Borrowed(&[]),
        }
    }

    pub fn extended_segment_address(segment: u16) -> Self {
        Self {
            record_type: RecordType::ExtendedSegmentAddress,
            address: 0,
            data: Cow::Owned(segment.to_be_bytes().to_vec()),
        }
    }

    pub fn extended_linear_address(upper: u16) -> Self {
        Self {
            record_type: RecordType::ExtendedLinearAddress,
            address: 0,
            data: Cow::Owned(upper.to_be_bytes().to_vec()),
        }
    }

    pub fn byte_count(&self) -> u8 {
        self.data.len().assert_into()
    }

    pub fn checksum(&self) -> u8 {
        checksum(
            &RecordHeader {
                byte_count: self.byte_count(),
                address: self.address,
                record_type: self.record_type as u8,
            },
            &self.data,
        )
    }

    /// Number of characters `write_to` produces, line terminator included
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + 2 * self.data.len() + 2 + 1
    }

    /// Serializes the record as one line of upper case hex.
    pub fn write_to(&self, mut output: impl Write) -> io::Result<()> {
        write!(
            output,
            ":{:02X}{:04X}{:02X}",
            self.byte_count(),
            self.address,
            self.record_type as u8
        )?;
        for byte in self.data.iter() {
            write!(output, "{:02X}", byte)?;
        }
        writeln!(output, "{:02X}", self.checksum())
    }
}

/// Two's complement of the sum of every field in front of the checksum
pub fn checksum(header: &RecordHeader, data: &[u8]) -> u8 {
    let [address_high, address_low] = header.address.to_be_bytes();
    let sum = data.iter().fold(
        header
            .byte_count
            .wrapping_add(address_high)
            .wrapping_add(address_low)
            .wrapping_add(header.record_type),
        |sum, &byte| sum.wrapping_add(byte),
    );
    sum.wrapping_neg()
}

/// Parses `:CCAAAATT` at the start of `line`.
pub fn parse_header(line: &[u8]) -> Option<RecordHeader> {
    if line.len() < HEADER_LEN || line[0] != b':' {
        return None;
    }

    let byte_count = hex_byte(&line[1..3])?;
    let address = u16::from_be_bytes([hex_byte(&line[3..5])?, hex_byte(&line[5..7])?]);
    let record_type = hex_byte(&line[7..9])?;

    Some(RecordHeader {
        byte_count,
        address,
        record_type,
    })
}

/// Parses the `byte_count` payload bytes following the header into `data`, and returns the
/// trailing checksum byte. Anything after the checksum is ignored.
pub fn parse_body(line: &[u8], header: &RecordHeader, data: &mut Vec<u8>) -> Option<u8> {
    let payload_end = HEADER_LEN + 2 * header.byte_count as usize;
    if line.len() < payload_end + 2 {
        return None;
    }

    data.clear();
    for digits in line[HEADER_LEN..payload_end].chunks_exact(2) {
        data.push(hex_byte(digits)?);
    }

    hex_byte(&line[payload_end..payload_end + 2])
}

fn hex_byte(digits: &[u8]) -> Option<u8> {
    match digits {
        [high, low] => Some(hex_nibble(*high)? << 4 | hex_nibble(*low)?),
        _ => None,
    }
}

fn hex_nibble(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(10 + digit - b'a'),
        b'A'..=b'F' => Some(10 + digit - b'A'),
        _ => None,
    }
}
