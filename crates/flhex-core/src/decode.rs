use std::io::{self, BufRead, Read};

use log::{debug, trace, warn};
use thiserror::Error;

use crate::{
    image::ByteImage,
    record::{self, RecordType, UnsupportedRecordType, MAX_RECORD_LEN},
};

// Longest record plus a `\r\n` terminator
const LINE_LIMIT: u64 = MAX_RECORD_LEN as u64 + 2;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed header on line {0}")]
    MalformedHeader(u32),
    #[error("unsupported record type {record_type:02X} on line {line}")]
    UnsupportedRecordType { record_type: u8, line: u32 },
    #[error("checksum failed on line {line} (0x{expected:02X} != 0x{actual:02X})")]
    ChecksumMismatch { line: u32, expected: u8, actual: u8 },
    #[error("line {0} exceeds the maximum record length")]
    LineTooLong(u32),
    #[error("failed to read input ({0})")]
    FailedToRead(io::Error),
}

/// Loads every record of an Intel HEX stream into `image`.
///
/// Decoding stops at the first end of file record, or successfully at the end of the input if
/// there is none. Every record is checksummed before it touches the image, but records decoded
/// before a failing one stay in place.
pub fn decode(mut input: impl BufRead, image: &mut ByteImage) -> Result<(), DecodeError> {
    let mut line_buf = Vec::with_capacity(LINE_LIMIT as usize);
    let mut data = Vec::with_capacity(u8::MAX as usize);
    let mut base_address: u32 = 0;
    let mut line: u32 = 0;

    loop {
        line_buf.clear();
        let read = (&mut input)
            .take(LINE_LIMIT)
            .read_until(b'\n', &mut line_buf)
            .map_err(DecodeError::FailedToRead)?;

        if read == 0 {
            warn!(
                "Input ended after {} records without an end of file record",
                line
            );
            return Ok(());
        }

        line += 1;

        let text = strip_line_terminator(&line_buf);
        if text.len() > MAX_RECORD_LEN {
            return Err(DecodeError::LineTooLong(line));
        }

        let header = record::parse_header(text).ok_or(DecodeError::MalformedHeader(line))?;

        image.observe_record_width(header.byte_count);

        let record_type = RecordType::try_from(header.record_type).map_err(
            |UnsupportedRecordType(record_type)| DecodeError::UnsupportedRecordType {
                record_type,
                line,
            },
        )?;

        let actual = record::parse_body(text, &header, &mut data)
            .ok_or(DecodeError::MalformedHeader(line))?;
        let expected = record::checksum(&header, &data);
        if actual != expected {
            return Err(DecodeError::ChecksumMismatch {
                line,
                expected,
                actual,
            });
        }

        match record_type {
            RecordType::Data => {
                let address = base_address.wrapping_add(u32::from(header.address));
                trace!(
                    "Line {}: {} bytes at {:#010x}",
                    line,
                    data.len(),
                    address
                );
                image.write_slice(address, &data);
            }
            RecordType::EndOfFile => {
                debug!("End of file record on line {}", line);
                return Ok(());
            }
            RecordType::ExtendedSegmentAddress => {
                let segment = extension_value(&data).ok_or(DecodeError::MalformedHeader(line))?;
                base_address = u32::from(segment) << 4;
                debug!("Line {}: segment base {:#010x}", line, base_address);
            }
            RecordType::StartSegmentAddress => {
                trace!("Line {}: ignoring start segment address", line);
            }
            RecordType::ExtendedLinearAddress => {
                let upper = extension_value(&data).ok_or(DecodeError::MalformedHeader(line))?;
                base_address = (base_address & 0x0000_ffff) | u32::from(upper) << 16;
                debug!("Line {}: linear base {:#010x}", line, base_address);
            }
        }
    }
}

fn strip_line_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn extension_value(data: &[u8]) -> Option<u16> {
    match data {
        [high, low, ..] => Some(u16::from_be_bytes([*high, *low])),
        _ => None,
    }
}
