use std::{
    cmp::min,
    io::{self, Write},
};

use assert_into::AssertInto;
use log::debug;
use thiserror::Error;

use crate::{image::ByteImage, record::Record};

/// Span addressed by the 16 bit address field of a single record
pub const BANK_SIZE: usize = 0x10000;

/// Addresses below this are banked with extended segment records, everything above with
/// extended linear records
pub const SEGMENT_LIMIT: usize = 0x100000;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("failed to write output ({0})")]
    FailedToWrite(io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Bank,
    Data,
    EndOfFile,
    Done,
}

/// Iterator over the records that make up the flattened image.
///
/// Every bank starts with an extended address record, followed by data records of at most
/// `width` bytes. A data record never crosses a bank boundary. The sequence always ends with a
/// single end of file record.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    image: &'a ByteImage,
    width: usize,
    addr: usize,
    state: State,
}

impl<'a> Iterator for Records<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let image = self.image;

        loop {
            match self.state {
                State::Bank => {
                    if self.addr >= image.size() {
                        self.state = State::EndOfFile;
                        continue;
                    }

                    self.state = State::Data;
                    if self.addr % BANK_SIZE == 0 {
                        return Some(if self.addr < SEGMENT_LIMIT {
                            Record::extended_segment_address((self.addr >> 4).assert_into())
                        } else {
                            Record::extended_linear_address((self.addr >> 16).assert_into())
                        });
                    }
                }
                State::Data => {
                    let offset = self.addr % BANK_SIZE;
                    let count = min(
                        min(self.width, image.size() - self.addr),
                        BANK_SIZE - offset,
                    );
                    let data = &image.as_bytes()[self.addr..self.addr + count];

                    self.addr += count;
                    self.state = State::Bank;
                    return Some(Record::data(offset.assert_into(), data));
                }
                State::EndOfFile => {
                    self.state = State::Done;
                    return Some(Record::end_of_file());
                }
                State::Done => return None,
            }
        }
    }
}

/// Plans the records for `image`. A `width` of 0 uses the width observed while decoding.
pub fn records(image: &ByteImage, width: u8) -> Records<'_> {
    let width = match width {
        0 => image.record_width(),
        width => width,
    };

    Records {
        image,
        width: width as usize,
        addr: 0,
        state: State::Bank,
    }
}

/// Exact number of bytes `encode` writes for the same arguments
pub fn encoded_len(image: &ByteImage, width: u8) -> u64 {
    records(image, width)
        .map(|record| record.encoded_len() as u64)
        .sum()
}

/// Writes `image` as a gapless Intel HEX file.
pub fn encode(image: &ByteImage, width: u8, mut output: impl Write) -> Result<(), EncodeError> {
    let mut count = 0usize;
    for record in records(image, width) {
        record
            .write_to(&mut output)
            .map_err(EncodeError::FailedToWrite)?;
        count += 1;
    }
    output.flush().map_err(EncodeError::FailedToWrite)?;

    debug!(
        "Wrote {} records covering {:#x} bytes",
        count,
        image.size()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode::decode, record::RecordType};

    fn encode_to_string(image: &ByteImage, width: u8) -> String {
        let mut out = Vec::new();
        encode(image, width, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn filled(fill: u8, size: u32) -> ByteImage {
        let mut image = ByteImage::new(fill);
        for addr in 0..size {
            image.write_byte(addr, (addr % 251) as u8);
        }
        image
    }

    #[test]
    pub fn empty_image_is_only_end_of_file() {
        let image = ByteImage::new(0xff);
        assert_eq!(encode_to_string(&image, 0), ":00000001FF\n");
    }

    #[test]
    pub fn single_record_round_trip() {
        let input = ":10000000000102030405060708090A0B0C0D0E0F78\n:00000001FF\n";
        let mut image = ByteImage::new(0xff);
        decode(input.as_bytes(), &mut image).unwrap();

        assert_eq!(
            encode_to_string(&image, 16),
            format!(":020000020000FC\n{}", input)
        );
        assert_eq!(encode_to_string(&image, 0), encode_to_string(&image, 16));
    }

    #[test]
    pub fn width_override_chunks_data() {
        let image = filled(0xff, 10);

        assert_eq!(
            encode_to_string(&image, 4),
            ":020000020000FC\n\
             :0400000000010203F6\n\
             :0400040004050607E2\n\
             :020008000809E5\n\
             :00000001FF\n"
        );
    }

    #[test]
    pub fn gaps_are_padded() {
        let mut image = ByteImage::new(0xaa);
        image.write_byte(0, 0x01);
        image.write_byte(3, 0x02);

        assert_eq!(
            encode_to_string(&image, 16),
            ":020000020000FC\n:0400000001AAAA02A5\n:00000001FF\n"
        );
    }

    #[test]
    pub fn segment_record_at_each_bank_below_one_megabyte() {
        let mut image = ByteImage::new(0xff);
        image.write_byte(0x10000, 0x42);

        let records: Vec<_> = records(&image, 16).collect();
        assert_eq!(records.len(), 4096 + 4);
        assert_eq!(records[0], Record::extended_segment_address(0x0000));
        assert_eq!(records[4097], Record::extended_segment_address(0x1000));
        assert_eq!(records[4098], Record::data(0x0000, &[0x42]));
        assert_eq!(records[4099], Record::end_of_file());
    }

    #[test]
    pub fn linear_record_from_one_megabyte() {
        let mut image = ByteImage::new(0xff);
        image.write_byte(0x10ffff, 0x42);

        let banks: Vec<_> = records(&image, 255)
            .filter(|record| record.record_type != RecordType::Data)
            .collect();

        let mut expected: Vec<_> = (0..16)
            .map(|bank| Record::extended_segment_address(bank << 12))
            .collect();
        expected.push(Record::extended_linear_address(0x0010));
        expected.push(Record::end_of_file());
        assert_eq!(banks, expected);

        let mut out = Vec::new();
        banks[16].write_to(&mut out).unwrap();
        assert_eq!(out, b":020000040010EA\n");
    }

    #[test]
    pub fn records_never_cross_a_bank() {
        let image = filled(0xff, 0x30000);

        for width in [3u8, 7, 100, 255].iter() {
            let mut addr = 0usize;
            for record in records(&image, *width) {
                match record.record_type {
                    RecordType::Data => {
                        assert_eq!(addr % BANK_SIZE, record.address as usize);
                        assert!(record.address as usize + record.data.len() <= BANK_SIZE);
                        addr += record.data.len();
                    }
                    RecordType::ExtendedSegmentAddress => assert_eq!(addr % BANK_SIZE, 0),
                    _ => {}
                }
            }
            assert_eq!(addr, image.size());
        }
    }

    #[test]
    pub fn every_record_checksums_to_zero() {
        let image = filled(0x00, 0x20100);

        for record in records(&image, 0) {
            let [high, low] = record.address.to_be_bytes();
            let sum = record
                .data
                .iter()
                .fold(
                    record
                        .byte_count()
                        .wrapping_add(high)
                        .wrapping_add(low)
                        .wrapping_add(record.record_type as u8),
                    |sum, &b| sum.wrapping_add(b),
                )
                .wrapping_add(record.checksum());
            assert_eq!(sum, 0);
        }
    }

    #[test]
    pub fn round_trip_for_any_width() {
        let mut image = filled(0xff, 0x100);
        image.write_slice(0x1fff0, &[0x11; 0x40]);

        for width in [1u8, 2, 3, 16, 17, 128, 255].iter() {
            let mut out = Vec::new();
            encode(&image, *width, &mut out).unwrap();

            let mut decoded = ByteImage::new(0xff);
            decode(out.as_slice(), &mut decoded).unwrap();

            assert_eq!(decoded.size(), image.size(), "width {}", width);
            assert_eq!(decoded.as_bytes(), image.as_bytes(), "width {}", width);
        }
    }

    #[test]
    pub fn round_trip_past_one_megabyte() {
        let mut image = ByteImage::new(0xff);
        image.write_slice(0xffff0, &[0x22; 0x20]);
        image.write_slice(0x234567, &[0x33; 0x10]);

        for width in [16u8, 255].iter() {
            let mut out = Vec::new();
            encode(&image, *width, &mut out).unwrap();

            let mut decoded = ByteImage::new(0xff);
            decode(out.as_slice(), &mut decoded).unwrap();

            assert_eq!(decoded.size(), image.size());
            assert!(decoded.as_bytes() == image.as_bytes());
        }
    }

    #[test]
    pub fn encoding_is_deterministic() {
        let mut image = filled(0xff, 0x1234);
        image.write_byte(0x18000, 0x01);

        assert_eq!(encode_to_string(&image, 32), encode_to_string(&image, 32));
    }

    #[test]
    pub fn encoded_len_matches_output() {
        let mut image = filled(0xff, 0x1234);
        image.write_byte(0x18000, 0x01);

        for width in [0u8, 1, 16, 255].iter() {
            assert_eq!(
                encoded_len(&image, *width),
                encode_to_string(&image, *width).len() as u64
            );
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    pub fn write_failures_are_reported() {
        let image = filled(0xff, 16);
        assert!(matches!(
            encode(&image, 0, BrokenPipe),
            Err(EncodeError::FailedToWrite(_))
        ));
    }
}
