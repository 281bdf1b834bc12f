use std::io::{BufRead, Write};

use log::*;
use thiserror::Error;

pub mod decode;
pub mod encode;
pub mod image;
pub mod record;

pub use decode::{decode, DecodeError};
pub use encode::{encode, encoded_len, records, EncodeError};
pub use image::ByteImage;

/// Padding used for bytes the input never wrote
pub const DEFAULT_PADDING: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Value of every byte the input leaves unwritten
    pub padding: u8,

    /// Bytes per output data record, 0 matches the widest record of the input
    pub record_width: u8,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
            record_width: 0,
        }
    }
}

#[derive(Error, Debug)]
pub enum FlhexError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Loads a whole Intel HEX file into a fresh image padded with `padding`.
pub fn load(input: impl BufRead, padding: u8) -> Result<ByteImage, DecodeError> {
    let mut image = ByteImage::new(padding);
    decode(input, &mut image)?;

    debug!(
        "Loaded {:#x} bytes, widest record {:?}",
        image.size(),
        image.observed_record_width()
    );

    Ok(image)
}

/// Flattens an Intel HEX file so that there are no gaps between bytes.
pub fn flatten(
    input: impl BufRead,
    output: impl Write,
    options: &FlattenOptions,
) -> Result<(), FlhexError> {
    let image = load(input, options.padding)?;
    encode(&image, options.record_width, output)?;
    Ok(())
}
