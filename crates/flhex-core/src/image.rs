use assert_into::AssertInto;
use log::trace;
use static_assertions::const_assert;

/// Capacity of a freshly created image, one full 16 bit bank
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Record width used for images that never saw a sized record
pub const DEFAULT_RECORD_WIDTH: u8 = 16;

const_assert!(DEFAULT_CAPACITY.is_power_of_two());

/// A contiguous memory image with a configurable padding value.
///
/// Every position that was never written holds `fill`. The backing storage only ever grows,
/// and always to a power of two, so sequential firmware layouts only reallocate a handful of
/// times.
#[derive(Debug, Clone)]
pub struct ByteImage {
    bytes: Vec<u8>,
    size: usize,
    fill: u8,
    // Largest record byte count seen while decoding, 0 when nothing was decoded
    record_width: u8,
}

impl ByteImage {
    pub fn new(fill: u8) -> Self {
        Self {
            bytes: vec![fill; DEFAULT_CAPACITY],
            size: 0,
            fill,
            record_width: 0,
        }
    }

    /// Allocated length of the image, always a power of two
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// One past the highest offset ever written
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The padding value of unwritten positions
    pub fn fill(&self) -> u8 {
        self.fill
    }

    /// Grows the image so that it holds at least `desired` bytes.
    ///
    /// The new capacity is `desired` rounded up to the next power of two. Only the added region
    /// is initialized with the fill value, existing contents are never touched. Running out of
    /// memory here aborts the process.
    pub fn ensure_capacity(&mut self, desired: usize) {
        let old_capacity = self.capacity();
        if desired <= old_capacity {
            return;
        }

        let new_capacity = desired.next_power_of_two();
        trace!(
            "Growing image from {:#x} to {:#x} bytes",
            old_capacity,
            new_capacity
        );

        self.bytes.reserve_exact(new_capacity - old_capacity);
        self.bytes.resize(new_capacity, self.fill);
    }

    pub fn write_byte(&mut self, addr: u32, val: u8) {
        let index: usize = addr.assert_into();
        if index >= self.capacity() {
            self.ensure_capacity(index + 1);
        }
        self.bytes[index] = val;
        self.size = self.size.max(index + 1);
    }

    /// Writes `data` starting at `addr`, wrapping around the end of the 32 bit address space.
    pub fn write_slice(&mut self, addr: u32, data: &[u8]) {
        let mut addr = addr;
        for &val in data {
            self.write_byte(addr, val);
            addr = addr.wrapping_add(1);
        }
    }

    /// The populated part of the image, `[0, size)`
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.size]
    }

    /// Reads a single byte, positions past the allocation read as the fill value.
    pub fn get(&self, addr: usize) -> u8 {
        self.bytes.get(addr).copied().unwrap_or(self.fill)
    }

    /// Record width to use when no explicit width is requested.
    pub fn record_width(&self) -> u8 {
        match self.record_width {
            0 => DEFAULT_RECORD_WIDTH,
            width => width,
        }
    }

    /// Widest record byte count observed while decoding, if any.
    pub fn observed_record_width(&self) -> Option<u8> {
        match self.record_width {
            0 => None,
            width => Some(width),
        }
    }

    pub(crate) fn observe_record_width(&mut self, byte_count: u8) {
        self.record_width = self.record_width.max(byte_count);
    }
}
