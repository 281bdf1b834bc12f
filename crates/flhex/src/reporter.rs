use std::io::{Stdout, Write};

use pbr::{ProgressBar, Units};

/// Writer that advances a progress bar by every byte passed through to `inner`
pub struct ProgressBarReporter<T> {
    pb: ProgressBar<Stdout>,
    inner: T,
}

impl<T> ProgressBarReporter<T>
where
    T: Write,
{
    pub fn new(total_bytes: u64, inner: T) -> Self {
        let mut pb = ProgressBar::new(total_bytes);
        pb.set_units(Units::Bytes);
        pb.show_speed = false;
        pb.message("Writing records ");

        Self { pb, inner }
    }

    pub fn finish(&mut self) {
        self.pb.finish();
    }
}

impl<T> Write for ProgressBarReporter<T>
where
    T: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.pb.add(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
