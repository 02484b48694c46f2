//! Percentage reporting while file data is written.

/// Callback receiving whole percentages while an archive is encoded
pub type ProgressSink<'a> = &'a mut dyn FnMut(u8);

/// Turns written byte counts into monotonic percentages
///
/// A value is forwarded only when it changes. 100 is held back until the last file has been written,
/// even when rounding would reach it earlier.
pub struct ProgressTracker<'a> {
    sink: Option<ProgressSink<'a>>,
    total_bytes: u64,
    written_bytes: u64,
    total_files: usize,
    written_files: usize,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    /// Track `total_files` files adding up to `total_bytes`
    pub fn new(sink: Option<ProgressSink<'a>>, total_bytes: u64, total_files: usize) -> Self {
        Self {
            sink,
            total_bytes,
            written_bytes: 0,
            total_files,
            written_files: 0,
            last: None,
        }
    }

    /// Record one finished file of `size` bytes
    pub fn file_written(&mut self, size: u64) {
        self.written_bytes += size;
        self.written_files += 1;

        let percent = if self.written_files >= self.total_files {
            100
        } else if self.total_bytes == 0 {
            0
        } else {
            ((self.written_bytes as u128 * 100) / self.total_bytes as u128).min(99) as u8
        };
        self.emit(percent);
    }

    /// Report completion, used when there was nothing to write
    pub fn finish(&mut self) {
        self.emit(100);
    }

    fn emit(&mut self, percent: u8) {
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        if let Some(sink) = self.sink.as_mut() {
            sink(percent);
        }
    }
}
