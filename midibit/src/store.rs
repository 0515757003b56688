//! Persistence
//!
//! Two small pieces of durable state survive a power cycle: the accumulated
//! practice/play counters, and the boot mode flag. Both are written as full
//! overwrites, and both treat a read-only medium as an expected condition
//! that is reported rather than fatal.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a write did not reach durable storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteFailure {
    #[error("storage is read-only")]
    ReadOnly,

    #[error("write failed: {0}")]
    Io(String),
}

impl From<io::Error> for WriteFailure {
    fn from(err: io::Error) -> WriteFailure {
        match err.kind() {
            io::ErrorKind::PermissionDenied => WriteFailure::ReadOnly,
            _ if err.raw_os_error() == Some(EROFS) => WriteFailure::ReadOnly,
            _ => WriteFailure::Io(err.to_string()),
        }
    }
}

/// errno for "read-only file system" on Linux and macOS.
const EROFS: i32 = 30;

/// Durable practice/play totals, in whole seconds.
pub trait CounterStore {
    /// Returns the stored `(practice, play)` seconds, or `(0, 0)` when
    /// there is no usable prior data.
    fn read(&self) -> (i64, i64);

    /// Replaces the stored values.
    fn write(&mut self, practice: i64, play: i64) -> Result<(), WriteFailure>;
}

/// Counters kept in a two line text file: `practice\nplay`.
#[derive(Debug, Clone)]
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    pub fn new<P: AsRef<Path>>(path: P) -> FileCounterStore {
        FileCounterStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parses the counters file contents. Anything short of two decimal
/// integers is treated as no data.
pub fn parse_counters(text: &str) -> Option<(i64, i64)> {
    let mut lines = text.lines();
    let practice = lines.next()?.trim().parse().ok()?;
    let play = lines.next()?.trim().parse().ok()?;
    Some((practice, play))
}

pub fn format_counters(practice: i64, play: i64) -> String {
    format!("{}\n{}", practice, play)
}

impl CounterStore for FileCounterStore {
    fn read(&self) -> (i64, i64) {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| parse_counters(&text))
            .unwrap_or((0, 0))
    }

    fn write(&mut self, practice: i64, play: i64) -> Result<(), WriteFailure> {
        fs::write(&self.path, format_counters(practice, play))?;
        Ok(())
    }
}

/// In-memory store, optionally refusing writes like a read-only medium.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    values: Option<(i64, i64)>,
    read_only: bool,
    writes: usize,
}

impl MemoryCounterStore {
    pub fn with_values(practice: i64, play: i64) -> MemoryCounterStore {
        MemoryCounterStore {
            values: Some((practice, play)),
            ..Default::default()
        }
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl CounterStore for MemoryCounterStore {
    fn read(&self) -> (i64, i64) {
        self.values.unwrap_or((0, 0))
    }

    fn write(&mut self, practice: i64, play: i64) -> Result<(), WriteFailure> {
        if self.read_only {
            return Err(WriteFailure::ReadOnly);
        }
        self.values = Some((practice, play));
        self.writes += 1;
        Ok(())
    }
}

/// Persisted boot mode. The byte values match the flag written by the
/// device firmware, so the same flag file can be shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BootMode {
    Run = 0x12,
    Dev = 0x34,
}

impl BootMode {
    pub fn is_dev(self) -> bool {
        self == BootMode::Dev
    }

    pub fn toggled(self) -> BootMode {
        match self {
            BootMode::Run => BootMode::Dev,
            BootMode::Dev => BootMode::Run,
        }
    }
}

/// Storage for the boot mode flag.
pub trait BootFlag {
    /// Current stored mode. Unreadable or unknown values read as `Run`.
    fn load(&self) -> BootMode;

    fn store(&mut self, mode: BootMode) -> Result<(), WriteFailure>;

    /// Flips the stored mode and returns the new value.
    fn toggle(&mut self) -> Result<BootMode, WriteFailure> {
        let mode = self.load().toggled();
        self.store(mode)?;
        Ok(mode)
    }
}

/// Boot flag kept as a single byte in a file.
#[derive(Debug, Clone)]
pub struct FileBootFlag {
    path: PathBuf,
}

impl FileBootFlag {
    pub fn new<P: AsRef<Path>>(path: P) -> FileBootFlag {
        FileBootFlag {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl BootFlag for FileBootFlag {
    fn load(&self) -> BootMode {
        match fs::read(&self.path) {
            Ok(bytes) => bytes
                .first()
                .and_then(|b| BootMode::try_from(*b).ok())
                .unwrap_or(BootMode::Run),
            Err(_) => BootMode::Run,
        }
    }

    fn store(&mut self, mode: BootMode) -> Result<(), WriteFailure> {
        fs::write(&self.path, [u8::from(mode)])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryBootFlag {
    mode: BootMode,
    read_only: bool,
}

impl MemoryBootFlag {
    pub fn new(mode: BootMode) -> MemoryBootFlag {
        MemoryBootFlag {
            mode,
            read_only: false,
        }
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

impl Default for MemoryBootFlag {
    fn default() -> Self {
        Self::new(BootMode::Run)
    }
}

impl BootFlag for MemoryBootFlag {
    fn load(&self) -> BootMode {
        self.mode
    }

    fn store(&mut self, mode: BootMode) -> Result<(), WriteFailure> {
        if self.read_only {
            return Err(WriteFailure::ReadOnly);
        }
        self.mode = mode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        parse_counters, BootFlag, BootMode, CounterStore, FileBootFlag, FileCounterStore,
        MemoryBootFlag, MemoryCounterStore, WriteFailure,
    };
    use std::fs;
    use std::io;

    #[test]
    fn parse_accepts_two_integers() {
        assert_eq!(parse_counters("120\n45"), Some((120, 45)));
        assert_eq!(parse_counters(" 7 \n 9\n"), Some((7, 9)));
        assert_eq!(parse_counters("-3\n0"), Some((-3, 0)));
    }

    #[test]
    fn parse_rejects_truncated_or_garbage() {
        assert_eq!(parse_counters(""), None);
        assert_eq!(parse_counters("120"), None);
        assert_eq!(parse_counters("120\n"), None);
        assert_eq!(parse_counters("abc\n4"), None);
        assert_eq!(parse_counters("4\n4.5"), None);
    }

    #[test]
    fn missing_file_reads_as_zero() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileCounterStore::new(dir.path().join("absent.text"));
        assert_eq!(store.read(), (0, 0));
    }

    #[test]
    fn corrupt_file_reads_as_zero() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pm_settings.text");
        fs::write(&path, "1234").unwrap();
        assert_eq!(FileCounterStore::new(&path).read(), (0, 0));
        fs::write(&path, "").unwrap();
        assert_eq!(FileCounterStore::new(&path).read(), (0, 0));
    }

    #[test]
    fn repeated_write_then_read() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pm_settings.text");
        let mut store = FileCounterStore::new(&path);
        store.write(300, 42).unwrap();
        store.write(300, 42).unwrap();
        assert_eq!(store.read(), (300, 42));
        assert_eq!(fs::read_to_string(&path).unwrap(), "300\n42");
    }

    #[test]
    fn write_overwrites_longer_contents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pm_settings.text");
        let mut store = FileCounterStore::new(&path);
        store.write(123456, 654321).unwrap();
        store.write(1, 2).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n2");
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = FileCounterStore::new(dir.path().join("nope").join("pm.text"));
        assert!(matches!(store.write(1, 1), Err(WriteFailure::Io(_))));
    }

    #[test]
    fn permission_denied_maps_to_read_only() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(WriteFailure::from(err), WriteFailure::ReadOnly);
        let err = io::Error::from_raw_os_error(30);
        assert_eq!(WriteFailure::from(err), WriteFailure::ReadOnly);
    }

    #[test]
    fn memory_store_can_be_read_only() {
        let mut store = MemoryCounterStore::with_values(5, 6);
        store.set_read_only(true);
        assert_eq!(store.write(7, 8), Err(WriteFailure::ReadOnly));
        assert_eq!(store.read(), (5, 6));
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn boot_flag_file_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("boot.bin");
        let mut flag = FileBootFlag::new(&path);
        assert_eq!(flag.load(), BootMode::Run);
        assert_eq!(flag.toggle(), Ok(BootMode::Dev));
        assert_eq!(fs::read(&path).unwrap(), vec![0x34]);
        assert_eq!(FileBootFlag::new(&path).load(), BootMode::Dev);
        assert_eq!(flag.toggle(), Ok(BootMode::Run));
        assert_eq!(fs::read(&path).unwrap(), vec![0x12]);
    }

    #[test]
    fn unknown_boot_byte_reads_as_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("boot.bin");
        fs::write(&path, [0x99]).unwrap();
        assert_eq!(FileBootFlag::new(&path).load(), BootMode::Run);
    }

    #[test]
    fn read_only_boot_flag_keeps_mode() {
        let mut flag = MemoryBootFlag::new(BootMode::Dev);
        flag.set_read_only(true);
        assert_eq!(flag.toggle(), Err(WriteFailure::ReadOnly));
        assert_eq!(flag.load(), BootMode::Dev);
    }
}
