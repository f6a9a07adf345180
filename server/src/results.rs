//! Append-only store of finished games.
//!
//! The store is a flat file of fixed-width records with no header and no
//! index:
//!
//! | field   | encoding |
//! |---------|----------|
//! | name    | 50 UTF-16 code units, big-endian, space padded |
//! | score   | `i32` big-endian |
//! | elapsed | `i64` big-endian, seconds |
//!
//! One async mutex per store serialises appends and full scans so a reader
//! never observes half a record written by a concurrent session. The file
//! work itself runs on the blocking pool.

use log::{error, warn};
use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio::task;

pub const NAME_UNITS: usize = 50;
pub const NAME_BYTES: usize = NAME_UNITS * 2;
pub const RECORD_SIZE: usize = NAME_BYTES + 4 + 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub name: String,
    pub score: i32,
    pub elapsed_secs: i64,
}

impl ResultRecord {
    pub fn new(name: &str, score: i32, elapsed_secs: i64) -> Self {
        Self {
            name: fit_name(name),
            score,
            elapsed_secs,
        }
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];

        // `new` already fitted the name; `take` guards hand-built records
        let units = self
            .name
            .encode_utf16()
            .chain(std::iter::repeat(u16::from(b' ')))
            .take(NAME_UNITS);
        for (i, unit) in units.enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&unit.to_be_bytes());
        }

        out[NAME_BYTES..NAME_BYTES + 4].copy_from_slice(&self.score.to_be_bytes());
        out[NAME_BYTES + 4..].copy_from_slice(&self.elapsed_secs.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Self {
        let units: Vec<u16> = bytes[..NAME_BYTES]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        let name = String::from_utf16_lossy(&units)
            .trim_end_matches(&[' ', '\0'][..])
            .to_string();

        let mut score = [0u8; 4];
        score.copy_from_slice(&bytes[NAME_BYTES..NAME_BYTES + 4]);
        let mut elapsed = [0u8; 8];
        elapsed.copy_from_slice(&bytes[NAME_BYTES + 4..]);

        Self {
            name,
            score: i32::from_be_bytes(score),
            elapsed_secs: i64::from_be_bytes(elapsed),
        }
    }
}

/// Truncates `name` to at most `NAME_UNITS` UTF-16 units without splitting a
/// character.
fn fit_name(name: &str) -> String {
    let mut units = 0;
    name.chars()
        .take_while(|c| {
            units += c.len_utf16();
            units <= NAME_UNITS
        })
        .collect()
}

/// Orders records best first: higher score, then lower elapsed time.
pub fn compare(a: &ResultRecord, b: &ResultRecord) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.elapsed_secs.cmp(&b.elapsed_secs))
}

/// Highest score wins; ties go to the faster game. `None` for no records.
/// Among full ties the earliest record is kept.
pub fn best_result(records: &[ResultRecord]) -> Option<&ResultRecord> {
    records.iter().reduce(|best, candidate| {
        if compare(candidate, best) == Ordering::Less {
            candidate
        } else {
            best
        }
    })
}

/// All records, best first. Equal records keep their append order.
pub fn ranking(records: &[ResultRecord]) -> Vec<ResultRecord> {
    let mut ranked = records.to_vec();
    ranked.sort_by(compare);
    ranked
}

pub struct ResultStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record at the last record boundary.
    ///
    /// Bytes of a torn trailing record are overwritten, so later records stay
    /// aligned.
    pub async fn append(
        &self,
        name: &str,
        score: i32,
        elapsed_secs: i64,
    ) -> io::Result<ResultRecord> {
        let record = ResultRecord::new(name, score, elapsed_secs);
        let bytes = record.encode();
        let path = self.path.clone();

        let _guard = self.lock.lock().await;
        task::spawn_blocking(move || append_record(&path, &bytes))
            .await
            .map_err(|e| io::Error::new(ErrorKind::Other, e))??;

        Ok(record)
    }

    /// Reads every complete record in append order.
    ///
    /// A missing file is an empty store. Other I/O failures are logged and
    /// whatever was decoded before the failure is returned.
    pub async fn read_all(&self) -> Vec<ResultRecord> {
        let path = self.path.clone();

        let _guard = self.lock.lock().await;
        match task::spawn_blocking(move || read_records(&path)).await {
            Ok(records) => records,
            Err(e) => {
                error!("Results scan of {} failed: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }
}

fn append_record(path: &Path, bytes: &[u8; RECORD_SIZE]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    let len = file.metadata()?.len();
    let torn = len % RECORD_SIZE as u64;
    if torn != 0 {
        warn!("Overwriting {} trailing bytes in {}", torn, path.display());
        file.set_len(len - torn)?;
    }

    file.seek(SeekFrom::Start(len - torn))?;
    file.write_all(bytes)?;
    file.flush()
}

fn read_records(path: &Path) -> Vec<ResultRecord> {
    let mut records = Vec::new();

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return records,
        Err(e) => {
            error!("Cannot open results file {}: {}", path.display(), e);
            return records;
        }
    };

    let mut buf = [0u8; RECORD_SIZE];
    loop {
        match read_record(&mut file, &mut buf) {
            Ok(RecordRead::Full) => records.push(ResultRecord::decode(&buf)),
            Ok(RecordRead::End) => break,
            Ok(RecordRead::Partial(n)) => {
                warn!("Ignoring {} trailing bytes in {}", n, path.display());
                break;
            }
            Err(e) => {
                error!("Error reading results from {}: {}", path.display(), e);
                break;
            }
        }
    }

    records
}

enum RecordRead {
    Full,
    End,
    Partial(usize),
}

fn read_record<R: Read>(reader: &mut R, buf: &mut [u8; RECORD_SIZE]) -> io::Result<RecordRead> {
    let mut filled = 0;
    while filled < RECORD_SIZE {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(match filled {
        0 => RecordRead::End,
        RECORD_SIZE => RecordRead::Full,
        n => RecordRead::Partial(n),
    })
}
