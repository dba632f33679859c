use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::{
    domain::{IncomingMessage, Prediction},
    errors::LogWriteError,
};

/// Column order of the daily CSV file.
pub const HEADER: [&str; 6] = [
    "timestamp",
    "user_id",
    "username",
    "first_name",
    "text",
    "prediction",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Local wall-clock time without offset. The six-digit fraction is always written.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One row of the request log. Field order matches [`HEADER`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestLogRecord {
    pub timestamp: String,
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub text: String,
    pub prediction: Prediction,
}

impl RequestLogRecord {
    /// Build the row for a processed message. Stores the raw, unnormalized text.
    pub fn from_message(msg: &IncomingMessage, prediction: Prediction) -> Self {
        Self {
            timestamp: msg.received_at.format(TIMESTAMP_FORMAT).to_string(),
            user_id: msg.user_id.0,
            username: msg.username.clone().unwrap_or_default(),
            first_name: msg.first_name.clone().unwrap_or_default(),
            text: msg.text.clone(),
            prediction,
        }
    }
}

/// Append-only CSV log, one file per local calendar day.
///
/// Appends are serialized by an in-process lock; each row is fully encoded
/// before the file is touched and written with a single `write_all`.
/// Concurrent writers in other processes are not coordinated.
#[derive(Debug)]
pub struct RequestLogger {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl RequestLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/requests_{YYYY-MM-DD}.csv`
    pub fn path_for_date(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("requests_{}.csv", date.format("%Y-%m-%d")))
    }

    /// Append to today's file (local clock).
    pub fn append(&self, record: &RequestLogRecord) -> Result<(), LogWriteError> {
        self.append_on(Local::now().date_naive(), record)
    }

    /// Append to the file of the given day.
    ///
    /// Errors are reported through `tracing` and returned; they never panic.
    pub fn append_on(
        &self,
        date: NaiveDate,
        record: &RequestLogRecord,
    ) -> Result<(), LogWriteError> {
        let path = self.path_for_date(date);
        match self.write_row(&path, record) {
            Ok(()) => {
                tracing::info!(
                    user_id = record.user_id,
                    prediction = %record.prediction,
                    path = %path.display(),
                    "request logged"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    user_id = record.user_id,
                    path = %path.display(),
                    error = %e,
                    "failed to write request log"
                );
                Err(e)
            }
        }
    }

    fn write_row(&self, path: &Path, record: &RequestLogRecord) -> Result<(), LogWriteError> {
        let row = encode_row(record)?;

        // A poisoned lock only means another append panicked; the file itself is fine.
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());

        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut buf = Vec::with_capacity(row.len() + 64);
        if file.metadata()?.len() == 0 {
            buf.extend_from_slice(UTF8_BOM);
            buf.extend_from_slice(&encode_header()?);
        }
        buf.extend_from_slice(&row);

        file.write_all(&buf)?;
        file.sync_data()?;
        Ok(())
    }
}

fn row_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new())
}

fn encode_header() -> Result<Vec<u8>, LogWriteError> {
    let mut w = row_writer();
    w.write_record(HEADER)?;
    w.into_inner().map_err(|e| LogWriteError::Io(e.into_error()))
}

fn encode_row(record: &RequestLogRecord) -> Result<Vec<u8>, LogWriteError> {
    let mut w = row_writer();
    w.serialize(record)?;
    w.into_inner().map_err(|e| LogWriteError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::domain::{ChatId, UserId};

    fn tmp_dir(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"))
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn record(user_id: i64, text: &str, prediction: Prediction) -> RequestLogRecord {
        RequestLogRecord {
            timestamp: "2026-03-14T09:26:53.589793".to_string(),
            user_id,
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            text: text.to_string(),
            prediction,
        }
    }

    fn read_rows(path: &Path) -> (bool, Vec<Vec<String>>) {
        let raw = fs::read_to_string(path).unwrap();
        let (has_bom, body) = match raw.strip_prefix('\u{feff}') {
            Some(rest) => (true, rest.to_string()),
            None => (false, raw.clone()),
        };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(body.as_bytes());
        let rows = rdr
            .records()
            .map(|r| r.unwrap().iter().map(|s| s.to_string()).collect())
            .collect();
        (has_bom, rows)
    }

    #[test]
    fn path_is_keyed_by_date() {
        let log = RequestLogger::new("/var/log/dbot");
        assert_eq!(
            log.path_for_date(day()),
            PathBuf::from("/var/log/dbot/requests_2026-03-14.csv")
        );
    }

    #[test]
    fn header_written_once_and_rows_keep_order() {
        let dir = tmp_dir("dbot-reqlog");
        let log = RequestLogger::new(&dir);

        log.append_on(day(), &record(1, "flood downtown", Prediction::Disaster))
            .unwrap();
        log.append_on(day(), &record(2, "nice day", Prediction::NoDisaster))
            .unwrap();

        let (has_bom, rows) = read_rows(&log.path_for_date(day()));
        assert!(has_bom);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], HEADER.map(|s| s.to_string()).to_vec());
        assert_eq!(rows[1][1], "1");
        assert_eq!(rows[1][5], "Disaster");
        assert_eq!(rows[2][1], "2");
        assert_eq!(rows[2][5], "No disaster");

        let raw = fs::read(log.path_for_date(day())).unwrap();
        assert_eq!(raw.windows(3).filter(|w| *w == UTF8_BOM).count(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn new_day_gets_its_own_file() {
        let dir = tmp_dir("dbot-reqlog-days");
        let log = RequestLogger::new(&dir);
        let next = day().succ_opt().unwrap();

        log.append_on(day(), &record(1, "a", Prediction::Error)).unwrap();
        log.append_on(next, &record(2, "b", Prediction::Error)).unwrap();

        assert_eq!(read_rows(&log.path_for_date(day())).1.len(), 2);
        assert_eq!(read_rows(&log.path_for_date(next)).1.len(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn quotes_unicode_commas_and_newlines() {
        let dir = tmp_dir("dbot-reqlog-quote");
        let log = RequestLogger::new(&dir);
        let text = "Пожар, \"срочно\"\nвторая строка 🔥";

        log.append_on(day(), &record(7, text, Prediction::Disaster))
            .unwrap();

        let (_, rows) = read_rows(&log.path_for_date(day()));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][4], text);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_identity_fields_are_empty_strings() {
        let msg = IncomingMessage {
            chat_id: ChatId(10),
            user_id: UserId(42),
            username: None,
            first_name: None,
            text: "raw #Text http://x.co".to_string(),
            received_at: Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
        };
        let rec = RequestLogRecord::from_message(&msg, Prediction::NoDisaster);
        assert_eq!(rec.username, "");
        assert_eq!(rec.first_name, "");
        assert_eq!(rec.text, "raw #Text http://x.co");
        assert_eq!(rec.timestamp, "2026-03-14T09:26:53.000000");

        let dir = tmp_dir("dbot-reqlog-empty");
        let log = RequestLogger::new(&dir);
        log.append_on(day(), &rec).unwrap();
        let raw = fs::read_to_string(log.path_for_date(day())).unwrap();
        assert!(raw.ends_with("42,,,raw #Text http://x.co,No disaster\r\n"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let dir = tmp_dir("dbot-reqlog-concurrent");
        let log = Arc::new(RequestLogger::new(&dir));
        let long = "x".repeat(32 * 1024);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let log = log.clone();
                let text = format!("{i}:{long}");
                std::thread::spawn(move || {
                    log.append_on(day(), &record(i, &text, Prediction::Disaster))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let (_, rows) = read_rows(&log.path_for_date(day()));
        assert_eq!(rows.len(), 17);
        let mut ids: Vec<i64> = rows[1..]
            .iter()
            .map(|r| {
                assert_eq!(r.len(), HEADER.len());
                let id: i64 = r[1].parse().unwrap();
                assert_eq!(r[4], format!("{id}:{long}"));
                id
            })
            .collect();
        ids.sort();
        assert_eq!(ids, (0..16).collect::<Vec<_>>());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unwritable_dir_reports_error() {
        let blocker = tmp_dir("dbot-reqlog-blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let log = RequestLogger::new(blocker.join("nested"));

        let err = log
            .append_on(day(), &record(1, "a", Prediction::Error))
            .unwrap_err();
        assert!(matches!(err, LogWriteError::Io(_)));

        let _ = fs::remove_file(&blocker);
    }
}
