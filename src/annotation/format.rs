//! Persisted annotation text format.
//!
//! ```text
//! ==========Marker==========
//! 2024-03-06 10:00:12.500, 12.5, 1, 2024-03-06 10:00:12.500, 12.5, 0, injection, injection
//! ==========Start-End==========
//! 2024-03-06 10:16:40.000, 1000, 1, 2024-03-06 10:16:41.200, 1001.2, 0, spindle, spindle
//! ==========Sleep state==========
//! 2024-03-06 10:00:00, 1, 1, 2024-03-06 10:00:30, 30, 0, 4, INIT
//! ```
//!
//! Every row has eight `", "`-separated fields: start time, start second,
//! start code, end time, end second, end code, state code (or label), label.
//!
//! Sleep rows are run-length rows at 1 s resolution. Files whose first
//! sleep row has start code `1` use 1-based inclusive seconds, so a row
//! covers `end - start + 1` seconds; other files cover `end - start`.
//! Older files carry the `Sleep stage` header instead of `Sleep state`.
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};

use super::{Annotation, Marker, StartEnd};
use crate::annotation::SleepState;
use crate::error::{Error, Result};

pub const MARKER_HEADER: &str = "==========Marker==========";
pub const START_END_HEADER: &str = "==========Start-End==========";
pub const SLEEP_STATE_HEADER: &str = "==========Sleep state==========";
pub const LEGACY_SLEEP_STATE_HEADER: &str = "==========Sleep stage==========";

const N_FIELDS: usize = 8;
/// Recording start and sleep-row time format.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const START_TIME_FORMATS: [&str; 3] = ["%Y%m%d-%H:%M:%S", "%Y-%m-%dT%H:%M:%S", TIME_FORMAT];

/// Seconds covered by each row of a bio-signal annotation export.
pub const BIO_EPOCH_SEC: usize = 4;

/// Parse the persisted annotation format.
///
/// # Errors
///
/// * [`Error::EmptyAnnotation`] when `text` has no content at all.
/// * [`Error::InvalidAnnotation`] when a section header is missing or the
///   sections are out of order.
/// * [`Error::Parse`] / [`Error::InvalidState`] for malformed rows.
pub fn parse(text: &str) -> Result<Annotation> {
    if text.is_empty() {
        return Err(Error::EmptyAnnotation);
    }
    let lines: Vec<&str> = text.lines().collect();
    let find = |header: &str| lines.iter().position(|l| l.trim_end() == header);

    let marker_idx = find(MARKER_HEADER)
        .ok_or_else(|| Error::InvalidAnnotation(format!("missing {MARKER_HEADER}")))?;
    let start_end_idx = find(START_END_HEADER)
        .ok_or_else(|| Error::InvalidAnnotation(format!("missing {START_END_HEADER}")))?;
    let sleep_idx = find(SLEEP_STATE_HEADER)
        .or_else(|| find(LEGACY_SLEEP_STATE_HEADER))
        .ok_or_else(|| Error::InvalidAnnotation(format!("missing {SLEEP_STATE_HEADER}")))?;
    if !(marker_idx < start_end_idx && start_end_idx < sleep_idx) {
        return Err(Error::InvalidAnnotation("sections are out of order".into()));
    }

    let markers = rows(&lines, marker_idx + 1, start_end_idx)?
        .into_iter()
        .map(|(line, f)| Ok(Marker { time: event_time(f[1], line)?, label: label(&f).to_string() }))
        .collect::<Result<Vec<_>>>()?;

    let start_end = rows(&lines, start_end_idx + 1, sleep_idx)?
        .into_iter()
        .map(|(line, f)| {
            let (start, end) = (event_time(f[1], line)?, event_time(f[4], line)?);
            if start > end {
                return Err(Error::Parse { line, message: format!("event ends ({end}) before it starts ({start})") });
            }
            Ok(StartEnd { start, end, label: label(&f).to_string() })
        })
        .collect::<Result<Vec<_>>>()?;

    let sleep_rows = rows(&lines, sleep_idx + 1, lines.len())?;
    let inclusive = sleep_rows.first().is_some_and(|(_, f)| f[2] == "1");
    let mut sleep_state = Vec::new();
    for (line, f) in sleep_rows {
        if f[7] == "MARKER" {
            continue;
        }
        let start = number(f[1], line)? as i64;
        let end = number(f[4], line)? as i64;
        let count = end - start + i64::from(inclusive);
        if count < 0 {
            return Err(Error::Parse { line, message: format!("row ends ({end}) before it starts ({start})") });
        }
        let code: u8 = f[6]
            .parse()
            .map_err(|_| Error::Parse { line, message: format!("bad state code '{}'", f[6]) })?;
        sleep_state.extend(std::iter::repeat(code).take(count as usize));
    }

    debug!(
        seconds = sleep_state.len(),
        markers = markers.len(),
        events = start_end.len(),
        inclusive,
        "parsed annotation"
    );
    Annotation::new(sleep_state, markers, start_end)
}

/// Render `anno` in the persisted format, with wall-clock times relative
/// to the recording start `start`.
pub fn write(anno: &Annotation, start: NaiveDateTime) -> String {
    let mut lines = vec![MARKER_HEADER.to_string()];
    for m in anno.markers() {
        let t = clock(start, m.time, EVENT_TIME_FORMAT);
        lines.push(row([&t, &m.time.to_string(), "1", &t, &m.time.to_string(), "0", &m.label, &m.label]));
    }

    lines.push(START_END_HEADER.to_string());
    for ev in anno.start_end() {
        lines.push(row([
            &clock(start, ev.start, EVENT_TIME_FORMAT),
            &ev.start.to_string(),
            "1",
            &clock(start, ev.end, EVENT_TIME_FORMAT),
            &ev.end.to_string(),
            "0",
            &ev.label,
            &ev.label,
        ]));
    }

    lines.push(SLEEP_STATE_HEADER.to_string());
    for iv in anno.intervals() {
        let label = anno.state_map().label(iv.value).unwrap_or("");
        lines.push(row([
            &clock(start, iv.start as f64, TIME_FORMAT),
            &(iv.start + 1).to_string(),
            "1",
            &clock(start, iv.end as f64, TIME_FORMAT),
            &iv.end.to_string(),
            "0",
            &iv.value.to_string(),
            label,
        ]));
    }
    lines.join("\n")
}

pub fn load(path: impl AsRef<Path>) -> Result<Annotation> {
    parse(&fs::read_to_string(path)?)
}

pub fn save(anno: &Annotation, start: NaiveDateTime, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, write(anno, start))?;
    Ok(())
}

/// Load an annotation, or start a fresh one when there is nothing to load.
///
/// A missing or empty file becomes an all-`Init` annotation of `duration`
/// seconds. Without a known duration this is [`Error::NoRecording`]. An
/// invalid file is returned as the error it is.
pub fn load_or_create(path: impl AsRef<Path>, duration: Option<usize>) -> Result<Annotation> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    match parse(&text) {
        Err(Error::EmptyAnnotation) => match duration {
            Some(duration) => {
                warn!(path = %path.display(), duration, "no annotation found, starting a new one");
                Ok(Annotation::new_init(duration))
            }
            None => Err(Error::NoRecording),
        },
        Ok(anno) => {
            if let Some(duration) = duration.filter(|&d| d != anno.len()) {
                warn!(annotated = anno.len(), duration, "annotation length differs from recording");
            }
            Ok(anno)
        }
        Err(e) => Err(e),
    }
}

/// Parse a bio-signal scoring export: two header lines, then one
/// tab-separated row per 4 s epoch with the state in the second field
/// (`AW`/`QW` → Wake, `NREM`, `REMS` → REM).
pub fn parse_bio_annotation(text: &str) -> Result<Annotation> {
    let mut sleep_state = Vec::new();
    for (i, raw) in text.lines().enumerate().skip(2) {
        if raw.trim().is_empty() {
            continue;
        }
        let line = i + 1;
        let field = raw
            .split('\t')
            .nth(1)
            .map(str::trim)
            .ok_or_else(|| Error::Parse { line, message: "missing state column".into() })?;
        let state = match field {
            "AW" | "QW" => SleepState::Wake,
            "NREM" => SleepState::Nrem,
            "REMS" => SleepState::Rem,
            other => return Err(Error::Parse { line, message: format!("unknown state '{other}'") }),
        };
        sleep_state.extend(std::iter::repeat(state.code()).take(BIO_EPOCH_SEC));
    }
    Annotation::new(sleep_state, vec![], vec![])
}

pub fn load_bio_annotation(path: impl AsRef<Path>) -> Result<Annotation> {
    parse_bio_annotation(&fs::read_to_string(path)?)
}

/// Parse a recording start time (`20240306-10:00:00`, ISO 8601 or
/// `2024-03-06 10:00:00`).
pub fn parse_start_time(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    let mut last_err = None;
    for fmt in START_TIME_FORMATS {
        match NaiveDateTime::parse_from_str(s, fmt) {
            Ok(t) => return Ok(t),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(e.into()),
        None => Err(Error::param("no start time formats configured")),
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

type Row<'a> = (usize, Vec<&'a str>);

/// Non-blank rows of `lines[from..to]`, split into fields, with 1-based
/// line numbers.
fn rows<'a>(lines: &[&'a str], from: usize, to: usize) -> Result<Vec<Row<'a>>> {
    lines[from..to]
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(k, l)| {
            let line = from + k + 1;
            let fields: Vec<&str> = l.split(", ").map(str::trim).collect();
            if fields.len() < N_FIELDS {
                return Err(Error::Parse {
                    line,
                    message: format!("expected {N_FIELDS} fields, found {}", fields.len()),
                });
            }
            Ok((line, fields))
        })
        .collect()
}

fn number(field: &str, line: usize) -> Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::Parse { line, message: format!("bad number '{field}'") })
}

/// Seconds from recording start; must not be negative.
fn event_time(field: &str, line: usize) -> Result<f64> {
    let t = number(field, line)?;
    if t < 0.0 {
        return Err(Error::Parse { line, message: format!("negative event time {t}") });
    }
    Ok(t)
}

fn label<'a>(fields: &[&'a str]) -> &'a str {
    if fields[7].is_empty() {
        fields[6]
    } else {
        fields[7]
    }
}

fn row(fields: [&str; N_FIELDS]) -> String {
    fields.join(", ")
}

fn clock(start: NaiveDateTime, secs: f64, fmt: &str) -> String {
    let t = start + Duration::milliseconds((secs * 1000.0).round() as i64);
    t.format(fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> NaiveDateTime {
        parse_start_time("20240306-10:00:00").unwrap()
    }

    #[test]
    fn empty_and_invalid_are_distinguished() {
        assert!(matches!(parse(""), Err(Error::EmptyAnnotation)));
        assert!(matches!(parse(MARKER_HEADER), Err(Error::InvalidAnnotation(_))));
    }

    #[test]
    fn writes_inclusive_sleep_rows() {
        let anno = Annotation::new(vec![4, 4, 4, 1, 1], vec![], vec![]).unwrap();
        let text = write(&anno, t0());
        let sleep: Vec<&str> = text.lines().skip(3).collect();
        assert_eq!(sleep[0], "2024-03-06 10:00:00, 1, 1, 2024-03-06 10:00:03, 3, 0, 4, INIT");
        assert_eq!(sleep[1], "2024-03-06 10:00:03, 4, 1, 2024-03-06 10:00:05, 5, 0, 1, NREM");
        assert_eq!(parse(&text).unwrap(), anno);
    }

    #[test]
    fn exclusive_rows_without_start_code_one() {
        let text = format!(
            "{MARKER_HEADER}\n{START_END_HEADER}\n{LEGACY_SLEEP_STATE_HEADER}\n\
             a, 0, 0, b, 3, 0, 3, Wake\n\
             a, 3, 0, b, 5, 0, 2, REM"
        );
        assert_eq!(parse(&text).unwrap().sleep_state(), &[3, 3, 3, 2, 2]);
    }

    #[test]
    fn event_label_falls_back_to_code_field() {
        let text = format!(
            "{MARKER_HEADER}\na, 12, 1, a, 12, 0, injection, \n{START_END_HEADER}\n{SLEEP_STATE_HEADER}"
        );
        let anno = parse(&text).unwrap();
        assert_eq!(anno.markers()[0].label, "injection");
        approx::assert_abs_diff_eq!(anno.markers()[0].time, 12.0);
    }

    #[test]
    fn short_row_is_a_parse_error() {
        let text = format!("{MARKER_HEADER}\n{START_END_HEADER}\n{SLEEP_STATE_HEADER}\n1, 2, 3");
        assert!(matches!(parse(&text), Err(Error::Parse { line: 4, .. })));
    }

    #[test]
    fn bio_rows_expand_to_four_seconds() {
        let text = "header\nheader\n0\tAW\n1\tNREM\n2\tREMS\n";
        let anno = parse_bio_annotation(text).unwrap();
        assert_eq!(anno.len(), 12);
        assert_eq!(&anno.sleep_state()[..4], &[3, 3, 3, 3]);
        assert_eq!(&anno.sleep_state()[8..], &[2, 2, 2, 2]);
        assert!(parse_bio_annotation("h\nh\n0\tXX\n").is_err());
    }

    #[test]
    fn start_time_formats() {
        let a = parse_start_time("2024-03-06T10:00:00").unwrap();
        let b = parse_start_time("2024-03-06 10:00:00").unwrap();
        assert_eq!(a, t0());
        assert_eq!(b, t0());
        assert!(matches!(parse_start_time("yesterday"), Err(Error::Time(_))));
    }
}
