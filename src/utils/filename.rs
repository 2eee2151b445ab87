// backup-dav/src/utils/filename.rs
//! Backup filenames: `backup-<name>_[<kind>-<target>_]<date>_<time>.<ext>`.
//!
//! Producers build names with [`build_filename`]; the retention pruner
//! recognises them with [`FilenameMatcher`]. Both sides share the format
//! strings below so every produced name parses back.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use regex::Regex;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H-%M-%S-%3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    Directory,
    Mysql,
    Mongo,
}

impl BackupKind {
    /// Tag embedded in the filename; directory archives carry none.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            BackupKind::Directory => None,
            BackupKind::Mysql => Some("mysql"),
            BackupKind::Mongo => Some("mongo"),
        }
    }

    // mongodump archives keep the historical `.sql.gz` suffix; the kind tag
    // is what tells them apart from SQL dumps.
    pub fn extension(self) -> &'static str {
        match self {
            BackupKind::Directory => "tgz",
            BackupKind::Mysql | BackupKind::Mongo => "sql.gz",
        }
    }

    fn from_tag(tag: Option<&str>) -> Option<Self> {
        match tag {
            None => Some(BackupKind::Directory),
            Some("mysql") => Some(BackupKind::Mysql),
            Some("mongo") => Some(BackupKind::Mongo),
            Some(_) => None,
        }
    }
}

/// A parsed backup filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFilename {
    pub name: String,
    pub kind: BackupKind,
    pub target: Option<String>,
    pub timestamp: NaiveDateTime,
    pub extension: String,
}

pub fn build_filename<Tz: TimeZone>(
    name: &str,
    kind: BackupKind,
    target: Option<&str>,
    at: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let stamp = format!("{}_{}", at.format(DATE_FORMAT), at.format(TIME_FORMAT));
    match (kind.tag(), target) {
        (Some(tag), Some(target)) => {
            format!("backup-{}_{}-{}_{}.{}", name, tag, target, stamp, kind.extension())
        }
        _ => format!("backup-{}_{}.{}", name, stamp, kind.extension()),
    }
}

/// Filename for an artifact produced right now.
pub fn filename_now(name: &str, kind: BackupKind, target: Option<&str>) -> String {
    build_filename(name, kind, target, &Local::now())
}

/// Recognises backup filenames belonging to one run name.
#[derive(Debug, Clone)]
pub struct FilenameMatcher {
    pattern: Regex,
}

impl FilenameMatcher {
    pub fn new(name: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"^backup-(?P<name>{})_(?:(?P<kind>mysql|mongo)-(?P<target>.+?)_)?(?P<y>\d{{4}})-(?P<mo>\d{{2}})-(?P<d>\d{{2}})_(?P<h>\d{{2}})-(?P<mi>\d{{2}})-(?P<s>\d{{2}})-(?P<ms>\d{{3}})\.(?P<ext>tar\.gz|tgz|tar|sql\.gz|sql)$",
            regex::escape(name)
        ))?;
        Ok(Self { pattern })
    }

    pub fn is_match(&self, basename: &str) -> bool {
        self.parse(basename).is_some()
    }

    pub fn parse(&self, basename: &str) -> Option<BackupFilename> {
        let caps = self.pattern.captures(basename)?;
        let number = |group: &str| caps.name(group)?.as_str().parse::<u32>().ok();

        let date = NaiveDate::from_ymd_opt(number("y")? as i32, number("mo")?, number("d")?)?;
        let timestamp = date.and_hms_milli_opt(number("h")?, number("mi")?, number("s")?, number("ms")?)?;
        let kind = BackupKind::from_tag(caps.name("kind").map(|m| m.as_str()))?;

        Some(BackupFilename {
            name: caps["name"].to_string(),
            kind,
            target: caps.name("target").map(|m| m.as_str().to_string()),
            timestamp,
            extension: caps["ext"].to_string(),
        })
    }
}
