use crate::hash::TorrentHash;
use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Torrent entry returned by the torrent list
#[derive(Deserialize, Debug, Clone)]
pub struct TorrentInfo {
    /// Info-hash, lowercase
    pub hash: TorrentHash,
    pub name: String,
    /// Total size of the selected files in bytes
    pub size: u64,
    /// Download progress in the `0.0..=1.0` range
    pub progress: f64,
    pub dlspeed: u64,
    pub upspeed: u64,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub num_seeds: i64,
    #[serde(default)]
    pub num_leechs: i64,
    #[serde(default)]
    pub ratio: f64,
    /// Estimated seconds left, `8640000` when unknown
    #[serde(default)]
    pub eta: i64,
    pub state: TorrentState,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub save_path: String,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub added_on: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub completion_on: Option<DateTime<Utc>>,
}

/// Torrent state as reported by the daemon
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentState {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "missingFiles")]
    MissingFiles,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "pausedUP")]
    PausedUp,
    #[serde(rename = "stoppedUP")]
    StoppedUp,
    #[serde(rename = "queuedUP")]
    QueuedUp,
    #[serde(rename = "stalledUP")]
    StalledUp,
    #[serde(rename = "checkingUP")]
    CheckingUp,
    #[serde(rename = "forcedUP")]
    ForcedUp,
    #[serde(rename = "allocating")]
    Allocating,
    #[serde(rename = "downloading")]
    Downloading,
    #[serde(rename = "metaDL")]
    MetaDl,
    #[serde(rename = "forcedMetaDL")]
    ForcedMetaDl,
    #[serde(rename = "pausedDL")]
    PausedDl,
    #[serde(rename = "stoppedDL")]
    StoppedDl,
    #[serde(rename = "queuedDL")]
    QueuedDl,
    #[serde(rename = "stalledDL")]
    StalledDl,
    #[serde(rename = "checkingDL")]
    CheckingDl,
    #[serde(rename = "forcedDL")]
    ForcedDl,
    #[serde(rename = "checkingResumeData")]
    CheckingResumeData,
    #[serde(rename = "moving")]
    Moving,
    #[serde(other)]
    Unknown,
}

/// General properties of one torrent
#[derive(Deserialize, Debug, Clone)]
pub struct TorrentProperties {
    pub save_path: String,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub creation_date: Option<DateTime<Utc>>,
    /// Piece size in bytes, `None` until the torrent has metadata
    #[serde(default, deserialize_with = "known_size")]
    pub piece_size: Option<u64>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub addition_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_wasted: i64,
    #[serde(default)]
    pub total_uploaded: i64,
    #[serde(default)]
    pub total_downloaded: i64,
    #[serde(default)]
    pub up_limit: i64,
    #[serde(default)]
    pub dl_limit: i64,
    /// Seconds since the torrent was added
    #[serde(default)]
    pub time_elapsed: i64,
    #[serde(default)]
    pub seeding_time: i64,
    #[serde(default)]
    pub nb_connections: i64,
    #[serde(default)]
    pub share_ratio: f64,
    #[serde(default)]
    pub dl_speed: i64,
    #[serde(default)]
    pub up_speed: i64,
    #[serde(default)]
    pub eta: i64,
    #[serde(default)]
    pub peers: i64,
    #[serde(default)]
    pub seeds: i64,
    #[serde(default)]
    pub pieces_have: i64,
    /// Declared piece count; older daemons don't report it
    #[serde(default, deserialize_with = "known_size")]
    pub pieces_num: Option<u32>,
    /// Total size of the torrent content in bytes, `None` until the torrent has metadata
    #[serde(default, deserialize_with = "known_size")]
    pub total_size: Option<u64>,
}

impl TorrentProperties {
    /// Declared number of pieces: reported directly, or derived from total size and piece size
    ///
    /// `None` while the torrent has no metadata yet, e.g. right after adding a magnet link.
    #[must_use]
    pub fn piece_count(&self) -> Option<usize> {
        match (self.pieces_num, self.total_size, self.piece_size) {
            (Some(count), _, _) => usize::try_from(count).ok(),
            (None, Some(total), Some(piece)) if piece > 0 => {
                usize::try_from(total.div_ceil(piece)).ok()
            }
            _ => None,
        }
    }
}

/// One file inside a torrent
#[derive(Deserialize, Debug, Clone)]
pub struct ContentEntry {
    #[serde(default)]
    pub index: Option<u32>,
    /// Path relative to the torrent's root
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_seed: Option<bool>,
    /// First and last piece index covered by this file
    #[serde(default)]
    pub piece_range: Option<(u32, u32)>,
    #[serde(default)]
    pub availability: Option<f64>,
}

/// One tracker of a torrent
#[derive(Deserialize, Debug, Clone)]
pub struct TrackerEntry {
    /// Announce URL, or a pseudo entry such as `** [DHT] **`
    pub url: String,
    pub status: TrackerStatus,
    #[serde(default)]
    pub num_peers: i64,
    #[serde(default)]
    pub num_seeds: i64,
    #[serde(default)]
    pub num_leeches: i64,
    #[serde(default)]
    pub num_downloaded: i64,
    #[serde(default)]
    pub msg: String,
}

/// Tracker status. Web API v2 reports a code, the legacy API a label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Disabled,
    NotContacted,
    Working,
    Updating,
    NotWorking,
    Unknown,
}

impl<'de> Deserialize<'de> for TrackerStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(i64),
            Label(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Code(0) => Self::Disabled,
            Raw::Code(1) => Self::NotContacted,
            Raw::Code(2) => Self::Working,
            Raw::Code(3) => Self::Updating,
            Raw::Code(4) => Self::NotWorking,
            Raw::Code(_) => Self::Unknown,
            Raw::Label(label) => match label.as_str() {
                "Disabled" => Self::Disabled,
                "Not contacted yet" => Self::NotContacted,
                "Working" => Self::Working,
                "Updating..." => Self::Updating,
                "Not working" => Self::NotWorking,
                _ => Self::Unknown,
            },
        })
    }
}

/// One HTTP web seed of a torrent
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WebSeedEntry {
    pub url: String,
}

/// Download state of a single piece
#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PieceState {
    NotDownloaded = 0,
    Downloading = 1,
    Downloaded = 2,
}

/// Entry of the daemon's main log
#[derive(Deserialize, Debug, Clone)]
pub struct LogEntry {
    pub id: i64,
    pub message: String,
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub severity: LogSeverity,
}

#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogSeverity {
    Normal = 1,
    Info = 2,
    Warning = 4,
    Critical = 8,
}

/// Size or count the daemon reports as `-1` while it is unknown
fn known_size<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value.and_then(|value| T::try_from(value).ok()))
}

/// Unix timestamp in seconds; negative values mean "not set"
fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = Option::<i64>::deserialize(deserializer)?;
    Ok(seconds
        .filter(|seconds| *seconds >= 0)
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0)))
}
