//! Endpoint resolution.
//!
//! The Web API changed shape between qBittorrent releases: the legacy API
//! (`/query`, `/command`) was replaced by `/api/v2` in 4.1, and 5.0 (Web API
//! 2.11) renamed pause/resume to stop/start. Each [`Operation`] owns an
//! ascending table of version ranges; a range starts at `since` and ends where
//! the next one begins.

use crate::error::{QbitError, Result};
use reqwest::Method;
use std::fmt;
use std::str::FromStr;

/// Web API version advertised by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    /// First `/api/v2` version (qBittorrent 4.1)
    pub const V2: ApiVersion = ApiVersion::new(2, 0, 0);

    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Maps a legacy integer API level (as returned by `/version/api`) to `1.<level>.0`
    #[must_use]
    pub const fn legacy(level: u32) -> Self {
        Self::new(1, level, 0)
    }
}

impl FromStr for ApiVersion {
    type Err = QbitError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || QbitError::UnexpectedResponse(format!("Malformed API version: {s:?}"));

        let mut parts = [0u32; 3];
        let mut count = 0;
        for component in s.trim().split('.') {
            if count == parts.len() {
                return Err(malformed());
            }
            parts[count] = component.parse().map_err(|_| malformed())?;
            count += 1;
        }
        if count < 2 {
            return Err(malformed());
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Logical operations exposed by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    Logout,
    ApiVersion,
    DaemonVersion,
    TorrentList,
    AddTorrentFiles,
    AddTorrentUrls,
    Properties,
    Contents,
    Trackers,
    WebSeeds,
    PieceStates,
    PieceHashes,
    Pause,
    Resume,
    Delete,
    DeleteWithData,
    Log,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

impl Verb {
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
        }
    }
}

/// How scalar parameters travel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// No parameters at all
    None,
    /// URL query string
    Query,
    /// `application/x-www-form-urlencoded` body
    Form,
    /// `multipart/form-data` body
    Multipart,
}

/// Where the torrent hash goes, if the operation takes one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPlacement {
    None,
    /// Named parameter, encoded like the other scalars
    Param(&'static str),
    /// Appended as the last path segment
    PathSegment,
}

/// Spelling of the "create root folder" add option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootFolderOption {
    /// `root_folder=true|false`
    Flag,
    /// `contentLayout=Subfolder|NoSubfolder`, Web API 2.7+
    ContentLayout,
}

/// Wire names of the add-torrent options that were renamed over time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptionNames {
    /// `paused`, or `stopped` from Web API 2.11
    pub paused: &'static str,
    pub root_folder: RootFolderOption,
}

impl AddOptionNames {
    const ORIGINAL: Self = Self {
        paused: "paused",
        root_folder: RootFolderOption::Flag,
    };
    const CONTENT_LAYOUT: Self = Self {
        paused: "paused",
        root_folder: RootFolderOption::ContentLayout,
    };
    const STOPPED: Self = Self {
        paused: "stopped",
        root_folder: RootFolderOption::ContentLayout,
    };
}

/// Concrete request shape for one operation on one API version range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub path: &'static str,
    pub verb: Verb,
    pub encoding: Encoding,
    pub identity: IdentityPlacement,
    /// Parameters always sent with this endpoint
    pub fixed: &'static [(&'static str, &'static str)],
    /// Unknown-hash responses decode to an absent value instead of an error
    pub absence: bool,
    /// Add-torrent option names; only add endpoints send options
    pub add_options: AddOptionNames,
}

impl Endpoint {
    const fn new(path: &'static str, verb: Verb, encoding: Encoding) -> Self {
        Self {
            path,
            verb,
            encoding,
            identity: IdentityPlacement::None,
            fixed: &[],
            absence: false,
            add_options: AddOptionNames::ORIGINAL,
        }
    }

    const fn identity(mut self, identity: IdentityPlacement) -> Self {
        self.identity = identity;
        self
    }

    const fn add_options(mut self, names: AddOptionNames) -> Self {
        self.add_options = names;
        self
    }

    const fn fixed(mut self, fixed: &'static [(&'static str, &'static str)]) -> Self {
        self.fixed = fixed;
        self
    }

    /// A per-torrent read query, keyed by hash, with the absence convention
    const fn lookup(path: &'static str, identity: IdentityPlacement) -> Self {
        let mut endpoint = Self::new(path, Verb::Get, Encoding::Query).identity(identity);
        endpoint.absence = true;
        endpoint
    }
}

#[derive(Debug, Clone, Copy)]
struct Range {
    since: ApiVersion,
    endpoint: Endpoint,
}

const fn since(since: ApiVersion, endpoint: Endpoint) -> Range {
    Range { since, endpoint }
}

const LEGACY: ApiVersion = ApiVersion::new(1, 0, 0);
const V2: ApiVersion = ApiVersion::V2;
const V2_7: ApiVersion = ApiVersion::new(2, 7, 0);
const V2_11: ApiVersion = ApiVersion::new(2, 11, 0);

/// Major versions from here on are not known to this client
pub const UNSUPPORTED_FROM: ApiVersion = ApiVersion::new(3, 0, 0);

const HASH: IdentityPlacement = IdentityPlacement::Param("hash");
const HASHES: IdentityPlacement = IdentityPlacement::Param("hashes");
const SEGMENT: IdentityPlacement = IdentityPlacement::PathSegment;

const GET: Verb = Verb::Get;
const POST: Verb = Verb::Post;

const LOGIN: &[Range] = &[
    since(LEGACY, Endpoint::new("/login", POST, Encoding::Form)),
    since(V2, Endpoint::new("/api/v2/auth/login", POST, Encoding::Form)),
];

const LOGOUT: &[Range] = &[
    since(LEGACY, Endpoint::new("/logout", POST, Encoding::None)),
    since(V2, Endpoint::new("/api/v2/auth/logout", POST, Encoding::None)),
];

const API_VERSION: &[Range] = &[
    since(LEGACY, Endpoint::new("/version/api", GET, Encoding::None)),
    since(V2, Endpoint::new("/api/v2/app/webapiVersion", GET, Encoding::None)),
];

const DAEMON_VERSION: &[Range] = &[
    since(LEGACY, Endpoint::new("/version/qbittorrent", GET, Encoding::None)),
    since(V2, Endpoint::new("/api/v2/app/version", GET, Encoding::None)),
];

const TORRENT_LIST: &[Range] = &[
    since(LEGACY, Endpoint::new("/query/torrents", GET, Encoding::Query)),
    since(V2, Endpoint::new("/api/v2/torrents/info", GET, Encoding::Query)),
];

const ADD: Endpoint = Endpoint::new("/api/v2/torrents/add", POST, Encoding::Multipart);

const ADD_TORRENT_FILES: &[Range] = &[
    since(LEGACY, Endpoint::new("/command/upload", POST, Encoding::Multipart)),
    since(V2, ADD),
    since(V2_7, ADD.add_options(AddOptionNames::CONTENT_LAYOUT)),
    since(V2_11, ADD.add_options(AddOptionNames::STOPPED)),
];

const ADD_TORRENT_URLS: &[Range] = &[
    since(LEGACY, Endpoint::new("/command/download", POST, Encoding::Form)),
    since(V2, ADD),
    since(V2_7, ADD.add_options(AddOptionNames::CONTENT_LAYOUT)),
    since(V2_11, ADD.add_options(AddOptionNames::STOPPED)),
];

const PROPERTIES: &[Range] = &[
    since(LEGACY, Endpoint::lookup("/query/propertiesGeneral", SEGMENT)),
    since(V2, Endpoint::lookup("/api/v2/torrents/properties", HASH)),
];

const CONTENTS: &[Range] = &[
    since(LEGACY, Endpoint::lookup("/query/propertiesFiles", SEGMENT)),
    since(V2, Endpoint::lookup("/api/v2/torrents/files", HASH)),
];

const TRACKERS: &[Range] = &[
    since(LEGACY, Endpoint::lookup("/query/propertiesTrackers", SEGMENT)),
    since(V2, Endpoint::lookup("/api/v2/torrents/trackers", HASH)),
];

const WEB_SEEDS: &[Range] = &[
    since(LEGACY, Endpoint::lookup("/query/propertiesWebSeeds", SEGMENT)),
    since(V2, Endpoint::lookup("/api/v2/torrents/webseeds", HASH)),
];

const PIECE_STATES: &[Range] = &[
    since(LEGACY, Endpoint::lookup("/query/getPieceStates", SEGMENT)),
    since(V2, Endpoint::lookup("/api/v2/torrents/pieceStates", HASH)),
];

const PIECE_HASHES: &[Range] = &[
    since(LEGACY, Endpoint::lookup("/query/getPieceHashes", SEGMENT)),
    since(V2, Endpoint::lookup("/api/v2/torrents/pieceHashes", HASH)),
];

const PAUSE: &[Range] = &[
    since(LEGACY, Endpoint::new("/command/pause", POST, Encoding::Form).identity(HASH)),
    since(V2, Endpoint::new("/api/v2/torrents/pause", POST, Encoding::Form).identity(HASHES)),
    since(V2_11, Endpoint::new("/api/v2/torrents/stop", POST, Encoding::Form).identity(HASHES)),
];

const RESUME: &[Range] = &[
    since(LEGACY, Endpoint::new("/command/resume", POST, Encoding::Form).identity(HASH)),
    since(V2, Endpoint::new("/api/v2/torrents/resume", POST, Encoding::Form).identity(HASHES)),
    since(V2_11, Endpoint::new("/api/v2/torrents/start", POST, Encoding::Form).identity(HASHES)),
];

const DELETE: &[Range] = &[
    since(LEGACY, Endpoint::new("/command/delete", POST, Encoding::Form).identity(HASHES)),
    since(
        V2,
        Endpoint::new("/api/v2/torrents/delete", POST, Encoding::Form)
            .identity(HASHES)
            .fixed(&[("deleteFiles", "false")]),
    ),
];

const DELETE_WITH_DATA: &[Range] = &[
    since(LEGACY, Endpoint::new("/command/deletePerm", POST, Encoding::Form).identity(HASHES)),
    since(
        V2,
        Endpoint::new("/api/v2/torrents/delete", POST, Encoding::Form)
            .identity(HASHES)
            .fixed(&[("deleteFiles", "true")]),
    ),
];

const LOG: &[Range] = &[since(V2, Endpoint::new("/api/v2/log/main", GET, Encoding::Query))];

fn ranges(operation: Operation) -> &'static [Range] {
    match operation {
        Operation::Login => LOGIN,
        Operation::Logout => LOGOUT,
        Operation::ApiVersion => API_VERSION,
        Operation::DaemonVersion => DAEMON_VERSION,
        Operation::TorrentList => TORRENT_LIST,
        Operation::AddTorrentFiles => ADD_TORRENT_FILES,
        Operation::AddTorrentUrls => ADD_TORRENT_URLS,
        Operation::Properties => PROPERTIES,
        Operation::Contents => CONTENTS,
        Operation::Trackers => TRACKERS,
        Operation::WebSeeds => WEB_SEEDS,
        Operation::PieceStates => PIECE_STATES,
        Operation::PieceHashes => PIECE_HASHES,
        Operation::Pause => PAUSE,
        Operation::Resume => RESUME,
        Operation::Delete => DELETE,
        Operation::DeleteWithData => DELETE_WITH_DATA,
        Operation::Log => LOG,
    }
}

/// Picks the endpoint for `operation` on the negotiated `version`
///
/// # Errors
///
/// Returns [`QbitError::UnsupportedOperation`] when no range covers the version
pub fn resolve(operation: Operation, version: ApiVersion) -> Result<Endpoint> {
    let unsupported = || QbitError::UnsupportedOperation { operation, version };

    if version >= UNSUPPORTED_FROM {
        return Err(unsupported());
    }

    ranges(operation)
        .iter()
        .rev()
        .find(|range| range.since <= version)
        .map(|range| range.endpoint)
        .ok_or_else(unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPERATIONS: [Operation; 18] = [
        Operation::Login,
        Operation::Logout,
        Operation::ApiVersion,
        Operation::DaemonVersion,
        Operation::TorrentList,
        Operation::AddTorrentFiles,
        Operation::AddTorrentUrls,
        Operation::Properties,
        Operation::Contents,
        Operation::Trackers,
        Operation::WebSeeds,
        Operation::PieceStates,
        Operation::PieceHashes,
        Operation::Pause,
        Operation::Resume,
        Operation::Delete,
        Operation::DeleteWithData,
        Operation::Log,
    ];

    #[test]
    fn test_parse_version() {
        assert_eq!(ApiVersion::new(2, 8, 3), "2.8.3".parse().unwrap());
        assert_eq!(ApiVersion::new(2, 0, 0), "2.0".parse().unwrap());
        assert_eq!(ApiVersion::new(2, 11, 2), " 2.11.2\n".parse().unwrap());
        for bad in ["", "2", "2.x", "2.0.0.1", "v2.0"] {
            assert!(bad.parse::<ApiVersion>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_version_ordering() {
        assert!(ApiVersion::legacy(18) < ApiVersion::V2);
        assert!(ApiVersion::new(2, 9, 0) < ApiVersion::new(2, 11, 0));
    }

    #[test]
    fn test_tables_are_ascending() {
        for operation in ALL_OPERATIONS {
            let table = ranges(operation);
            assert!(!table.is_empty(), "{operation} has no endpoints");
            assert!(
                table.windows(2).all(|pair| pair[0].since < pair[1].since),
                "{operation} ranges overlap or are out of order"
            );
        }
    }

    #[test]
    fn test_resolve_picks_highest_matching_range() {
        let pause = |version| resolve(Operation::Pause, version).unwrap().path;

        assert_eq!("/command/pause", pause(ApiVersion::legacy(18)));
        assert_eq!("/api/v2/torrents/pause", pause(ApiVersion::new(2, 0, 0)));
        assert_eq!("/api/v2/torrents/pause", pause(ApiVersion::new(2, 10, 4)));
        assert_eq!("/api/v2/torrents/stop", pause(ApiVersion::new(2, 11, 0)));
        assert_eq!("/api/v2/torrents/stop", pause(ApiVersion::new(2, 11, 2)));
    }

    #[test]
    fn test_resolve_lookup_shape() {
        let legacy = resolve(Operation::Properties, ApiVersion::legacy(18)).unwrap();
        assert_eq!(IdentityPlacement::PathSegment, legacy.identity);
        assert!(legacy.absence);

        let v2 = resolve(Operation::Properties, ApiVersion::new(2, 8, 3)).unwrap();
        assert_eq!(IdentityPlacement::Param("hash"), v2.identity);
        assert_eq!(Verb::Get, v2.verb);
        assert!(v2.absence);

        let add = resolve(Operation::AddTorrentUrls, ApiVersion::legacy(18)).unwrap();
        assert_eq!(Encoding::Form, add.encoding);
        assert!(!add.absence);
    }

    #[test]
    fn test_add_option_names_follow_version() {
        let names = |operation, version| resolve(operation, version).unwrap().add_options;

        for operation in [Operation::AddTorrentFiles, Operation::AddTorrentUrls] {
            assert_eq!(AddOptionNames::ORIGINAL, names(operation, ApiVersion::legacy(18)));
            assert_eq!(AddOptionNames::ORIGINAL, names(operation, ApiVersion::new(2, 6, 2)));
            assert_eq!(
                RootFolderOption::ContentLayout,
                names(operation, ApiVersion::new(2, 8, 3)).root_folder
            );
            assert_eq!("paused", names(operation, ApiVersion::new(2, 8, 3)).paused);
            assert_eq!("stopped", names(operation, ApiVersion::new(2, 11, 2)).paused);
        }
    }

    #[test]
    fn test_unsupported_is_explicit() {
        assert!(matches!(
            resolve(Operation::Log, ApiVersion::legacy(18)),
            Err(QbitError::UnsupportedOperation {
                operation: Operation::Log,
                ..
            })
        ));
        assert!(matches!(
            resolve(Operation::Properties, ApiVersion::new(3, 0, 0)),
            Err(QbitError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            resolve(Operation::Login, ApiVersion::new(0, 9, 0)),
            Err(QbitError::UnsupportedOperation { .. })
        ));
    }
}
