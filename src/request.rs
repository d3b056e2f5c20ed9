//! Outbound request construction.
//!
//! Every call is first lowered into a [`PreparedRequest`], a plain value that
//! records path, verb, query and body fields in a deterministic order, and only
//! then turned into a `reqwest` request.

use crate::endpoint::{AddOptionNames, Encoding, Endpoint, IdentityPlacement, Operation, RootFolderOption};
use crate::error::{QbitError, Result};
use reqwest::multipart;
use reqwest::{Client, Method, RequestBuilder};
use std::fs;
use std::path::Path;

const TORRENT_MIME: &str = "application/octet-stream";

/// Name of the multipart field carrying `.torrent` payloads
pub const TORRENTS_FIELD: &str = "torrents";

/// Options shared by both add-torrent variants. Unset options are not sent,
/// so the daemon's own defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddTorrentOptions {
    pub paused: Option<bool>,
    pub save_path: Option<String>,
    pub category: Option<String>,
    pub skip_checking: Option<bool>,
    pub sequential_download: Option<bool>,
    pub create_root_folder: Option<bool>,
    pub rename: Option<String>,
    /// Upload limit in bytes/s
    pub upload_limit: Option<u64>,
    /// Download limit in bytes/s
    pub download_limit: Option<u64>,
    pub first_last_piece_priority: Option<bool>,
    pub auto_management: Option<bool>,
    /// Cookie sent by the daemon when it fetches torrent URLs
    pub cookie: Option<String>,
}

impl AddTorrentOptions {
    /// Fields for the set options, spelled as `names` says
    fn fields(&self, names: &AddOptionNames) -> Vec<(&'static str, String)> {
        let flag = |value: bool| value.to_string();
        let root_folder = match names.root_folder {
            RootFolderOption::Flag => ("root_folder", self.create_root_folder.map(flag)),
            RootFolderOption::ContentLayout => (
                "contentLayout",
                self.create_root_folder
                    .map(|create| if create { "Subfolder" } else { "NoSubfolder" }.to_string()),
            ),
        };
        [
            (names.paused, self.paused.map(flag)),
            ("savepath", self.save_path.clone()),
            ("category", self.category.clone()),
            ("skip_checking", self.skip_checking.map(flag)),
            ("sequentialDownload", self.sequential_download.map(flag)),
            root_folder,
            ("rename", self.rename.clone()),
            ("upLimit", self.upload_limit.map(|limit| limit.to_string())),
            ("dlLimit", self.download_limit.map(|limit| limit.to_string())),
            ("firstLastPiecePrio", self.first_last_piece_priority.map(flag)),
            ("autoTMM", self.auto_management.map(flag)),
            ("cookie", self.cookie.clone()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect()
    }
}

/// A `.torrent` payload uploaded as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl TorrentFile {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// Reads a `.torrent` file from disk, keeping its file name
    ///
    /// # Errors
    ///
    /// Returns [`QbitError::InvalidInput`] if the file cannot be read or has no file name
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| QbitError::InvalidInput(format!("No file name in {}", path.display())))?;
        let data = fs::read(path).map_err(|err| {
            QbitError::InvalidInput(format!("Failed to read {}: {err}", path.display()))
        })?;

        Ok(Self::new(file_name, data))
    }
}

/// Payload variant of an [`AddTorrentRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    Files(Vec<TorrentFile>),
    /// HTTP(S) links to `.torrent` files or magnet URIs
    Urls(Vec<String>),
}

/// Request to add one or more torrents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTorrentRequest {
    pub source: TorrentSource,
    pub options: AddTorrentOptions,
}

impl AddTorrentRequest {
    pub fn from_files(files: impl IntoIterator<Item = TorrentFile>) -> Self {
        Self {
            source: TorrentSource::Files(files.into_iter().collect()),
            options: AddTorrentOptions::default(),
        }
    }

    pub fn from_urls<S: Into<String>>(urls: impl IntoIterator<Item = S>) -> Self {
        Self {
            source: TorrentSource::Urls(urls.into_iter().map(Into::into).collect()),
            options: AddTorrentOptions::default(),
        }
    }

    #[must_use]
    pub fn paused(mut self, paused: bool) -> Self {
        self.options.paused = Some(paused);
        self
    }

    #[must_use]
    pub fn save_path(mut self, save_path: impl Into<String>) -> Self {
        self.options.save_path = Some(save_path.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.options.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn skip_checking(mut self, skip_checking: bool) -> Self {
        self.options.skip_checking = Some(skip_checking);
        self
    }

    #[must_use]
    pub fn sequential_download(mut self, sequential: bool) -> Self {
        self.options.sequential_download = Some(sequential);
        self
    }

    #[must_use]
    pub fn create_root_folder(mut self, create: bool) -> Self {
        self.options.create_root_folder = Some(create);
        self
    }

    #[must_use]
    pub fn options(mut self, options: AddTorrentOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        match self.source {
            TorrentSource::Files(_) => Operation::AddTorrentFiles,
            TorrentSource::Urls(_) => Operation::AddTorrentUrls,
        }
    }

    /// Checks the payload before anything is sent
    ///
    /// # Errors
    ///
    /// Returns [`QbitError::InvalidInput`] if:
    /// - No file or URL was given
    /// - A file has an empty name or no data
    /// - A URL doesn't start with http://, https:// or magnet:
    pub fn validate(&self) -> Result<()> {
        match &self.source {
            TorrentSource::Files(files) => {
                if files.is_empty() {
                    return Err(QbitError::InvalidInput("Torrent files cannot be empty".into()));
                }
                for file in files {
                    if file.file_name.is_empty() {
                        return Err(QbitError::InvalidInput("File name cannot be empty".into()));
                    }
                    if file.data.is_empty() {
                        return Err(QbitError::InvalidInput(format!(
                            "File data cannot be empty: {}",
                            file.file_name
                        )));
                    }
                }
            }
            TorrentSource::Urls(urls) => {
                if urls.is_empty() {
                    return Err(QbitError::InvalidInput("Torrent URLs cannot be empty".into()));
                }
                if let Some(url) = urls.iter().find(|url| {
                    !url.starts_with("http://")
                        && !url.starts_with("https://")
                        && !url.starts_with("magnet:")
                }) {
                    return Err(QbitError::InvalidInput(format!(
                        "URL must start with http://, https://, or magnet:, got: {url}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Scalar fields and file payloads, identical option fields for both variants
    pub(crate) fn fields(&self, names: &AddOptionNames) -> (Vec<(&'static str, String)>, &[TorrentFile]) {
        match &self.source {
            TorrentSource::Files(files) => (self.options.fields(names), files.as_slice()),
            TorrentSource::Urls(urls) => {
                let mut fields = vec![("urls", urls.join("\n"))];
                fields.extend(self.options.fields(names));
                (fields, &[])
            }
        }
    }
}

/// Torrent list filter understood by `/torrents/info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentListFilter {
    All,
    Downloading,
    Seeding,
    Completed,
    Paused,
    Active,
    Inactive,
    Resumed,
    Stalled,
    Errored,
}

impl TorrentListFilter {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Downloading => "downloading",
            Self::Seeding => "seeding",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Resumed => "resumed",
            Self::Stalled => "stalled",
            Self::Errored => "errored",
        }
    }
}

/// Parameters for listing torrents; everything is optional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrentListQuery {
    pub filter: Option<TorrentListFilter>,
    pub category: Option<String>,
    /// Property name to sort by, e.g. `"name"` or `"added_on"`
    pub sort: Option<String>,
    pub reverse: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<i64>,
}

impl TorrentListQuery {
    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        [
            ("filter", self.filter.map(|filter| filter.as_str().to_string())),
            ("category", self.category.clone()),
            ("sort", self.sort.clone()),
            ("reverse", self.reverse.map(|reverse| reverse.to_string())),
            ("limit", self.limit.map(|limit| limit.to_string())),
            ("offset", self.offset.map(|offset| offset.to_string())),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect()
    }
}

/// Parameters for reading the main log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub normal: bool,
    pub info: bool,
    pub warning: bool,
    pub critical: bool,
    /// Only entries with a greater id are returned
    pub last_known_id: Option<i64>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            normal: true,
            info: true,
            warning: true,
            critical: true,
            last_known_id: None,
        }
    }
}

impl LogQuery {
    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("normal", self.normal.to_string()),
            ("info", self.info.to_string()),
            ("warning", self.warning.to_string()),
            ("critical", self.critical.to_string()),
        ];
        if let Some(id) = self.last_known_id {
            params.push(("last_known_id", id.to_string()));
        }
        params
    }
}

/// One multipart field
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum Payload {
    #[default]
    Empty,
    Form(Vec<(String, String)>),
    Multipart(Vec<Part>),
}

/// A request lowered from an [`Endpoint`], ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub payload: Payload,
}

/// Lowers an operation into a [`PreparedRequest`]
///
/// The identity, if any, comes first, then the endpoint's fixed parameters,
/// then `params`. Files always precede text fields in multipart bodies.
/// `identity` must already be normalized.
pub(crate) fn prepare(
    endpoint: &Endpoint,
    identity: Option<&str>,
    params: Vec<(&'static str, String)>,
    files: &[TorrentFile],
) -> PreparedRequest {
    let mut path = endpoint.path.to_string();
    let mut scalars = Vec::with_capacity(params.len() + endpoint.fixed.len() + 1);

    if let Some(hash) = identity {
        match endpoint.identity {
            IdentityPlacement::Param(name) => scalars.push((name.to_string(), hash.to_string())),
            IdentityPlacement::PathSegment => {
                path.push('/');
                path.push_str(hash);
            }
            IdentityPlacement::None => {}
        }
    }
    scalars.extend(
        endpoint
            .fixed
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string())),
    );
    scalars.extend(params.into_iter().map(|(name, value)| (name.to_string(), value)));

    let mut query = Vec::new();
    let payload = match endpoint.encoding {
        Encoding::None => Payload::Empty,
        Encoding::Query => {
            query = scalars;
            Payload::Empty
        }
        Encoding::Form => Payload::Form(scalars),
        Encoding::Multipart => {
            let mut parts: Vec<Part> = files
                .iter()
                .map(|file| Part::File {
                    name: TORRENTS_FIELD.to_string(),
                    file_name: file.file_name.clone(),
                    data: file.data.clone(),
                })
                .collect();
            parts.extend(
                scalars
                    .into_iter()
                    .map(|(name, value)| Part::Text { name, value }),
            );
            Payload::Multipart(parts)
        }
    };

    PreparedRequest {
        method: endpoint.verb.method(),
        path,
        query,
        payload,
    }
}

impl PreparedRequest {
    /// Converts into a `reqwest` request against `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart part cannot be built
    pub(crate) fn into_builder(self, client: &Client, base_url: &str) -> Result<RequestBuilder> {
        let url = format!("{base_url}{}", self.path);
        let mut builder = client.request(self.method, url);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }

        let builder = match self.payload {
            Payload::Empty => builder,
            Payload::Form(fields) => builder.form(&fields),
            Payload::Multipart(parts) => {
                let mut form = multipart::Form::new();
                for part in parts {
                    form = match part {
                        Part::Text { name, value } => form.text(name, value),
                        Part::File {
                            name,
                            file_name,
                            data,
                        } => {
                            let part = multipart::Part::bytes(data)
                                .file_name(file_name)
                                .mime_str(TORRENT_MIME)?;
                            form.part(name, part)
                        }
                    };
                }
                builder.multipart(form)
            }
        };

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{ApiVersion, resolve};

    const HASH: &str = "778ce280b595e57780ff083f2eb6f897dfa4a4ee";

    fn v2() -> ApiVersion {
        ApiVersion::new(2, 8, 3)
    }

    fn names(version: ApiVersion) -> AddOptionNames {
        resolve(Operation::AddTorrentFiles, version).unwrap().add_options
    }

    fn text(name: &str, value: &str) -> Part {
        Part::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_unset_options_are_not_sent() {
        assert!(AddTorrentOptions::default().fields(&names(v2())).is_empty());

        let options = AddTorrentOptions {
            paused: Some(false),
            category: Some("linux".into()),
            ..Default::default()
        };
        assert_eq!(
            vec![("paused", "false".to_string()), ("category", "linux".to_string())],
            options.fields(&names(v2()))
        );
    }

    #[test]
    fn test_add_files_is_multipart_with_files_first() {
        let request = AddTorrentRequest::from_files([
            TorrentFile::new("a.torrent", b"d4:infoe".to_vec()),
            TorrentFile::new("b.torrent", b"d4:infoe".to_vec()),
        ])
        .paused(true)
        .save_path("/downloads");

        let endpoint = resolve(request.operation(), v2()).unwrap();
        let (fields, files) = request.fields(&endpoint.add_options);
        let prepared = prepare(&endpoint, None, fields, files);

        assert_eq!(Method::POST, prepared.method);
        assert_eq!("/api/v2/torrents/add", prepared.path);
        assert!(prepared.query.is_empty());
        let Payload::Multipart(parts) = prepared.payload else {
            panic!("expected multipart payload");
        };
        assert_eq!(4, parts.len());
        assert!(matches!(&parts[0], Part::File { name, file_name, .. } if name == "torrents" && file_name == "a.torrent"));
        assert!(matches!(&parts[1], Part::File { file_name, .. } if file_name == "b.torrent"));
        assert_eq!(text("paused", "true"), parts[2]);
        assert_eq!(text("savepath", "/downloads"), parts[3]);
    }

    #[test]
    fn test_add_urls_joins_locators() {
        let request = AddTorrentRequest::from_urls([
            "magnet:?xt=urn:btih:778ce280b595e57780ff083f2eb6f897dfa4a4ee",
            "http://releases.ubuntu.com/16.04/ubuntu.iso.torrent",
        ])
        .paused(true);

        let legacy = resolve(Operation::AddTorrentUrls, ApiVersion::legacy(18)).unwrap();
        let (fields, files) = request.fields(&legacy.add_options);
        assert!(files.is_empty());
        assert_eq!(
            vec![
                (
                    "urls",
                    "magnet:?xt=urn:btih:778ce280b595e57780ff083f2eb6f897dfa4a4ee\nhttp://releases.ubuntu.com/16.04/ubuntu.iso.torrent"
                        .to_string()
                ),
                ("paused", "true".to_string()),
            ],
            fields
        );

        let prepared = prepare(&legacy, None, fields, files);
        assert_eq!("/command/download", prepared.path);
        assert!(matches!(prepared.payload, Payload::Form(ref form) if form.len() == 2));
    }

    #[test]
    fn test_options_serialize_identically_for_both_variants() {
        let options = AddTorrentOptions {
            paused: Some(true),
            skip_checking: Some(true),
            sequential_download: Some(false),
            create_root_folder: Some(true),
            ..Default::default()
        };
        let files = AddTorrentRequest::from_files([TorrentFile::new("a.torrent", vec![1])])
            .options(options.clone());
        let urls = AddTorrentRequest::from_urls(["magnet:?xt=urn:btih:abc"]).options(options);

        let (file_fields, _) = files.fields(&names(v2()));
        let (url_fields, _) = urls.fields(&names(v2()));
        assert_eq!(file_fields[..], url_fields[1..]);
    }

    #[test]
    fn test_renamed_options_follow_version() {
        let options = AddTorrentOptions {
            paused: Some(true),
            create_root_folder: Some(false),
            ..Default::default()
        };

        assert_eq!(
            vec![("paused", "true".to_string()), ("root_folder", "false".to_string())],
            options.fields(&names(ApiVersion::legacy(18)))
        );
        assert_eq!(
            vec![("paused", "true".to_string()), ("contentLayout", "NoSubfolder".to_string())],
            options.fields(&names(v2()))
        );

        let options = AddTorrentOptions {
            create_root_folder: Some(true),
            ..options
        };
        assert_eq!(
            vec![("stopped", "true".to_string()), ("contentLayout", "Subfolder".to_string())],
            options.fields(&names(ApiVersion::new(2, 11, 2)))
        );
    }

    #[test]
    fn test_validate() {
        assert!(AddTorrentRequest::from_files([]).validate().is_err());
        assert!(AddTorrentRequest::from_urls(Vec::<String>::new()).validate().is_err());
        assert!(
            AddTorrentRequest::from_files([TorrentFile::new("a.torrent", Vec::new())])
                .validate()
                .is_err()
        );
        assert!(AddTorrentRequest::from_files([TorrentFile::new("", vec![1])]).validate().is_err());
        assert!(AddTorrentRequest::from_urls(["ftp://example.com/a.torrent"]).validate().is_err());
        assert!(AddTorrentRequest::from_urls(["magnet:?xt=urn:btih:abc"]).validate().is_ok());
    }

    #[test]
    fn test_lookup_identity_placement() {
        let v2_props = resolve(Operation::Properties, v2()).unwrap();
        let prepared = prepare(&v2_props, Some(HASH), Vec::new(), &[]);
        assert_eq!(Method::GET, prepared.method);
        assert_eq!("/api/v2/torrents/properties", prepared.path);
        assert_eq!(vec![("hash".to_string(), HASH.to_string())], prepared.query);
        assert_eq!(Payload::Empty, prepared.payload);

        let legacy_props = resolve(Operation::Properties, ApiVersion::legacy(18)).unwrap();
        let prepared = prepare(&legacy_props, Some(HASH), Vec::new(), &[]);
        assert_eq!(format!("/query/propertiesGeneral/{HASH}"), prepared.path);
        assert!(prepared.query.is_empty());
    }

    #[test]
    fn test_fixed_params_follow_identity() {
        let delete = resolve(Operation::DeleteWithData, v2()).unwrap();
        let prepared = prepare(&delete, Some(HASH), Vec::new(), &[]);
        assert_eq!(
            Payload::Form(vec![
                ("hashes".to_string(), HASH.to_string()),
                ("deleteFiles".to_string(), "true".to_string()),
            ]),
            prepared.payload
        );
    }

    #[test]
    fn test_list_and_log_params() {
        let query = TorrentListQuery {
            filter: Some(TorrentListFilter::Completed),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(
            vec![("filter", "completed".to_string()), ("limit", "10".to_string())],
            query.params()
        );

        let log = LogQuery {
            normal: false,
            last_known_id: Some(41),
            ..Default::default()
        };
        assert_eq!(
            vec![
                ("normal", "false".to_string()),
                ("info", "true".to_string()),
                ("warning", "true".to_string()),
                ("critical", "true".to_string()),
                ("last_known_id", "41".to_string()),
            ],
            log.params()
        );
    }
}
