//! Response decoding.
//!
//! Each response is classified into a value, an absent value (`Ok(None)`) or
//! a failure. Only endpoints flagged with the absence convention ever produce
//! `Ok(None)`: the daemon answers an unknown hash either with an empty 2xx body
//! or, on newer releases, with a 404. A JSON `[]` is a legitimately empty
//! list and stays `Ok(Some(vec![]))`.

use crate::endpoint::Endpoint;
use crate::entities::PieceState;
use crate::error::{QbitError, Result};
use crate::hash;
use log::debug;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// Body the daemon returns when it refuses a login or a torrent submission
pub const FAILS: &str = "Fails.";

/// Status and body of one exchange, read to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }

    fn message(&self) -> String {
        if self.is_blank() {
            self.status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string()
        } else {
            self.body.trim().to_string()
        }
    }

    /// Fails on any non-2xx status
    ///
    /// # Errors
    ///
    /// - [`QbitError::SessionExpired`] for 401/403
    /// - [`QbitError::Api`] for every other non-2xx status
    pub fn ensure_success(&self) -> Result<()> {
        let status = self.status;
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(QbitError::SessionExpired {
                status: status.as_u16(),
            });
        }

        Err(QbitError::Api {
            status: status.as_u16(),
            message: self.message(),
        })
    }
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|err| QbitError::UnexpectedResponse(format!("Failed to parse API response: {err}")))
}

/// Decodes a per-torrent query honoring the endpoint's absence convention
pub(crate) fn decode_lookup<T: DeserializeOwned>(
    raw: &RawResponse,
    endpoint: &Endpoint,
) -> Result<Option<T>> {
    if endpoint.absence && raw.status == StatusCode::NOT_FOUND {
        debug!("{} reported an unknown torrent (404)", endpoint.path);
        return Ok(None);
    }
    raw.ensure_success()?;
    if endpoint.absence && raw.is_blank() {
        debug!("{} reported an unknown torrent (empty body)", endpoint.path);
        return Ok(None);
    }

    parse_json(&raw.body).map(Some)
}

/// Decodes a JSON body that must be present
pub(crate) fn decode_json<T: DeserializeOwned>(raw: &RawResponse) -> Result<T> {
    raw.ensure_success()?;
    if raw.is_blank() {
        return Err(QbitError::UnexpectedResponse("Empty response body".into()));
    }
    parse_json(&raw.body)
}

/// Decodes a plain text body, trimmed
pub(crate) fn decode_text(raw: &RawResponse) -> Result<String> {
    raw.ensure_success()?;
    Ok(raw.body.trim().to_string())
}

/// Decodes the reply to an add-torrent submission
pub(crate) fn decode_add(raw: &RawResponse) -> Result<()> {
    if raw.status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
        return Err(QbitError::TorrentAdd(raw.message()));
    }
    raw.ensure_success()?;
    if raw.body.trim() == FAILS {
        return Err(QbitError::TorrentAdd(
            "qBittorrent could not add the torrent".into(),
        ));
    }
    Ok(())
}

fn check_piece_count(actual: usize, expected: usize) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(QbitError::UnexpectedResponse(format!(
            "Expected {expected} pieces, got {actual}"
        )))
    }
}

/// Decodes piece states, which must cover exactly `expected` pieces
pub(crate) fn decode_piece_states(
    raw: &RawResponse,
    endpoint: &Endpoint,
    expected: usize,
) -> Result<Option<Vec<PieceState>>> {
    let Some(states) = decode_lookup::<Vec<PieceState>>(raw, endpoint)? else {
        return Ok(None);
    };
    check_piece_count(states.len(), expected)?;
    Ok(Some(states))
}

/// Hex lengths of SHA-1 (v1) and SHA-256 (v2) piece hashes
const PIECE_HASH_LENS: [usize; 2] = [hash::HASH_LEN, 64];

fn normalize_piece_hash(piece: &str) -> Result<String> {
    if PIECE_HASH_LENS.contains(&piece.len()) && piece.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(piece.to_ascii_lowercase())
    } else {
        Err(QbitError::UnexpectedResponse(format!("Malformed piece hash: {piece:?}")))
    }
}

/// Decodes piece hashes, which must cover exactly `expected` pieces. Hashes are lowercased.
pub(crate) fn decode_piece_hashes(
    raw: &RawResponse,
    endpoint: &Endpoint,
    expected: usize,
) -> Result<Option<Vec<String>>> {
    let Some(hashes) = decode_lookup::<Vec<String>>(raw, endpoint)? else {
        return Ok(None);
    };
    check_piece_count(hashes.len(), expected)?;

    hashes
        .into_iter()
        .map(|piece| normalize_piece_hash(&piece))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}
