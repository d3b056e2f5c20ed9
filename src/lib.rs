//!# qBittorrent Web API Client
//!
//! A Rust client library for the qBittorrent Web API. Log in, submit torrents
//! and inspect them through a strongly-typed interface.
//!
//! ## Features
//!
//! - Cookie session authentication, safe to share between concurrent tasks
//! - Web API version negotiation covering the legacy API and `/api/v2`
//! - Add torrents from `.torrent` files or from URLs/magnet links
//! - Torrent list, properties, contents, trackers, web seeds
//! - Piece states and piece hashes, checked against the declared piece count
//! - Pause, resume and delete torrents; read the main log
//! - Unknown torrents come back as `None`, never as an empty list
//! - Human-readable file sizes, progress calculation and ETA
//!
//! ## Usage example
//!
//! ```rust,no_run
//! use anyhow::Result;
//! use std::env;
//! use qbittorrent_web_client::client::QBittorrentClient;
//! use qbittorrent_web_client::request::{AddTorrentRequest, TorrentListQuery};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let client = QBittorrentClient::builder()
//!         .url(env::var("QBITTORRENT_URL")?)
//!         .build()?;
//!
//!     client.login("admin", &env::var("QBITTORRENT_PASSWORD")?).await?;
//!
//!     let magnet = "magnet:?xt=urn:btih:778ce280b595e57780ff083f2eb6f897dfa4a4ee";
//!     client
//!         .add_torrents(&AddTorrentRequest::from_urls([magnet]).paused(true))
//!         .await?;
//!
//!     for torrent in client.get_torrent_list(&TorrentListQuery::default()).await? {
//!         println!("{}: {} ({:?})", torrent.hash, torrent.name, torrent.state);
//!     }
//!
//!     match client.get_torrent_trackers("778ce280b595e57780ff083f2eb6f897dfa4a4ee").await? {
//!         Some(trackers) => println!("{} tracker(s)", trackers.len()),
//!         None => println!("torrent not registered yet"),
//!     }
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoint;
pub mod entities;
pub mod error;
pub mod hash;
pub mod request;
mod response;
pub mod session;
pub mod utils;

pub use client::{QBittorrentClient, QBittorrentClientBuilder};
pub use error::{QbitError, Result};
