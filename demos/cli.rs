use anyhow::Result;
use qbittorrent_web_client::client::QBittorrentClientBuilder;
use qbittorrent_web_client::request::TorrentListQuery;
use std::env;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let client = QBittorrentClientBuilder::from_env()?.build()?;

    let username = env::var("QBITTORRENT_USERNAME")?;
    let password = env::var("QBITTORRENT_PASSWORD")?;
    client.login(&username, &password).await?;

    println!(
        "qBittorrent {} (Web API {})",
        client.get_qbittorrent_version().await?,
        client.api_version().await?
    );

    let torrents = client.get_torrent_list(&TorrentListQuery::default()).await?;
    for torrent in torrents {
        println!(
            "torrent: {}, name: {}, size: {}, progress: {}% {} {}",
            torrent.hash,
            torrent.name,
            torrent.calculate_size(),
            torrent.calculate_progress(),
            torrent.calculate_speed(),
            torrent.calculate_time_left()
        );
    }

    client.logout().await?;

    Ok(())
}
