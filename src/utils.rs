use crate::entities::TorrentState::{Downloading, ForcedDl, ForcedMetaDl, ForcedUp, MetaDl, Uploading};
use crate::entities::{TorrentInfo, TorrentProperties};
use byte_unit::{Byte, UnitType};

/// ETA the daemon reports when it cannot estimate one (100 days)
pub const ETA_INFINITY: i64 = 8_640_000;

fn format_size(bytes: u64) -> String {
    let size = Byte::from(bytes);
    format!("{:#.2}", size.get_appropriate_unit(UnitType::Decimal))
}

impl TorrentInfo {
    #[must_use]
    pub fn calculate_size(&self) -> String {
        format_size(self.size)
    }

    /// Progress in percent, rounded
    #[must_use]
    pub fn calculate_progress(&self) -> f64 {
        Some((self.progress * 100.0).round())
            .take_if(|x| !x.is_nan())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn calculate_speed(&self) -> String {
        let speed = match self.state {
            Downloading | ForcedDl | MetaDl | ForcedMetaDl => self.dlspeed,
            Uploading | ForcedUp => self.upspeed,
            _ => return String::new(),
        };

        Some(speed)
            .take_if(|speed| *speed > 0u64)
            .map(|speed| {
                format!(
                    "({:#.2}/s)",
                    Byte::from(speed).get_appropriate_unit(UnitType::Decimal)
                )
            })
            .unwrap_or_default()
    }

    pub fn calculate_time_left(&self) -> String {
        if !matches!(self.state, Downloading | ForcedDl) {
            return String::new();
        }

        let eta = if self.eta >= ETA_INFINITY { -1 } else { self.eta };
        format!("⏳Time left: {}", convert_time_left(eta))
    }
}

impl TorrentProperties {
    /// Total size, `Unknown` until the torrent has metadata
    #[must_use]
    pub fn calculate_size(&self) -> String {
        self.total_size
            .map(format_size)
            .unwrap_or_else(|| String::from("Unknown"))
    }
}

#[must_use]
pub fn convert_time_left(input: i64) -> String {
    if input < 0 {
        return String::from("Unknown");
    }

    if input < 60 {
        return format!("{input} s");
    }

    if input < 3600 {
        let minutes = input / 60;
        let seconds = input % 60;
        return format!("{minutes} m {seconds} s");
    }

    if input < 86400 {
        let hours = input / 3600;
        let minutes = input % 3600 / 60;
        return format!("{hours} h {minutes} m");
    }

    let days = input / 86400;
    let hours = input % 86400 / 3600;
    let minutes = input % 3600 / 60;
    format!("{days} d {hours} h {minutes} m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TorrentState::PausedDl;

    fn create_test_torrent() -> TorrentInfo {
        serde_json::from_str(
            r#"{
                "hash": "778CE280B595E57780FF083F2EB6F897DFA4A4EE",
                "name": "ubuntu-16.04.4-desktop-amd64.iso",
                "size": 1234567890,
                "progress": 0.4567,
                "dlspeed": 98765,
                "upspeed": 45678,
                "eta": 12500,
                "state": "downloading"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_calculate_size() {
        let torrent = create_test_torrent();
        assert_eq!("1.23 GB", torrent.calculate_size());
    }

    #[test]
    fn test_calculate_progress() {
        let torrent = create_test_torrent();
        assert!((torrent.calculate_progress() - 46.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_calculate_speed() {
        let mut torrent = create_test_torrent();
        assert_eq!("(98.77 KB/s)", torrent.calculate_speed());

        torrent.state = Uploading;
        assert_eq!("(45.68 KB/s)", torrent.calculate_speed());

        torrent.state = PausedDl;
        assert_eq!("", torrent.calculate_speed());
    }

    #[test]
    fn test_calculate_time_left() {
        let mut torrent = create_test_torrent();
        assert_eq!("⏳Time left: 3 h 28 m", torrent.calculate_time_left());

        torrent.eta = ETA_INFINITY;
        assert_eq!("⏳Time left: Unknown", torrent.calculate_time_left());
    }

    #[test]
    fn test_properties_size() {
        let mut props: TorrentProperties = serde_json::from_str(
            r#"{"save_path":"/downloads/","piece_size":524288,"total_size":1310720}"#,
        )
        .unwrap();
        assert_eq!("1.31 MB", props.calculate_size());

        props.total_size = None;
        assert_eq!("Unknown", props.calculate_size());
    }

    #[test]
    fn test_convert_time_left() {
        assert_eq!("Unknown", convert_time_left(-1));
        assert_eq!("59 s", convert_time_left(59));
        assert_eq!("1 m 1 s", convert_time_left(61));
        assert_eq!("1 d 1 h 1 m", convert_time_left(90_061));
    }
}
