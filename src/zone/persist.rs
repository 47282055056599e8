use crate::error::AppError;
use crate::zone::Zone;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write one `[x1, y1, x2, y2]` line per zone to `<dir>/<filename>.txt`.
pub async fn save_zones(dir: &Path, filename: &str, zones: &[Zone]) -> Result<PathBuf, AppError> {
    if zones.is_empty() {
        return Err(AppError::Persist("no zones to save".to_string()));
    }
    if filename.is_empty() || filename.contains(['/', '\\']) || filename.contains("..") {
        return Err(AppError::Persist(format!("invalid filename: {filename:?}")));
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|err| AppError::Persist(err.to_string()))?;

    let path = dir.join(format!("{filename}.txt"));
    tokio::fs::write(&path, format_zones(zones))
        .await
        .map_err(|err| AppError::Persist(err.to_string()))?;

    info!(path = %path.display(), count = zones.len(), "Zones saved");
    Ok(path)
}

fn format_zones(zones: &[Zone]) -> String {
    zones
        .iter()
        .map(|z| format!("[{}, {}, {}, {}]\n", z.x1, z.y1, z.x2, z.y2))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[tokio::test]
    async fn save_zones_writes_one_line_per_zone() -> Result<(), Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let dir = std::env::temp_dir().join(format!("parkwatch-zones-{unique}"));
        let zones = [
            Zone::from_corners((10, 10), (60, 60))?,
            Zone::from_corners((200, 40), (100, 5))?,
        ];

        let path = save_zones(&dir, "lot-a", &zones).await?;
        let contents = std::fs::read_to_string(&path)?;
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(contents, "[10, 10, 60, 60]\n[100, 5, 200, 40]\n");
        assert!(path.ends_with("lot-a.txt"));
        Ok(())
    }

    #[tokio::test]
    async fn save_zones_rejects_empty_set_and_path_traversal() -> Result<(), AppError> {
        let dir = std::env::temp_dir();
        let zone = Zone::from_corners((0, 0), (40, 40))?;

        assert!(matches!(
            save_zones(&dir, "lot", &[]).await,
            Err(AppError::Persist(_))
        ));
        assert!(matches!(
            save_zones(&dir, "../escape", &[zone]).await,
            Err(AppError::Persist(_))
        ));
        Ok(())
    }
}
