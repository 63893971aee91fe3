/// Stage Module
///
/// Uploads a serialized payload to the staging bucket under a name that
/// makes every artifact traceable to exactly the (dataset, window, run)
/// that produced it: the dataset type, a run-unique time-derived token,
/// and both window bounds.
use crate::errors::RegenError;
use crate::gcp::storage::StagingStore;
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};

/// Handle to an uploaded payload. Created once per (dataset, window)
/// pair, consumed exactly once by the replacer, never reused.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub location: String,
    pub bucket: String,
    pub name: String,
    #[allow(dead_code)]
    pub dataset: String,
    #[allow(dead_code)]
    pub window: TimeWindow,
}

/// Build the staged object name. The token is base36 of the current
/// epoch microseconds, which is enough to avoid collisions across
/// repeated or concurrent runs over the same window.
pub fn staged_file_name(dataset: &str, window: &TimeWindow, now: DateTime<Utc>) -> String {
    let token = base36(now.timestamp_micros().max(0) as u64);
    format!(
        "{}_regeneration/{}_{}_{}_{}.csv",
        dataset,
        dataset,
        token,
        window.ini_string(),
        window.end_string()
    )
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

/// Upload a payload for one (dataset, window) pair and return its handle.
/// A failed upload is fatal: the replacer cannot load without the staged
/// artifact.
pub async fn upload(
    store: &StagingStore,
    dataset: &str,
    window: &TimeWindow,
    payload: String,
) -> Result<StagedFile, RegenError> {
    let name = staged_file_name(dataset, window, Utc::now());
    store.upload(&name, payload).await?;

    Ok(StagedFile {
        location: format!("gs://{}/{}", store.bucket(), name),
        bucket: store.bucket().to_string(),
        name,
        dataset: dataset.to_string(),
        window: *window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> TimeWindow {
        TimeWindow {
            start: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2023, 1, 1, 1, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_name_encodes_dataset_token_and_bounds() {
        let now = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let name = staged_file_name("sessions", &window(), now);

        assert!(name.starts_with("sessions_regeneration/sessions_"));
        assert!(name.contains("2023-01-01T00:00:00.000Z"));
        assert!(name.contains("2023-01-01T01:00:00.000Z"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_names_differ_across_runs_over_the_same_window() {
        let first = staged_file_name("sessions", &window(), Utc.timestamp_micros(1_000_000).unwrap());
        let second = staged_file_name("sessions", &window(), Utc.timestamp_micros(2_000_000).unwrap());
        assert_ne!(first, second);
    }

    #[test]
    fn test_base36() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(1_679_616), "10000");
    }

    #[tokio::test]
    async fn test_upload_returns_traceable_handle() {
        let store = StagingStore::memory("staging-test");
        let staged = upload(&store, "sessions", &window(), "a,b\n1,x".to_string()).await.unwrap();

        assert_eq!(staged.dataset, "sessions");
        assert_eq!(staged.location, format!("gs://staging-test/{}", staged.name));
        assert!(store.exists(&staged.name).await.unwrap());
        assert_eq!(store.read(&staged.name).await.unwrap(), "a,b\n1,x");
    }
}
