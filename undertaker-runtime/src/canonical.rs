//! Normalization of raw runtime fields into snapshot records

use chrono::{DateTime, ParseError, Utc};
use std::time::SystemTime;
use undertaker_core::{ContainerStatus, ImageRef};

/// Tag Docker reports for an untagged image
pub const UNTAGGED: &str = "<none>:<none>";

/// Container name without the leading slash the Engine API puts on it
#[must_use]
pub fn container_name(raw: &str) -> String {
    raw.strip_prefix('/').unwrap_or(raw).to_string()
}

/// Drop placeholder tags
#[must_use]
pub fn repo_tags(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .filter(|tag| !tag.is_empty() && tag != UNTAGGED)
        .collect()
}

/// Parse a container's `FinishedAt` timestamp.
///
/// Docker reports `0001-01-01T00:00:00Z` for containers that never finished;
/// that, an empty string, and anything before the Unix epoch yield
/// `Ok(None)`. Text that is present but not RFC 3339 is an error.
///
/// # Errors
/// Returns the parse error for a malformed timestamp
pub fn finished_at(raw: &str) -> Result<Option<SystemTime>, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let parsed = DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc);
    if parsed.timestamp() <= 0 {
        Ok(None)
    } else {
        Ok(Some(SystemTime::from(parsed)))
    }
}

/// Combine an inspected image reference with the raw `FinishedAt` text.
///
/// An exited container whose timestamp cannot be parsed has an unknown age,
/// so its image is replaced by [`ImageRef::Unavailable`] and the record is
/// reported as inconsistent rather than treated as infinitely old. For any
/// other status the exit time is irrelevant and a bad one is dropped.
#[must_use]
pub fn exit_state(
    status: &ContainerStatus,
    image: ImageRef,
    raw_finished_at: Option<&str>,
) -> (ImageRef, Option<SystemTime>) {
    match raw_finished_at.map(finished_at).transpose() {
        Ok(exited_at) => (image, exited_at.flatten()),
        Err(err) if status.is_exited() => {
            let raw = raw_finished_at.unwrap_or_default();
            tracing::warn!(value = raw, error = %err, "Unparseable FinishedAt timestamp");
            (
                ImageRef::Unavailable(format!("unparseable FinishedAt {raw:?}: {err}")),
                None,
            )
        }
        Err(_) => (image, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_container_name() {
        assert_eq!(container_name("/web"), "web");
        assert_eq!(container_name("web"), "web");
        assert_eq!(container_name("/"), "");
    }

    #[test]
    fn test_repo_tags() {
        let tags = repo_tags(vec![
            "app:latest".to_string(),
            UNTAGGED.to_string(),
            String::new(),
        ]);
        assert_eq!(tags, ["app:latest"]);
    }

    #[test]
    fn test_finished_at() {
        assert_eq!(
            finished_at("2023-11-14T22:13:20Z").unwrap(),
            Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
        assert_eq!(
            finished_at("2023-11-14T22:13:20.5+00:00").unwrap(),
            Some(UNIX_EPOCH + Duration::from_millis(1_700_000_000_500))
        );
        assert_eq!(finished_at("0001-01-01T00:00:00Z").unwrap(), None);
        assert_eq!(finished_at("").unwrap(), None);
        assert!(finished_at("yesterday").is_err());
        assert!(finished_at("2023-11-14 22:10:00").is_err());
    }

    #[test]
    fn test_exit_state_malformed_timestamp_marks_exited_record() {
        let image = ImageRef::Reference("app:latest".to_string());

        let (image_ref, exited_at) = exit_state(
            &ContainerStatus::Exited,
            image.clone(),
            Some("2023-11-14 22:10:00"),
        );
        assert!(matches!(image_ref, ImageRef::Unavailable(ref reason) if reason.contains("FinishedAt")));
        assert_eq!(exited_at, None);

        // A running container keeps its image so it still protects it
        let (image_ref, exited_at) = exit_state(
            &ContainerStatus::Other("running".to_string()),
            image.clone(),
            Some("garbage"),
        );
        assert_eq!(image_ref, image);
        assert_eq!(exited_at, None);
    }

    #[test]
    fn test_exit_state_missing_or_zero_timestamp() {
        let image = ImageRef::Reference("app:latest".to_string());

        for raw in [None, Some(""), Some("0001-01-01T00:00:00Z")] {
            let (image_ref, exited_at) = exit_state(&ContainerStatus::Exited, image.clone(), raw);
            assert_eq!(image_ref, image);
            assert_eq!(exited_at, None);
        }

        let (_, exited_at) = exit_state(
            &ContainerStatus::Exited,
            image,
            Some("2023-11-14T22:13:20Z"),
        );
        assert_eq!(exited_at, Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000)));
    }
}
