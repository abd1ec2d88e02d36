//! Remote filenames for the two artifact variants.

use crate::types::ArtifactKind;

const CLEAN_SUFFIX: &str = "-clean.jpg";
const SIDE_DOCUMENT: &str = "cam.json";

/// Make `text` safe for a remote filename: spaces become underscores,
/// non-ASCII characters are dropped, and leading/trailing `-`/`_` trimmed.
pub fn sanitize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    cleaned.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// `{location}-{camera}.jpg` or `{location}-{camera}-clean.jpg`.
pub fn artifact_filename(location: &str, camera: &str, kind: ArtifactKind) -> String {
    let stem = format!("{}-{}", sanitize(location), sanitize(camera));
    match kind {
        ArtifactKind::Full => format!("{stem}.jpg"),
        ArtifactKind::Clean => format!("{stem}{CLEAN_SUFFIX}"),
    }
}

/// The full-artifact filename paired with a clean one.
pub fn full_sibling(clean_filename: &str) -> String {
    match clean_filename.strip_suffix(CLEAN_SUFFIX) {
        Some(stem) => format!("{stem}.jpg"),
        None => clean_filename.to_string(),
    }
}

/// Join a remote directory and a filename with exactly one `/`.
pub fn remote_join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

pub fn side_document_path(remote_dir: &str) -> String {
    remote_join(remote_dir, SIDE_DOCUMENT)
}
