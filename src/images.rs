use std::path::{Path, PathBuf};

/// Resolve a paper's image file against the image directory. An empty name
/// or a file that is not on disk resolves to `None`; the caller shows a
/// blank panel in that case, it is never an error.
pub fn resolve_image(img_dir: &Path, img_file: &str) -> Option<PathBuf> {
    let name = img_file.trim();
    if name.is_empty() {
        return None;
    }

    let path = img_dir.join(name);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_test_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("paper-browser-{prefix}-{nanos}"))
    }

    #[test]
    fn empty_name_resolves_to_nothing() {
        assert_eq!(resolve_image(Path::new("/tmp"), ""), None);
        assert_eq!(resolve_image(Path::new("/tmp"), "   "), None);
    }

    #[test]
    fn missing_file_resolves_to_nothing() {
        let dir = unique_test_dir("missing-img");
        assert_eq!(resolve_image(&dir, "7001.png"), None);
    }

    #[test]
    fn existing_file_resolves_to_its_path() {
        let dir = unique_test_dir("img");
        fs::create_dir_all(&dir).expect("should create temp dir");
        let file = dir.join("7001.png");
        fs::write(&file, b"not really a png").expect("should write file");

        assert_eq!(resolve_image(&dir, "7001.png"), Some(file));

        fs::remove_dir_all(&dir).expect("should cleanup temp dir");
    }
}
