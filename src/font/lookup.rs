use camino::Utf8Path;
use camino::Utf8PathBuf;

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf"];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Search `dirs` for a font file whose stem matches `name`.
///
/// Style suffixes in fontconfig notation (`"DejaVu Sans:bold"`) are ignored.
pub(super) fn find_in_dirs(dirs: &[Utf8PathBuf], name: &str) -> Option<Utf8PathBuf> {
    let family = name.split(':').next().unwrap_or(name);
    let wanted = normalize(family);
    if wanted.is_empty() {
        return None;
    }

    dirs.iter()
        .flat_map(|dir| walkdir::WalkDir::new(dir).follow_links(true))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::trace!(%error, "Skipping unreadable font directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
        .find(|path| is_match(path, &wanted))
}

fn is_match(path: &Utf8Path, wanted: &str) -> bool {
    let has_font_extension = path
        .extension()
        .is_some_and(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));

    has_font_extension && path.file_stem().is_some_and(|stem| normalize(stem) == wanted)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::find_in_dirs;

    fn font_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("truetype/dejavu")).unwrap();
        std::fs::write(root.join("truetype/dejavu/DejaVu-Sans.ttf"), b"").unwrap();
        std::fs::write(root.join("truetype/dejavu/DejaVu-Sans.txt"), b"").unwrap();
        (dir, root)
    }

    #[test]
    fn finds_by_loose_name() {
        let (_guard, root) = font_dir();
        let found = find_in_dirs(&[root.clone()], "dejavu sans:bold");
        assert_eq!(found, Some(root.join("truetype/dejavu/DejaVu-Sans.ttf")));
    }

    #[test]
    fn misses_unknown_names() {
        let (_guard, root) = font_dir();
        assert_eq!(find_in_dirs(&[root.clone()], "Comic Sans"), None);
        assert_eq!(find_in_dirs(&[root], ""), None);
    }

    #[test]
    fn missing_directories_are_skipped() {
        assert_eq!(
            find_in_dirs(&[Utf8PathBuf::from("/does/not/exist")], "anything"),
            None
        );
    }
}
