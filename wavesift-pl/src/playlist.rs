//! Playlist file output
//!
//! A playlist is an ordered list of file paths, one per line, newline-joined.

use std::path::Path;

use wavesift_common::Result;

/// Write a playlist file.
pub fn write_playlist(path: &Path, tracks: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, tracks.join("\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_is_newline_joined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists").join("set.txt");
        let tracks = vec![
            "data/a.mp3".to_string(),
            "data/b.mp3".to_string(),
            "data/c.mp3".to_string(),
        ];

        write_playlist(&path, &tracks).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "data/a.mp3\ndata/b.mp3\ndata/c.mp3");
    }

    #[test]
    fn empty_playlist_is_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        write_playlist(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
