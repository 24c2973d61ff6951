//! ID3 tags written into each clip before it is stored
//!
//! Frames used (ID3v2.4):
//! - `TCOP` copyright / license
//! - `TLAN` language (dataset locale)
//! - `TALB` album, holding the sentence CID
//! - `TOLY` original lyricist, holding the speaker's client id
//!
//! Existing frames are kept; a clip without a tag gets a new one.

use crate::error::{ImportError, ImportResult};
use id3::{Tag, TagLike, Version};
use std::path::{Path, PathBuf};

const FRAME_COPYRIGHT: &str = "TCOP";
const FRAME_LANGUAGE: &str = "TLAN";
const FRAME_ALBUM: &str = "TALB";
const FRAME_AUTHOR: &str = "TOLY";

/// Values written into a clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipTags {
    pub copyright: String,
    pub language: String,
    pub album: String,
    pub author: String,
}

/// Write `tags` into the file at `path`, blocking
pub fn write_clip_tags(path: &Path, tags: &ClipTags) -> ImportResult<()> {
    let tag_error = |message: String| ImportError::Tag {
        path: path.to_path_buf(),
        message,
    };

    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => Tag::new(),
        Err(e) => {
            let message = e.to_string();
            match e.partial_tag {
                // Keep whatever frames were readable
                Some(partial) => {
                    tracing::debug!(path = %path.display(), error = %message, "Partially readable ID3 tag");
                    partial
                }
                None => return Err(tag_error(message)),
            }
        }
    };

    tag.set_text(FRAME_COPYRIGHT, tags.copyright.as_str());
    tag.set_text(FRAME_LANGUAGE, tags.language.as_str());
    tag.set_text(FRAME_ALBUM, tags.album.as_str());
    tag.set_text(FRAME_AUTHOR, tags.author.as_str());

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| tag_error(e.to_string()))
}

/// Write tags on the blocking thread pool
pub async fn write_clip_tags_blocking(path: PathBuf, tags: ClipTags) -> ImportResult<()> {
    tokio::task::spawn_blocking(move || write_clip_tags(&path, &tags))
        .await
        .map_err(|e| ImportError::Worker(format!("Tag task failed: {}", e)))?
}

/// Read back the four import tags, `None` when the clip has no tag
pub fn read_clip_tags(path: &Path) -> ImportResult<Option<ClipTags>> {
    let tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => return Ok(None),
        Err(e) => {
            return Err(ImportError::Tag {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };

    let text = |id: &str| {
        tag.get(id)
            .and_then(|frame| frame.content().text())
            .unwrap_or_default()
            .to_string()
    };

    Ok(Some(ClipTags {
        copyright: text(FRAME_COPYRIGHT),
        language: text(FRAME_LANGUAGE),
        album: text(FRAME_ALBUM),
        author: text(FRAME_AUTHOR),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tags() -> ClipTags {
        ClipTags {
            copyright: "CC0-1.0".to_string(),
            language: "fy-NL".to_string(),
            album: "QmSentence".to_string(),
            author: "client-42".to_string(),
        }
    }

    #[test]
    fn test_untagged_file_gets_new_tag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, vec![0u8; 256]).unwrap();

        assert_eq!(read_clip_tags(&path).unwrap(), None);
        write_clip_tags(&path, &sample_tags()).unwrap();
        assert_eq!(read_clip_tags(&path).unwrap(), Some(sample_tags()));
    }

    #[test]
    fn test_existing_frames_preserved_and_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, vec![0u8; 256]).unwrap();

        let mut tag = Tag::new();
        tag.set_title("Keep me");
        tag.set_album("old album");
        tag.write_to_path(&path, Version::Id3v24).unwrap();

        write_clip_tags(&path, &sample_tags()).unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Keep me"));
        assert_eq!(tag.album(), Some("QmSentence"));
    }

    #[test]
    fn test_missing_file_is_tag_error() {
        let result = write_clip_tags(Path::new("/nonexistent/clip.mp3"), &sample_tags());
        assert!(matches!(result, Err(ImportError::Tag { .. })));
    }
}
