//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Frame assets
//!
//! A stage key resolves to a directory of pre-rendered frames. Loading never fails
//! from the caller's point of view: a missing directory, an empty directory or a
//! directory where nothing decodes all yield an empty [`FrameSet`], and the caller
//! decides how to abort. Files that fail to decode are skipped one at a time.

use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors encountered while loading a stage directory. Logged, never returned past
/// [`AssetProvider::load`].
#[derive(Debug, Error)]
pub enum AssetLoadError {
    #[error("Asset directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("Failed to read asset directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No .{extension} frames in {path}")]
    NoMatchingFiles { path: PathBuf, extension: String },

    #[error("Every frame in {0} failed to decode")]
    AllFramesFailed(PathBuf),

    #[error("Failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Opaque handle to one decoded frame. Clones share the pixel buffer.
#[derive(Clone)]
pub struct FrameHandle {
    name: Arc<str>,
    image: Arc<RgbaImage>,
}

impl FrameHandle {
    pub fn new(name: impl Into<Arc<str>>, image: RgbaImage) -> Self {
        Self {
            name: name.into(),
            image: Arc::new(image),
        }
    }

    /// A frame filled with a single color
    pub fn solid(name: impl Into<Arc<str>>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(name, RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHandle")
            .field("name", &self.name)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Ordered, immutable sequence of frames for one stage
#[derive(Debug, Clone, Default)]
pub struct FrameSet(Arc<[FrameHandle]>);

impl FrameSet {
    pub fn new(frames: Vec<FrameHandle>) -> Self {
        Self(frames.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Grey stand-in frames used when the idle loop has no assets
    pub fn placeholder(count: usize) -> Self {
        let frames = (0..count)
            .map(|i| {
                let shade = ((i * 50) % 256) as u8;
                FrameHandle::solid(format!("placeholder-{}", i), 100, 100, [shade, shade, shade, 255])
            })
            .collect();
        Self::new(frames)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FrameHandle> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameHandle> {
        self.0.iter()
    }
}

/// Source of stage frames
#[cfg_attr(test, mockall::automock)]
pub trait AssetProvider: Send + Sync {
    /// Load the frames for a stage key. Never fails; problems yield an empty set.
    fn load(&self, stage_key: &str) -> FrameSet;
}

/// Loads stage frames from `<root>/<stage key>/*.<extension>`, ordered by file name
pub struct DirectoryAssetProvider {
    root: PathBuf,
    extension: String,
}

impl DirectoryAssetProvider {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into().trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    /// Resolve a stage key to its directory
    pub fn stage_dir(&self, stage_key: &str) -> PathBuf {
        stage_key
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Load a stage, reporting why nothing could be loaded
    pub fn try_load(&self, stage_key: &str) -> Result<FrameSet, AssetLoadError> {
        let dir = self.stage_dir(stage_key);
        if !dir.is_dir() {
            return Err(AssetLoadError::MissingDirectory(dir));
        }

        let entries = std::fs::read_dir(&dir).map_err(|source| AssetLoadError::ReadDirectory {
            path: dir.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.matches_extension(path))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        tracing::debug!("Found {} frame files in {}", files.len(), dir.display());
        if files.is_empty() {
            return Err(AssetLoadError::NoMatchingFiles {
                path: dir,
                extension: self.extension.clone(),
            });
        }

        let frames: Vec<FrameHandle> = files
            .iter()
            .filter_map(|path| match decode_frame(path) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            })
            .collect();

        if frames.is_empty() {
            return Err(AssetLoadError::AllFramesFailed(dir));
        }

        Ok(FrameSet::new(frames))
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

impl AssetProvider for DirectoryAssetProvider {
    fn load(&self, stage_key: &str) -> FrameSet {
        match self.try_load(stage_key) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!("Stage '{}' has no usable frames: {}", stage_key, e);
                FrameSet::empty()
            }
        }
    }
}

fn decode_frame(path: &Path) -> Result<FrameHandle, AssetLoadError> {
    let image = image::open(path)
        .map_err(|source| AssetLoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(FrameHandle::new(name, image))
}

/// Stage frames held in memory, keyed by stage key
#[derive(Default)]
pub struct InMemoryAssetProvider {
    stages: HashMap<String, FrameSet>,
}

impl InMemoryAssetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `count` generated frames under `stage_key`
    pub fn with_frames(mut self, stage_key: impl Into<String>, count: usize) -> Self {
        let stage_key = stage_key.into();
        let frames = (0..count)
            .map(|i| FrameHandle::solid(format!("{}#{}", stage_key, i), 1, 1, [0, 0, 0, 255]))
            .collect();
        self.stages.insert(stage_key, FrameSet::new(frames));
        self
    }

    pub fn insert(&mut self, stage_key: impl Into<String>, frames: FrameSet) {
        self.stages.insert(stage_key.into(), frames);
    }
}

impl AssetProvider for InMemoryAssetProvider {
    fn load(&self, stage_key: &str) -> FrameSet {
        self.stages.get(stage_key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        RgbaImage::from_pixel(2, 3, Rgba([shade, 0, 0, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_placeholder_frames() {
        let frames = FrameSet::placeholder(4);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames.get(3).unwrap().image().get_pixel(0, 0).0, [150, 150, 150, 255]);
    }

    #[test]
    fn test_stage_dir_resolution() {
        let provider = DirectoryAssetProvider::new("/assets", "png");
        assert_eq!(
            provider.stage_dir("WORK/Study/A_Nomal"),
            Path::new("/assets").join("WORK").join("Study").join("A_Nomal")
        );
    }

    #[test]
    fn test_missing_directory_yields_empty_set() {
        let root = tempfile::tempdir().unwrap();
        let provider = DirectoryAssetProvider::new(root.path(), "png");

        assert!(matches!(
            provider.try_load("Nope"),
            Err(AssetLoadError::MissingDirectory(_))
        ));
        assert!(provider.load("Nope").is_empty());
    }

    #[test]
    fn test_directory_without_matching_files() {
        let root = tempfile::tempdir().unwrap();
        let stage = root.path().join("Empty");
        std::fs::create_dir(&stage).unwrap();
        std::fs::write(stage.join("notes.txt"), "not a frame").unwrap();

        let provider = DirectoryAssetProvider::new(root.path(), "png");
        assert!(matches!(
            provider.try_load("Empty"),
            Err(AssetLoadError::NoMatchingFiles { .. })
        ));
    }

    #[test]
    fn test_frames_sorted_by_file_name() {
        let root = tempfile::tempdir().unwrap();
        let stage = root.path().join("Idle");
        std::fs::create_dir(&stage).unwrap();
        write_frame(&stage, "frame_002.png", 2);
        write_frame(&stage, "frame_000.png", 0);
        write_frame(&stage, "frame_001.png", 1);

        let provider = DirectoryAssetProvider::new(root.path(), ".PNG");
        let frames = provider.load("Idle");
        let names: Vec<_> = frames.iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["frame_000.png", "frame_001.png", "frame_002.png"]);
        assert_eq!(frames.get(0).unwrap().width(), 2);
        assert_eq!(frames.get(0).unwrap().height(), 3);
    }

    #[test]
    fn test_partial_decode_failure_keeps_good_frames_in_order() {
        let root = tempfile::tempdir().unwrap();
        let stage = root.path().join("Eat");
        std::fs::create_dir(&stage).unwrap();
        write_frame(&stage, "a.png", 10);
        std::fs::write(stage.join("b.png"), b"definitely not a png").unwrap();
        write_frame(&stage, "c.png", 30);

        let provider = DirectoryAssetProvider::new(root.path(), "png");
        let frames = provider.load("Eat");
        let names: Vec<_> = frames.iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
    }

    #[test]
    fn test_total_decode_failure() {
        let root = tempfile::tempdir().unwrap();
        let stage = root.path().join("Broken");
        std::fs::create_dir(&stage).unwrap();
        std::fs::write(stage.join("a.png"), b"garbage").unwrap();

        let provider = DirectoryAssetProvider::new(root.path(), "png");
        assert!(matches!(
            provider.try_load("Broken"),
            Err(AssetLoadError::AllFramesFailed(_))
        ));
        assert!(provider.load("Broken").is_empty());
    }

    #[test]
    fn test_in_memory_provider() {
        let provider = InMemoryAssetProvider::new().with_frames("BDay/B", 3);
        assert_eq!(provider.load("BDay/B").len(), 3);
        assert!(provider.load("Sleep/A_Happy").is_empty());
    }
}
