//! Workspace directory conventions.

use std::path::{Component, Path, PathBuf};

use fader_fstree::is_ignored_name;
use fader_types::DataUsed;

pub const SCRIPT_FILE: &str = "script.lua";
pub const STRUCTURAL_FILE: &str = "structural_data.json";
pub const META_FILE: &str = "meta.json";

/// Which file field a sibling artifact carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    RawData,
    LuaScript,
    StructuralData,
    MetaData,
}

impl ArtifactKind {
    /// Classify an artifact by name suffix. Anything unrecognized is raw data.
    pub fn classify(name: &str) -> Self {
        if name.ends_with(SCRIPT_FILE) {
            Self::LuaScript
        } else if name.ends_with(STRUCTURAL_FILE) {
            Self::StructuralData
        } else if name.ends_with(META_FILE) {
            Self::MetaData
        } else {
            Self::RawData
        }
    }

    /// Classify an artifact inside the directory of file `entity_name`. The
    /// artifact named exactly like the file is always its raw data, whatever
    /// its suffix.
    pub fn classify_for(name: &str, entity_name: &str) -> Self {
        if name == entity_name {
            Self::RawData
        } else {
            Self::classify(name)
        }
    }

    /// The artifact file name written on export for a file entity.
    pub fn file_name(self, entity_name: &str) -> &str {
        match self {
            Self::RawData => entity_name,
            Self::LuaScript => SCRIPT_FILE,
            Self::StructuralData => STRUCTURAL_FILE,
            Self::MetaData => META_FILE,
        }
    }

    pub fn projection(self) -> DataUsed {
        match self {
            Self::RawData => DataUsed::RAW_DATA,
            Self::LuaScript => DataUsed::LUA_SCRIPT,
            Self::StructuralData => DataUsed::STRUCTURAL_DATA,
            Self::MetaData => DataUsed::META_DATA,
        }
    }
}

/// Returns `true` if `name` can be used as a single directory component.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !is_ignored_name(name)
}

pub fn bucket_dir(root: &Path, bucket: &str) -> PathBuf {
    root.join(bucket)
}

pub fn file_dir(root: &Path, bucket: &str, file: &str) -> PathBuf {
    root.join(bucket).join(file)
}

/// What a workspace-relative path refers to, by depth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkspacePath {
    /// `<bucket>`
    Bucket { bucket: String },
    /// `<bucket>/<file>`
    FileDir { bucket: String, file: String },
    /// `<bucket>/<file>/<artifact>`
    Artifact {
        bucket: String,
        file: String,
        artifact: String,
    },
    /// The root itself, deeper paths, ignored names and non-UTF-8 paths.
    Other,
}

impl WorkspacePath {
    /// Interpret a path relative to the workspace root.
    pub fn parse(relative: &Path) -> Self {
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(part) if !is_ignored_name(part) => parts.push(part.to_string()),
                    _ => return Self::Other,
                },
                Component::CurDir => {}
                _ => return Self::Other,
            }
        }

        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(bucket), None, None, None) => Self::Bucket { bucket },
            (Some(bucket), Some(file), None, None) => Self::FileDir { bucket, file },
            (Some(bucket), Some(file), Some(artifact), None) => Self::Artifact {
                bucket,
                file,
                artifact,
            },
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_suffix() {
        assert_eq!(ArtifactKind::classify("script.lua"), ArtifactKind::LuaScript);
        assert_eq!(
            ArtifactKind::classify("structural_data.json"),
            ArtifactKind::StructuralData
        );
        assert_eq!(ArtifactKind::classify("meta.json"), ArtifactKind::MetaData);
        assert_eq!(ArtifactKind::classify("index.html"), ArtifactKind::RawData);
        assert_eq!(ArtifactKind::classify("data.json"), ArtifactKind::RawData);
    }

    #[test]
    fn own_name_is_always_raw_data() {
        assert_eq!(
            ArtifactKind::classify_for("page.meta.json", "page.meta.json"),
            ArtifactKind::RawData
        );
        assert_eq!(
            ArtifactKind::classify_for("x.script.lua", "x.script.lua"),
            ArtifactKind::RawData
        );
        assert_eq!(
            ArtifactKind::classify_for("meta.json", "page.meta.json"),
            ArtifactKind::MetaData
        );
    }

    #[test]
    fn export_names() {
        assert_eq!(ArtifactKind::RawData.file_name("index.html"), "index.html");
        assert_eq!(ArtifactKind::MetaData.file_name("index.html"), "meta.json");
    }

    #[test]
    fn parse_depths() {
        assert_eq!(
            WorkspacePath::parse(Path::new("photos")),
            WorkspacePath::Bucket {
                bucket: "photos".into()
            }
        );
        assert_eq!(
            WorkspacePath::parse(Path::new("photos/cat.png")),
            WorkspacePath::FileDir {
                bucket: "photos".into(),
                file: "cat.png".into()
            }
        );
        assert_eq!(
            WorkspacePath::parse(Path::new("photos/cat.png/meta.json")),
            WorkspacePath::Artifact {
                bucket: "photos".into(),
                file: "cat.png".into(),
                artifact: "meta.json".into()
            }
        );
        assert_eq!(WorkspacePath::parse(Path::new("a/b/c/d")), WorkspacePath::Other);
        assert_eq!(WorkspacePath::parse(Path::new("")), WorkspacePath::Other);
        assert_eq!(WorkspacePath::parse(Path::new(".fader_index")), WorkspacePath::Other);
        assert_eq!(WorkspacePath::parse(Path::new("../escape")), WorkspacePath::Other);
    }

    #[test]
    fn valid_names() {
        assert!(is_valid_name("photos"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name(".git"));
    }
}
