/// Semantic category of a node, derived from its name.
///
/// Only drives marker colour; layout and collapse ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Test,
    Config,
    Build,
    Style,
    Image,
    None,
}

const CONFIG_EXTENSIONS: &[&str] = &["txt", "md", "json", "yml", "toml", "lock", "sh"];
const CONFIG_DOTFILES: &[&str] = &[".eslintignore", ".husky", ".prettierrc"];
const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js"];
const STYLE_EXTENSIONS: &[&str] = &["css", "scss", "sass", "less"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "bmp"];

/// Colour used for folder markers.
pub const FOLDER_RGB: (u8, u8, u8) = (0x55, 0x55, 0x55);

impl NodeCategory {
    /// Classify by name. Branches only ever come out as `Test` or `None`.
    pub fn classify(name: &str, is_branch: bool) -> Self {
        let lower = name.to_lowercase();
        let is_test_name = lower.contains("test");

        if is_branch {
            return if is_test_name {
                NodeCategory::Test
            } else {
                NodeCategory::None
            };
        }

        if CONFIG_DOTFILES.contains(&lower.as_str()) {
            return NodeCategory::Config;
        }

        let ext = extension(&lower);
        match ext {
            Some(ext) if CONFIG_EXTENSIONS.contains(&ext) => NodeCategory::Config,
            Some(ext) if STYLE_EXTENSIONS.contains(&ext) => NodeCategory::Style,
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => NodeCategory::Image,
            Some(ext) if is_test_name && SOURCE_EXTENSIONS.contains(&ext) => NodeCategory::Test,
            _ => NodeCategory::Build,
        }
    }

    /// Marker fill colour.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            NodeCategory::Test => (0x4c, 0xaf, 0x50),   // green
            NodeCategory::Config => (0xf5, 0x9e, 0x0b), // amber
            NodeCategory::Build => (0x03, 0xad, 0xfc),  // sky blue
            NodeCategory::Style => (0x8b, 0x5c, 0xf6),  // violet
            NodeCategory::Image => (0xec, 0x48, 0x99),  // pink
            NodeCategory::None => FOLDER_RGB,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeCategory::Test => "test",
            NodeCategory::Config => "config",
            NodeCategory::Build => "build",
            NodeCategory::Style => "style",
            NodeCategory::Image => "image",
            NodeCategory::None => "none",
        }
    }
}

/// Extension after the last dot; dotfiles without a further dot have none.
fn extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}
