//! Asset folders and inline image markup.

use std::fmt;
use std::path::Path;

/// Object-storage folder an asset is uploaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFolder {
    /// Hero image shown above the post.
    Main,
    /// Images referenced from the post body.
    Inline,
}

impl AssetFolder {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetFolder::Main => "blog-main-images",
            AssetFolder::Inline => "blog-inline-images",
        }
    }
}

impl fmt::Display for AssetFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the storage path for an asset: `<folder>/<unix-millis>-<file name>`.
///
/// Only the final component of the client-supplied name is kept.
pub fn asset_path(folder: AssetFolder, timestamp_millis: i128, original_name: &str) -> String {
    let name = Path::new(original_name)
        .file_name()
        .and_then(|value| value.to_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("upload");
    format!("{folder}/{timestamp_millis}-{name}")
}

/// Markup the operator pastes into the post body for an inline image.
pub fn inline_image_tag(url: &str) -> String {
    format!(
        "<img src=\"{}\" alt=\"\" class=\"w-full rounded-xl my-6\" />",
        url.replace('"', "&quot;")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_path_prefixes_folder_and_timestamp() {
        let path = asset_path(AssetFolder::Main, 1_760_000_000_000, "hero shot.png");
        assert_eq!(path, "blog-main-images/1760000000000-hero shot.png");
    }

    #[test]
    fn asset_path_keeps_only_file_name() {
        let path = asset_path(AssetFolder::Inline, 5, "../../etc/passwd");
        assert_eq!(path, "blog-inline-images/5-passwd");

        let fallback = asset_path(AssetFolder::Inline, 5, "");
        assert_eq!(fallback, "blog-inline-images/5-upload");
    }

    #[test]
    fn inline_tag_wraps_url() {
        assert_eq!(
            inline_image_tag("https://cdn.example/a.png"),
            r#"<img src="https://cdn.example/a.png" alt="" class="w-full rounded-xl my-6" />"#
        );
    }
}
