use std::path::{MAIN_SEPARATOR_STR, PathBuf};
use url::Url;

/// Helpers for drivers that accept URL connection strings
pub trait UrlExtension {
    /// File path portion of the URL, or `None` when the URL names no file (e.g. `sqlite://`)
    fn database_path(&self) -> Option<PathBuf>;

    /// First value of a query parameter
    fn query_parameter(&self, name: &str) -> Option<String>;
}

impl UrlExtension for Url {
    fn database_path(&self) -> Option<PathBuf> {
        let url = self.as_str();
        let start_index = url.find("://").map_or(self.scheme().len() + 1, |index| index + 3);
        let end_index = url.find('?').unwrap_or(url.len());
        if start_index >= end_index {
            return None;
        }
        let path = &url[start_index..end_index];

        #[cfg(target_os = "windows")]
        let path = if path.contains(':') {
            // Strip preceding '/' character for Windows absolute path (e.g. /C:/foo)
            path.strip_prefix('/').unwrap_or(path)
        } else {
            path
        };

        if path.is_empty() || path == "/" {
            return None;
        }
        Some(PathBuf::from(path.replace('/', MAIN_SEPARATOR_STR)))
    }

    fn query_parameter(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}
