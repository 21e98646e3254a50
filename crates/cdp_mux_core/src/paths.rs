use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;

use crate::{MuxConfig, MuxError, Result};

/// Translates between the client's source paths and the URLs backends know scripts by.
pub trait PathTranslator: Send + Sync {
    fn path_to_backend_url(&self, path: &str) -> Result<String>;

    /// Rewrites the `url` of a `Debugger.scriptParsed` payload into a client path.
    fn script_parsed_to_client(&self, params: Value) -> Value;
}

/// Maps paths under `local_root` onto `device_root`; anything else becomes a `file://` URL.
/// Every URL handed out is cached so the reverse mapping is exact.
pub struct RootTranslator {
    local_root: Option<PathBuf>,
    device_root: Option<Url>,
    reverse: RwLock<HashMap<String, String>>,
}

impl RootTranslator {
    pub fn new(local_root: Option<PathBuf>, device_root: Option<&str>) -> Result<Self> {
        let device_root = device_root
            .map(|root| {
                let root = if root.ends_with('/') {
                    root.to_string()
                } else {
                    format!("{root}/")
                };
                Url::parse(&root).map_err(|e| MuxError::InvalidPath(format!("{root}: {e}")))
            })
            .transpose()?;

        Ok(Self {
            local_root,
            device_root,
            reverse: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &MuxConfig) -> Result<Self> {
        Self::new(config.local_root.clone(), config.device_root.as_deref())
    }

    fn backend_url(&self, path: &Path) -> Result<Url> {
        if let (Some(local_root), Some(device_root)) = (&self.local_root, &self.device_root) {
            if let Ok(relative) = path.strip_prefix(local_root) {
                let mut url = device_root.clone();
                url.path_segments_mut()
                    .map_err(|_| MuxError::InvalidPath(format!("{device_root} cannot hold a path")))?
                    .pop_if_empty()
                    .extend(relative.components().map(|part| part.as_os_str().to_string_lossy()));
                return Ok(url);
            }
        }
        Url::from_file_path(path).map_err(|_| MuxError::InvalidPath(path.display().to_string()))
    }

    fn client_path(&self, url: &str) -> Option<String> {
        if let Some(path) = self
            .reverse
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
        {
            return Some(path.clone());
        }

        let path = self.resolve_uncached(url)?;
        self.remember(url, &path);
        Some(path)
    }

    fn resolve_uncached(&self, url: &str) -> Option<String> {
        if let (Some(local_root), Some(device_root)) = (&self.local_root, &self.device_root) {
            if let Some(relative) = url.strip_prefix(device_root.as_str()) {
                let mut path = local_root.clone();
                for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
                    let decoded = percent_decode_str(segment).decode_utf8_lossy();
                    // Separators or a parent step would escape the local root.
                    if decoded == ".." || decoded.contains(['/', '\\']) {
                        return None;
                    }
                    path.push(decoded.as_ref());
                }
                return Some(path.to_string_lossy().into_owned());
            }
        }

        let parsed = Url::parse(url).ok()?;
        if parsed.scheme() != "file" {
            return None;
        }
        parsed
            .to_file_path()
            .ok()
            .map(|path| path.to_string_lossy().into_owned())
    }

    fn remember(&self, url: &str, path: &str) {
        self.reverse
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), path.to_string());
    }
}

impl PathTranslator for RootTranslator {
    fn path_to_backend_url(&self, path: &str) -> Result<String> {
        let as_path = Path::new(path);
        if !as_path.is_absolute() {
            // Already a URL (http://, file://, ...): the client addressed the backend directly.
            if Url::parse(path).is_ok() {
                return Ok(path.to_string());
            }
            return Err(MuxError::InvalidPath(format!("{path} is not absolute")));
        }

        let url = self.backend_url(as_path)?.to_string();
        self.remember(&url, path);
        Ok(url)
    }

    fn script_parsed_to_client(&self, mut params: Value) -> Value {
        let client_path = params
            .get("url")
            .and_then(Value::as_str)
            .and_then(|url| self.client_path(url));

        if let (Some(path), Some(object)) = (client_path, params.as_object_mut()) {
            object.insert("url".to_string(), Value::String(path));
        }
        params
    }
}
