//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as missing handler sections, malformed origin URLs,
//! colliding mount paths and zero-valued limits. Returns every
//! [`ValidationError`] found, with per-field suggestions.

use url::Url;

use super::model::{CommentsConfig, Config, ObjectStoreConfig, ViewsConfig, WallpaperConfig};
use crate::error::ValidationError;

/// Paths the host claims for itself.
pub const RESERVED_PATHS: &[&str] = &["/health"];

/// Validate a mount path or path suffix. Returns `Ok(())` or a human-readable error.
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path cannot be empty".into());
    }
    if !path.starts_with('/') {
        return Err(format!("path must start with '/' (did you mean '/{path}'?)"));
    }
    if let Some(ch) = path.chars().find(|ch| matches!(ch, '{' | '}' | '*')) {
        return Err(format!("path cannot contain '{ch}'"));
    }
    Ok(())
}

/// True if `path` is the mount itself or lies underneath it.
fn under_mount(path: &str, mount: &str) -> bool {
    path.trim_end_matches('/') == mount || path.starts_with(&format!("{mount}/"))
}

/// Validate an origin or public base URL. Returns `Ok(())` or a human-readable error.
pub fn validate_origin_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().is_none() {
                Err(format!("'{url}' has no host"))
            } else if parsed.query().is_some() || parsed.fragment().is_some() {
                Err(format!("'{url}' must not carry a query or fragment"))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

struct Collector {
    errors: Vec<ValidationError>,
}

impl Collector {
    fn push(&mut self, section: &str, field: &str, message: String, suggestion: Option<String>) {
        self.errors.push(ValidationError {
            section: section.into(),
            field: field.into(),
            message,
            suggestion,
        });
    }

    fn check_path(&mut self, section: &str, field: &str, path: &str) {
        if let Err(msg) = validate_path(path) {
            let suggestion = (!path.is_empty() && !path.starts_with('/'))
                .then(|| format!("did you mean '/{path}'?"));
            self.push(section, field, msg, suggestion);
        }
    }

    fn check_url(&mut self, section: &str, field: &str, url: &str) {
        if let Err(msg) = validate_origin_url(url) {
            self.push(section, field, msg, None);
        }
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut c = Collector { errors: Vec::new() };

    if config.comments.is_none() && config.wallpaper.is_none() && config.views.is_none() {
        c.push(
            "(root)",
            "handlers",
            "at least one of comments, wallpaper or views must be configured".into(),
            Some("run 'tandem init' for a starter config".into()),
        );
        return Err(c.errors);
    }

    if let Some(ref comments) = config.comments {
        validate_comments(&mut c, comments);
    }
    if let Some(ref views) = config.views {
        validate_views(&mut c, views);
    }
    if let Some(ref wallpaper) = config.wallpaper {
        validate_wallpaper(&mut c, wallpaper, config.views.as_ref());
    }

    if config.background.max_in_flight == 0 {
        c.push(
            "background",
            "max_in_flight",
            "must be greater than zero".into(),
            None,
        );
    }
    if config.background.drain_timeout_ms == 0 {
        c.push(
            "background",
            "drain_timeout_ms",
            "must be greater than zero".into(),
            None,
        );
    }

    if c.errors.is_empty() {
        Ok(())
    } else {
        Err(c.errors)
    }
}

fn validate_comments(c: &mut Collector, comments: &CommentsConfig) {
    c.check_path("comments", "path_suffix", &comments.path_suffix);
    c.check_url("comments", "primary", &comments.primary);
    c.check_url("comments", "secondary", &comments.secondary);
    if let Some(ref passthrough) = comments.passthrough {
        c.check_url("comments", "passthrough", passthrough);
    }

    if comments.primary.trim_end_matches('/') == comments.secondary.trim_end_matches('/') {
        c.push(
            "comments",
            "secondary",
            "secondary origin is the same as primary".into(),
            Some("point it at the mirror node's own hostname".into()),
        );
    }

    if comments.timeout_ms == 0 {
        c.push("comments", "timeout_ms", "must be greater than zero".into(), None);
    }
}

fn validate_views(c: &mut Collector, views: &ViewsConfig) {
    c.check_path("views", "path", &views.path);
    if views.path == "/" || RESERVED_PATHS.contains(&views.path.as_str()) {
        c.push(
            "views",
            "path",
            format!("'{}' is reserved", views.path),
            None,
        );
    }
}

fn validate_wallpaper(c: &mut Collector, wallpaper: &WallpaperConfig, views: Option<&ViewsConfig>) {
    let mount = wallpaper.mount.trim_end_matches('/');
    c.check_path("wallpaper", "mount", &wallpaper.mount);
    if wallpaper.mount.starts_with('/') && mount.is_empty() {
        c.push(
            "wallpaper",
            "mount",
            "cannot mount at '/'".into(),
            Some("use a prefix such as '/wallpaper'".into()),
        );
    }
    let clashes_with_views = !mount.is_empty() && views.is_some_and(|v| under_mount(&v.path, mount));
    if RESERVED_PATHS.contains(&mount) || clashes_with_views {
        c.push(
            "wallpaper",
            "mount",
            format!("'{mount}' collides with another handler"),
            None,
        );
    }

    c.check_url("wallpaper", "public_base_url", &wallpaper.public_base_url);

    if wallpaper.pc_prefix.is_empty() {
        c.push("wallpaper", "pc_prefix", "prefix cannot be empty".into(), None);
    }
    if wallpaper.mobile_prefix.is_empty() {
        c.push("wallpaper", "mobile_prefix", "prefix cannot be empty".into(), None);
    }

    if let ObjectStoreConfig::Local { ref root } = wallpaper.store {
        if root.as_os_str().is_empty() {
            c.push("wallpaper", "store.root", "root cannot be empty".into(), None);
        }
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let handlers = config.enabled_handlers();
    let mut lines = vec![format!("  {} handlers enabled\n", handlers.len())];

    if let Some(ref views) = config.views {
        lines.push(format!("  views      {}  (store: {})", views.path, views.store.kind()));
    }
    if let Some(ref wallpaper) = config.wallpaper {
        lines.push(format!(
            "  wallpaper  {}/*  -> {}",
            wallpaper.mount.trim_end_matches('/'),
            wallpaper.public_base_url
        ));
    }
    if let Some(ref comments) = config.comments {
        lines.push(format!(
            "  comments   *{}  -> primary: {}, secondary: {}",
            comments.path_suffix, comments.primary, comments.secondary
        ));
        lines.push(format!("    policy:  {:?}", comments.policy));
        lines.push(format!("    timeout: {}ms", comments.timeout_ms));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
