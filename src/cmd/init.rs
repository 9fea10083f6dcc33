//! `tandem init`: generate a starter configuration file.
//!
//! Writes a YAML, JSON, or TOML config with either a minimal template
//! (the comment dual-writer only) or a full one listing every option.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::TandemError;

pub fn execute(args: &InitArgs) -> Result<(), TandemError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("tandem.{}", args.format.extension())));

    if output.exists() {
        return Err(TandemError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("Created {}", output.display());
    Ok(())
}

const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

const YAML_MINIMAL: &str = r#"# tandem config

comments:
  primary: "https://comment1.example.com"
  secondary: "https://comment2.example.com"
"#;

const YAML_FULL: &str = r#"# tandem config
#
# Every handler is optional; omit a section to disable it. Values shown
# for optional keys are the defaults.

# Comment dual-writer. Requests whose path ends with path_suffix are
# sent to primary (response returned) and mirrored to secondary in the
# background. Any other path gets a 404.
comments:
  primary: "https://comment1.example.com"
  secondary: "https://comment2.example.com"
  # passthrough: "https://comment1.example.com"  # Upstream for non-comment ajax calls
  path_suffix: "/admin-ajax.php"
  policy: content-aware        # or duplicate-all
  timeout_ms: 30000

# Random wallpaper redirect
wallpaper:
  mount: "/wallpaper"
  public_base_url: "https://img.example.com"
  pc_prefix: "pc_img/"
  mobile_prefix: "mobile_img/"
  browser_max_age: 600
  cdn_max_age: 604800
  store:
    type: local                # or memory (with a keys list)
    root: "./wallpapers"

# Per-post view counter
views:
  path: "/views-track"
  store:
    type: memory               # redis (url) and sqlite (path) need build features

# Queue for secondary writes that outlive their request
background:
  max_in_flight: 64
  drain_timeout_ms: 10000
"#;

const JSON_MINIMAL: &str = r#"{
  "comments": {
    "primary": "https://comment1.example.com",
    "secondary": "https://comment2.example.com"
  }
}
"#;

const JSON_FULL: &str = r#"{
  "comments": {
    "primary": "https://comment1.example.com",
    "secondary": "https://comment2.example.com",
    "path_suffix": "/admin-ajax.php",
    "policy": "content-aware",
    "timeout_ms": 30000
  },
  "wallpaper": {
    "mount": "/wallpaper",
    "public_base_url": "https://img.example.com",
    "pc_prefix": "pc_img/",
    "mobile_prefix": "mobile_img/",
    "browser_max_age": 600,
    "cdn_max_age": 604800,
    "store": { "type": "local", "root": "./wallpapers" }
  },
  "views": {
    "path": "/views-track",
    "store": { "type": "memory" }
  },
  "background": {
    "max_in_flight": 64,
    "drain_timeout_ms": 10000
  }
}
"#;

const TOML_MINIMAL: &str = r#"# tandem config

[comments]
primary = "https://comment1.example.com"
secondary = "https://comment2.example.com"
"#;

const TOML_FULL: &str = r#"# tandem config
#
# Every handler is optional; omit a section to disable it. Values shown
# for optional keys are the defaults.

[comments]
primary = "https://comment1.example.com"
secondary = "https://comment2.example.com"
# passthrough = "https://comment1.example.com"
path_suffix = "/admin-ajax.php"
policy = "content-aware"
timeout_ms = 30000

[wallpaper]
mount = "/wallpaper"
public_base_url = "https://img.example.com"
pc_prefix = "pc_img/"
mobile_prefix = "mobile_img/"
browser_max_age = 600
cdn_max_age = 604800

[wallpaper.store]
type = "local"
root = "./wallpapers"

[views]
path = "/views-track"

[views.store]
type = "memory"

[background]
max_in_flight = 64
drain_timeout_ms = 10000
"#;
