use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static PROLOG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<\?xml.*?\?>|<!DOCTYPE[^>]*>|<!--.*?-->").unwrap()
});
static ROOT_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<svg\b[^>]*>").unwrap());
static SIZE_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s(?:width|height)\s*=\s*("[^"]*"|'[^']*')"#).unwrap());
static VIEWBOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"viewBox\s*=\s*["']([^"']+)["']"#).unwrap());
static BLACK_PAINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(stroke|fill)\s*=\s*["'](?:#000|#000000|black)["']"#).unwrap()
});

pub const ICON_PREFIX: &str = "icon-";
const DEFAULT_ICON_SIZE: f32 = 24.0;

/// Normalized icon markup ready to be embedded inside a label.
#[derive(Debug, Clone, PartialEq)]
pub struct Icon {
    pub markup: String,
    /// Edge length of the icon's own coordinate space (its viewBox).
    pub size: f32,
}

#[derive(Debug, Clone, Default)]
pub struct IconLookup {
    pub icon: Option<Icon>,
    pub warnings: Vec<String>,
}

impl IconLookup {
    fn warn(warning: String) -> Self {
        Self {
            icon: None,
            warnings: vec![warning],
        }
    }
}

/// Anything that can turn an icon name into embeddable markup.
pub trait IconSource: Send + Sync {
    fn load_icon(&self, name: Option<&str>) -> IconLookup;
}

/// Resolves icons from a directory of `.svg` files (Tabler layout).
#[derive(Debug, Clone)]
pub struct IconResolver {
    base_dir: PathBuf,
}

impl IconResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl IconSource for IconResolver {
    fn load_icon(&self, name: Option<&str>) -> IconLookup {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return IconLookup::default();
        };
        let Some(file_name) = icon_file_name(name) else {
            tracing::warn!(icon = name, "rejected icon name");
            return IconLookup::warn(format!("icon_invalid:{name}"));
        };
        let path = self.base_dir.join(&file_name);
        if !path.is_file() {
            tracing::warn!(icon = name, path = %path.display(), "icon not found");
            return IconLookup::warn(format!("icon_missing:{name}"));
        }
        let icon = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| normalize_icon(&raw));
        match icon {
            Some(icon) => IconLookup {
                icon: Some(icon),
                warnings: Vec::new(),
            },
            None => {
                tracing::warn!(icon = name, path = %path.display(), "icon could not be loaded");
                IconLookup::warn(format!("icon_load_error:{name}"))
            }
        }
    }
}

/// Maps `jar`, `icon-jar` and `jar.svg` to `jar.svg`; rejects anything
/// that could leave the icon directory.
pub fn icon_file_name(name: &str) -> Option<String> {
    if name.contains(['/', '\\', '\0']) || name.contains("..") {
        return None;
    }
    let stem = name.strip_prefix(ICON_PREFIX).unwrap_or(name);
    if stem.is_empty() || stem == ".svg" {
        return None;
    }
    if stem.ends_with(".svg") {
        Some(stem.to_string())
    } else {
        Some(format!("{stem}.svg"))
    }
}

/// Prepares raw icon SVG for inline embedding: drops prolog and
/// comments, pins the root size to its viewBox and turns hard-coded
/// black paint into `currentColor`.
pub fn normalize_icon(raw: &str) -> Option<Icon> {
    let cleaned = PROLOG_RE.replace_all(raw, "");
    let cleaned = cleaned.trim();
    let root = ROOT_TAG_RE.find(cleaned)?;
    if !cleaned.ends_with("</svg>") && !root.as_str().ends_with("/>") {
        return None;
    }

    let size = VIEWBOX_RE
        .captures(root.as_str())
        .and_then(|caps| parse_view_box(&caps[1]))
        .unwrap_or(DEFAULT_ICON_SIZE);

    let stripped = SIZE_ATTR_RE.replace_all(root.as_str(), "");
    let tag_body = stripped.trim_end_matches('>');
    let (tag_body, self_closing) = match tag_body.strip_suffix('/') {
        Some(body) => (body.trim_end(), true),
        None => (tag_body.trim_end(), false),
    };
    let mut new_root = format!("{tag_body} width=\"{size}\" height=\"{size}\"");
    if !VIEWBOX_RE.is_match(tag_body) {
        new_root.push_str(&format!(" viewBox=\"0 0 {size} {size}\""));
    }
    new_root.push_str(if self_closing { "/>" } else { ">" });

    let mut markup = String::with_capacity(cleaned.len() + 32);
    markup.push_str(&cleaned[..root.start()]);
    markup.push_str(&new_root);
    markup.push_str(&cleaned[root.end()..]);
    let markup = BLACK_PAINT_RE
        .replace_all(&markup, "$1=\"currentColor\"")
        .into_owned();

    Some(Icon { markup, size })
}

fn parse_view_box(value: &str) -> Option<f32> {
    let parts: Vec<f32> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .filter_map(|p| p.parse().ok())
        .collect();
    if parts.len() != 4 {
        return None;
    }
    let size = parts[2].max(parts[3]);
    (size > 0.0).then_some(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLER_JAR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- tabler-icons.io -->
<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2"><path stroke="none" d="M0 0h24v24H0z" fill="none"/><path d="M6 7h12v12a2 2 0 0 1 -2 2h-8a2 2 0 0 1 -2 -2z"/></svg>"#;

    fn resolver_with(files: &[(&str, &str)]) -> (tempfile::TempDir, IconResolver) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let resolver = IconResolver::new(dir.path());
        (dir, resolver)
    }

    #[test]
    fn loads_and_normalizes_icon() {
        let (_dir, resolver) = resolver_with(&[("jar.svg", TABLER_JAR)]);
        let lookup = resolver.load_icon(Some("jar"));
        assert!(lookup.warnings.is_empty());
        let icon = lookup.icon.unwrap();
        assert_eq!(icon.size, 24.0);
        assert!(icon.markup.starts_with("<svg"));
        assert!(!icon.markup.contains("<?xml"));
        assert!(!icon.markup.contains("tabler-icons.io"));
        assert!(icon.markup.contains("stroke=\"currentColor\""));
    }

    #[test]
    fn accepts_prefixed_and_suffixed_names() {
        let (_dir, resolver) = resolver_with(&[("truck.svg", TABLER_JAR)]);
        assert!(resolver.load_icon(Some("icon-truck")).icon.is_some());
        assert!(resolver.load_icon(Some("truck.svg")).icon.is_some());
    }

    #[test]
    fn missing_icon_is_a_warning() {
        let (_dir, resolver) = resolver_with(&[]);
        let lookup = resolver.load_icon(Some("unicorn"));
        assert!(lookup.icon.is_none());
        assert_eq!(lookup.warnings, vec!["icon_missing:unicorn".to_string()]);
    }

    #[test]
    fn no_name_means_no_icon_and_no_warning() {
        let (_dir, resolver) = resolver_with(&[]);
        let lookup = resolver.load_icon(None);
        assert!(lookup.icon.is_none() && lookup.warnings.is_empty());
        assert!(resolver.load_icon(Some("  ")).warnings.is_empty());
    }

    #[test]
    fn rejects_path_traversal() {
        let (_dir, resolver) = resolver_with(&[]);
        let lookup = resolver.load_icon(Some("../secret"));
        assert!(lookup.icon.is_none());
        assert_eq!(lookup.warnings, vec!["icon_invalid:../secret".to_string()]);
    }

    #[test]
    fn non_svg_content_is_a_load_error() {
        let (_dir, resolver) = resolver_with(&[("broken.svg", "not an icon")]);
        let lookup = resolver.load_icon(Some("broken"));
        assert!(lookup.icon.is_none());
        assert_eq!(lookup.warnings, vec!["icon_load_error:broken".to_string()]);
    }

    #[test]
    fn normalize_pins_size_and_recolors_black() {
        let raw = r##"<svg xmlns="http://www.w3.org/2000/svg" width="1em" height="1em" viewBox="0 0 48 48"><path fill="#000" d="M0 0h48v48z"/></svg>"##;
        let icon = normalize_icon(raw).unwrap();
        assert_eq!(icon.size, 48.0);
        assert!(icon.markup.contains("width=\"48\" height=\"48\""));
        assert!(!icon.markup.contains("1em"));
        assert!(icon.markup.contains("fill=\"currentColor\""));
    }

    #[test]
    fn normalize_adds_missing_viewbox() {
        let icon = normalize_icon(r#"<svg xmlns="http://www.w3.org/2000/svg"><circle r="4"/></svg>"#).unwrap();
        assert_eq!(icon.size, 24.0);
        assert!(icon.markup.contains("viewBox=\"0 0 24 24\""));
    }

    #[test]
    fn icon_file_name_rules() {
        assert_eq!(icon_file_name("jar").as_deref(), Some("jar.svg"));
        assert_eq!(icon_file_name("icon-jar").as_deref(), Some("jar.svg"));
        assert_eq!(icon_file_name("jar.svg").as_deref(), Some("jar.svg"));
        assert_eq!(icon_file_name("a/b"), None);
        assert_eq!(icon_file_name("icon-"), None);
    }
}
