use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub font_family: String,
    pub background: String,
    pub text_color: String,
    pub border_color: String,
    pub border_width: f32,
}

impl Theme {
    pub fn label_default() -> Self {
        Self {
            font_family: "Inter, 'Noto Color Emoji', sans-serif".to_string(),
            background: "#ffffff".to_string(),
            text_color: "#111827".to_string(),
            border_color: "#111827".to_string(),
            border_width: 0.4,
        }
    }

    /// Copy of this theme with per-request or per-label colors applied.
    pub fn with_colors(&self, bg: Option<&str>, color: Option<&str>, border: Option<&str>) -> Self {
        let mut theme = self.clone();
        if let Some(v) = non_empty(bg) {
            theme.background = v.to_string();
        }
        if let Some(v) = non_empty(color) {
            theme.text_color = v.to_string();
        }
        if let Some(v) = non_empty(border) {
            theme.border_color = v.to_string();
        }
        theme
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::label_default()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
