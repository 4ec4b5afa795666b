use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::catalog::DEFAULT_TEMPLATE;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TEXT_CHARS: usize = 500;
pub const MAX_ICON_CHARS: usize = 120;
pub const MAX_COLOR_CHARS: usize = 32;
pub const MAX_STORAGE_NAME_CHARS: usize = 120;
pub const MIN_DPI: u32 = 72;
pub const MAX_DPI: u32 = 1200;
pub const MAX_PADDING_MM: f32 = 20.0;
pub const MAX_DESIRED_QTY: i64 = 10_000;

pub type Meta = Map<String, Value>;

// ---- rendering requests ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelItem {
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Tabler icon name, e.g. `jar` or `truck`.
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

impl LabelItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub sheet: Option<String>,
    pub with_cut_marks: bool,
    pub preview: bool,
    pub dpi: Option<u32>,
    pub padding_mm: Option<f32>,
    pub bg: Option<String>,
    pub color: Option<String>,
    pub border: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelBatchRequest {
    #[serde(rename = "type")]
    pub template: String,
    pub items: Vec<LabelItem>,
    #[serde(default)]
    pub options: RenderOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSingleRequest {
    #[serde(rename = "type")]
    pub template: String,
    pub item: LabelItem,
    #[serde(default)]
    pub options: RenderOptions,
}

// ---- storages ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageLabelCreate {
    #[serde(default = "default_template_type")]
    pub template_type: String,
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub bg: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub border: Option<String>,
    #[serde(default)]
    pub desired_qty: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub meta: Option<Meta>,
}

fn default_template_type() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_active() -> bool {
    true
}

impl StorageLabelCreate {
    pub fn new(title: impl Into<String>, desired_qty: i64) -> Self {
        Self {
            template_type: default_template_type(),
            title: title.into(),
            text: None,
            icon: None,
            bg: None,
            color: None,
            border: None,
            desired_qty,
            active: true,
            meta: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageLabelUpdate {
    pub desired_qty: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageLabel {
    pub id: i64,
    pub storage_id: i64,
    pub template_type: String,
    pub title: String,
    pub text: Option<String>,
    pub icon: Option<String>,
    pub bg: Option<String>,
    pub color: Option<String>,
    pub border: Option<String>,
    pub desired_qty: i64,
    pub printed_qty: i64,
    /// Always `max(desired_qty - printed_qty, 0)`; recomputed on load.
    pub missing_qty: i64,
    pub active: bool,
    pub meta: Option<Meta>,
    pub created_at: String,
}

pub fn missing_qty(desired: i64, printed: i64) -> i64 {
    desired.saturating_sub(printed).max(0)
}

// ---- validation ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn add(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.reason)?;
        }
        Ok(())
    }
}

/// Explicit validation pass over a deserialized request record.
pub trait Validate {
    fn validate_into(&self, prefix: &str, errors: &mut ValidationErrors);

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        self.validate_into("", &mut errors);
        errors.into_result()
    }
}

fn field(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn check_required(errors: &mut ValidationErrors, path: String, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.add(path, "must not be empty");
    } else if value.chars().count() > max {
        errors.add(path, format!("must be at most {max} characters"));
    }
}

fn check_optional(errors: &mut ValidationErrors, path: String, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        if value.chars().count() > max {
            errors.add(path, format!("must be at most {max} characters"));
        }
    }
}

fn check_desired_qty(errors: &mut ValidationErrors, path: String, qty: i64) {
    if qty < 0 {
        errors.add(path, "must not be negative");
    } else if qty > MAX_DESIRED_QTY {
        errors.add(path, format!("must be at most {MAX_DESIRED_QTY}"));
    }
}

impl Validate for LabelItem {
    fn validate_into(&self, prefix: &str, errors: &mut ValidationErrors) {
        check_required(errors, field(prefix, "title"), &self.title, MAX_TITLE_CHARS);
        check_optional(errors, field(prefix, "text"), self.text.as_deref(), MAX_TEXT_CHARS);
        check_optional(errors, field(prefix, "icon"), self.icon.as_deref(), MAX_ICON_CHARS);
    }
}

impl Validate for RenderOptions {
    fn validate_into(&self, prefix: &str, errors: &mut ValidationErrors) {
        if let Some(dpi) = self.dpi {
            if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
                errors.add(
                    field(prefix, "dpi"),
                    format!("must be between {MIN_DPI} and {MAX_DPI}"),
                );
            }
        }
        if let Some(padding) = self.padding_mm {
            if !padding.is_finite() || !(0.0..=MAX_PADDING_MM).contains(&padding) {
                errors.add(
                    field(prefix, "padding_mm"),
                    format!("must be between 0 and {MAX_PADDING_MM}"),
                );
            }
        }
        check_optional(errors, field(prefix, "bg"), self.bg.as_deref(), MAX_COLOR_CHARS);
        check_optional(errors, field(prefix, "color"), self.color.as_deref(), MAX_COLOR_CHARS);
        check_optional(errors, field(prefix, "border"), self.border.as_deref(), MAX_COLOR_CHARS);
    }
}

impl Validate for LabelBatchRequest {
    fn validate_into(&self, prefix: &str, errors: &mut ValidationErrors) {
        if self.items.is_empty() {
            errors.add(field(prefix, "items"), "must contain at least one item");
        }
        for (idx, item) in self.items.iter().enumerate() {
            item.validate_into(&field(prefix, &format!("items[{idx}]")), errors);
        }
        self.options.validate_into(&field(prefix, "options"), errors);
    }
}

impl Validate for LabelSingleRequest {
    fn validate_into(&self, prefix: &str, errors: &mut ValidationErrors) {
        self.item.validate_into(&field(prefix, "item"), errors);
        self.options.validate_into(&field(prefix, "options"), errors);
    }
}

impl Validate for StorageCreate {
    fn validate_into(&self, prefix: &str, errors: &mut ValidationErrors) {
        check_required(errors, field(prefix, "name"), &self.name, MAX_STORAGE_NAME_CHARS);
    }
}

impl Validate for StorageLabelCreate {
    fn validate_into(&self, prefix: &str, errors: &mut ValidationErrors) {
        check_required(errors, field(prefix, "title"), &self.title, MAX_TITLE_CHARS);
        check_optional(errors, field(prefix, "text"), self.text.as_deref(), MAX_TEXT_CHARS);
        check_optional(errors, field(prefix, "icon"), self.icon.as_deref(), MAX_ICON_CHARS);
        check_optional(errors, field(prefix, "bg"), self.bg.as_deref(), MAX_COLOR_CHARS);
        check_optional(errors, field(prefix, "color"), self.color.as_deref(), MAX_COLOR_CHARS);
        check_optional(errors, field(prefix, "border"), self.border.as_deref(), MAX_COLOR_CHARS);
        check_desired_qty(errors, field(prefix, "desired_qty"), self.desired_qty);
    }
}

impl Validate for StorageLabelUpdate {
    fn validate_into(&self, prefix: &str, errors: &mut ValidationErrors) {
        if let Some(qty) = self.desired_qty {
            check_desired_qty(errors, field(prefix, "desired_qty"), qty);
        }
    }
}
