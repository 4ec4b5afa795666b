use serde_json::json;
use std::sync::Arc;

use crate::catalog::{SheetDef, TypeDef, get_sheet, get_template};
use crate::config::RenderConfig;
use crate::error::{LabelError, Result};
use crate::export::{Export, ExportFormat, export_pages, raster_fits};
use crate::icons::IconSource;
use crate::layout::{Page, layout_pages};
use crate::model::{
    LabelBatchRequest, LabelItem, LabelSingleRequest, RenderOptions, StorageLabel, Validate,
    ValidationErrors,
};
use crate::render::{RenderedLabel, render_label};
use crate::theme::Theme;

/// Rendered output plus the non-fatal problems met on the way.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub export: Export,
    pub warnings: Vec<String>,
    pub page_count: usize,
}

/// Request-level orchestration of the render pipeline.
pub struct LabelService {
    icons: Arc<dyn IconSource>,
    config: RenderConfig,
    theme: Theme,
}

impl LabelService {
    pub fn new(config: RenderConfig, theme: Theme, icons: Arc<dyn IconSource>) -> Self {
        Self {
            icons,
            config,
            theme,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn render_batch(&self, req: &LabelBatchRequest, format: ExportFormat) -> Result<RenderOutput> {
        let template = resolve_template(&req.template)?;
        let sheet = self.resolve_sheet(&req.options)?;
        self.check_batch_size(req.items.len(), self.config.max_batch_items)?;
        req.validate()?;
        self.check_raster(sheet.page_width_mm, sheet.page_height_mm, &req.options, format)?;

        tracing::info!(
            template = template.key,
            sheet = sheet.key,
            items = req.items.len(),
            %format,
            "rendering label batch"
        );

        let theme = self.theme_for(&req.options);
        let padding = self.padding(&req.options);
        let mut warnings = Vec::new();
        if !sheet.fits(template) {
            warnings.push(format!("template_exceeds_cell:{}:{}", template.key, sheet.key));
        }
        let labels: Vec<RenderedLabel> = req
            .items
            .iter()
            .map(|item| render_label(item, template, self.icons.as_ref(), &theme, padding))
            .collect();
        self.finish(labels, sheet, &req.options, format, "labels", warnings)
    }

    /// One label on a page of its own size; only PDF and PNG apply.
    pub fn render_single(&self, req: &LabelSingleRequest, format: ExportFormat) -> Result<RenderOutput> {
        if format == ExportFormat::Zip {
            return Err(LabelError::UnsupportedFormat(format.to_string()));
        }
        let template = resolve_template(&req.template)?;
        req.validate()?;
        self.check_raster(template.width_mm, template.height_mm, &req.options, format)?;
        tracing::info!(template = template.key, %format, "rendering single label");

        let theme = self.theme_for(&req.options);
        let label = render_label(
            &req.item,
            template,
            self.icons.as_ref(),
            &theme,
            self.padding(&req.options),
        );
        let warnings = label.warnings.clone();
        let pages = [Page::single(&label)];
        let export = export_pages(&pages, format, self.dpi(&req.options), "label")?;
        Ok(RenderOutput {
            export,
            warnings,
            page_count: 1,
        })
    }

    /// Renders every missing copy of the given storage labels, each with
    /// its own template and color overrides. `None` when nothing is missing.
    pub fn render_missing(
        &self,
        storage_id: i64,
        labels: &[StorageLabel],
        format: ExportFormat,
    ) -> Result<Option<RenderOutput>> {
        let missing: Vec<&StorageLabel> = labels
            .iter()
            .filter(|label| label.active && label.missing_qty > 0)
            .collect();
        if missing.is_empty() {
            return Ok(None);
        }
        let max = self.config.max_missing_items;
        let total = missing
            .iter()
            .try_fold(0usize, |sum, label| {
                sum.checked_add(usize::try_from(label.missing_qty).ok()?)
            })
            .ok_or(LabelError::BatchTooLarge {
                count: usize::MAX,
                max,
            })?;
        self.check_batch_size(total, max)?;

        let options = RenderOptions::default();
        let sheet = self.resolve_sheet(&options)?;
        let padding = self.padding(&options);
        let mut warnings = Vec::new();
        let mut rendered = Vec::with_capacity(total);

        for label in missing {
            let Some(template) = get_template(&label.template_type) else {
                tracing::warn!(label_id = label.id, template = %label.template_type, "skipping label with unknown type");
                warnings.push(format!("unknown_type:{}", label.template_type));
                continue;
            };
            let theme = self.theme.with_colors(
                label.bg.as_deref(),
                label.color.as_deref(),
                label.border.as_deref(),
            );
            let item = missing_item(storage_id, label);
            for _ in 0..label.missing_qty {
                rendered.push(render_label(&item, template, self.icons.as_ref(), &theme, padding));
            }
        }
        if rendered.is_empty() {
            // every candidate had an unknown template
            return Err(LabelError::UnknownTemplate(warnings.join(", ")));
        }

        tracing::info!(storage_id, labels = rendered.len(), "rendering missing labels");
        let title = format!("storage-{storage_id}-missing");
        self.finish(rendered, sheet, &options, format, &title, warnings)
            .map(Some)
    }

    fn finish(
        &self,
        labels: Vec<RenderedLabel>,
        sheet: &SheetDef,
        options: &RenderOptions,
        format: ExportFormat,
        title: &str,
        mut warnings: Vec<String>,
    ) -> Result<RenderOutput> {
        for label in &labels {
            warnings.extend(label.warnings.iter().cloned());
        }
        let pages = layout_pages(&labels, sheet, options.with_cut_marks);
        let export = export_pages(&pages, format, self.dpi(options), title)?;
        tracing::debug!(
            pages = pages.len(),
            bytes = export.bytes.len(),
            warnings = warnings.len(),
            "export finished"
        );
        Ok(RenderOutput {
            export,
            warnings,
            page_count: pages.len(),
        })
    }

    fn resolve_sheet(&self, options: &RenderOptions) -> Result<&'static SheetDef> {
        let key = options
            .sheet
            .as_deref()
            .unwrap_or(self.config.default_sheet.as_str());
        get_sheet(key).ok_or_else(|| LabelError::UnknownSheet(key.to_string()))
    }

    fn check_batch_size(&self, count: usize, max: usize) -> Result<()> {
        if count > max {
            return Err(LabelError::BatchTooLarge { count, max });
        }
        Ok(())
    }

    /// Rejects a DPI whose raster of a `width_mm` x `height_mm` page would
    /// exceed the pixel budget.
    fn check_raster(
        &self,
        width_mm: f32,
        height_mm: f32,
        options: &RenderOptions,
        format: ExportFormat,
    ) -> Result<()> {
        let dpi = self.dpi(options);
        if format == ExportFormat::Zip || raster_fits(width_mm, height_mm, dpi) {
            return Ok(());
        }
        let mut errors = ValidationErrors::default();
        errors.add(
            "options.dpi",
            format!("{dpi} dpi is too high for a {width_mm}x{height_mm} mm page"),
        );
        Err(errors.into())
    }

    fn theme_for(&self, options: &RenderOptions) -> Theme {
        self.theme.with_colors(
            options.bg.as_deref(),
            options.color.as_deref(),
            options.border.as_deref(),
        )
    }

    fn padding(&self, options: &RenderOptions) -> f32 {
        options.padding_mm.unwrap_or(self.config.default_padding_mm)
    }

    fn dpi(&self, options: &RenderOptions) -> u32 {
        if options.preview {
            self.config.preview_dpi
        } else {
            options.dpi.unwrap_or(self.config.default_dpi)
        }
    }
}

fn resolve_template(key: &str) -> Result<&'static TypeDef> {
    get_template(key).ok_or_else(|| LabelError::UnknownTemplate(key.to_string()))
}

fn missing_item(storage_id: i64, label: &StorageLabel) -> LabelItem {
    let mut meta = label.meta.clone().unwrap_or_default();
    meta.insert("type".into(), json!(label.template_type));
    meta.insert("storage_id".into(), json!(storage_id));
    meta.insert("label_id".into(), json!(label.id));
    LabelItem {
        title: label.title.clone(),
        text: label.text.clone(),
        icon: label.icon.clone(),
        meta: Some(meta),
    }
}

/// Joins warnings for the `X-Warnings` header: `"; "`-separated, cut to
/// `limit` characters, non-printable-ASCII replaced with `?`.
pub fn warnings_header(warnings: &[String], limit: usize) -> Option<String> {
    if warnings.is_empty() {
        return None;
    }
    let joined: String = warnings
        .join("; ")
        .chars()
        .take(limit)
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect();
    Some(joined)
}
