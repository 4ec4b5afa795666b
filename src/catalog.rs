use serde::{Deserialize, Serialize};

/// Border outline of a label template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Rect,
    Round,
    Oval,
}

/// Physical label template: size in millimetres and border shape.
#[derive(Debug, Clone, Serialize)]
pub struct TypeDef {
    pub key: &'static str,
    pub name: &'static str,
    pub width_mm: f32,
    pub height_mm: f32,
    pub shape: Shape,
}

/// Printable sheet: page size plus the grid the labels are tiled into.
#[derive(Debug, Clone, Serialize)]
pub struct SheetDef {
    pub key: &'static str,
    pub name: &'static str,
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub cols: usize,
    pub rows: usize,
    pub label_width_mm: f32,
    pub label_height_mm: f32,
    pub margin_top_mm: f32,
    pub margin_left_mm: f32,
    pub gutter_x_mm: f32,
    pub gutter_y_mm: f32,
}

impl SheetDef {
    pub fn capacity(&self) -> usize {
        self.cols * self.rows
    }

    /// Top-left corner of the cell at `row`/`col`, in page millimetres.
    pub fn cell_origin(&self, row: usize, col: usize) -> (f32, f32) {
        let x = self.margin_left_mm + col as f32 * (self.label_width_mm + self.gutter_x_mm);
        let y = self.margin_top_mm + row as f32 * (self.label_height_mm + self.gutter_y_mm);
        (x, y)
    }

    pub fn fits(&self, template: &TypeDef) -> bool {
        template.width_mm <= self.label_width_mm && template.height_mm <= self.label_height_mm
    }
}

pub const DEFAULT_TEMPLATE: &str = "jar_label_small";

static TEMPLATES: [TypeDef; 5] = [
    TypeDef {
        key: "jar_label_small",
        name: "Jar, small (58×30)",
        width_mm: 58.0,
        height_mm: 30.0,
        shape: Shape::Oval,
    },
    TypeDef {
        key: "jar_label_medium",
        name: "Jar, medium (70×35)",
        width_mm: 70.0,
        height_mm: 35.0,
        shape: Shape::Rect,
    },
    TypeDef {
        key: "binder_spine",
        name: "Binder spine (190×30)",
        width_mm: 190.0,
        height_mm: 30.0,
        shape: Shape::Rect,
    },
    TypeDef {
        key: "parcel_medium",
        name: "Parcel (99×67)",
        width_mm: 99.0,
        height_mm: 67.0,
        shape: Shape::Rect,
    },
    TypeDef {
        key: "round_50",
        name: "Round Ø50",
        width_mm: 50.0,
        height_mm: 50.0,
        shape: Shape::Round,
    },
];

static SHEETS: [SheetDef; 3] = [
    // Free A4 grid; the default sheet.
    SheetDef {
        key: "A4",
        name: "A4 - custom grid",
        page_width_mm: 210.0,
        page_height_mm: 297.0,
        cols: 3,
        rows: 8,
        label_width_mm: 63.5,
        label_height_mm: 36.0,
        margin_top_mm: 10.0,
        margin_left_mm: 10.0,
        gutter_x_mm: 2.0,
        gutter_y_mm: 2.0,
    },
    SheetDef {
        key: "L7160",
        name: "Avery L7160 (63.5×38.1, 3×7)",
        page_width_mm: 210.0,
        page_height_mm: 297.0,
        cols: 3,
        rows: 7,
        label_width_mm: 63.5,
        label_height_mm: 38.1,
        margin_top_mm: 12.0,
        margin_left_mm: 5.0,
        gutter_x_mm: 2.5,
        gutter_y_mm: 0.0,
    },
    SheetDef {
        key: "L7163",
        name: "Avery L7163 (99.1×38.1, 2×7)",
        page_width_mm: 210.0,
        page_height_mm: 297.0,
        cols: 2,
        rows: 7,
        label_width_mm: 99.1,
        label_height_mm: 38.1,
        margin_top_mm: 12.7,
        margin_left_mm: 5.0,
        gutter_x_mm: 2.5,
        gutter_y_mm: 0.0,
    },
];

pub fn templates() -> &'static [TypeDef] {
    &TEMPLATES
}

pub fn sheets() -> &'static [SheetDef] {
    &SHEETS
}

pub fn get_template(key: &str) -> Option<&'static TypeDef> {
    TEMPLATES.iter().find(|tpl| tpl.key == key)
}

pub fn get_sheet(key: &str) -> Option<&'static SheetDef> {
    SHEETS.iter().find(|sheet| sheet.key == key)
}
