use crate::catalog::SheetDef;
use crate::render::RenderedLabel;
use crate::svg::{Element, fmt_num};

const CUT_MARK_LENGTH: f32 = 1.5;
const CUT_MARK_STROKE: f32 = 0.2;

/// A full sheet page with its labels placed.
#[derive(Debug, Clone)]
pub struct Page {
    pub document: Element,
    pub width_mm: f32,
    pub height_mm: f32,
    pub label_count: usize,
}

impl Page {
    /// A page that is exactly one label, used for single-label output.
    pub fn single(label: &RenderedLabel) -> Self {
        Self {
            document: label.document.clone(),
            width_mm: label.width_mm,
            height_mm: label.height_mm,
            label_count: 1,
        }
    }

    pub fn to_svg(&self) -> String {
        self.document.render()
    }
}

/// Tiles labels row-major onto as many sheet pages as needed.
pub fn layout_pages(labels: &[RenderedLabel], sheet: &SheetDef, with_cut_marks: bool) -> Vec<Page> {
    let capacity = sheet.capacity();
    if capacity == 0 {
        return Vec::new();
    }
    labels
        .chunks(capacity)
        .map(|chunk| layout_page(chunk, sheet, with_cut_marks))
        .collect()
}

fn layout_page(labels: &[RenderedLabel], sheet: &SheetDef, with_cut_marks: bool) -> Page {
    let mut doc = empty_page(sheet);
    for (idx, label) in labels.iter().enumerate() {
        let row = idx / sheet.cols;
        let col = idx % sheet.cols;
        let (x, y) = sheet.cell_origin(row, col);
        let mut cell = Element::new("g")
            .attr("transform", format!("translate({},{})", fmt_num(x), fmt_num(y)));
        cell.extend(label.document.children().iter().cloned());
        doc.push(cell);
        if with_cut_marks {
            for mark in cut_marks(x, y, sheet.label_width_mm, sheet.label_height_mm) {
                doc.push(mark);
            }
        }
    }
    Page {
        document: doc,
        width_mm: sheet.page_width_mm,
        height_mm: sheet.page_height_mm,
        label_count: labels.len(),
    }
}

fn empty_page(sheet: &SheetDef) -> Element {
    Element::document_mm(sheet.page_width_mm, sheet.page_height_mm).child(
        Element::new("rect")
            .num("x", 0.0)
            .num("y", 0.0)
            .num("width", sheet.page_width_mm)
            .num("height", sheet.page_height_mm)
            .attr("fill", "white"),
    )
}

/// L-shaped ticks just outside each corner of the cell at (x, y).
pub fn cut_marks(x: f32, y: f32, w: f32, h: f32) -> [Element; 4] {
    let m = CUT_MARK_LENGTH;
    let (x2, y2) = (x + w, y + h);
    let n = fmt_num;
    [
        // top-left
        format!("M {} {} H {} M {} {} V {}", n(x - m), n(y), n(x), n(x), n(y - m), n(y)),
        // top-right
        format!("M {} {} H {} M {} {} V {}", n(x2), n(y), n(x2 + m), n(x2), n(y - m), n(y)),
        // bottom-left
        format!("M {} {} H {} M {} {} V {}", n(x - m), n(y2), n(x), n(x), n(y2), n(y2 + m)),
        // bottom-right
        format!("M {} {} H {} M {} {} V {}", n(x2), n(y2), n(x2 + m), n(x2), n(y2), n(y2 + m)),
    ]
    .map(|d| {
        Element::new("path")
            .attr("class", "cut-mark")
            .attr("d", d)
            .attr("stroke", "#000")
            .num("stroke-width", CUT_MARK_STROKE)
    })
}

pub fn mm_to_px(mm: f32, dpi: u32) -> f32 {
    mm / 25.4 * dpi as f32
}
