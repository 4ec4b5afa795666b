use crate::catalog::{Shape, TypeDef};
use crate::icons::IconSource;
use crate::model::LabelItem;
use crate::svg::{Element, fmt_num};
use crate::theme::Theme;

const BORDER_INSET: f32 = 0.2;
const RECT_CORNER_RADIUS: f32 = 1.2;
const ICON_FILL_RATIO: f32 = 0.8;
const TITLE_SIZE_RATIO: f32 = 0.35;
const TITLE_SIZE_CAP: f32 = 10.0;
const TEXT_SIZE_RATIO: f32 = 0.22;
const TEXT_SIZE_CAP: f32 = 6.0;
const TITLE_BASELINE_RATIO: f32 = 0.45;
const TEXT_GAP_RATIO: f32 = 0.28;
const TEXT_GAP_CAP: f32 = 7.0;

/// One label as a standalone SVG document in millimetre units.
#[derive(Debug, Clone)]
pub struct RenderedLabel {
    pub document: Element,
    pub width_mm: f32,
    pub height_mm: f32,
    pub warnings: Vec<String>,
}

impl RenderedLabel {
    pub fn to_svg(&self) -> String {
        self.document.render()
    }
}

pub fn title_font_size(inner_h: f32) -> f32 {
    (inner_h * TITLE_SIZE_RATIO).min(TITLE_SIZE_CAP)
}

pub fn text_font_size(inner_h: f32) -> f32 {
    (inner_h * TEXT_SIZE_RATIO).min(TEXT_SIZE_CAP)
}

pub fn render_label(
    item: &LabelItem,
    template: &TypeDef,
    icons: &dyn IconSource,
    theme: &Theme,
    padding_mm: f32,
) -> RenderedLabel {
    let w = template.width_mm;
    let h = template.height_mm;
    let p = padding_mm.max(0.0);
    let inner_w = (w - 2.0 * p).max(0.0);
    let inner_h = (h - 2.0 * p).max(0.0);

    let lookup = icons.load_icon(item.icon.as_deref());
    let mut doc = Element::document_mm(w, h);

    doc.push(
        Element::new("rect")
            .num("x", 0.0)
            .num("y", 0.0)
            .num("width", w)
            .num("height", h)
            .attr("fill", theme.background.as_str()),
    );
    doc.push(border_element(template.shape, w, h, theme));

    let (text_x, anchor) = match &lookup.icon {
        Some(icon) => {
            let icon_size = inner_w.min(inner_h) * ICON_FILL_RATIO;
            let icon_y = (h - icon_size) / 2.0;
            let scale = icon_size / icon.size;
            doc.push(
                Element::new("g")
                    .attr("class", "icon")
                    .attr(
                        "transform",
                        format!(
                            "translate({},{}) scale({})",
                            fmt_num(p),
                            fmt_num(icon_y),
                            fmt_num(scale)
                        ),
                    )
                    .attr("color", theme.text_color.as_str())
                    .raw(icon.markup.as_str()),
            );
            (p + icon_size + p * 0.5, "start")
        }
        None => (w / 2.0, "middle"),
    };

    let title_y = p + inner_h * TITLE_BASELINE_RATIO;
    doc.push(
        text_element("title", text_x, title_y, anchor, title_font_size(inner_h), "700", theme)
            .text(item.title.as_str()),
    );

    if let Some(text) = item.text.as_deref().filter(|t| !t.trim().is_empty()) {
        let text_y = title_y + (inner_h * TEXT_GAP_RATIO).min(TEXT_GAP_CAP);
        doc.push(
            text_element("text", text_x, text_y, anchor, text_font_size(inner_h), "400", theme)
                .text(text),
        );
    }

    RenderedLabel {
        document: doc,
        width_mm: w,
        height_mm: h,
        warnings: lookup.warnings,
    }
}

/// Border outline per template shape; unknown shapes use the rect rule.
fn border_element(shape: Shape, w: f32, h: f32, theme: &Theme) -> Element {
    let stroke = theme.border_width;
    let el = match shape {
        Shape::Round => Element::new("circle")
            .num("cx", w / 2.0)
            .num("cy", h / 2.0)
            .num("r", (w.min(h) / 2.0 - stroke).max(0.0)),
        Shape::Oval => {
            let radius = (w.min(h) / 2.0 - BORDER_INSET).max(0.0);
            inset_rect(w, h).num("rx", radius).num("ry", radius)
        }
        Shape::Rect => inset_rect(w, h)
            .num("rx", RECT_CORNER_RADIUS)
            .num("ry", RECT_CORNER_RADIUS),
    };
    el.attr("class", "border")
        .attr("fill", "none")
        .attr("stroke", theme.border_color.as_str())
        .num("stroke-width", stroke)
}

fn inset_rect(w: f32, h: f32) -> Element {
    Element::new("rect")
        .num("x", BORDER_INSET)
        .num("y", BORDER_INSET)
        .num("width", (w - 2.0 * BORDER_INSET).max(0.0))
        .num("height", (h - 2.0 * BORDER_INSET).max(0.0))
}

fn text_element(
    class: &'static str,
    x: f32,
    y: f32,
    anchor: &'static str,
    font_size: f32,
    weight: &'static str,
    theme: &Theme,
) -> Element {
    Element::new("text")
        .attr("class", class)
        .num("x", x)
        .num("y", y)
        .attr("text-anchor", anchor)
        .attr("font-family", theme.font_family.as_str())
        .num("font-size", font_size)
        .attr("font-weight", weight)
        .attr("fill", theme.text_color.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::get_template;
    use crate::icons::{Icon, IconLookup};

    struct FixedIcons;

    impl IconSource for FixedIcons {
        fn load_icon(&self, name: Option<&str>) -> IconLookup {
            match name {
                Some("jar") => IconLookup {
                    icon: Some(Icon {
                        markup: "<svg width=\"24\" height=\"24\" viewBox=\"0 0 24 24\"><path d=\"M6 7h12\" stroke=\"currentColor\"/></svg>".to_string(),
                        size: 24.0,
                    }),
                    warnings: Vec::new(),
                },
                Some(other) => IconLookup {
                    icon: None,
                    warnings: vec![format!("icon_missing:{other}")],
                },
                None => IconLookup::default(),
            }
        }
    }

    fn render(key: &str, item: &LabelItem) -> RenderedLabel {
        let template = get_template(key).unwrap();
        render_label(item, template, &FixedIcons, &Theme::label_default(), 3.0)
    }

    fn border(label: &RenderedLabel) -> Element {
        let mut found: Vec<Element> = label
            .document
            .find_all("circle")
            .into_iter()
            .chain(label.document.find_all("rect"))
            .filter(|el| el.get_attr("class") == Some("border"))
            .cloned()
            .collect();
        assert_eq!(found.len(), 1);
        found.remove(0)
    }

    #[test]
    fn round_shape_draws_a_circle() {
        let label = render("round_50", &LabelItem::new("Salt"));
        let border = border(&label);
        assert_eq!(border.name(), "circle");
        assert_eq!(border.get_attr("r"), Some("24.6"));
        assert_eq!(border.get_attr("stroke-width"), Some("0.4"));
    }

    #[test]
    fn oval_shape_is_fully_rounded() {
        let label = render("jar_label_small", &LabelItem::new("Plum"));
        let border = border(&label);
        assert_eq!(border.name(), "rect");
        assert_eq!(border.get_attr("rx"), Some("14.8"));
        assert_eq!(border.get_attr("ry"), Some("14.8"));
    }

    #[test]
    fn rect_shape_uses_fixed_corner_radius() {
        let label = render("parcel_medium", &LabelItem::new("Books"));
        let border = border(&label);
        assert_eq!(border.name(), "rect");
        assert_eq!(border.get_attr("rx"), Some("1.2"));
        assert_eq!(border.get_attr("width"), Some("98.6"));
    }

    #[test]
    fn document_is_sized_in_millimetres() {
        let label = render("jar_label_medium", &LabelItem::new("Tea"));
        let svg = label.to_svg();
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"70mm\" height=\"35mm\" viewBox=\"0 0 70 35\""));
        assert_eq!((label.width_mm, label.height_mm), (70.0, 35.0));
    }

    #[test]
    fn icon_sits_left_of_the_text() {
        let item = LabelItem {
            icon: Some("jar".into()),
            text: Some("2024".into()),
            ..LabelItem::new("Honey")
        };
        let label = render("jar_label_medium", &item);
        assert!(label.warnings.is_empty());
        let groups = label.document.find_all("g");
        assert_eq!(groups.len(), 1);
        // inner 64x29, icon 23.2 wide, placed at the padding
        assert_eq!(groups[0].get_attr("transform"), Some("translate(3,5.9) scale(0.967)"));
        let texts = label.document.find_all("text");
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].get_attr("x"), Some("27.7"));
        assert_eq!(texts[0].get_attr("text-anchor"), Some("start"));
    }

    #[test]
    fn unknown_icon_warns_and_centers_text() {
        let item = LabelItem {
            icon: Some("unicorn".into()),
            ..LabelItem::new("Mystery")
        };
        let label = render("jar_label_medium", &item);
        assert_eq!(label.warnings, vec!["icon_missing:unicorn".to_string()]);
        assert!(label.document.find_all("g").is_empty());
        let title = label.document.find_all("text")[0].clone();
        assert_eq!(title.get_attr("x"), Some("35"));
        assert_eq!(title.get_attr("text-anchor"), Some("middle"));
    }

    #[test]
    fn font_sizes_are_clamped() {
        assert!((title_font_size(24.0) - 8.4).abs() < 1e-5);
        assert_eq!(title_font_size(61.0), 10.0);
        assert_eq!(text_font_size(61.0), 6.0);

        let label = render("parcel_medium", &LabelItem::new("Big"));
        let title = label.document.find_all("text")[0].clone();
        assert_eq!(title.get_attr("font-size"), Some("10"));
    }

    #[test]
    fn title_is_escaped_and_empty_text_is_omitted() {
        let item = LabelItem {
            text: Some("   ".into()),
            ..LabelItem::new("Salt & <Pepper>")
        };
        let label = render("jar_label_small", &item);
        let svg = label.to_svg();
        assert!(svg.contains("Salt &amp; &lt;Pepper&gt;"));
        assert_eq!(label.document.find_all("text").len(), 1);
    }
}
