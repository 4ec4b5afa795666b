use labelsmith::catalog::{Shape, sheets, templates};
use labelsmith::icons::IconResolver;
use labelsmith::layout::layout_pages;
use labelsmith::model::LabelItem;
use labelsmith::render::render_label;
use labelsmith::theme::Theme;

const JAR_ICON: &str = r##"<?xml version="1.0"?>
<!-- tabler icon -->
<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2">
  <path stroke="none" d="M0 0h24v24H0z" fill="none"/>
  <path d="M7 4h10v3H7z" />
  <path d="M6 7h12v13H6z" fill="#000"/>
</svg>"##;

fn icon_dir() -> (tempfile::TempDir, IconResolver) {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("jar.svg"), JAR_ICON).expect("icon write");
    let resolver = IconResolver::new(dir.path());
    (dir, resolver)
}

fn items() -> Vec<LabelItem> {
    let mut with_icon = LabelItem::new("Basmati rice");
    with_icon.text = Some("2026-10 <dry> & sealed".to_string());
    with_icon.icon = Some("icon-jar".to_string());

    let plain = LabelItem::new("Śliwki w czekoladzie");

    let mut missing = LabelItem::new("Oats");
    missing.icon = Some("does-not-exist".to_string());

    vec![with_icon, plain, missing]
}

fn assert_parses(svg: &str, context: &str) {
    assert!(svg.starts_with("<svg"), "{context}: missing <svg root");
    assert!(svg.ends_with("</svg>"), "{context}: unterminated document");
    if let Err(err) = usvg::Tree::from_str(svg, &usvg::Options::default()) {
        panic!("{context}: usvg rejected document: {err}\n{svg}");
    }
}

#[test]
fn every_template_renders_on_every_sheet() {
    let (_dir, icons) = icon_dir();
    let theme = Theme::label_default();

    for template in templates() {
        let labels: Vec<_> = items()
            .iter()
            .map(|item| render_label(item, template, &icons, &theme, 3.0))
            .collect();

        for label in &labels {
            assert_parses(&label.to_svg(), template.key);
        }

        for sheet in sheets() {
            let context = format!("{} on {}", template.key, sheet.key);
            let pages = layout_pages(&labels, sheet, true);
            assert_eq!(pages.len(), 1, "{context}");
            assert_eq!(pages[0].label_count, labels.len(), "{context}");
            assert_parses(&pages[0].to_svg(), &context);
        }
    }
}

#[test]
fn icon_warnings_survive_rendering() {
    let (_dir, icons) = icon_dir();
    let template = labelsmith::catalog::get_template("jar_label_small").unwrap();
    let rendered: Vec<_> = items()
        .iter()
        .map(|item| render_label(item, template, &icons, &Theme::label_default(), 3.0))
        .collect();

    assert!(rendered[0].warnings.is_empty());
    assert!(rendered[0].to_svg().contains("class=\"icon\""));
    assert!(rendered[1].warnings.is_empty());
    assert_eq!(rendered[2].warnings, vec!["icon_missing:does-not-exist".to_string()]);
    assert!(!rendered[2].to_svg().contains("class=\"icon\""));
}

#[test]
fn user_text_is_escaped() {
    let (_dir, icons) = icon_dir();
    let template = labelsmith::catalog::get_template("jar_label_small").unwrap();
    let svg = render_label(&items()[0], template, &icons, &Theme::label_default(), 3.0).to_svg();
    assert!(svg.contains("2026-10 &lt;dry&gt; &amp; sealed"));
}

#[test]
fn border_follows_shape() {
    let (_dir, icons) = icon_dir();
    let theme = Theme::label_default();
    for template in templates() {
        let svg = render_label(&LabelItem::new("X"), template, &icons, &theme, 2.0).to_svg();
        let has_circle = svg.contains("<circle ");
        assert_eq!(has_circle, template.shape == Shape::Round, "{}", template.key);
    }
}
