use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use once_cell::sync::Lazy;
use resvg::tiny_skia;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Write};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::LabelError;
use crate::layout::{Page, mm_to_px};

const PT_PER_MM: f32 = 72.0 / 25.4;
const MAX_RASTER_SIDE: u32 = 20_000;
/// 160 MB of RGBA; an A4 page at 600 dpi fits, at 1200 dpi it does not.
const MAX_RASTER_PIXELS: u64 = 40_000_000;

static FONT_DB: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!(faces = db.len(), "loaded system fonts");
    Arc::new(db)
});

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid SVG: {0}")]
    Svg(#[from] usvg::Error),

    #[error("cannot allocate a {width}x{height} pixmap")]
    Pixmap { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Png(String),

    #[error("PDF writing failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("ZIP writing failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Png,
    /// Raw SVG pages in a ZIP archive.
    Zip,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Zip => "zip",
        }
    }

    fn media_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Zip => "application/zip",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "png" => Ok(Self::Png),
            "zip" => Ok(Self::Zip),
            _ => Err(LabelError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded output ready to be sent or written to disk.
#[derive(Debug, Clone)]
pub struct Export {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub filename: String,
}

/// Serializes pages: one page becomes one file, several become a ZIP of
/// numbered files. `Zip` is always an archive of SVG pages.
pub fn export_pages(
    pages: &[Page],
    format: ExportFormat,
    dpi: u32,
    title: &str,
) -> Result<Export, ExportError> {
    tracing::debug!(pages = pages.len(), %format, dpi, "exporting pages");
    match format {
        ExportFormat::Zip => {
            let entries = pages
                .iter()
                .map(|page| page.to_svg().into_bytes())
                .collect::<Vec<_>>();
            zip_export(&entries, "svg", title)
        }
        ExportFormat::Pdf | ExportFormat::Png => {
            let encode = |page: &Page| match format {
                ExportFormat::Pdf => page_to_pdf(page, dpi, title),
                _ => page_to_png(page, dpi),
            };
            if let [page] = pages {
                return Ok(Export {
                    bytes: encode(page)?,
                    media_type: format.media_type(),
                    filename: format!("{title}.{format}"),
                });
            }
            let entries = pages.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
            zip_export(&entries, format.as_str(), title)
        }
    }
}

fn zip_export(entries: &[Vec<u8>], ext: &str, title: &str) -> Result<Export, ExportError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (idx, bytes) in entries.iter().enumerate() {
        writer.start_file(entry_name(title, idx + 1, ext), options)?;
        writer.write_all(bytes)?;
    }
    let cursor = writer.finish()?;
    Ok(Export {
        bytes: cursor.into_inner(),
        media_type: ExportFormat::Zip.media_type(),
        filename: format!("{title}.zip"),
    })
}

pub fn entry_name(title: &str, number: usize, ext: &str) -> String {
    format!("{title}_{number:02}.{ext}")
}

pub fn raster_size(width_mm: f32, height_mm: f32, dpi: u32) -> (u32, u32) {
    (
        mm_to_px(width_mm, dpi).round().max(1.0) as u32,
        mm_to_px(height_mm, dpi).round().max(1.0) as u32,
    )
}

/// Whether a page of this size can be rasterized at `dpi` within the
/// per-side and total pixel limits.
pub fn raster_fits(width_mm: f32, height_mm: f32, dpi: u32) -> bool {
    let (width, height) = raster_size(width_mm, height_mm, dpi);
    width <= MAX_RASTER_SIDE
        && height <= MAX_RASTER_SIDE
        && u64::from(width) * u64::from(height) <= MAX_RASTER_PIXELS
}

/// Rasterizes a page at `dpi` onto a white background.
pub fn rasterize(page: &Page, dpi: u32) -> Result<tiny_skia::Pixmap, ExportError> {
    let (width, height) = raster_size(page.width_mm, page.height_mm, dpi);
    if !raster_fits(page.width_mm, page.height_mm, dpi) {
        return Err(ExportError::Pixmap { width, height });
    }
    let mut opt = usvg::Options::default();
    opt.fontdb = FONT_DB.clone();
    let tree = usvg::Tree::from_str(&page.to_svg(), &opt)?;
    let mut pixmap =
        tiny_skia::Pixmap::new(width, height).ok_or(ExportError::Pixmap { width, height })?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let size = tree.size();
    let transform = tiny_skia::Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    Ok(pixmap)
}

fn page_to_png(page: &Page, dpi: u32) -> Result<Vec<u8>, ExportError> {
    rasterize(page, dpi)?
        .encode_png()
        .map_err(|e| ExportError::Png(e.to_string()))
}

/// One-page PDF holding the page raster as a Flate-compressed image.
fn page_to_pdf(page: &Page, dpi: u32, title: &str) -> Result<Vec<u8>, ExportError> {
    let pixmap = rasterize(page, dpi)?;
    let (px_w, px_h) = (pixmap.width(), pixmap.height());

    // The pixmap is opaque (white fill), so dropping alpha is lossless.
    let rgb: Vec<u8> = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    let page_w = page.width_mm * PT_PER_MM;
    let page_h = page.height_mm * PT_PER_MM;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => px_w as i64,
            "Height" => px_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&rgb)?,
    );
    let image_id = doc.add_object(image);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    page_w.into(),
                    0.into(),
                    0.into(),
                    page_h.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {"Filter" => "FlateDecode"},
        deflate(&content.encode()?)?,
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal(concat!("labelsmith ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svg::Element;
    use std::io::Read;

    fn page(label: &str) -> Page {
        Page {
            document: Element::document_mm(20.0, 10.0).child(
                Element::new("rect")
                    .num("width", 10.0)
                    .num("height", 10.0)
                    .attr("fill", "#000")
                    .attr("data-label", label),
            ),
            width_mm: 20.0,
            height_mm: 10.0,
            label_count: 1,
        }
    }

    fn zip_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn single_page_pdf_is_one_document() {
        let export = export_pages(&[page("a")], ExportFormat::Pdf, 72, "labels").unwrap();
        assert_eq!(export.media_type, "application/pdf");
        assert_eq!(export.filename, "labels.pdf");
        assert!(export.bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&export.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn two_page_pdf_is_a_zip_of_two_pdfs() {
        let export = export_pages(&[page("a"), page("b")], ExportFormat::Pdf, 72, "labels").unwrap();
        assert_eq!(export.media_type, "application/zip");
        assert_eq!(export.filename, "labels.zip");
        assert_eq!(zip_names(&export.bytes), vec!["labels_01.pdf", "labels_02.pdf"]);

        let mut archive = zip::ZipArchive::new(Cursor::new(&export.bytes)).unwrap();
        let mut second = Vec::new();
        archive.by_index(1).unwrap().read_to_end(&mut second).unwrap();
        assert!(second.starts_with(b"%PDF"));
    }

    #[test]
    fn png_is_rasterized_at_dpi() {
        let export = export_pages(&[page("a")], ExportFormat::Png, 254, "label").unwrap();
        assert_eq!(export.media_type, "image/png");
        let pixmap = tiny_skia::Pixmap::decode_png(&export.bytes).unwrap();
        // 20mm x 10mm at 254 dpi
        assert_eq!((pixmap.width(), pixmap.height()), (200, 100));
        let left = pixmap.pixel(10, 50).unwrap();
        let right = pixmap.pixel(190, 50).unwrap();
        assert_eq!((left.red(), left.alpha()), (0, 255));
        assert_eq!((right.red(), right.alpha()), (255, 255));
    }

    #[test]
    fn zip_format_holds_raw_svg_pages() {
        let export = export_pages(&[page("only")], ExportFormat::Zip, 300, "sheet").unwrap();
        assert_eq!(zip_names(&export.bytes), vec!["sheet_01.svg"]);
        let mut archive = zip::ZipArchive::new(Cursor::new(&export.bytes)).unwrap();
        let mut svg = String::new();
        archive.by_index(0).unwrap().read_to_string(&mut svg).unwrap();
        assert!(svg.contains("data-label=\"only\""));
    }

    #[test]
    fn multi_page_png_is_zipped() {
        let export = export_pages(&[page("a"), page("b"), page("c")], ExportFormat::Png, 72, "p").unwrap();
        assert_eq!(zip_names(&export.bytes), vec!["p_01.png", "p_02.png", "p_03.png"]);
    }

    #[test]
    fn raster_area_is_capped() {
        assert!(raster_fits(210.0, 297.0, 600));
        assert!(!raster_fits(210.0, 297.0, 1200));
        // each side is under the per-side cap, the area is not
        assert!(!raster_fits(800.0, 800.0, 600));

        let mut big = page("a4");
        big.width_mm = 210.0;
        big.height_mm = 297.0;
        assert!(matches!(
            export_pages(&[big], ExportFormat::Png, 1200, "big"),
            Err(ExportError::Pixmap { width: 9921, height: 14031 })
        ));
    }

    #[test]
    fn format_parsing() {
        assert_eq!("pdf".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert!(matches!(
            "tiff".parse::<ExportFormat>(),
            Err(LabelError::UnsupportedFormat(f)) if f == "tiff"
        ));
    }
}
