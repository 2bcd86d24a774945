//! Flatten an overlay onto a page of an existing PDF.
//!
//! Layers are painted bottom to top. Each image layer covers the whole
//! MediaBox and text layers are written as real text in Helvetica between
//! them. Coordinates in [`TextRun`] use the overlay's top-left origin and are
//! flipped into PDF space here.

use crate::{inherited_attribute, media_box, PdfEngineError, RgbaImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

const OVERLAY_IMAGE_PREFIX: &str = "Ovl";
const OVERLAY_FONT_PREFIX: &str = "FOvl";

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub baseline: f32,
    pub font_size: f32,
    pub color: [u8; 3],
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum StampLayer {
    Image(RgbaImage),
    Text(Vec<TextRun>),
}

impl StampLayer {
    fn is_empty(&self) -> bool {
        match self {
            StampLayer::Image(image) => image.pixels().all(|pixel| pixel[3] == 0),
            StampLayer::Text(runs) => runs.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverlayStamp {
    pub layers: Vec<StampLayer>,
}

impl OverlayStamp {
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(StampLayer::is_empty)
    }

    fn text_run_count(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| match layer {
                StampLayer::Text(runs) => runs.len(),
                StampLayer::Image(_) => 0,
            })
            .sum()
    }
}

/// Stamp `stamp` onto page `page_index` (0-based) of `bytes` and return the saved document.
pub fn stamp_overlay(
    bytes: &[u8],
    page_index: u32,
    stamp: &OverlayStamp,
) -> Result<Vec<u8>, PdfEngineError> {
    let mut doc = Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let page_id = *pages
        .get(&(page_index + 1))
        .ok_or(PdfEngineError::PageOutOfRange { page: page_index, page_count })?;

    if stamp.is_empty() {
        tracing::debug!(page_index, "overlay is empty, leaving document untouched");
        return Ok(bytes.to_vec());
    }

    let [x0, y0, x1, y1] = media_box(&doc, page_id).unwrap_or([0.0, 0.0, 612.0, 792.0]);
    let (left, bottom) = (x0.min(x1), y0.min(y1));
    let (width, height) = ((x1 - x0).abs(), (y1 - y0).abs());

    let mut resources = page_resources(&doc, page_id);
    let mut content = Vec::new();

    let mut font_name: Option<String> = None;

    for layer in stamp.layers.iter().filter(|layer| !layer.is_empty()) {
        match layer {
            StampLayer::Image(image) => {
                let image_id = add_image(&mut doc, image);
                let name =
                    insert_resource(&doc, &mut resources, b"XObject", OVERLAY_IMAGE_PREFIX, image_id);
                writeln!(content, "q {width} 0 0 {height} {left} {bottom} cm /{name} Do Q")?;
            }
            StampLayer::Text(runs) => {
                let name = match font_name.clone() {
                    Some(name) => name,
                    None => {
                        let font_id = doc.add_object(dictionary! {
                            "Type" => "Font",
                            "Subtype" => "Type1",
                            "BaseFont" => "Helvetica",
                            "Encoding" => "WinAnsiEncoding",
                        });
                        let name = insert_resource(
                            &doc,
                            &mut resources,
                            b"Font",
                            OVERLAY_FONT_PREFIX,
                            font_id,
                        );
                        font_name = Some(name.clone());
                        name
                    }
                };

                for run in runs {
                    let [r, g, b] = run.color.map(|channel| channel as f32 / 255.0);
                    let x = left + run.x;
                    let y = bottom + height - run.baseline;
                    write!(
                        content,
                        "BT /{name} {} Tf {r} {g} {b} rg {x} {y} Td (",
                        run.font_size
                    )?;
                    content.extend(encode_win_ansi(&run.text));
                    writeln!(content, ") Tj ET")?;
                }
            }
        }
    }

    let overlay_id = doc.add_object(Stream::new(dictionary! {}, content));
    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));

    let existing = {
        let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
        page.remove(b"Contents")
    };

    // Isolate the original content so its graphics state cannot leak into the overlay.
    let mut contents = vec![Object::Reference(save_id)];
    match existing {
        Some(Object::Array(items)) => contents.extend(items),
        Some(Object::Reference(id)) => match doc.get_object(id) {
            Ok(Object::Array(items)) => contents.extend(items.iter().cloned()),
            _ => contents.push(Object::Reference(id)),
        },
        Some(other) => contents.push(other),
        None => {}
    }
    contents.push(Object::Reference(restore_id));
    contents.push(Object::Reference(overlay_id));

    {
        let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
        page.set("Contents", contents);
        page.set("Resources", resources);
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)?;

    tracing::debug!(
        page_index,
        layers = stamp.layers.len(),
        text_runs = stamp.text_run_count(),
        bytes = out.len(),
        "stamped overlay"
    );

    Ok(out)
}

fn add_image(doc: &mut Document, image: &RgbaImage) -> ObjectId {
    let (width, height) = image.dimensions();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }

    let mut smask = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    );
    let _ = smask.compress();
    let smask_id = doc.add_object(smask);

    let mut image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => smask_id,
        },
        rgb,
    );
    let _ = image_stream.compress();
    doc.add_object(image_stream)
}

/// The page's effective resources as an owned dictionary, resolving
/// inheritance and indirect references.
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

/// Add `id` under a fresh `prefix{n}` name in the `category` sub-dictionary
/// and return the chosen name.
fn insert_resource(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    prefix: &str,
    id: ObjectId,
) -> String {
    let mut entries = match resources.get(category) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(reference)) => {
            doc.get_dictionary(*reference).cloned().unwrap_or_default()
        }
        _ => Dictionary::new(),
    };

    let name = (0..)
        .map(|n| format!("{prefix}{n}"))
        .find(|candidate| !entries.has(candidate.as_bytes()))
        .unwrap_or_else(|| prefix.to_owned());

    entries.set(name.clone(), id);
    resources.set(category.to_vec(), entries);
    name
}

/// Encode text for a literal string shown with a WinAnsi-encoded base font.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(ch as u8);
            }
            ' '..='~' | '\u{a0}'..='\u{ff}' => out.push(ch as u32 as u8),
            '\t' => out.push(b' '),
            _ => out.push(win_ansi_extra(ch).unwrap_or(b'?')),
        }
    }
    out
}

/// WinAnsi code points 0x80..=0x9F, which differ from Latin-1.
fn win_ansi_extra(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{20ac}' => 0x80,
        '\u{201a}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201e}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02c6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8a,
        '\u{2039}' => 0x8b,
        '\u{0152}' => 0x8c,
        '\u{017d}' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02dc}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9a,
        '\u{203a}' => 0x9b,
        '\u{0153}' => 0x9c,
        '\u{017e}' => 0x9e,
        '\u{0178}' => 0x9f,
        _ => return None,
    };
    Some(byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::blank_pdf;
    use image::Rgba;

    fn opaque_stamp(width: u32, height: u32) -> OverlayStamp {
        OverlayStamp {
            layers: vec![StampLayer::Image(RgbaImage::from_pixel(
                width,
                height,
                Rgba([255, 255, 255, 200]),
            ))],
        }
    }

    fn run(text: &str) -> TextRun {
        TextRun {
            x: 10.0,
            baseline: 30.0,
            font_size: 16.0,
            color: [0, 0, 0],
            text: text.to_owned(),
        }
    }

    fn page_dict(doc: &Document, page_number: u32) -> Dictionary {
        let page_id = doc.get_pages()[&page_number];
        doc.get_dictionary(page_id).expect("page dictionary").clone()
    }

    #[test]
    fn stamps_image_onto_requested_page_only() {
        let source = blank_pdf(&[(612.0, 792.0), (612.0, 792.0)]);
        let out = stamp_overlay(&source, 1, &opaque_stamp(10, 10)).expect("stamp should succeed");

        let doc = Document::load_mem(&out).expect("output should parse");
        let second = page_dict(&doc, 2);
        let contents = second.get(b"Contents").and_then(Object::as_array).expect("contents array");
        assert_eq!(contents.len(), 4);

        let resources = second.get(b"Resources").and_then(Object::as_dict).expect("resources");
        let xobjects = resources.get(b"XObject").and_then(Object::as_dict).expect("xobjects");
        assert!(xobjects.has(b"Ovl0"));

        let first = page_dict(&doc, 1);
        assert!(first.get(b"Contents").and_then(Object::as_reference).is_ok());
    }

    #[test]
    fn overlay_draws_across_the_media_box() {
        let source = blank_pdf(&[(300.0, 400.0)]);
        let out = stamp_overlay(&source, 0, &opaque_stamp(4, 4)).expect("stamp should succeed");

        let doc = Document::load_mem(&out).expect("output should parse");
        let page_id = doc.get_pages()[&1];
        let content = doc.get_page_content(page_id).expect("content should decode");
        let content = String::from_utf8_lossy(&content);

        assert!(content.contains("q 300 0 0 400 0 0 cm /Ovl0 Do Q"), "content was {content}");
    }

    #[test]
    fn text_runs_keep_inherited_fonts_and_escape_delimiters() {
        let source = blank_pdf(&[(612.0, 792.0)]);
        let stamp = OverlayStamp {
            layers: vec![
                StampLayer::Image(RgbaImage::new(4, 4)),
                StampLayer::Text(vec![run("Hello (world)")]),
            ],
        };

        let out = stamp_overlay(&source, 0, &stamp).expect("stamp should succeed");
        let doc = Document::load_mem(&out).expect("output should parse");
        let page = page_dict(&doc, 1);

        let fonts = page
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|resources| resources.get(b"Font"))
            .and_then(Object::as_dict)
            .expect("font resources");
        assert!(fonts.has(b"F1"), "inherited font must survive");
        assert!(fonts.has(b"FOvl0"));

        let content = doc.get_page_content(doc.get_pages()[&1]).expect("content should decode");
        let content = String::from_utf8_lossy(&content);
        assert!(content.contains("10 762 Td (Hello \\(world\\)) Tj"), "content was {content}");
        assert!(!content.contains("/Ovl0 Do"), "transparent raster should be skipped");
    }

    #[test]
    fn empty_overlay_returns_source_unchanged() {
        let source = blank_pdf(&[(612.0, 792.0)]);
        let stamp = OverlayStamp {
            layers: vec![StampLayer::Image(RgbaImage::new(8, 8)), StampLayer::Text(Vec::new())],
        };

        let out = stamp_overlay(&source, 0, &stamp).expect("stamp should succeed");
        assert_eq!(out, source);
    }

    #[test]
    fn layers_are_written_bottom_to_top() {
        let source = blank_pdf(&[(612.0, 792.0)]);
        let panel = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 230]));
        let stamp = OverlayStamp {
            layers: vec![
                StampLayer::Image(panel.clone()),
                StampLayer::Text(vec![run("below")]),
                StampLayer::Image(panel),
                StampLayer::Text(vec![run("above")]),
            ],
        };

        let out = stamp_overlay(&source, 0, &stamp).expect("stamp should succeed");
        let doc = Document::load_mem(&out).expect("output should parse");
        let content = doc.get_page_content(doc.get_pages()[&1]).expect("content should decode");
        let content = String::from_utf8_lossy(&content);

        let position = |needle: &str| {
            content.find(needle).unwrap_or_else(|| panic!("{needle} missing from {content}"))
        };
        assert!(position("/Ovl0 Do") < position("(below) Tj"));
        assert!(position("(below) Tj") < position("/Ovl1 Do"));
        assert!(position("/Ovl1 Do") < position("(above) Tj"));
        assert_eq!(content.matches("/FOvl0 ").count(), 2, "one font shared by both text layers");
    }

    #[test]
    fn out_of_range_page_is_rejected() {
        let source = blank_pdf(&[(612.0, 792.0)]);
        let err = stamp_overlay(&source, 3, &opaque_stamp(2, 2)).expect_err("page 3 is missing");

        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 3, page_count: 1 }));
    }

    #[test]
    fn win_ansi_encoding_replaces_unmappable_characters() {
        assert_eq!(encode_win_ansi("a\\b"), b"a\\\\b".to_vec());
        assert_eq!(encode_win_ansi("caf\u{e9}"), vec![b'c', b'a', b'f', 0xe9]);
        assert_eq!(encode_win_ansi("\u{4e2d}"), b"?".to_vec());
    }

    #[test]
    fn win_ansi_encoding_maps_typographic_punctuation() {
        assert_eq!(encode_win_ansi("\u{20ac}5"), vec![0x80, b'5']);
        assert_eq!(encode_win_ansi("\u{201c}hi\u{201d}"), vec![0x93, b'h', b'i', 0x94]);
        assert_eq!(encode_win_ansi("a\u{2013}b\u{2014}c"), vec![b'a', 0x96, b'b', 0x97, b'c']);
        assert_eq!(encode_win_ansi("wait\u{2026}"), vec![b'w', b'a', b'i', b't', 0x85]);
        assert_eq!(encode_win_ansi("\u{2019}"), vec![0x92]);
    }
}
