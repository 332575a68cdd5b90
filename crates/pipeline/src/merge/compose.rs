//! PDF assembly for merge jobs.
//!
//! The first page of each invoice is imported as a form XObject, so it stays
//! vector; the screenshot is decoded upright and embedded as an RGB image XObject.

use std::path::Path;

use docdesk_core::body::JobError;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::layout::{layout_pair, Placement, PAGE_HEIGHT, PAGE_WIDTH};
use crate::scan::file_name;

/// How far up the page tree an inherited attribute is looked for.
const MAX_INHERIT_DEPTH: usize = 16;

/// Incrementally built output document, one page per pair.
pub struct PdfComposer {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

/// Invoice page imported into the output document.
struct ImportedPage {
    form_id: ObjectId,
    /// Lower-left corner and size of the source media box.
    origin: (f64, f64),
    size: (f64, f64),
}

impl PdfComposer {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append one page holding `invoice` (first page) and `screenshot`.
    pub fn add_pair(
        &mut self,
        invoice: &Path,
        screenshot: &Path,
        inv_ratio: f64,
    ) -> Result<(), JobError> {
        let imported = self.import_first_page(invoice)?;

        let image = load_screenshot(screenshot)?;
        let (px_w, px_h) = image.dimensions();
        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(px_w),
                "Height" => i64::from(px_h),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.into_raw(),
        ));

        let layout = layout_pair(imported.size, (f64::from(px_w), f64::from(px_h)), inv_ratio);
        let content = page_content(&imported, &layout.invoice, &layout.screenshot);
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let resources_id = self.doc.add_object(dictionary! {
            "XObject" => dictionary! {
                "Inv" => imported.form_id,
                "Shot" => image_id,
            },
        });
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Finish the page tree and write the document to `path`.
    pub fn save(mut self, path: &Path) -> Result<(), JobError> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                (PAGE_WIDTH as i64).into(),
                (PAGE_HEIGHT as i64).into(),
            ],
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        self.doc
            .save(path)
            .map_err(|e| JobError::Failed(format!("Cannot write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Copy every object of `invoice` into the output document and wrap its
    /// first page's content in a form XObject.
    fn import_first_page(&mut self, invoice: &Path) -> Result<ImportedPage, JobError> {
        let name = file_name(invoice);
        let mut source = Document::load(invoice)
            .map_err(|e| JobError::Failed(format!("Cannot open PDF {name}: {e}")))?;
        source.renumber_objects_with(self.doc.max_id + 1);

        let page_id = *source
            .get_pages()
            .values()
            .next()
            .ok_or_else(|| JobError::Failed(format!("PDF {name} has no pages")))?;
        let content = source
            .get_page_content(page_id)
            .map_err(|e| JobError::Failed(format!("Cannot read page of {name}: {e}")))?;
        let page = source
            .get_dictionary(page_id)
            .map_err(|e| JobError::Failed(format!("Malformed page in {name}: {e}")))?
            .clone();

        let media_box = inherited(&source, &page, b"MediaBox")
            .and_then(|obj| rect(&source, &obj))
            .ok_or_else(|| JobError::Failed(format!("PDF {name} has no usable MediaBox")))?;
        let resources = inherited(&source, &page, b"Resources")
            .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));

        self.doc.max_id = self.doc.max_id.max(source.max_id);
        self.doc.objects.extend(source.objects);

        let [llx, lly, urx, ury] = media_box;
        let form_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![llx.into(), lly.into(), urx.into(), ury.into()],
                "Resources" => resources,
            },
            content,
        ));

        let size = ((urx - llx) as f64, (ury - lly) as f64);
        if size.0 <= 0.0 || size.1 <= 0.0 {
            return Err(JobError::Failed(format!("PDF {name} has an empty page")));
        }

        Ok(ImportedPage {
            form_id,
            origin: (llx as f64, lly as f64),
            size,
        })
    }
}

impl Default for PdfComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a screenshot upright, honouring its EXIF orientation.
pub fn load_screenshot(path: &Path) -> Result<RgbImage, JobError> {
    let name = file_name(path);
    let unreadable = |e: ImageError| JobError::Failed(format!("Cannot read image {name}: {e}"));

    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(unreadable)?;
    let orientation = decoder.orientation().map_err(unreadable)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(unreadable)?;
    image.apply_orientation(orientation);

    let image = image.to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(JobError::Failed(format!("Image {name} has no pixels")));
    }
    Ok(image)
}

/// Content stream drawing the invoice form and the screenshot image.
fn page_content(invoice: &ImportedPage, inv: &Placement, shot: &Placement) -> String {
    let scale_x = inv.width / invoice.size.0;
    let scale_y = inv.height / invoice.size.1;
    let tx = inv.x - invoice.origin.0 * scale_x;
    let ty = inv.y - invoice.origin.1 * scale_y;

    format!(
        "q {scale_x:.5} 0 0 {scale_y:.5} {tx:.3} {ty:.3} cm /Inv Do Q\n\
         q {:.3} 0 0 {:.3} {:.3} {:.3} cm /Shot Do Q\n",
        shot.width, shot.height, shot.x, shot.y
    )
}

/// Look up `key` on a page, walking up `Parent` links for inherited
/// attributes.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut current = page.clone();
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?.clone();
    }
    None
}

/// Read a `[llx lly urx ury]` rectangle, resolving references.
fn rect(doc: &Document, obj: &Object) -> Option<[i64; 4]> {
    let array = match resolve(doc, obj)? {
        Object::Array(items) => items,
        _ => return None,
    };
    if array.len() != 4 {
        return None;
    }
    let mut out = [0i64; 4];
    for (slot, item) in out.iter_mut().zip(array) {
        *slot = number(resolve(doc, item)?)?.round() as i64;
    }
    Some(out)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::codecs::jpeg::JpegEncoder;

    use super::*;
    use crate::merge::layout::layout_pair;

    /// APP1 segment carrying a little-endian TIFF block with a single
    /// Orientation tag.
    fn exif_orientation_segment(orientation: u16) -> Vec<u8> {
        let mut payload = b"Exif\0\0II*\0".to_vec();
        payload.extend_from_slice(&8u32.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.extend_from_slice(&0x0112u16.to_le_bytes());
        payload.extend_from_slice(&3u16.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&orientation.to_le_bytes());
        payload.extend_from_slice(&[0, 0]);
        payload.extend_from_slice(&0u32.to_le_bytes());

        let mut segment = vec![0xFF, 0xE1];
        segment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        segment.extend_from_slice(&payload);
        segment
    }

    /// An 80x40 JPEG whose EXIF says "rotate 90 degrees clockwise".
    fn write_rotated_jpeg(path: &Path) {
        let img = RgbImage::from_pixel(80, 40, image::Rgb([10, 200, 90]));
        let mut encoded = Cursor::new(Vec::new());
        JpegEncoder::new(&mut encoded).encode_image(&img).unwrap();
        let encoded = encoded.into_inner();

        // SOI, then the EXIF segment, then the rest of the stream.
        let mut tagged = encoded[..2].to_vec();
        tagged.extend_from_slice(&exif_orientation_segment(6));
        tagged.extend_from_slice(&encoded[2..]);
        std::fs::write(path, tagged).unwrap();
    }

    #[test]
    fn screenshot_is_rotated_by_exif_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phone.jpg");
        write_rotated_jpeg(&path);

        let image = load_screenshot(&path).unwrap();
        assert_eq!(image.dimensions(), (40, 80));

        // The layout sees a portrait screenshot.
        let (w, h) = image.dimensions();
        let layout = layout_pair((595.0, 842.0), (f64::from(w), f64::from(h)), 0.75);
        let shot = layout.screenshot;
        assert!(shot.height > shot.width);
        assert!((shot.width / shot.height - 0.5).abs() < 1e-6);
    }

    #[test]
    fn screenshot_without_exif_keeps_its_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.png");
        RgbImage::from_pixel(80, 40, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        assert_eq!(load_screenshot(&path).unwrap().dimensions(), (80, 40));
    }

    #[test]
    fn unreadable_screenshot_fails_with_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = load_screenshot(&path).unwrap_err();
        assert!(err.to_string().contains("broken.png"), "{err}");
    }
}
