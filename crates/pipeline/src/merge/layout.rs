//! Page geometry for one invoice + screenshot pair.
//!
//! Landscape A4 page, invoice on the left scaled into `inv_ratio` of the
//! usable width, screenshot in the remaining space to its right. Both are
//! vertically centered. Units are PDF points, origin bottom-left.

/// Landscape A4 width in points.
pub const PAGE_WIDTH: f64 = 842.0;
/// Landscape A4 height in points.
pub const PAGE_HEIGHT: f64 = 595.0;
/// Outer page margin.
pub const MARGIN: f64 = 20.0;
/// Horizontal gap between the invoice and the screenshot.
pub const GAP: f64 = 20.0;

/// Where a drawn element lands on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairLayout {
    pub invoice: Placement,
    pub screenshot: Placement,
}

/// Compute placements for an invoice page of `invoice_size` points and a
/// screenshot of `screenshot_size` pixels.
///
/// `inv_ratio` is used as given; values outside `(0, 1)` produce odd but
/// well-defined geometry.
pub fn layout_pair(
    invoice_size: (f64, f64),
    screenshot_size: (f64, f64),
    inv_ratio: f64,
) -> PairLayout {
    let (pdf_w, pdf_h) = invoice_size;
    let usable_h = PAGE_HEIGHT - 2.0 * MARGIN;

    let max_inv_w = (PAGE_WIDTH - 2.0 * MARGIN - GAP) * inv_ratio;
    let scale = (max_inv_w / pdf_w).min(usable_h / pdf_h);
    let inv_w = pdf_w * scale;
    let inv_h = pdf_h * scale;
    let invoice = Placement {
        x: MARGIN,
        y: MARGIN + (usable_h - inv_h) / 2.0,
        width: inv_w,
        height: inv_h,
    };

    let (img_w, img_h) = screenshot_size;
    let aspect = img_w / img_h;
    let avail_w = PAGE_WIDTH - inv_w - 3.0 * MARGIN - GAP;
    let target_w = avail_w.min(usable_h * aspect);
    let target_h = target_w / aspect;
    let screenshot = Placement {
        x: invoice.x + inv_w + GAP,
        y: MARGIN + (usable_h - target_h) / 2.0,
        width: target_w,
        height: target_h,
    };

    PairLayout {
        invoice,
        screenshot,
    }
}
