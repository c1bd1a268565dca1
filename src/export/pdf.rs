//! PDF export.
//!
//! The rendered sheet arrives as one tall raster snapshot (captured by the
//! client at `DeviceCapabilities::capture_scale`). It is sliced into A4
//! content frames, each frame is placed on its own page, and every page gets
//! the branding header, a "Page i / n" footer and the optional watermark.

use base64::Engine as _;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use printpdf::{
  BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect, Rgb,
};
use tracing::{debug, instrument};

use crate::config::Branding;
use crate::domain::StudySheetContent;
use crate::error::ExportError;
use crate::progress::{ExportStage, ProgressObserver};

use super::DeviceCapabilities;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 10.0;
const HEADER_H: f32 = 16.0;
const CONTENT_W: f32 = PAGE_W - 2.0 * MARGIN;
const CONTENT_H: f32 = PAGE_H - 2.0 * MARGIN - HEADER_H;
const CONTENT_TOP: f32 = PAGE_H - MARGIN - HEADER_H;
const MM_PER_INCH: f32 = 25.4;

/// Source of the rendered page raster.
pub trait PageCapture: Send + Sync {
  fn capture(&self, scale: f32) -> Result<DynamicImage, ExportError>;
}

/// A snapshot uploaded by the client, encoded PNG or JPEG.
pub struct SnapshotCapture {
  pub bytes: Vec<u8>,
  /// Scale the snapshot was rendered at.
  pub source_scale: f32,
}

impl SnapshotCapture {
  /// Accepts raw base64 or a `data:image/...;base64,` URL.
  pub fn from_base64(data: &str, source_scale: f32) -> Result<Self, ExportError> {
    let payload = match data.split_once("base64,") {
      Some((_, rest)) => rest,
      None => data,
    };
    let bytes = base64::engine::general_purpose::STANDARD
      .decode(payload.trim())
      .map_err(|e| ExportError::Capture(format!("snapshot is not valid base64: {e}")))?;
    Ok(Self { bytes, source_scale })
  }
}

impl PageCapture for SnapshotCapture {
  fn capture(&self, scale: f32) -> Result<DynamicImage, ExportError> {
    if self.bytes.is_empty() {
      return Err(ExportError::Capture("empty snapshot".into()));
    }
    let img = image::load_from_memory(&self.bytes)?;
    if self.source_scale > scale && scale > 0.0 {
      let ratio = scale / self.source_scale;
      let (w, h) = img.dimensions();
      let nw = ((w as f32 * ratio).round() as u32).max(1);
      let nh = ((h as f32 * ratio).round() as u32).max(1);
      return Ok(img.resize_exact(nw, nh, FilterType::Triangle));
    }
    Ok(img)
  }
}

#[derive(Debug)]
pub struct PdfOutput {
  pub bytes: Vec<u8>,
  pub pages: usize,
}

/// Height in pixels of one content frame for a snapshot `width_px` wide.
fn frame_height_px(width_px: u32) -> u32 {
  ((width_px as f32 * CONTENT_H / CONTENT_W).ceil() as u32).max(1)
}

fn pdf_err(e: impl std::fmt::Debug) -> ExportError {
  ExportError::Pdf(format!("{e:?}"))
}

fn rgb(c: [u8; 3]) -> Color {
  Color::Rgb(Rgb::new(c[0] as f32 / 255.0, c[1] as f32 / 255.0, c[2] as f32 / 255.0, None))
}

#[instrument(level = "info", skip_all, fields(title = %content.title, constrained = device.constrained))]
pub fn build_pdf(
  content: &StudySheetContent,
  capture: &dyn PageCapture,
  branding: &Branding,
  device: &DeviceCapabilities,
  progress: &dyn ProgressObserver<ExportStage>,
) -> Result<PdfOutput, ExportError> {
  let stage = |s: ExportStage| progress.on_stage(s, s.percent());

  stage(ExportStage::Preparing);
  if !device.supported {
    return Err(ExportError::UnsupportedDevice(
      "please use a recent desktop browser or the web/JSON export".into(),
    ));
  }

  stage(ExportStage::Capturing);
  let snapshot = capture.capture(device.capture_scale())?.to_rgb8();
  let (width, height) = snapshot.dimensions();
  if width == 0 || height == 0 {
    return Err(ExportError::Capture("snapshot has no pixels".into()));
  }

  stage(ExportStage::Converting);
  let frame_h = frame_height_px(width);
  let pages = height.div_ceil(frame_h).max(1) as usize;
  let dpi = width as f32 * MM_PER_INCH / CONTENT_W;
  debug!(target: "studysheet_backend::export", width, height, frame_h, pages, dpi, "Slicing snapshot");

  let (doc, first_page, first_layer) = PdfDocument::new(content.title.as_str(), Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
  let mut layers: Vec<PdfLayerReference> = vec![doc.get_page(first_page).get_layer(first_layer)];
  for i in 1..pages {
    let (p, l) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), format!("Layer {}", i + 1));
    layers.push(doc.get_page(p).get_layer(l));
  }

  for (i, layer) in layers.iter().enumerate() {
    let top = i as u32 * frame_h;
    let slice_h = frame_h.min(height - top);
    let slice = image::imageops::crop_imm(&snapshot, 0, top, width, slice_h).to_image();
    let slice_mm = slice_h as f32 / dpi * MM_PER_INCH;
    Image::from_dynamic_image(&DynamicImage::ImageRgb8(slice)).add_to_layer(
      layer.clone(),
      ImageTransform {
        translate_x: Some(Mm(MARGIN)),
        translate_y: Some(Mm(CONTENT_TOP - slice_mm)),
        dpi: Some(dpi),
        ..Default::default()
      },
    );
  }

  stage(ExportStage::Metadata);
  let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
  let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?;
  for (i, layer) in layers.iter().enumerate() {
    decorate_page(layer, branding, &font, &bold, i + 1, pages);
  }

  stage(ExportStage::Finalizing);
  let bytes = doc.save_to_bytes().map_err(pdf_err)?;

  stage(ExportStage::Complete);
  Ok(PdfOutput { bytes, pages })
}

fn decorate_page(
  layer: &PdfLayerReference,
  branding: &Branding,
  font: &IndirectFontRef,
  bold: &IndirectFontRef,
  page: usize,
  pages: usize,
) {
  layer.set_fill_color(rgb(branding.header_color));
  layer.add_rect(Rect::new(Mm(MARGIN), Mm(CONTENT_TOP), Mm(PAGE_W - MARGIN), Mm(PAGE_H - MARGIN)));

  layer.set_fill_color(rgb([255, 255, 255]));
  layer.use_text(branding.logo_text.as_str(), 14.0, Mm(MARGIN + 4.0), Mm(CONTENT_TOP + 5.5), bold);

  layer.set_fill_color(rgb([107, 114, 128]));
  let footer = format!("{}    Page {} / {}", branding.footer_text, page, pages);
  layer.use_text(footer, 8.0, Mm(MARGIN), Mm(MARGIN / 2.0), font);

  if let Some(mark) = &branding.watermark {
    layer.set_fill_color(rgb([209, 213, 219]));
    layer.use_text(mark.as_str(), 40.0, Mm(PAGE_W / 4.0), Mm(PAGE_H / 2.0), bold);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fallback::generate_emergency_content;
  use crate::progress::tests::Recorder;
  use crate::progress::NoProgress;
  use std::io::Cursor;

  fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([250, 250, 250]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
      .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
      .unwrap();
    buf
  }

  #[test]
  fn tall_snapshot_spans_several_pages() {
    // 400 px wide -> frames of 550 px; 1200 px tall -> 3 pages.
    let capture = SnapshotCapture { bytes: png(400, 1200), source_scale: 2.0 };
    let rec = Recorder::<ExportStage>::new();
    let branding = Branding { watermark: Some("DRAFT".into()), ..Branding::default() };
    let out = build_pdf(&generate_emergency_content("x"), &capture, &branding, &DeviceCapabilities::desktop(), &rec).unwrap();

    assert_eq!(out.pages, 3);
    assert!(out.bytes.starts_with(b"%PDF"));
    assert_eq!(
      rec.stages(),
      vec![
        ExportStage::Preparing,
        ExportStage::Capturing,
        ExportStage::Converting,
        ExportStage::Metadata,
        ExportStage::Finalizing,
        ExportStage::Complete,
      ]
    );
  }

  #[test]
  fn short_snapshot_is_one_page() {
    let capture = SnapshotCapture { bytes: png(200, 50), source_scale: 1.0 };
    let out = build_pdf(&generate_emergency_content("x"), &capture, &Branding::default(), &DeviceCapabilities::desktop(), &NoProgress).unwrap();
    assert_eq!(out.pages, 1);
  }

  #[test]
  fn unsupported_device_stops_after_preparing() {
    let capture = SnapshotCapture { bytes: png(10, 10), source_scale: 1.0 };
    let device = DeviceCapabilities { constrained: true, supported: false };
    let rec = Recorder::<ExportStage>::new();
    let err = build_pdf(&generate_emergency_content("x"), &capture, &Branding::default(), &device, &rec).unwrap_err();
    assert!(matches!(err, ExportError::UnsupportedDevice(_)));
    assert_eq!(rec.stages(), vec![ExportStage::Preparing]);
  }

  #[test]
  fn constrained_devices_get_a_downscaled_capture() {
    let capture = SnapshotCapture { bytes: png(400, 100), source_scale: 2.0 };
    let img = capture.capture(1.0).unwrap();
    assert_eq!(img.dimensions(), (200, 50));
    assert_eq!(capture.capture(2.0).unwrap().dimensions(), (400, 100));
  }

  #[test]
  fn garbage_snapshot_is_a_capture_error() {
    let capture = SnapshotCapture { bytes: b"not an image".to_vec(), source_scale: 1.0 };
    let err = build_pdf(&generate_emergency_content("x"), &capture, &Branding::default(), &DeviceCapabilities::desktop(), &NoProgress).unwrap_err();
    assert!(matches!(err, ExportError::Capture(_)));
    assert!(SnapshotCapture::from_base64("%%%", 1.0).is_err());
  }

  #[test]
  fn data_urls_are_accepted() {
    let b64 = base64::engine::general_purpose::STANDARD.encode(png(4, 4));
    let cap = SnapshotCapture::from_base64(&format!("data:image/png;base64,{b64}"), 1.0).unwrap();
    assert_eq!(cap.capture(1.0).unwrap().dimensions(), (4, 4));
  }
}
