//! The scanline sink contract consumed by the raster driver.

use std::sync::{Arc, Mutex};

use crate::foundation::core::ColorSpace;
use crate::foundation::error::{SpotMergeError, SpotMergeResult};

/// Configuration provided to a [`ScanlineSink`] before any scanlines.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    /// 1-based global page ordinal, used for output naming.
    pub ordinal: u32,
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels; the exact number of scanlines the sink will
    /// receive.
    pub height: u32,
    /// Process color space of the incoming scanlines.
    pub color_space: ColorSpace,
    /// Raster resolution in dots per inch, recorded in the output file.
    pub dpi: f64,
}

impl SinkConfig {
    /// Bytes of pixel data per scanline (excluding stride padding).
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.color_space.bytes_per_pixel()
    }
}

/// Sink contract for consuming one page's raster, scanline by scanline.
///
/// Ordering contract: `begin` once, then exactly `height` `write_scan_line`
/// calls top row first, then `finish` exactly once. Each row slice carries at
/// least [`SinkConfig::row_bytes`] bytes of pixel data; anything beyond that
/// is stride padding and must be ignored. Violating the call sequence is an
/// encode error, not a silent truncation.
pub trait ScanlineSink: Send {
    /// Called once before any scanlines.
    fn begin(&mut self, cfg: &SinkConfig) -> SpotMergeResult<()>;
    /// Push the next scanline, top row first.
    fn write_scan_line(&mut self, row: &[u8]) -> SpotMergeResult<()>;
    /// Finalize the output once, after the last scanline.
    fn finish(&mut self) -> SpotMergeResult<()>;
}

/// Creates one sink per rendered page.
///
/// Shared by every page task, so factories are `Sync`; each created sink is
/// owned by a single page.
pub trait SinkFactory: Sync {
    /// Create the sink that will receive the page described by `cfg`.
    fn create(&self, cfg: &SinkConfig) -> SpotMergeResult<Box<dyn ScanlineSink>>;
}

/// Stream a completed raster buffer into a sink, row by row.
///
/// `stride` is the buffer's row stride in bytes and may exceed the pixel
/// data per row; each scanline call receives the full stride slice.
pub fn encode_raster(
    buffer: &[u8],
    stride: usize,
    cfg: &SinkConfig,
    sink: &mut dyn ScanlineSink,
) -> SpotMergeResult<()> {
    let height = cfg.height as usize;
    if stride < cfg.row_bytes() {
        return Err(SpotMergeError::encode(format!(
            "row stride {stride} is smaller than {} bytes of pixel data per row",
            cfg.row_bytes()
        )));
    }
    if buffer.len() < stride * height {
        return Err(SpotMergeError::encode(format!(
            "raster buffer holds {} bytes, encoding needs {}",
            buffer.len(),
            stride * height
        )));
    }

    sink.begin(cfg)?;
    for y in 0..height {
        sink.write_scan_line(&buffer[y * stride..(y + 1) * stride])?;
    }
    sink.finish()
}

/// Output filename pattern with a single `%u` page-ordinal placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPattern {
    pattern: String,
}

impl OutputPattern {
    /// Validate a pattern.
    ///
    /// Exactly one `%u` is required; zero placeholders would make every page
    /// overwrite the last, and more than one has no defined substitution.
    pub fn new(pattern: impl Into<String>) -> SpotMergeResult<Self> {
        let pattern = pattern.into();
        match pattern.matches("%u").count() {
            1 => Ok(Self { pattern }),
            n => Err(SpotMergeError::validation(format!(
                "output pattern '{pattern}' must contain exactly one '%u' placeholder, found {n}"
            ))),
        }
    }

    /// Substitute the page ordinal into the pattern.
    pub fn file_name(&self, ordinal: u32) -> String {
        self.pattern.replacen("%u", &ordinal.to_string(), 1)
    }
}

/// One page captured by [`InMemorySink`].
#[derive(Clone, Debug)]
pub struct CapturedPage {
    /// Sink configuration the page was written with.
    pub cfg: SinkConfig,
    /// Scanlines in write order, each the full stride slice.
    pub rows: Vec<Vec<u8>>,
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    rows: Vec<Vec<u8>>,
    finished: bool,
    store: Option<Arc<Mutex<Vec<CapturedPage>>>>,
}

impl InMemorySink {
    /// Create a standalone in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_store(store: Arc<Mutex<Vec<CapturedPage>>>) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    /// The configuration captured by `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg.clone()
    }

    /// Scanlines written so far.
    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// Whether `finish` has completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ScanlineSink for InMemorySink {
    fn begin(&mut self, cfg: &SinkConfig) -> SpotMergeResult<()> {
        if self.cfg.is_some() {
            return Err(SpotMergeError::encode("sink already started"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(SpotMergeError::validation(
                "sink width/height must be non-zero",
            ));
        }
        self.cfg = Some(cfg.clone());
        self.rows.clear();
        Ok(())
    }

    fn write_scan_line(&mut self, row: &[u8]) -> SpotMergeResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| SpotMergeError::encode("sink not started"))?;
        if self.finished {
            return Err(SpotMergeError::encode("sink is already finalized"));
        }
        if self.rows.len() == cfg.height as usize {
            return Err(SpotMergeError::encode(format!(
                "received more than {} scanlines",
                cfg.height
            )));
        }
        if row.len() < cfg.row_bytes() {
            return Err(SpotMergeError::encode(format!(
                "scanline holds {} bytes, expected at least {}",
                row.len(),
                cfg.row_bytes()
            )));
        }
        self.rows.push(row.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> SpotMergeResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| SpotMergeError::encode("sink not started"))?;
        if self.finished {
            return Err(SpotMergeError::encode("sink is already finalized"));
        }
        if self.rows.len() != cfg.height as usize {
            return Err(SpotMergeError::encode(format!(
                "finalized after {} of {} scanlines",
                self.rows.len(),
                cfg.height
            )));
        }
        self.finished = true;
        if let Some(store) = &self.store {
            store
                .lock()
                .map_err(|_| SpotMergeError::encode("captured page store is poisoned"))?
                .push(CapturedPage {
                    cfg: cfg.clone(),
                    rows: self.rows.clone(),
                });
        }
        Ok(())
    }
}

/// Factory producing [`InMemorySink`] values that record finished pages into
/// a shared store.
#[derive(Debug, Default)]
pub struct InMemorySinkFactory {
    store: Arc<Mutex<Vec<CapturedPage>>>,
}

impl InMemorySinkFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished pages, sorted by ordinal.
    pub fn pages(&self) -> Vec<CapturedPage> {
        let mut pages = self
            .store
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();
        pages.sort_by_key(|p| p.cfg.ordinal);
        pages
    }
}

impl SinkFactory for InMemorySinkFactory {
    fn create(&self, _cfg: &SinkConfig) -> SpotMergeResult<Box<dyn ScanlineSink>> {
        Ok(Box::new(InMemorySink::with_store(self.store.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(width: u32, height: u32) -> SinkConfig {
        SinkConfig {
            ordinal: 1,
            width,
            height,
            color_space: ColorSpace::DeviceCmyk,
            dpi: 300.0,
        }
    }

    #[test]
    fn output_pattern_requires_exactly_one_placeholder() {
        assert!(OutputPattern::new("page_%u.tif").is_ok());
        assert!(OutputPattern::new("page.tif").is_err());
        assert!(OutputPattern::new("%u_%u.tif").is_err());
    }

    #[test]
    fn output_pattern_substitutes_the_ordinal() {
        let pattern = OutputPattern::new("out/doc_p%u.tif").unwrap();
        assert_eq!(pattern.file_name(1), "out/doc_p1.tif");
        assert_eq!(pattern.file_name(42), "out/doc_p42.tif");
    }

    #[test]
    fn sink_contract_happy_path() {
        let mut sink = InMemorySink::new();
        sink.begin(&cfg(2, 2)).unwrap();
        sink.write_scan_line(&[1u8; 8]).unwrap();
        sink.write_scan_line(&[2u8; 8]).unwrap();
        sink.finish().unwrap();
        assert!(sink.is_finished());
        assert_eq!(sink.rows().len(), 2);
    }

    #[test]
    fn sink_rejects_misuse() {
        let mut sink = InMemorySink::new();
        assert!(sink.write_scan_line(&[0u8; 8]).is_err(), "write before begin");

        sink.begin(&cfg(2, 1)).unwrap();
        assert!(sink.begin(&cfg(2, 1)).is_err(), "begin twice");
        assert!(sink.finish().is_err(), "finish before all scanlines");

        sink.write_scan_line(&[0u8; 8]).unwrap();
        assert!(sink.write_scan_line(&[0u8; 8]).is_err(), "too many scanlines");

        sink.finish().unwrap();
        assert!(sink.finish().is_err(), "finish twice");
        assert!(sink.write_scan_line(&[0u8; 8]).is_err(), "write after finish");
    }

    #[test]
    fn sink_rejects_short_scanlines() {
        let mut sink = InMemorySink::new();
        sink.begin(&cfg(4, 1)).unwrap();
        assert!(sink.write_scan_line(&[0u8; 15]).is_err());
    }

    #[test]
    fn encode_raster_streams_rows_with_stride_padding_intact() {
        // 2x2 CMYK with a 4-byte pad per row; pad bytes are distinct so
        // corruption across rows would be visible.
        let stride = 12;
        let mut buffer = vec![0u8; stride * 2];
        for (y, row) in buffer.chunks_exact_mut(stride).enumerate() {
            row[..8].fill(y as u8 + 1);
            row[8..].fill(0xEE);
        }

        let cfg = cfg(2, 2);
        let mut sink = InMemorySink::new();
        encode_raster(&buffer, stride, &cfg, &mut sink).unwrap();

        assert!(sink.is_finished());
        assert_eq!(sink.rows().len(), 2);
        for (y, row) in sink.rows().iter().enumerate() {
            assert_eq!(&row[..8], &[y as u8 + 1; 8]);
            assert_eq!(&row[8..], &[0xEE; 4], "padding must pass through untouched");
        }
    }

    #[test]
    fn encode_raster_rejects_undersized_buffers() {
        let cfg = cfg(2, 2);
        let mut sink = InMemorySink::new();
        assert!(matches!(
            encode_raster(&[0u8; 8], 8, &cfg, &mut sink).unwrap_err(),
            SpotMergeError::Encode(_)
        ));
    }

    #[test]
    fn factory_collects_finished_pages_by_ordinal() {
        let factory = InMemorySinkFactory::new();

        for ordinal in [2u32, 1u32] {
            let cfg = SinkConfig {
                ordinal,
                ..cfg(1, 1)
            };
            let mut sink = factory.create(&cfg).unwrap();
            sink.begin(&cfg).unwrap();
            sink.write_scan_line(&[ordinal as u8; 4]).unwrap();
            sink.finish().unwrap();
        }

        let pages = factory.pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].cfg.ordinal, 1);
        assert_eq!(pages[1].cfg.ordinal, 2);
        assert_eq!(pages[1].rows[0], vec![2u8; 4]);
    }
}
