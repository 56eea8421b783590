//! Streaming CMYK TIFF sink implementation.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::Context as _;
use tiff::encoder::{Rational, TiffEncoder, colortype};
use tiff::tags::ResolutionUnit;

use crate::encode::sink::{OutputPattern, ScanlineSink, SinkConfig, SinkFactory};
use crate::foundation::core::ColorSpace;
use crate::foundation::error::{SpotMergeError, SpotMergeResult};

/// Scanline sink writing one CMYK8 TIFF file, one strip per scanline.
///
/// The `tiff` encoder is driven on a dedicated worker thread fed through a
/// bounded channel, so scanlines stream to disk as they arrive instead of
/// accumulating in memory. A failed write or finalize leaves the partial
/// file in place; no cleanup is attempted.
pub struct TiffSink {
    path: PathBuf,
    cfg: Option<SinkConfig>,
    tx: Option<mpsc::SyncSender<Vec<u8>>>,
    worker: Option<std::thread::JoinHandle<SpotMergeResult<()>>>,
    rows_written: u32,
    finished: bool,
}

impl TiffSink {
    /// Create a sink that will write to `path` once started.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cfg: None,
            tx: None,
            worker: None,
            rows_written: 0,
            finished: false,
        }
    }

    fn worker_error(&mut self) -> SpotMergeError {
        match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(())) => SpotMergeError::encode("tiff writer stopped unexpectedly"),
                Ok(Err(e)) => e,
                Err(_) => SpotMergeError::encode("tiff writer thread panicked"),
            },
            None => SpotMergeError::encode("tiff writer is not running"),
        }
    }
}

impl ScanlineSink for TiffSink {
    fn begin(&mut self, cfg: &SinkConfig) -> SpotMergeResult<()> {
        if self.cfg.is_some() {
            return Err(SpotMergeError::encode("sink already started"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(SpotMergeError::validation(
                "tiff sink width/height must be non-zero",
            ));
        }
        if cfg.color_space != ColorSpace::DeviceCmyk {
            return Err(SpotMergeError::validation(
                "tiff sink encodes device CMYK only",
            ));
        }
        if !cfg.dpi.is_finite() || cfg.dpi < 1.0 {
            return Err(SpotMergeError::validation(
                "tiff sink resolution must be at least 1 dpi",
            ));
        }

        ensure_parent_dir(&self.path)?;
        let file = File::create(&self.path).map_err(|e| {
            SpotMergeError::encode(format!("create '{}': {e}", self.path.display()))
        })?;

        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(4);
        let worker_cfg = cfg.clone();
        let worker = std::thread::spawn(move || encode_worker(file, &worker_cfg, &rx));

        self.cfg = Some(cfg.clone());
        self.tx = Some(tx);
        self.worker = Some(worker);
        self.rows_written = 0;
        self.finished = false;
        tracing::debug!(path = %self.path.display(), "tiff sink started");
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
        if self.rows_written == cfg.height {
            return Err(SpotMergeError::encode(format!(
                "received more than {} scanlines",
                cfg.height
            )));
        }
        let row_bytes = cfg.row_bytes();
        if row.len() < row_bytes {
            return Err(SpotMergeError::encode(format!(
                "scanline holds {} bytes, expected at least {row_bytes}",
                row.len()
            )));
        }

        let Some(tx) = self.tx.as_ref() else {
            return Err(SpotMergeError::encode("tiff writer is not running"));
        };
        // Stride padding stops here; only pixel data reaches the container.
        if tx.send(row[..row_bytes].to_vec()).is_err() {
            return Err(self.worker_error());
        }
        self.rows_written += 1;
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
        let expected = cfg.height;

        // Disconnect the channel so the worker sees end-of-scanlines.
        drop(self.tx.take());

        if self.rows_written != expected {
            let _ = self.worker.take().map(std::thread::JoinHandle::join);
            return Err(SpotMergeError::encode(format!(
                "finalized after {} of {expected} scanlines",
                self.rows_written
            )));
        }

        let result = match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SpotMergeError::encode("tiff writer thread panicked"))?,
            None => Err(SpotMergeError::encode("tiff writer is not running")),
        };
        result?;

        self.finished = true;
        tracing::debug!(path = %self.path.display(), "tiff sink finalized");
        Ok(())
    }
}

fn encode_worker(
    file: File,
    cfg: &SinkConfig,
    rx: &mpsc::Receiver<Vec<u8>>,
) -> SpotMergeResult<()> {
    let mut encoder = TiffEncoder::new(BufWriter::new(file))
        .map_err(|e| SpotMergeError::encode(format!("create tiff encoder: {e}")))?;
    let mut image = encoder
        .new_image::<colortype::CMYK8>(cfg.width, cfg.height)
        .map_err(|e| SpotMergeError::encode(format!("create tiff image: {e}")))?;
    image
        .rows_per_strip(1)
        .map_err(|e| SpotMergeError::encode(format!("configure tiff strips: {e}")))?;
    image.resolution(
        ResolutionUnit::Inch,
        Rational {
            n: cfg.dpi.round() as u32,
            d: 1,
        },
    );

    let mut rows: u32 = 0;
    while let Ok(row) = rx.recv() {
        image
            .write_strip(&row)
            .map_err(|e| SpotMergeError::encode(format!("write scanline {rows}: {e}")))?;
        rows += 1;
    }
    if rows != cfg.height {
        return Err(SpotMergeError::encode(format!(
            "stream ended after {rows} of {} scanlines",
            cfg.height
        )));
    }
    image
        .finish()
        .map_err(|e| SpotMergeError::encode(format!("finalize tiff: {e}")))
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> SpotMergeResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Factory creating one [`TiffSink`] per page from an [`OutputPattern`].
#[derive(Clone, Debug)]
pub struct TiffSinkFactory {
    pattern: OutputPattern,
}

impl TiffSinkFactory {
    /// Create a factory substituting page ordinals into `pattern`.
    pub fn new(pattern: OutputPattern) -> Self {
        Self { pattern }
    }

    /// The file path a given page ordinal encodes to.
    pub fn path_for(&self, ordinal: u32) -> PathBuf {
        PathBuf::from(self.pattern.file_name(ordinal))
    }
}

impl SinkFactory for TiffSinkFactory {
    fn create(&self, cfg: &SinkConfig) -> SpotMergeResult<Box<dyn ScanlineSink>> {
        Ok(Box::new(TiffSink::new(self.path_for(cfg.ordinal))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::sink::encode_raster;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "spotmerge_tiff_{tag}_{}_{}.tif",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ))
    }

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
    fn writes_a_decodable_cmyk_tiff() {
        let path = temp_path("ok");
        let cfg = cfg(2, 2);

        // Row stride carries 4 pad bytes that must not reach the file.
        let stride = 12;
        let mut buffer = vec![0xAAu8; stride * 2];
        for (y, row) in buffer.chunks_exact_mut(stride).enumerate() {
            for (x, px) in row[..8].chunks_exact_mut(4).enumerate() {
                px.copy_from_slice(&[y as u8, x as u8, 7, 9]);
            }
        }

        let mut sink = TiffSink::new(&path);
        encode_raster(&buffer, stride, &cfg, &mut sink).unwrap();

        let mut decoder = tiff::decoder::Decoder::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (2, 2));
        assert_eq!(decoder.colortype().unwrap(), tiff::ColorType::CMYK(8));
        let tiff::decoder::DecodingResult::U8(data) = decoder.read_image().unwrap() else {
            panic!("expected 8-bit samples");
        };
        assert_eq!(
            data,
            vec![0, 0, 7, 9, 0, 1, 7, 9, 1, 0, 7, 9, 1, 1, 7, 9],
            "pad bytes leaked into the container"
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn finish_requires_every_scanline() {
        let path = temp_path("short");
        let mut sink = TiffSink::new(&path);
        sink.begin(&cfg(1, 2)).unwrap();
        sink.write_scan_line(&[0u8; 4]).unwrap();
        let err = sink.finish().unwrap_err();
        assert!(matches!(err, SpotMergeError::Encode(_)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn sink_misuse_is_rejected() {
        let path = temp_path("misuse");
        let mut sink = TiffSink::new(&path);
        assert!(sink.write_scan_line(&[0u8; 4]).is_err(), "write before begin");

        sink.begin(&cfg(1, 1)).unwrap();
        assert!(sink.begin(&cfg(1, 1)).is_err(), "begin twice");
        sink.write_scan_line(&[0u8; 4]).unwrap();
        assert!(sink.write_scan_line(&[0u8; 4]).is_err(), "too many scanlines");
        sink.finish().unwrap();
        assert!(sink.finish().is_err(), "finish twice");
        assert!(sink.write_scan_line(&[0u8; 4]).is_err(), "write after finish");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn factory_names_files_by_ordinal() {
        let factory =
            TiffSinkFactory::new(OutputPattern::new("out/page_p%u.tif").unwrap());
        assert_eq!(factory.path_for(3), PathBuf::from("out/page_p3.tif"));
    }
}
