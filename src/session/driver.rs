use rayon::prelude::*;

use crate::doc::assembly::Assembly;
use crate::doc::model::PageContent;
use crate::encode::sink::{SinkConfig, SinkFactory, encode_raster};
use crate::foundation::core::{ColorSpace, RasterDims};
use crate::foundation::error::{SpotMergeError, SpotMergeResult};
use crate::merge::spec::SpotMergeSpec;
use crate::render::service::{RenderService, RenderSpec};

/// Options controlling [`RasterSession`] behavior.
#[derive(Clone, Copy, Debug)]
pub struct RasterSessionOpts {
    /// Target raster resolution in dots per inch.
    pub resolution_dpi: f64,
    /// Render pages on a rayon thread pool instead of sequentially.
    ///
    /// Every page task owns its buffer, render spec, and sink; the rendering
    /// service, merge specs, and sink factory are shared read-only.
    pub parallel: bool,
    /// Override the number of rayon worker threads. `None` uses rayon
    /// defaults.
    pub threads: Option<usize>,
}

impl Default for RasterSessionOpts {
    fn default() -> Self {
        Self {
            resolution_dpi: 300.0,
            parallel: false,
            threads: None,
        }
    }
}

/// Assembly render statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Documents traversed.
    pub documents: u32,
    /// Pages rendered and encoded.
    pub pages: u32,
}

/// One enumerated unit of work: a page plus its global output ordinal.
#[derive(Clone, Copy, Debug)]
struct PageJob {
    doc_index: u32,
    page_index: u32,
    ordinal: u32,
}

/// Drives rendering of every page in an assembly through the merge
/// post-process and into per-page image files.
///
/// The session itself is cheap and stateless; the expensive artifacts (LUT
/// textures, the shader program) live in the rendering service and are
/// reused by every page.
pub struct RasterSession {
    opts: RasterSessionOpts,
}

impl RasterSession {
    /// Create a session.
    pub fn new(opts: RasterSessionOpts) -> SpotMergeResult<Self> {
        if !opts.resolution_dpi.is_finite() || opts.resolution_dpi <= 0.0 {
            return Err(SpotMergeError::geometry(format!(
                "target resolution must be finite and positive, got {}",
                opts.resolution_dpi
            )));
        }
        Ok(Self { opts })
    }

    /// The options this session runs with.
    pub fn opts(&self) -> &RasterSessionOpts {
        &self.opts
    }

    /// Render a single page's content to an owned raster buffer.
    ///
    /// Used by single-page previews and tests; [`Self::render_assembly`] is
    /// the full pipeline.
    pub fn render_page(
        &self,
        content: &PageContent,
        svc: &dyn RenderService,
        merges: &[SpotMergeSpec],
    ) -> SpotMergeResult<(RasterDims, Vec<u8>)> {
        render_to_buffer(content, svc, merges, self.opts.resolution_dpi)
    }

    /// Render and encode every page of every document in `assembly`.
    ///
    /// Documents and pages are dense and zero-based; enumeration stops at the
    /// first missing index. Each page gets a 1-based global ordinal in
    /// enumeration order, threaded through to the sink factory for output
    /// naming. Any failure aborts the run; there are no retries and no
    /// partially-rendered success state.
    #[tracing::instrument(skip_all)]
    pub fn render_assembly(
        &self,
        assembly: &dyn Assembly,
        svc: &dyn RenderService,
        merges: &[SpotMergeSpec],
        sinks: &dyn SinkFactory,
    ) -> SpotMergeResult<RenderStats> {
        let (jobs, documents) = enumerate_jobs(assembly)?;
        tracing::debug!(documents, pages = jobs.len(), "enumerated assembly");

        if self.opts.parallel {
            let pool = build_thread_pool(self.opts.threads)?;
            pool.install(|| {
                jobs.par_iter()
                    .try_for_each(|job| self.run_job(assembly, svc, merges, sinks, *job))
            })?;
        } else {
            for job in &jobs {
                self.run_job(assembly, svc, merges, sinks, *job)?;
            }
        }

        Ok(RenderStats {
            documents,
            pages: jobs.len() as u32,
        })
    }

    fn run_job(
        &self,
        assembly: &dyn Assembly,
        svc: &dyn RenderService,
        merges: &[SpotMergeSpec],
        sinks: &dyn SinkFactory,
        job: PageJob,
    ) -> SpotMergeResult<()> {
        let document = assembly.document(job.doc_index)?;
        let page = document.page(job.page_index)?;
        // Content ownership transfers here; the page handle is consumed and
        // its resources released before any rendering starts.
        let content = page.content()?;

        let (dims, buffer) = render_to_buffer(&content, svc, merges, self.opts.resolution_dpi)?;

        let cfg = SinkConfig {
            ordinal: job.ordinal,
            width: dims.width,
            height: dims.height,
            color_space: ColorSpace::DeviceCmyk,
            dpi: self.opts.resolution_dpi,
        };
        let mut sink = sinks.create(&cfg)?;
        encode_raster(
            &buffer,
            dims.stride_bytes(ColorSpace::DeviceCmyk),
            &cfg,
            sink.as_mut(),
        )?;

        tracing::debug!(
            ordinal = job.ordinal,
            doc = job.doc_index,
            page = job.page_index,
            width = dims.width,
            height = dims.height,
            "page rendered and encoded"
        );
        Ok(())
    }
}

fn enumerate_jobs(assembly: &dyn Assembly) -> SpotMergeResult<(Vec<PageJob>, u32)> {
    let mut jobs = Vec::new();
    let mut doc_index = 0u32;
    while assembly.document_exists(doc_index) {
        let document = assembly.document(doc_index)?;
        let mut page_index = 0u32;
        while document.page_exists(page_index) {
            let ordinal = jobs.len() as u32 + 1;
            jobs.push(PageJob {
                doc_index,
                page_index,
                ordinal,
            });
            page_index += 1;
        }
        doc_index += 1;
    }
    Ok((jobs, doc_index))
}

fn render_to_buffer(
    content: &PageContent,
    svc: &dyn RenderService,
    merges: &[SpotMergeSpec],
    dpi: f64,
) -> SpotMergeResult<(RasterDims, Vec<u8>)> {
    let dims = RasterDims::of(content.width, content.height, dpi)?;
    let space = ColorSpace::DeviceCmyk;
    let mut buffer = vec![0u8; dims.buffer_len(space)];

    let mut spec = RenderSpec {
        width: dims.width,
        height: dims.height,
        source_rect: content.extent(),
        process_space: space,
        buffer: &mut buffer,
        row_stride: dims.stride_bytes(space),
        post_processes: merges,
    };
    svc.render(content, &mut spec)?;

    Ok((dims, buffer))
}

fn build_thread_pool(threads: Option<usize>) -> SpotMergeResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(SpotMergeError::validation(
            "render 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SpotMergeError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::assembly::{InMemoryAssembly, InMemoryDocument};
    use crate::doc::model::SpotFill;
    use crate::encode::sink::InMemorySinkFactory;
    use crate::foundation::core::{ProcessColor, Rect};
    use crate::merge::lut::{SpotLut, cyan_yellow_ramp, white_green_red_ramp};
    use crate::merge::spec::{SpotBinding, SpotMergeSpec};
    use crate::render::cpu::{CpuRenderService, SPIRV_MAGIC};

    fn minimal_program() -> Vec<u8> {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        bytes
    }

    fn setup() -> (CpuRenderService, Vec<SpotMergeSpec>) {
        let mut svc = CpuRenderService::new();
        let foo = SpotLut::from_ramp(white_green_red_ramp)
            .unwrap()
            .upload(&mut svc)
            .unwrap();
        let bar = SpotLut::from_ramp(cyan_yellow_ramp)
            .unwrap()
            .upload(&mut svc)
            .unwrap();
        let shader = svc.create_fragment_shader(&minimal_program()).unwrap();
        let merge = SpotMergeSpec::new(
            vec![SpotBinding::new("Foo", foo), SpotBinding::new("Bar", bar)],
            shader,
            Vec::new(),
        )
        .unwrap();
        (svc, vec![merge])
    }

    fn sample_page(width: f64, height: f64, tint: f64) -> PageContent {
        PageContent {
            width,
            height,
            base: ProcessColor::new(0.0, 0.0, 0.0, 0.05),
            spot_fills: vec![SpotFill {
                colorant: "Foo".to_owned(),
                tint,
                rect: Rect::new(0.0, 0.0, width / 2.0, height),
            }],
        }
    }

    #[test]
    fn empty_assembly_renders_zero_pages_successfully() {
        let (svc, merges) = setup();
        let assembly = InMemoryAssembly::default();
        let sinks = InMemorySinkFactory::new();

        let session = RasterSession::new(RasterSessionOpts::default()).unwrap();
        let stats = session
            .render_assembly(&assembly, &svc, &merges, &sinks)
            .unwrap();

        assert_eq!(stats, RenderStats::default());
        assert!(sinks.pages().is_empty());
    }

    #[test]
    fn ordinals_run_across_document_boundaries() {
        let (svc, merges) = setup();
        let assembly = InMemoryAssembly {
            documents: vec![
                InMemoryDocument {
                    pages: vec![sample_page(96.0, 96.0, 0.25)],
                },
                InMemoryDocument {
                    pages: vec![sample_page(48.0, 96.0, 0.5), sample_page(96.0, 48.0, 1.0)],
                },
            ],
        };
        let sinks = InMemorySinkFactory::new();

        let session = RasterSession::new(RasterSessionOpts::default()).unwrap();
        let stats = session
            .render_assembly(&assembly, &svc, &merges, &sinks)
            .unwrap();

        assert_eq!(
            stats,
            RenderStats {
                documents: 2,
                pages: 3,
            }
        );

        let pages = sinks.pages();
        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages.iter().map(|p| p.cfg.ordinal).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(pages[1].cfg.width, 150);
        assert_eq!(pages[2].cfg.height, 150);
        for page in &pages {
            assert_eq!(page.rows.len(), page.cfg.height as usize);
        }
    }

    #[test]
    fn parallel_output_matches_sequential_output() {
        let (svc, merges) = setup();
        let assembly = InMemoryAssembly::single_document(vec![
            sample_page(96.0, 96.0, 0.2),
            sample_page(96.0, 96.0, 0.6),
            sample_page(48.0, 48.0, 0.9),
            sample_page(96.0, 24.0, 1.0),
        ]);

        let seq_sinks = InMemorySinkFactory::new();
        let seq = RasterSession::new(RasterSessionOpts {
            resolution_dpi: 96.0,
            ..RasterSessionOpts::default()
        })
        .unwrap();
        seq.render_assembly(&assembly, &svc, &merges, &seq_sinks)
            .unwrap();

        let par_sinks = InMemorySinkFactory::new();
        let par = RasterSession::new(RasterSessionOpts {
            resolution_dpi: 96.0,
            parallel: true,
            threads: Some(2),
        })
        .unwrap();
        par.render_assembly(&assembly, &svc, &merges, &par_sinks)
            .unwrap();

        let a = seq_sinks.pages();
        let b = par_sinks.pages();
        assert_eq!(a.len(), b.len());
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert_eq!(pa.cfg, pb.cfg);
            assert_eq!(pa.rows, pb.rows);
        }
    }

    #[test]
    fn degenerate_page_geometry_aborts_the_run() {
        let (svc, merges) = setup();
        let assembly = InMemoryAssembly::single_document(vec![PageContent::blank(0.0, 96.0)]);
        let sinks = InMemorySinkFactory::new();

        let session = RasterSession::new(RasterSessionOpts::default()).unwrap();
        let err = session
            .render_assembly(&assembly, &svc, &merges, &sinks)
            .unwrap_err();
        assert!(matches!(err, SpotMergeError::Geometry(_)));
    }

    #[test]
    fn zero_threads_is_rejected() {
        let (svc, merges) = setup();
        let assembly = InMemoryAssembly::single_document(vec![sample_page(96.0, 96.0, 0.5)]);
        let sinks = InMemorySinkFactory::new();

        let session = RasterSession::new(RasterSessionOpts {
            parallel: true,
            threads: Some(0),
            ..RasterSessionOpts::default()
        })
        .unwrap();
        assert!(
            session
                .render_assembly(&assembly, &svc, &merges, &sinks)
                .is_err()
        );
    }

    #[test]
    fn invalid_session_resolution_is_rejected() {
        assert!(
            RasterSession::new(RasterSessionOpts {
                resolution_dpi: 0.0,
                ..RasterSessionOpts::default()
            })
            .is_err()
        );
    }
}
