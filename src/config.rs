//! Configuration for graph execution.
//!
//! All engine behaviour is controlled through [`EngineConfig`], built via its
//! [`EngineConfigBuilder`]. Node-specific settings live on the nodes
//! themselves ([`crate::graph::NodeOp`]); this struct only holds what is
//! shared across a run: worker limits, render scales, editing geometry and
//! the injected services.
//!
//! # Design choice: builder over constructor
//! The renderer and the progress callback are trait objects most callers
//! never touch. The builder lets callers set only what they care about and
//! rely on documented defaults for the rest.

use crate::codec::{PageRenderer, PdfiumRenderer};
use crate::error::BoardError;
use crate::graph::{Size, SplicePolicy};
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Configuration for the execution planner and graph edits.
///
/// Built via [`EngineConfig::builder()`] or using [`EngineConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfboard::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .concurrency(4)
///     .render_scale(1.5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct EngineConfig {
    /// Maximum transforms running at once. Default: number of CPUs.
    ///
    /// Transforms are CPU-bound and run on the blocking pool; more workers
    /// than cores only adds memory pressure from documents held in flight.
    pub concurrency: usize,

    /// Scale used by flatten when the node does not set one. Range: 0.25–8. Default: 2.0.
    pub render_scale: f32,

    /// Scale for preview thumbnails. Range: 0.1–4. Default: 0.5.
    pub preview_scale: f32,

    /// Geometry for drop-on-edge splicing.
    pub splice: SplicePolicy,

    /// Receives per-node execution events.
    pub progress_callback: Option<ProgressCallback>,

    /// Page rasteriser for flatten, pdfToImage, previews and image exports.
    /// Default: [`PdfiumRenderer`].
    pub renderer: Arc<dyn PageRenderer>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism().map_or(4, |n| n.get()),
            render_scale: 2.0,
            preview_scale: 0.5,
            splice: SplicePolicy::default(),
            progress_callback: None,
            renderer: Arc::new(PdfiumRenderer::new()),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("concurrency", &self.concurrency)
            .field("render_scale", &self.render_scale)
            .field("preview_scale", &self.preview_scale)
            .field("splice", &self.splice)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExecutionProgressCallback>"),
            )
            .field("renderer", &"<dyn PageRenderer>")
            .finish()
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn preview_scale(mut self, scale: f32) -> Self {
        self.config.preview_scale = scale.clamp(0.1, 4.0);
        self
    }

    pub fn splice_distance(mut self, distance: f64) -> Self {
        self.config.splice.distance = distance;
        self
    }

    pub fn default_node_size(mut self, width: f64, height: f64) -> Self {
        self.config.splice.default_size = Size::new(width, height);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.config.renderer = renderer;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, BoardError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(BoardError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if !(c.splice.distance.is_finite() && c.splice.distance >= 0.0) {
            return Err(BoardError::InvalidConfig(format!(
                "Splice distance must be a non-negative number, got {}",
                c.splice.distance
            )));
        }
        let size = c.splice.default_size;
        if !(size.width > 0.0 && size.height > 0.0) {
            return Err(BoardError::InvalidConfig(format!(
                "Default node size must be positive, got {}x{}",
                size.width, size.height
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert!(c.concurrency >= 1);
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.splice.distance, 50.0);
        assert_eq!(c.splice.default_size, Size::new(350.0, 200.0));
    }

    #[test]
    fn setters_clamp() {
        let c = EngineConfig::builder()
            .concurrency(0)
            .render_scale(100.0)
            .preview_scale(0.0)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.render_scale, 8.0);
        assert_eq!(c.preview_scale, 0.1);
    }

    #[test]
    fn negative_splice_distance_is_rejected() {
        let err = EngineConfig::builder().splice_distance(-1.0).build().unwrap_err();
        assert!(matches!(err, BoardError::InvalidConfig(_)));
    }

    #[test]
    fn zero_node_size_is_rejected() {
        assert!(EngineConfig::builder().default_node_size(0.0, 10.0).build().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", EngineConfig::default());
        assert!(s.contains("<dyn PageRenderer>"), "got: {s}");
    }
}
