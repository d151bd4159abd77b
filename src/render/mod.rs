//! Dry-run rendering for chartdiff.
//!
//! This module produces the manifest a fresh install of a chart would
//! create, without contacting a cluster:
//! - Template evaluation and manifest assembly
//! - The client-only installer and its options
//! - Signal-driven cancellation of a render in progress

mod cancel;
mod engine;
mod install;

pub use cancel::{
    cancellation_notice, CancellationController, ControllerState, Signal, SignalSender, SIGNAL_BUFFER,
};
pub use engine::{
    assemble, raw_manifest, render_templates, AssembledManifest, ManifestDocument,
    ReleaseContext, RenderedTemplate, HOOK_ANNOTATION,
};
pub use install::{DryRunInstaller, InstallOptions, RenderFailure, RenderResult, RenderedRelease};
