//! Staged bootstrap of plugin extensions and plugin UI.
//!
//! Two stages run strictly in sequence behind a [`baton::Baton`]: the
//! [`extensions::ExtensionDiscoverer`] finds and loads plain plugin scripts,
//! then the [`ui::UiAssetLoader`] loads the UI components it found. Within a
//! stage, requests fan out concurrently and join on a
//! [`barrier::PendingCount`].

pub mod barrier;
pub mod baton;
pub mod bootstrap;
pub mod extensions;
pub mod fanout;
pub mod host;
pub mod pipeline;
pub mod ui;

#[cfg(test)]
mod testing;

pub use bootstrap::{run_bootstrap, standard_pipeline};
pub use host::{
    DocumentHost, ExtensionModule, HeadlessHost, HostContext, ModuleRegistry, ResourceInjector,
};
pub use pipeline::{Pipeline, ProgressReporter, SilentProgress, Stage};
