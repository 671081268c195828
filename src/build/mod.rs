//! Compiling and linking.
//!
//! - [`discovery`] - deterministic source-tree walk and object path mapping
//! - [`compile`] - parallel per-unit compilation into the object staging tree
//! - [`link`] - the single link step that produces the kernel image
//! - [`kernel`] - the `kernel` stage: discover, compile, link
//! - [`apps`] - the `apps` sub-build and staging of its output into the initrd

pub mod apps;
pub mod compile;
pub mod discovery;
pub mod kernel;
pub mod link;

pub use compile::{compile_units, CompiledObjects, Compiler};
pub use discovery::{discover_sources, SourceKind, SourceUnit};
pub use kernel::{build_kernel, KernelBuild};
