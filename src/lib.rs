//! Schema IR
//!
//! Converts schema descriptions from two source formats into one canonical
//! Intermediate Representation that code writers consume.
//!
//! ## Front-ends
//!
//! - **OpenAPI**: an already-bundled OpenAPI 3.x document, lowered by
//!   [`openapi::build`]. All-or-nothing: the first structural problem is an
//!   [`IrError`].
//! - **Builder syntax**: TypeScript source with zod schema declarations,
//!   parsed by [`zod::parse`]. Problems are collected as diagnostics and the
//!   remaining declarations still lower.
//!
//! ## Architecture
//!
//! ```text
//! OpenAPI JSON ──► openapi ──┐
//!                            ├──► ir::Document ──► graph::analyze ──► writer::WriterContext ──► IrWriter
//! zod source   ──► zod    ───┘
//! ```
//!
//! Data only flows towards the writers. After `graph::analyze` the only
//! field still written is `metadata.circularReferences`, by the circular
//! reference detector.

pub mod config;
pub mod error;
pub mod graph;
pub mod ir;
pub mod openapi;
pub mod writer;
pub mod zod;

pub use config::IrConfig;
pub use error::{IrError, Result};
pub use graph::DependencyGraph;
pub use ir::{Component, Document, JsonType, PropertyMap, SchemaNode};
pub use writer::{IrWriter, Region, WriterContext, WriterOutput};
pub use zod::{Diagnostic, DiagnosticCode, ParseOutput};
