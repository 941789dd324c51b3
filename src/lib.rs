//! navlayer - aggregate per-actor TTP tables into ATT&CK Navigator layers.
//!
//! The library turns a workbook of `Technique ID | Source` sheets, one sheet
//! per threat actor, into Navigator layer documents scored by how often each
//! technique was observed, plus a ranked summary and an annotated copy of the
//! input with technique names and tactics.
//!
//! # Example
//!
//! ```no_run
//! use navlayer::{Catalog, EngineConfig, NameLookup, Pipeline};
//!
//! let config = EngineConfig::default();
//! let catalog = Catalog::from_path("layer.json").unwrap();
//! let names = NameLookup::from_path("TTP code-name index.txt").unwrap();
//! let workbook = navlayer::file_io::read_workbook("actors.json").unwrap();
//!
//! let output = Pipeline::new(&config, &catalog, &names).run(&workbook).unwrap();
//! for layer in output.layers.layers() {
//!     println!("{}", layer.to_pretty_json().unwrap());
//! }
//! ```

pub mod annotate;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod file_io;
pub mod gradient;
pub mod layer;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod source_index;
pub mod summary;
pub mod workbook;

// Re-export commonly used types at crate root
pub use annotate::{NameLookup, TacticAnnotator, OUTDATED_SENTINEL};
pub use catalog::{Catalog, TechniqueId, TechniqueRecord};
pub use config::EngineConfig;
pub use error::{NavError, Warning};
pub use gradient::{GradientSpec, HexColor};
pub use layer::{CommentScope, LayerDocument, LayerSynthesizer, NamedLayer, Synthesis, SynthesisMode};
pub use pipeline::{LayerMode, Pipeline, WorkflowOutput};
pub use source_index::{CountingPolicy, SourceEntry, SourceIndex};
pub use summary::SummaryRow;
pub use workbook::{Sheet, Workbook};
