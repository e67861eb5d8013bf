//! Radial diagrams of repository file trees.
//!
//! Flat path records (from GitHub or a local checkout) are folded into a
//! [`tree::FileTree`], laid out on a polar grid by [`radial_layout::layout`]
//! and driven interactively through [`diagram::RadialDiagram`].

pub mod animation;
pub mod canvas;
pub mod category;
pub mod cli;
pub mod config;
pub mod diagram;
pub mod error;
pub mod expand_state;
pub mod logging;
pub mod overlay;
pub mod provider;
pub mod radial_layout;
pub mod reconcile;
pub mod record;
pub mod request;
pub mod tree;
pub mod watch;

pub use config::Config;
pub use diagram::RadialDiagram;
pub use error::{RadialError, Result};
pub use record::{EntryKind, PathRecord};
pub use tree::FileTree;
