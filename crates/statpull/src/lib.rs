//! Connectors that pull Eurostat, ILO, World Bank and IEA
//! statistics into flat tables and write them as CSV.

pub mod cache;
pub mod config;
pub mod http_client;
pub mod renderer;
pub mod sources;
pub mod table;
pub mod types;

pub use cache::ListCache;
pub use config::{resolve_out_root, Config, IeaConfig, SourceConfig};
pub use http_client::HttpClient;
pub use renderer::{RenderContext, Renderer};
pub use sources::eurostat::Eurostat;
pub use sources::iea::{Iea, IeaRequest, Lookup, PageLayout};
pub use sources::ilo::Ilo;
pub use sources::world_bank::WorldBank;
pub use table::{Cell, Table};
pub use types::*;
