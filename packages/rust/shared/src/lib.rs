//! Shared types, error model, and configuration for pestres.
//!
//! This crate is the foundation depended on by all other pestres crates.
//! It provides:
//! - [`PestresError`] — the unified error type
//! - The commodity taxonomy and MRL record types ([`CommodityCategory`],
//!   [`CommodityDetail`], [`PesticideDetail`], ...)
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, Endpoints, FetchConfig, FetchSettings, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PestresError, Result};
pub use types::{
    BaseMrl, Commodity, CommodityCategory, CommodityDetail, CommodityMrl, CommodityMrlRow,
    CommodityRef, CommoditySubCategory, CommodityType, ParentNode, PesticideDetail, PesticideMrl,
    PesticideMrlRow, PesticideRef, PesticideRow, StepRef,
};
