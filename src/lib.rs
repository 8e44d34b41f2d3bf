// Siteedge multi-tenant static site edge

pub mod cache;
pub mod compression;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod error;
pub mod hostid;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod proxy;
pub mod resolver;
pub mod storage;
pub mod vfs;
