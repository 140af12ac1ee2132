#![doc = include_str!("../README.md")]

pub use crate::config::ClockDisplayConfig;
pub use crate::error::Error;
pub use crate::trace::{FileStream, Trace};
pub use crate::types::*;

pub mod bitpos;
pub mod config;
pub mod decl;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod index;
pub mod metadata;
pub mod registry;
pub mod scope;
pub mod trace;
pub mod types;
