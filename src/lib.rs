//! Terminal globe for SAR imagery search overlays and terrain measurement tools.

pub mod braille;
pub mod catalog;
pub mod config;
pub mod data;
pub mod error;
pub mod geodesy;
pub mod hash;
pub mod layers;
pub mod map;
pub mod picking;
pub mod scene;
pub mod telemetry;
pub mod terrain;
pub mod tools;
