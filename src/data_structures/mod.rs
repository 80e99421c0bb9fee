//! Engine data structures: geometry, materials, transforms and the scene arena.
//!
//! This module contains the core data types for scene representation:
//!
//! - `geometry` holds mesh vertex data and axis-aligned bounding boxes
//! - `material` holds shader tags, texture bitmaps and post-effect data
//! - `transform` holds local TRS transforms and matrix compose/decompose
//! - `scene` is the object arena, render data, cameras and the stereo rig

pub mod geometry;
pub mod material;
pub mod scene;
pub mod transform;
