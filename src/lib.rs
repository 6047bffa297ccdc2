//! Geolocates the hops of an mtr capture and measures the route to each
//! traced site.
//!
//! The capture is split into sites by [`trace`], each site's hops are
//! resolved and chained into a path by [`distances`], and [`pipeline`]
//! writes a CSV table and an SVG map per site.

pub mod config;
pub mod distances;
pub mod geolocations;
pub mod pipeline;
pub mod plotting;
pub mod records;
pub mod structs;
pub mod trace;
