//! Pure business logic: core types, segmentation, rendition planning,
//! playlist rendering, and acceleration profiles. Nothing here touches a
//! subprocess or a port implementation.

pub mod error;
pub mod hwaccel;
pub mod playlist;
pub mod rendition;
pub mod segment;
pub mod types;
