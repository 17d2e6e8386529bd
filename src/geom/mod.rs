mod bspline;
mod cache;
mod contour;
mod core;
mod cylinder;
mod frame;
mod mesh;
mod patch;
pub mod quadric;
mod tessellator;
mod wrapped;

pub use cache::{GridCache, GridCacheStats, GridSource};
pub use contour::{
    Contour, ContourError, ContourGallery, ContourKind, ContourSample, DEFAULT_DIVISIONS,
    MAX_DIVISIONS, MIN_DIVISIONS,
};
pub use core::{BBox, Point3, Quat, Tolerance, Transform, Vec3};
pub use cylinder::{CylinderEngine, GcError, GcPiece, GcSection, GcSettings};
pub use frame::{OrientationFrame, WidthScale};
pub use mesh::{MeshError, MeshGallery, TriMesh, Vertex};
pub use patch::{
    DEFAULT_PATCH_DIVISIONS, MAX_PATCH_DIVISIONS, Patch, Surface, SurfaceError, SurfaceGallery,
    SurfaceGrid,
};
pub use tessellator::{MAX_COMBINED_VERTICES, TessError, TessPrimitive, TessSink, Tessellator};
pub use wrapped::{WrappedGallery, WrappedSurface, WrappedSurfaceError};

#[cfg(test)]
mod tests;
