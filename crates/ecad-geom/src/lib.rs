//! Geometric reconstruction helpers.
//!
//! Both translation pipelines lean on the same small toolbox: circular-arc
//! reconstruction from the various on-disk parameterizations, conversion of
//! vertex records into drawable primitives, polygon sets with the boolean
//! queries the zone logic needs, and the fixed-order affine transform used
//! when replaying library graphics onto a board.
//!
//! Coordinates are `glam::DVec2` for real-valued math and `glam::IVec2`
//! where the document model's integer internal units appear directly.

pub mod arc;
pub mod poly;
pub mod transform;
pub mod vertex;

pub use arc::{
    arc_center_from_sweep, arc_sweep_ccw, circumcenter, normalize_deg, rotate_deg,
    three_point_arc,
};
pub use poly::{Polygon, PolySet, Ring};
pub use transform::Transform2;
pub use vertex::{primitives_from_vertices, ring_from_primitives, Primitive, Vertex, VertexKind};
