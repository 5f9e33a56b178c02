pub mod dcel;

pub use dcel::{Dcel, FaceId, HalfEdgeId, VertexId, OUTER_FACE};
