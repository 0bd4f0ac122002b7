//! 3D scene batching. Kept here because the VB-upload pass's sort/coalesce
//! *policy* is backend independent even though only a hardware backend
//! ever issues the resulting draw calls.
//!
//! Faces are sorted translucent-back-to-front, then consecutive faces
//! sharing material/blend/cull/primitive state are coalesced into a single
//! draw call, using a 16-bit index buffer unless the accumulated vertex
//! count requires 32-bit indices.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawState {
    pub material_id: u32,
    pub blend_mode: u8,
    pub cull_mode: u8,
    pub primitive: PrimitiveKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Triangles,
    TriangleStrip,
    Lines,
}

#[derive(Debug, Clone)]
pub struct Face {
    pub state: DrawState,
    pub indices: Vec<u32>,
    pub vertex_count: u32,
    /// Camera-space depth of the face centroid, for back-to-front sort.
    pub depth: f32,
    pub translucent: bool,
}

#[derive(Debug, Clone)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

#[derive(Debug, Clone)]
pub struct DrawCall {
    pub state: DrawState,
    pub indices: IndexBuffer,
}

const U16_INDEX_LIMIT: usize = u16::MAX as usize;

/// Sorts translucent faces back-to-front (stable, so same-depth faces keep
/// submission order) while leaving opaque faces in place, then coalesces
/// consecutive same-state faces into draw calls.
pub fn batch_faces(mut faces: Vec<Face>) -> Vec<DrawCall> {
    // Opaque faces stay front-to-back in submission order; translucent ones
    // are stably sorted back-to-front and appended after, mirroring a
    // typical two-pass forward renderer.
    let (mut opaque, mut translucent): (Vec<_>, Vec<_>) =
        faces.drain(..).partition(|f| !f.translucent);
    translucent.sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap_or(std::cmp::Ordering::Equal));
    opaque.extend(translucent);
    let ordered = opaque;

    let mut calls: Vec<DrawCall> = Vec::new();
    let mut pending_indices: Vec<u32> = Vec::new();
    let mut pending_state: Option<DrawState> = None;
    let mut pending_vertex_count: usize = 0;

    let flush = |calls: &mut Vec<DrawCall>, state: DrawState, indices: Vec<u32>, vertex_count: usize| {
        if indices.is_empty() {
            return;
        }
        let buffer = if vertex_count <= U16_INDEX_LIMIT {
            IndexBuffer::U16(indices.iter().map(|&i| i as u16).collect())
        } else {
            IndexBuffer::U32(indices)
        };
        calls.push(DrawCall { state, indices: buffer });
    };

    for face in ordered {
        match pending_state {
            Some(state) if state == face.state => {
                pending_indices.extend(&face.indices);
                pending_vertex_count += face.vertex_count as usize;
            }
            _ => {
                if let Some(state) = pending_state.take() {
                    flush(&mut calls, state, std::mem::take(&mut pending_indices), pending_vertex_count);
                }
                pending_state = Some(face.state);
                pending_indices = face.indices.clone();
                pending_vertex_count = face.vertex_count as usize;
            }
        }
    }
    if let Some(state) = pending_state {
        flush(&mut calls, state, pending_indices, pending_vertex_count);
    }

    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(material: u32) -> DrawState {
        DrawState {
            material_id: material,
            blend_mode: 0,
            cull_mode: 0,
            primitive: PrimitiveKind::Triangles,
        }
    }

    #[test]
    fn coalesces_consecutive_same_state_faces() {
        let faces = vec![
            Face { state: state(1), indices: vec![0, 1, 2], vertex_count: 3, depth: 1.0, translucent: false },
            Face { state: state(1), indices: vec![2, 1, 3], vertex_count: 1, depth: 1.0, translucent: false },
            Face { state: state(2), indices: vec![0, 1, 2], vertex_count: 3, depth: 1.0, translucent: false },
        ];
        let calls = batch_faces(faces);
        assert_eq!(calls.len(), 2);
        match &calls[0].indices {
            IndexBuffer::U16(v) => assert_eq!(v.len(), 6),
            _ => panic!("expected u16 buffer"),
        }
    }

    #[test]
    fn translucent_faces_sort_back_to_front() {
        let faces = vec![
            Face { state: state(1), indices: vec![0], vertex_count: 1, depth: 1.0, translucent: true },
            Face { state: state(1), indices: vec![1], vertex_count: 1, depth: 5.0, translucent: true },
            Face { state: state(1), indices: vec![2], vertex_count: 1, depth: 3.0, translucent: true },
        ];
        let calls = batch_faces(faces);
        assert_eq!(calls.len(), 1);
        match &calls[0].indices {
            IndexBuffer::U16(v) => assert_eq!(v, &vec![1, 2, 0]),
            _ => panic!("expected u16 buffer"),
        }
    }

    #[test]
    fn large_vertex_count_uses_u32_indices() {
        let faces = vec![Face {
            state: state(1),
            indices: vec![0, 1, 2],
            vertex_count: (U16_INDEX_LIMIT + 10) as u32,
            depth: 0.0,
            translucent: false,
        }];
        let calls = batch_faces(faces);
        assert!(matches!(calls[0].indices, IndexBuffer::U32(_)));
    }
}
