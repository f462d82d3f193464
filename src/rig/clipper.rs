use glam::Vec2;
use smallvec::SmallVec;

#[derive(Clone, Copy)]
struct ClipVertex {
    pos: Vec2,
    uv: Vec2,
}

type ClipPolygon = SmallVec<[ClipVertex; 16]>;

/// The runtime's clipping model: a single active clip polygon, opened by a
/// clipping attachment and closed at its designated end slot (or force-closed
/// when a unit's traversal finishes). Clipped geometry lands in the public
/// output buffers, which are reused across slots.
pub struct Clipper {
    polygon: Vec<Vec2>,
    end_slot: Option<usize>,
    active: bool,
    pub positions: Vec<Vec2>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u16>,
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new()
    }
}

impl Clipper {
    pub fn new() -> Self {
        Self {
            polygon: Vec::new(),
            end_slot: None,
            active: false,
            positions: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn is_clipping(&self) -> bool {
        self.active
    }

    /// Opens `polygon` (world space) as the active clip region. Polygons with
    /// fewer than three vertices are ignored. Winding is normalized to
    /// counter-clockwise.
    pub fn clip_start(&mut self, end_slot: Option<usize>, polygon: &[Vec2]) {
        if polygon.len() < 3 {
            return;
        }
        self.polygon.clear();
        self.polygon.extend_from_slice(polygon);
        if signed_area(&self.polygon) < 0.0 {
            self.polygon.reverse();
        }
        self.end_slot = end_slot;
        self.active = true;
    }

    /// Deactivates clipping when `slot` is the designated end of the active
    /// region.
    pub fn clip_end(&mut self, slot: usize) {
        if self.active && self.end_slot == Some(slot) {
            self.reset();
        }
    }

    /// Force-closes any active region, called after a unit's full draw-order
    /// traversal.
    pub fn clip_end_all(&mut self) {
        if self.active {
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.active = false;
        self.end_slot = None;
        self.polygon.clear();
    }

    /// Clips the triangle list against the active polygon, interpolating UVs
    /// at new edge intersections and fan-triangulating each surviving
    /// polygon. Output may be empty when every triangle falls outside.
    pub fn clip_triangles(&mut self, positions: &[Vec2], uvs: &[Vec2], indices: &[u16]) {
        self.positions.clear();
        self.uvs.clear();
        self.indices.clear();
        if !self.active {
            return;
        }
        for triangle in indices.chunks_exact(3) {
            let mut subject: ClipPolygon = triangle
                .iter()
                .map(|&index| ClipVertex {
                    pos: positions[index as usize],
                    uv: uvs[index as usize],
                })
                .collect();
            let mut scratch: ClipPolygon = SmallVec::new();
            for edge in 0..self.polygon.len() {
                let from = self.polygon[edge];
                let to = self.polygon[(edge + 1) % self.polygon.len()];
                clip_edge(&subject, from, to, &mut scratch);
                std::mem::swap(&mut subject, &mut scratch);
                if subject.len() < 3 {
                    break;
                }
            }
            if subject.len() < 3 {
                continue;
            }
            let base = self.positions.len() as u16;
            for vertex in &subject {
                self.positions.push(vertex.pos);
                self.uvs.push(vertex.uv);
            }
            for fan in 1..subject.len() as u16 - 1 {
                self.indices.extend_from_slice(&[base, base + fan, base + fan + 1]);
            }
        }
    }
}

fn signed_area(polygon: &[Vec2]) -> f32 {
    let mut area = 0.0;
    for index in 0..polygon.len() {
        let from = polygon[index];
        let to = polygon[(index + 1) % polygon.len()];
        area += from.x * to.y - to.x * from.y;
    }
    0.5 * area
}

/// One Sutherland-Hodgman pass against the half-plane left of `from -> to`.
fn clip_edge(input: &[ClipVertex], from: Vec2, to: Vec2, output: &mut ClipPolygon) {
    output.clear();
    let edge = to - from;
    for index in 0..input.len() {
        let current = input[index];
        let next = input[(index + 1) % input.len()];
        let side = edge.perp_dot(current.pos - from);
        let next_side = edge.perp_dot(next.pos - from);
        if side >= 0.0 {
            output.push(current);
        }
        if (side > 0.0 && next_side < 0.0) || (side < 0.0 && next_side > 0.0) {
            let t = side / (side - next_side);
            output.push(ClipVertex {
                pos: current.pos.lerp(next.pos, t),
                uv: current.uv.lerp(next.uv, t),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<Vec2> {
        vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)]
    }

    #[test]
    fn triangle_inside_passes_through() {
        let mut clipper = Clipper::new();
        clipper.clip_start(Some(5), &unit_square());
        let positions =
            [Vec2::new(0.1, 0.1), Vec2::new(0.9, 0.1), Vec2::new(0.5, 0.9)];
        let uvs = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.5, 1.0)];
        clipper.clip_triangles(&positions, &uvs, &[0, 1, 2]);
        assert_eq!(clipper.positions.len(), 3);
        assert_eq!(clipper.indices.len(), 3);
    }

    #[test]
    fn triangle_outside_is_eliminated() {
        let mut clipper = Clipper::new();
        clipper.clip_start(None, &unit_square());
        let positions =
            [Vec2::new(5.0, 5.0), Vec2::new(6.0, 5.0), Vec2::new(5.5, 6.0)];
        let uvs = [Vec2::ZERO; 3];
        clipper.clip_triangles(&positions, &uvs, &[0, 1, 2]);
        assert!(clipper.positions.is_empty());
        assert!(clipper.indices.is_empty());
    }

    #[test]
    fn partial_overlap_interpolates_uvs() {
        let mut clipper = Clipper::new();
        clipper.clip_start(None, &unit_square());
        // Horizontal strip: right half is outside the square.
        let positions =
            [Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(2.0, 1.0), Vec2::new(0.0, 1.0)];
        let uvs =
            [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
        clipper.clip_triangles(&positions, &uvs, &[0, 1, 2, 2, 3, 0]);
        assert!(!clipper.positions.is_empty());
        for (position, uv) in clipper.positions.iter().zip(clipper.uvs.iter()) {
            assert!(position.x <= 1.0 + 1e-4);
            // The strip maps u linearly over x in [0, 2].
            assert!((uv.x - position.x * 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn clockwise_polygon_is_normalized() {
        let mut clipper = Clipper::new();
        let mut reversed = unit_square();
        reversed.reverse();
        clipper.clip_start(None, &reversed);
        let positions =
            [Vec2::new(0.2, 0.2), Vec2::new(0.8, 0.2), Vec2::new(0.5, 0.8)];
        let uvs = [Vec2::ZERO; 3];
        clipper.clip_triangles(&positions, &uvs, &[0, 1, 2]);
        assert_eq!(clipper.positions.len(), 3);
    }

    #[test]
    fn end_slot_closes_only_at_designated_slot() {
        let mut clipper = Clipper::new();
        clipper.clip_start(Some(4), &unit_square());
        clipper.clip_end(2);
        assert!(clipper.is_clipping());
        clipper.clip_end(4);
        assert!(!clipper.is_clipping());
    }

    #[test]
    fn force_close_covers_missing_end_marker() {
        let mut clipper = Clipper::new();
        clipper.clip_start(None, &unit_square());
        clipper.clip_end(100);
        assert!(clipper.is_clipping());
        clipper.clip_end_all();
        assert!(!clipper.is_clipping());
    }

    #[test]
    fn degenerate_polygon_is_ignored() {
        let mut clipper = Clipper::new();
        clipper.clip_start(None, &[Vec2::ZERO, Vec2::new(1.0, 0.0)]);
        assert!(!clipper.is_clipping());
    }
}
