//! The shared sketch - THE source of truth for all shape data.
//!
//! One instance per participant process, mutated by local edits and by
//! operations arriving from remote peers, read by the renderer. Every
//! operation runs as one atomic unit under a single coarse lock, and
//! the lock is never held across an await.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::warn;

use crate::shapes::{Rgb, Shape};
use crate::wire::Operation;

/// Identifier naming a shape within a sketch.
///
/// Assigned strictly increasing from a single counter and never reused,
/// even after the shape is deleted. Retired identifiers keep concurrent
/// delete/edit races unambiguous: a stale `recolor 3` can only ever
/// refer to the shape that was id 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(pub u64);

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Model-level failure. Always benign: stale and duplicate network
/// messages are expected, not exceptional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SketchError {
    #[error("no shape with id {0}")]
    UnknownId(ShapeId),
}

#[derive(Debug, Default)]
struct Inner {
    shapes: BTreeMap<ShapeId, Shape>,
    next_id: u64,
}

/// Thread-safe mapping from identifier to shape.
///
/// Shared via `Arc` between the render/input context and the network
/// apply path; every method is atomic with respect to every other.
#[derive(Debug, Default)]
pub struct SharedSketch {
    inner: Mutex<Inner>,
}

impl SharedSketch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a shape under the next identifier and return it.
    pub fn add(&self, shape: Shape) -> ShapeId {
        let mut inner = self.inner.lock();
        let id = ShapeId(inner.next_id);
        inner.next_id += 1;
        inner.shapes.insert(id, shape);
        id
    }

    /// Topmost shape containing the point, if any.
    ///
    /// Iterates in descending identifier order so that on overlap the
    /// most recently added shape wins, matching the z-order the
    /// renderer paints in.
    pub fn shape_at(&self, x: i32, y: i32) -> Option<ShapeId> {
        let inner = self.inner.lock();
        inner
            .shapes
            .iter()
            .rev()
            .find(|(_, shape)| shape.contains(x, y))
            .map(|(id, _)| *id)
    }

    pub fn recolor(&self, id: ShapeId, color: Rgb) -> Result<(), SketchError> {
        let mut inner = self.inner.lock();
        let shape = inner.shapes.get_mut(&id).ok_or(SketchError::UnknownId(id))?;
        shape.set_color(color);
        Ok(())
    }

    pub fn translate(&self, id: ShapeId, dx: i32, dy: i32) -> Result<(), SketchError> {
        let mut inner = self.inner.lock();
        let shape = inner.shapes.get_mut(&id).ok_or(SketchError::UnknownId(id))?;
        shape.move_by(dx, dy);
        Ok(())
    }

    /// Detach the shape; its identifier is retired permanently.
    pub fn remove(&self, id: ShapeId) -> Result<(), SketchError> {
        let mut inner = self.inner.lock();
        inner
            .shapes
            .remove(&id)
            .map(|_| ())
            .ok_or(SketchError::UnknownId(id))
    }

    /// Consistent point-in-time copy of all shapes in ascending
    /// identifier order, for the render consumer.
    pub fn snapshot(&self) -> Vec<(ShapeId, Shape)> {
        let inner = self.inner.lock();
        inner.shapes.iter().map(|(id, s)| (*id, s.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().shapes.is_empty()
    }

    /// Apply one decoded operation.
    ///
    /// Peers converge by replaying the same lines in arrival order with
    /// last-applied-wins semantics; there is no reconciliation beyond
    /// that. An unknown identifier is a benign race (the shape was
    /// deleted while the message was in flight) - it is logged here and
    /// must be ignored by the caller.
    pub fn apply(&self, op: &Operation) -> Result<(), SketchError> {
        let result = match op {
            Operation::Draw(shape) => {
                self.add(shape.clone());
                Ok(())
            }
            Operation::Move { id, dx, dy } => self.translate(*id, *dx, *dy),
            Operation::Recolor { id, color } => self.recolor(*id, *color),
            Operation::Delete { id } => self.remove(*id),
        };
        if let Err(err) = result {
            warn!(%err, "ignoring operation for missing shape");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire;

    fn rect(x1: i32, y1: i32, x2: i32, y2: i32) -> Shape {
        Shape::rectangle(x1, y1, x2, y2, Rgb::BLACK)
    }

    #[test]
    fn ids_are_strictly_increasing_and_never_reused() {
        let sketch = SharedSketch::new();
        let a = sketch.add(rect(0, 0, 1, 1));
        let b = sketch.add(rect(0, 0, 1, 1));
        sketch.remove(a).unwrap();
        sketch.remove(b).unwrap();
        let c = sketch.add(rect(0, 0, 1, 1));
        assert_eq!((a, b, c), (ShapeId(0), ShapeId(1), ShapeId(2)));
    }

    #[test]
    fn topmost_shape_wins_hit_test() {
        let sketch = SharedSketch::new();
        let below = sketch.add(rect(0, 0, 100, 100));
        let above = sketch.add(Shape::ellipse(40, 40, 60, 60, Rgb(255)));
        assert_eq!(sketch.shape_at(50, 50), Some(above));
        // Outside the ellipse the rectangle shows through.
        assert_eq!(sketch.shape_at(5, 5), Some(below));
        assert_eq!(sketch.shape_at(200, 200), None);
    }

    #[test]
    fn unknown_id_operations_are_benign() {
        let sketch = SharedSketch::new();
        let id = sketch.add(rect(0, 0, 10, 10));
        let ghost = ShapeId(99);
        assert_eq!(sketch.recolor(ghost, Rgb(1)), Err(SketchError::UnknownId(ghost)));
        assert_eq!(sketch.translate(ghost, 1, 1), Err(SketchError::UnknownId(ghost)));
        assert_eq!(sketch.remove(ghost), Err(SketchError::UnknownId(ghost)));
        // The mapping is otherwise unchanged and still usable.
        assert_eq!(sketch.snapshot(), vec![(id, rect(0, 0, 10, 10))]);
        assert!(sketch.recolor(id, Rgb(7)).is_ok());
    }

    #[test]
    fn delete_then_recolor_race_is_a_no_op() {
        let sketch = SharedSketch::new();
        let id = sketch.add(rect(0, 0, 10, 10));
        sketch
            .apply(&Operation::Delete { id })
            .unwrap();
        // The in-flight recolor from another peer lands after the delete.
        assert!(sketch.apply(&Operation::Recolor { id, color: Rgb(3) }).is_err());
        assert!(sketch.is_empty());
    }

    #[test]
    fn snapshot_is_ascending_and_detached() {
        let sketch = SharedSketch::new();
        for i in 0..5 {
            sketch.add(rect(i, i, i + 1, i + 1));
        }
        sketch.remove(ShapeId(2)).unwrap();
        let snap = sketch.snapshot();
        let ids: Vec<u64> = snap.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![0, 1, 3, 4]);
        // Mutating after the snapshot does not disturb the copy.
        sketch.recolor(ShapeId(0), Rgb(9)).unwrap();
        assert_eq!(snap[0].1.color(), Rgb::BLACK);
    }

    #[test]
    fn concurrent_adds_never_share_an_id() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let sketch = Arc::new(SharedSketch::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sketch = Arc::clone(&sketch);
            handles.push(std::thread::spawn(move || {
                (0..100).map(|_| sketch.add(rect(0, 0, 1, 1))).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {id} assigned twice");
            }
        }
        assert_eq!(seen.len(), 800);
        assert_eq!(sketch.len(), 800);
    }

    #[test]
    fn extreme_wire_values_never_panic_the_apply_path() {
        let sketch = SharedSketch::new();
        sketch.add(rect(1, 1, 5, 5));
        // A misbehaving peer may send any signed 32-bit values; the
        // grammar admits them, so applying them must stay total.
        sketch
            .apply(&wire::decode("move 0 2147483647 0").unwrap())
            .unwrap();
        sketch
            .apply(&wire::decode("draw ellipse -2147483648 0 2147483647 0 0").unwrap())
            .unwrap();
        sketch
            .apply(&wire::decode("move 1 -2147483648 -2147483648").unwrap())
            .unwrap();
        // The sketch stays queryable afterwards.
        let _ = sketch.shape_at(0, 0);
        assert_eq!(sketch.len(), 2);
    }

    #[test]
    fn replicas_converge_through_encoded_lines() {
        let local = SharedSketch::new();
        let remote = SharedSketch::new();
        let ops = vec![
            Operation::Draw(Shape::ellipse(10, 10, 50, 50, Rgb::BLACK)),
            Operation::Draw(rect(0, 0, 30, 30)),
            Operation::Recolor { id: ShapeId(1), color: Rgb(255) },
            Operation::Move { id: ShapeId(0), dx: 5, dy: -5 },
            Operation::Delete { id: ShapeId(1) },
            Operation::Draw(Shape::segment(1, 2, 3, 4, Rgb(7))),
        ];
        for op in &ops {
            local.apply(op).ok();
            // The remote replica sees the operation only through its
            // encoded wire line.
            remote.apply(&wire::decode(&wire::encode(op)).unwrap()).ok();
        }
        assert_eq!(local.snapshot(), remote.snapshot());
    }
}
