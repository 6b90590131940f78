//! Shape variants for the collaborative sketch.
//!
//! A closed set of four drawable primitives - ellipse, rectangle,
//! straight segment, freehand polyline - with hit-testing, translation,
//! recoloring, and rendering onto an abstract [`DrawSurface`].

/// How close (in pixels) a point must be to a segment to count as a hit.
const SEGMENT_TOLERANCE: f64 = 3.0;

/// Packed signed 32-bit RGB color, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub i32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(-16777216);
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Render seam consumed by `Shape::draw`. The GUI supplies the
/// implementation; the core never touches pixels itself.
pub trait DrawSurface {
    fn fill_ellipse(&mut self, color: Rgb, x1: i32, y1: i32, x2: i32, y2: i32);
    fn fill_rect(&mut self, color: Rgb, x1: i32, y1: i32, x2: i32, y2: i32);
    fn draw_line(&mut self, color: Rgb, x1: i32, y1: i32, x2: i32, y2: i32);
}

/// One geometric primitive in the sketch.
///
/// Bounding-box variants (ellipse, rectangle) keep their corners
/// normalized so `x1 <= x2` and `y1 <= y2`; every mutator that changes
/// corners re-normalizes. Segment endpoints keep their drawn order.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Ellipse {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        color: Rgb,
    },
    Rectangle {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        color: Rgb,
    },
    Segment {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        color: Rgb,
    },
    /// Straight lines connecting consecutive joint points, one color.
    Polyline { points: Vec<Point>, color: Rgb },
}

impl Shape {
    /// Ellipse spanning the (normalized) box between two corners.
    pub fn ellipse(x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb) -> Self {
        Shape::Ellipse {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
            color,
        }
    }

    /// Rectangle spanning the (normalized) box between two corners.
    pub fn rectangle(x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb) -> Self {
        Shape::Rectangle {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
            color,
        }
    }

    /// Straight segment between two endpoints.
    pub fn segment(x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb) -> Self {
        Shape::Segment { x1, y1, x2, y2, color }
    }

    /// Polyline through the given joint points.
    pub fn polyline(points: Vec<Point>, color: Rgb) -> Self {
        Shape::Polyline { points, color }
    }

    /// Reshape a bounding-box variant while dragging. Corners are
    /// re-normalized; other variants are left untouched.
    pub fn set_corners(&mut self, ax: i32, ay: i32, bx: i32, by: i32) {
        match self {
            Shape::Ellipse { x1, y1, x2, y2, .. } | Shape::Rectangle { x1, y1, x2, y2, .. } => {
                *x1 = ax.min(bx);
                *y1 = ay.min(by);
                *x2 = ax.max(bx);
                *y2 = ay.max(by);
            }
            _ => {}
        }
    }

    /// Move a segment's free endpoint while dragging.
    pub fn set_end(&mut self, x: i32, y: i32) {
        if let Shape::Segment { x2, y2, .. } = self {
            *x2 = x;
            *y2 = y;
        }
    }

    /// Append a joint point to a polyline while dragging.
    pub fn push_point(&mut self, p: Point) {
        if let Shape::Polyline { points, .. } = self {
            points.push(p);
        }
    }

    pub fn color(&self) -> Rgb {
        match self {
            Shape::Ellipse { color, .. }
            | Shape::Rectangle { color, .. }
            | Shape::Segment { color, .. }
            | Shape::Polyline { color, .. } => *color,
        }
    }

    pub fn set_color(&mut self, c: Rgb) {
        match self {
            Shape::Ellipse { color, .. }
            | Shape::Rectangle { color, .. }
            | Shape::Segment { color, .. }
            | Shape::Polyline { color, .. } => *color = c,
        }
    }

    /// Hit test.
    ///
    /// Ellipse containment uses the normalized ellipse equation; a
    /// zero-extent axis degenerates to a boundary-line test rather than
    /// dividing by zero. Rectangle containment includes the boundary.
    /// Segments use a fixed pixel tolerance band clamped to the
    /// segment's parametric range. A polyline is hit if any of its
    /// constituent segments is.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        match *self {
            Shape::Ellipse { x1, y1, x2, y2, .. } => {
                // Widen before subtracting: corners may span the whole
                // i32 range.
                let a = (f64::from(x2) - f64::from(x1)) / 2.0;
                let b = (f64::from(y2) - f64::from(y1)) / 2.0;
                if a == 0.0 && b == 0.0 {
                    return x == x1 && y == y1;
                }
                if a == 0.0 {
                    return x == x1 && y >= y1 && y <= y2;
                }
                if b == 0.0 {
                    return y == y1 && x >= x1 && x <= x2;
                }
                let dx = f64::from(x) - (f64::from(x1) + a);
                let dy = f64::from(y) - (f64::from(y1) + b);
                (dx / a).powi(2) + (dy / b).powi(2) <= 1.0
            }
            Shape::Rectangle { x1, y1, x2, y2, .. } => x >= x1 && x <= x2 && y >= y1 && y <= y2,
            Shape::Segment { x1, y1, x2, y2, .. } => {
                segment_distance(x, y, x1, y1, x2, y2) <= SEGMENT_TOLERANCE
            }
            Shape::Polyline { ref points, .. } => match points.len() {
                0 => false,
                1 => {
                    segment_distance(x, y, points[0].x, points[0].y, points[0].x, points[0].y)
                        <= SEGMENT_TOLERANCE
                }
                _ => points.windows(2).any(|w| {
                    segment_distance(x, y, w[0].x, w[0].y, w[1].x, w[1].y) <= SEGMENT_TOLERANCE
                }),
            },
        }
    }

    /// Translate the whole shape. Corner normalization is preserved
    /// since both corners shift by the same delta. Deltas come off the
    /// wire unchecked, so coordinates wrap rather than panic.
    pub fn move_by(&mut self, dx: i32, dy: i32) {
        match self {
            Shape::Ellipse { x1, y1, x2, y2, .. }
            | Shape::Rectangle { x1, y1, x2, y2, .. } => {
                // A wrap on one corner only can invert the ordering, so
                // re-normalize like every other corner mutator.
                let (ax, ay) = (x1.wrapping_add(dx), y1.wrapping_add(dy));
                let (bx, by) = (x2.wrapping_add(dx), y2.wrapping_add(dy));
                *x1 = ax.min(bx);
                *y1 = ay.min(by);
                *x2 = ax.max(bx);
                *y2 = ay.max(by);
            }
            Shape::Segment { x1, y1, x2, y2, .. } => {
                *x1 = x1.wrapping_add(dx);
                *y1 = y1.wrapping_add(dy);
                *x2 = x2.wrapping_add(dx);
                *y2 = y2.wrapping_add(dy);
            }
            Shape::Polyline { points, .. } => {
                for p in points {
                    p.x = p.x.wrapping_add(dx);
                    p.y = p.y.wrapping_add(dy);
                }
            }
        }
    }

    /// Render onto the given surface.
    pub fn draw(&self, surface: &mut dyn DrawSurface) {
        match *self {
            Shape::Ellipse { x1, y1, x2, y2, color } => surface.fill_ellipse(color, x1, y1, x2, y2),
            Shape::Rectangle { x1, y1, x2, y2, color } => surface.fill_rect(color, x1, y1, x2, y2),
            Shape::Segment { x1, y1, x2, y2, color } => surface.draw_line(color, x1, y1, x2, y2),
            Shape::Polyline { ref points, color } => {
                if points.len() == 1 {
                    let p = points[0];
                    surface.draw_line(color, p.x, p.y, p.x, p.y);
                }
                for w in points.windows(2) {
                    surface.draw_line(color, w[0].x, w[0].y, w[1].x, w[1].y);
                }
            }
        }
    }
}

/// Distance from (px,py) to the segment (x1,y1)-(x2,y2), clamping the
/// projection to the segment's parametric range [0,1].
fn segment_distance(px: i32, py: i32, x1: i32, y1: i32, x2: i32, y2: i32) -> f64 {
    let (px, py) = (f64::from(px), f64::from(py));
    let (x1, y1) = (f64::from(x1), f64::from(y1));
    let (x2, y2) = (f64::from(x2), f64::from(y2));
    let (vx, vy) = (x2 - x1, y2 - y1);
    let len2 = vx * vx + vy * vy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((px - x1) * vx + (py - y1) * vy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (x1 + t * vx, y1 + t * vy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}
