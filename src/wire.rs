//! Line protocol between peers.
//!
//! One operation per newline-delimited UTF-8 text line, fields
//! separated by spaces, keyword first:
//!
//! ```text
//! draw ellipse x1 y1 x2 y2 rgb
//! draw rectangle x1 y1 x2 y2 rgb
//! draw segment x1 y1 x2 y2 rgb
//! draw polyline x1 y1 ... xn yn rgb
//! move id dx dy
//! recolor id rgb
//! delete id
//! ```
//!
//! Keywords and shape kinds match case-insensitively. Numbers are
//! base-10 integers; the color is a signed 32-bit packed RGB value.
//! Decoding never panics: a malformed line comes back as a
//! [`WireError`] for the caller to log and drop.

use thiserror::Error;

use crate::shapes::{Point, Rgb, Shape};
use crate::sketch::ShapeId;

/// One unit of synchronization between peers.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Add a new shape; the receiver assigns its own next identifier.
    Draw(Shape),
    Move { id: ShapeId, dx: i32, dy: i32 },
    Recolor { id: ShapeId, color: Rgb },
    Delete { id: ShapeId },
}

/// Why a received line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("empty line")]
    Empty,
    #[error("unknown operation keyword `{0}`")]
    UnknownKeyword(String),
    #[error("unknown shape kind `{0}`")]
    UnknownShapeKind(String),
    #[error("`{keyword}` takes {expected} fields, found {found}")]
    WrongArity {
        keyword: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("polyline needs coordinate pairs plus a color, found {0} fields")]
    BadPolylineArity(usize),
    #[error("bad numeric field `{0}`")]
    BadNumber(String),
}

/// Encode an operation as a single wire line (no trailing newline).
/// Total for every valid operation.
pub fn encode(op: &Operation) -> String {
    match op {
        Operation::Draw(shape) => match shape {
            Shape::Ellipse { x1, y1, x2, y2, color } => {
                format!("draw ellipse {x1} {y1} {x2} {y2} {color}")
            }
            Shape::Rectangle { x1, y1, x2, y2, color } => {
                format!("draw rectangle {x1} {y1} {x2} {y2} {color}")
            }
            Shape::Segment { x1, y1, x2, y2, color } => {
                format!("draw segment {x1} {y1} {x2} {y2} {color}")
            }
            Shape::Polyline { points, color } => {
                let mut line = String::from("draw polyline");
                for p in points {
                    line.push_str(&format!(" {} {}", p.x, p.y));
                }
                line.push_str(&format!(" {color}"));
                line
            }
        },
        Operation::Move { id, dx, dy } => format!("move {id} {dx} {dy}"),
        Operation::Recolor { id, color } => format!("recolor {id} {color}"),
        Operation::Delete { id } => format!("delete {id}"),
    }
}

/// Decode one received line.
pub fn decode(line: &str) -> Result<Operation, WireError> {
    let mut fields = line.split_whitespace();
    let keyword = fields.next().ok_or(WireError::Empty)?;
    let rest: Vec<&str> = fields.collect();

    match keyword.to_ascii_lowercase().as_str() {
        "draw" => decode_draw(&rest),
        "move" => {
            let [id, dx, dy] = expect_fields("move", &rest)?;
            Ok(Operation::Move {
                id: parse_id(id)?,
                dx: parse_int(dx)?,
                dy: parse_int(dy)?,
            })
        }
        "recolor" => {
            let [id, rgb] = expect_fields("recolor", &rest)?;
            Ok(Operation::Recolor {
                id: parse_id(id)?,
                color: Rgb(parse_int(rgb)?),
            })
        }
        "delete" => {
            let [id] = expect_fields("delete", &rest)?;
            Ok(Operation::Delete { id: parse_id(id)? })
        }
        other => Err(WireError::UnknownKeyword(other.to_string())),
    }
}

fn decode_draw(rest: &[&str]) -> Result<Operation, WireError> {
    let kind = rest.first().ok_or(WireError::WrongArity {
        keyword: "draw",
        expected: 1,
        found: 0,
    })?;
    let fields = &rest[1..];

    let shape = match kind.to_ascii_lowercase().as_str() {
        "ellipse" => {
            let [x1, y1, x2, y2, rgb] = expect_fields("draw ellipse", fields)?;
            Shape::ellipse(
                parse_int(x1)?,
                parse_int(y1)?,
                parse_int(x2)?,
                parse_int(y2)?,
                Rgb(parse_int(rgb)?),
            )
        }
        "rectangle" => {
            let [x1, y1, x2, y2, rgb] = expect_fields("draw rectangle", fields)?;
            Shape::rectangle(
                parse_int(x1)?,
                parse_int(y1)?,
                parse_int(x2)?,
                parse_int(y2)?,
                Rgb(parse_int(rgb)?),
            )
        }
        "segment" => {
            let [x1, y1, x2, y2, rgb] = expect_fields("draw segment", fields)?;
            Shape::segment(
                parse_int(x1)?,
                parse_int(y1)?,
                parse_int(x2)?,
                parse_int(y2)?,
                Rgb(parse_int(rgb)?),
            )
        }
        "polyline" => {
            // At least one coordinate pair plus the trailing color.
            if fields.len() < 3 || fields.len() % 2 == 0 {
                return Err(WireError::BadPolylineArity(fields.len()));
            }
            let (coords, rgb) = fields.split_at(fields.len() - 1);
            let mut points = Vec::with_capacity(coords.len() / 2);
            for pair in coords.chunks_exact(2) {
                points.push(Point::new(parse_int(pair[0])?, parse_int(pair[1])?));
            }
            Shape::polyline(points, Rgb(parse_int(rgb[0])?))
        }
        other => return Err(WireError::UnknownShapeKind(other.to_string())),
    };
    Ok(Operation::Draw(shape))
}

fn expect_fields<'a, const N: usize>(
    keyword: &'static str,
    fields: &[&'a str],
) -> Result<[&'a str; N], WireError> {
    <[&str; N]>::try_from(fields).map_err(|_| WireError::WrongArity {
        keyword,
        expected: N,
        found: fields.len(),
    })
}

fn parse_int(field: &str) -> Result<i32, WireError> {
    field
        .parse()
        .map_err(|_| WireError::BadNumber(field.to_string()))
}

fn parse_id(field: &str) -> Result<ShapeId, WireError> {
    field
        .parse()
        .map(ShapeId)
        .map_err(|_| WireError::BadNumber(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_every_operation() {
        assert_eq!(
            decode("draw ellipse 10 10 50 50 -16777216").unwrap(),
            Operation::Draw(Shape::ellipse(10, 10, 50, 50, Rgb::BLACK)),
        );
        assert_eq!(
            decode("draw polyline 0 0 5 5 9 2 -65536").unwrap(),
            Operation::Draw(Shape::polyline(
                vec![Point::new(0, 0), Point::new(5, 5), Point::new(9, 2)],
                Rgb(-65536),
            )),
        );
        assert_eq!(
            decode("move 3 -4 7").unwrap(),
            Operation::Move { id: ShapeId(3), dx: -4, dy: 7 },
        );
        assert_eq!(
            decode("recolor 0 255").unwrap(),
            Operation::Recolor { id: ShapeId(0), color: Rgb(255) },
        );
        assert_eq!(decode("delete 12").unwrap(), Operation::Delete { id: ShapeId(12) });
    }

    #[test]
    fn keywords_match_case_insensitively() {
        // The original peer sent capitalized keywords ("Draw ellipse ...").
        assert_eq!(
            decode("Draw Ellipse 0 0 2 2 0").unwrap(),
            Operation::Draw(Shape::ellipse(0, 0, 2, 2, Rgb(0))),
        );
        assert_eq!(decode("DELETE 4").unwrap(), Operation::Delete { id: ShapeId(4) });
    }

    #[test]
    fn rejects_malformed_lines_without_panicking() {
        assert_eq!(decode(""), Err(WireError::Empty));
        assert_eq!(decode("   "), Err(WireError::Empty));
        assert!(matches!(decode("scribble 1 2"), Err(WireError::UnknownKeyword(_))));
        assert!(matches!(
            decode("draw triangle 0 0 1 1 0"),
            Err(WireError::UnknownShapeKind(_))
        ));
        assert!(matches!(decode("move 1 2"), Err(WireError::WrongArity { .. })));
        assert!(matches!(
            decode("draw segment 0 0 1 1 0 9"),
            Err(WireError::WrongArity { .. })
        ));
        assert!(matches!(decode("delete twelve"), Err(WireError::BadNumber(_))));
        assert!(matches!(decode("recolor 1 0x10"), Err(WireError::BadNumber(_))));
    }

    #[test]
    fn polyline_requires_pairs_and_a_trailing_color() {
        // Even field count means a dangling coordinate.
        assert_eq!(
            decode("draw polyline 0 0 5 5"),
            Err(WireError::BadPolylineArity(4)),
        );
        assert_eq!(decode("draw polyline -1"), Err(WireError::BadPolylineArity(1)));
        // Single point plus color is the minimum.
        assert!(decode("draw polyline 3 4 0").is_ok());
    }

    #[test]
    fn draw_lines_normalize_corners_on_decode() {
        // A reversed-corner line still yields a normalized shape.
        assert_eq!(
            decode("draw rectangle 9 9 1 1 0").unwrap(),
            Operation::Draw(Shape::rectangle(1, 1, 9, 9, Rgb(0))),
        );
    }

    fn arb_coord() -> impl Strategy<Value = i32> {
        -10_000..10_000i32
    }

    fn arb_shape() -> impl Strategy<Value = Shape> {
        let color = any::<i32>().prop_map(Rgb);
        prop_oneof![
            (arb_coord(), arb_coord(), arb_coord(), arb_coord(), color.clone())
                .prop_map(|(x1, y1, x2, y2, c)| Shape::ellipse(x1, y1, x2, y2, c)),
            (arb_coord(), arb_coord(), arb_coord(), arb_coord(), color.clone())
                .prop_map(|(x1, y1, x2, y2, c)| Shape::rectangle(x1, y1, x2, y2, c)),
            (arb_coord(), arb_coord(), arb_coord(), arb_coord(), color.clone())
                .prop_map(|(x1, y1, x2, y2, c)| Shape::segment(x1, y1, x2, y2, c)),
            (
                proptest::collection::vec((arb_coord(), arb_coord()), 1..8),
                color
            )
                .prop_map(|(pts, c)| Shape::polyline(
                    pts.into_iter().map(|(x, y)| Point::new(x, y)).collect(),
                    c
                )),
        ]
    }

    fn arb_operation() -> impl Strategy<Value = Operation> {
        let id = any::<u64>().prop_map(ShapeId);
        prop_oneof![
            arb_shape().prop_map(Operation::Draw),
            (id.clone(), arb_coord(), arb_coord())
                .prop_map(|(id, dx, dy)| Operation::Move { id, dx, dy }),
            (id.clone(), any::<i32>().prop_map(Rgb))
                .prop_map(|(id, color)| Operation::Recolor { id, color }),
            id.prop_map(|id| Operation::Delete { id }),
        ]
    }

    proptest! {
        #[test]
        fn round_trip(op in arb_operation()) {
            prop_assert_eq!(decode(&encode(&op)).unwrap(), op);
        }
    }
}
