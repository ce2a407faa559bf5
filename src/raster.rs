// Line and arc rasterization on the integer drawing grid
//
// Every waypoint differs from the previous one by at most one unit per axis, so
// the arm's curved native motion between waypoints stays below one grid cell.

use std::f64::consts::TAU;

/// Integer drawing coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Round a real coordinate onto the grid
    pub fn rounded(x: f64, y: f64) -> Self {
        Self {
            x: x.round() as i32,
            y: y.round() as i32,
        }
    }

    pub fn distance(&self, other: Point) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Incremental-error line walker.
///
/// All eight octants share one loop: the swap flag picks which axis always
/// advances, the error term decides when the other one does.
#[derive(Debug, Clone)]
pub struct Line {
    current: Point,
    step_x: i32,
    step_y: i32,
    swap: bool,
    longest: i64,
    shortest: i64,
    error: i64,
    remaining: i64,
}

impl Line {
    pub fn new(from: Point, to: Point) -> Self {
        let dx = to.x as i64 - from.x as i64;
        let dy = to.y as i64 - from.y as i64;
        let swap = dy.abs() > dx.abs();
        let (longest, shortest) = if swap {
            (dy.abs(), dx.abs())
        } else {
            (dx.abs(), dy.abs())
        };

        Self {
            current: from,
            step_x: dx.signum() as i32,
            step_y: dy.signum() as i32,
            swap,
            longest,
            shortest,
            error: 2 * shortest - longest,
            remaining: longest,
        }
    }
}

impl Iterator for Line {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        if self.swap {
            self.current.y += self.step_y;
        } else {
            self.current.x += self.step_x;
        }
        if self.error > 0 {
            if self.swap {
                self.current.x += self.step_x;
            } else {
                self.current.y += self.step_y;
            }
            self.error -= 2 * self.longest;
        }
        self.error += 2 * self.shortest;

        Some(self.current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Line {}

/// Waypoints from `from` (exclusive) to `to` (inclusive)
pub fn line(from: Point, to: Point) -> Line {
    Line::new(from, to)
}

/// Arc rotation sense
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// Arc request: end point plus centre offset from the start point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcSpec {
    pub to: Point,
    pub i: f64,
    pub j: f64,
    pub rotation: Rotation,
}

/// Arc segmentation limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcLimits {
    pub max_chord_length: f64,
    pub offset_limit: f64,
}

/// Chord end points of an arc, the last one always equal to `spec.to`.
///
/// Centre offsets beyond `offset_limit` are treated as malformed and the arc
/// collapses to a single straight chord.
pub fn arc_vertices(from: Point, spec: &ArcSpec, limits: &ArcLimits) -> Vec<Point> {
    let ArcSpec { to, i, j, rotation } = *spec;
    if !(i.abs() <= limits.offset_limit && j.abs() <= limits.offset_limit) {
        return vec![to];
    }

    let radius = (i * i + j * j).sqrt();
    if radius == 0.0 {
        return vec![to];
    }
    let centre_x = from.x as f64 + i;
    let centre_y = from.y as f64 + j;

    let chord = from.distance(to);
    let alpha = 2.0 * (chord / (2.0 * radius)).min(1.0).asin();
    let arc_length = alpha * radius;

    let segments = if arc_length > limits.max_chord_length {
        (arc_length / limits.max_chord_length).floor() as usize
    } else {
        1
    };
    let beta = alpha / segments as f64;

    let mut bearing = (-j).atan2(-i);
    if bearing < 0.0 {
        bearing += TAU;
    }

    let mut vertices = Vec::with_capacity(segments);
    for _ in 1..segments {
        match rotation {
            Rotation::Clockwise => {
                bearing -= beta;
                if bearing < 0.0 {
                    bearing += TAU;
                }
            }
            Rotation::CounterClockwise => {
                bearing += beta;
                if bearing >= TAU {
                    bearing -= TAU;
                }
            }
        }
        vertices.push(Point::rounded(
            centre_x + radius * bearing.cos(),
            centre_y + radius * bearing.sin(),
        ));
    }
    vertices.push(to);
    vertices
}

/// Waypoints along a chain of straight chords starting at `from`
pub fn polyline(from: Point, vertices: Vec<Point>) -> impl Iterator<Item = Point> {
    let mut prev = from;
    vertices.into_iter().flat_map(move |vertex| {
        let segment = line(prev, vertex);
        prev = vertex;
        segment
    })
}

/// Arc waypoints: each chord of `arc_vertices` walked as a line
pub fn arc(from: Point, spec: ArcSpec, limits: ArcLimits) -> impl Iterator<Item = Point> {
    polyline(from, arc_vertices(from, &spec, &limits))
}

pub fn arc_cw(from: Point, to: Point, i: f64, j: f64, limits: ArcLimits) -> impl Iterator<Item = Point> {
    arc(
        from,
        ArcSpec {
            to,
            i,
            j,
            rotation: Rotation::Clockwise,
        },
        limits,
    )
}

pub fn arc_ccw(from: Point, to: Point, i: f64, j: f64, limits: ArcLimits) -> impl Iterator<Item = Point> {
    arc(
        from,
        ArcSpec {
            to,
            i,
            j,
            rotation: Rotation::CounterClockwise,
        },
        limits,
    )
}
