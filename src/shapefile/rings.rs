//! Turns the flat list of rings in one Polygon record into polygons.
//!
//! A Polygon record stores rings one after the other. Clockwise rings are
//! shells and counter-clockwise rings are holes, but nothing says which shell
//! owns which hole. The strategies here are competing guesses; none of them
//! is right for every producer.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use itertools::Itertools;

use crate::error::{Result, ShapefileError};
use crate::geo::{Coordinate, Envelope, LineString, Polygon, RingLocation, WindingOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RingStrategy {
    /// Holes go to the smallest shell containing their first vertex.
    #[default]
    Legacy,
    /// Like `Legacy`, but tests the first vertex not on the shell's boundary,
    /// and promotes holes that fit no shell to shells.
    Extended,
    /// Assumes rings are serialized `Shell[,Hole]*[,Shell[,Hole]*]...`.
    Sequential,
    /// Ignores orientation: dissolves shared segments, re-traces rings and
    /// nests them by containment depth.
    Polygonizer,
}

/// Assembles closed rings into polygons.
///
/// Fails with `NestedHole` when a resulting polygon has a hole inside
/// another of its holes.
pub fn assemble(rings: Vec<LineString>, strategy: RingStrategy) -> Result<Vec<Polygon>> {
    let polygons = match strategy {
        RingStrategy::Legacy => by_containment(rings, false),
        RingStrategy::Extended => by_containment(rings, true),
        RingStrategy::Sequential => sequential(rings),
        RingStrategy::Polygonizer => polygonize(rings),
    };

    for (i, polygon) in polygons.iter().enumerate() {
        if has_nested_hole(polygon) {
            return Err(ShapefileError::NestedHole { polygon: i });
        }
    }

    Ok(polygons)
}

/// A ring with its cached envelope and area.
struct Candidate {
    ring: LineString,
    envelope: Envelope,
    area: f64,
}

impl Candidate {
    fn new(ring: LineString) -> Candidate {
        let envelope = ring.envelope();
        let area = ring.area();
        Candidate { ring, envelope, area }
    }

    /// Does `self` contain `other`?
    ///
    /// With `first_vertex_only`, `other`'s first vertex decides (a vertex on
    /// the boundary counts as inside). Otherwise the first vertex that is not
    /// on `self`'s boundary decides.
    fn contains(&self, other: &Candidate, first_vertex_only: bool) -> bool {
        if !self.envelope.contains(&other.envelope) {
            return false;
        }

        if first_vertex_only {
            return match other.ring.0.first() {
                Some(c) => self.ring.locate(c) != RingLocation::Outside,
                None => false,
            };
        }

        for c in other.ring.0.iter() {
            match self.ring.locate(c) {
                RingLocation::OnBoundary => continue,
                RingLocation::Inside => return true,
                RingLocation::Outside => return false,
            }
        }
        // every vertex is on the boundary: the rings coincide
        true
    }
}

fn oriented(mut ring: LineString, order: WindingOrder) -> LineString {
    if ring.winding_order() != order {
        ring.reverse();
    }
    ring
}

/// Splits rings into (shells, holes) by orientation.
///
/// If there are holes but no shells, the producer wrote every ring backwards:
/// they are all reversed and treated as shells.
fn classify(rings: Vec<LineString>) -> (Vec<LineString>, Vec<LineString>) {
    let (shells, holes): (Vec<_>, Vec<_>) = rings
        .into_iter()
        .partition(|r| r.winding_order() == WindingOrder::Clockwise);

    if shells.is_empty() && !holes.is_empty() {
        tracing::warn!(rings = holes.len(), "Polygon record has only counter-clockwise rings; reversing them into shells");
        let shells = holes.into_iter().map(|r| oriented(r, WindingOrder::Clockwise)).collect();
        return (shells, vec![]);
    }

    (shells, holes)
}

fn by_containment(rings: Vec<LineString>, extended: bool) -> Vec<Polygon> {
    let (shells, holes) = classify(rings);

    let mut shells: Vec<Candidate> = shells.into_iter().map(Candidate::new).collect();
    let mut interiors: Vec<Vec<LineString>> = shells.iter().map(|_| vec![]).collect();

    // Smallest first, so the first containing shell is the tightest one
    let by_area: Vec<usize> = (0..shells.len())
        .sorted_by(|&a, &b| shells[a].area.partial_cmp(&shells[b].area).unwrap_or(std::cmp::Ordering::Equal))
        .collect();

    let mut orphans = vec![];

    for hole in holes.into_iter().map(Candidate::new) {
        let owner = by_area.iter().cloned().find(|&i| shells[i].contains(&hole, !extended));
        match owner {
            Some(i) => interiors[i].push(hole.ring),
            None if extended => orphans.push(hole),
            None => {
                tracing::warn!("Hole is not inside any shell; attaching it to the first shell");
                interiors[0].push(hole.ring);
            }
        }
    }

    for orphan in orphans {
        tracing::debug!("Promoting a hole that fits no shell to a shell");
        shells.push(Candidate::new(oriented(orphan.ring, WindingOrder::Clockwise)));
        interiors.push(vec![]);
    }

    shells
        .into_iter()
        .zip(interiors)
        .map(|(shell, holes)| Polygon::new(shell.ring, holes))
        .collect()
}

fn sequential(rings: Vec<LineString>) -> Vec<Polygon> {
    let mut polygons = vec![];
    let mut shell: Option<Candidate> = None;
    let mut holes: Vec<Candidate> = vec![];

    for ring in rings {
        let candidate = Candidate::new(ring);

        let is_hole = match shell {
            None => false,
            Some(ref s) => {
                candidate.ring.winding_order() == WindingOrder::CounterClockwise
                    && s.contains(&candidate, false)
                    && !holes.iter().any(|h| h.contains(&candidate, false))
            }
        };

        if is_hole {
            holes.push(candidate);
            continue;
        }

        if let Some(s) = shell.take() {
            polygons.push(Polygon::new(s.ring, holes.drain(..).map(|h| h.ring).collect()));
        }

        if candidate.ring.winding_order() == WindingOrder::CounterClockwise {
            tracing::warn!("Ring opening a polygon is counter-clockwise; reversing it into a shell");
        }
        shell = Some(Candidate::new(oriented(candidate.ring, WindingOrder::Clockwise)));
    }

    if let Some(s) = shell {
        polygons.push(Polygon::new(s.ring, holes.into_iter().map(|h| h.ring).collect()));
    }

    polygons
}

/// Hashable identity of a vertex's X and Y.
type NodeKey = (u64, u64);

fn node_key(c: &Coordinate) -> NodeKey {
    // +0.0 and -0.0 are the same vertex
    ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
}

struct Segment {
    from: Coordinate,
    to: Coordinate,
    count: usize,
}

/// Dissolves every segment that appears an even number of times (shared by
/// two rings), then traces what remains back into closed rings.
fn trace_rings(rings: Vec<LineString>) -> Vec<LineString> {
    let mut segments: Vec<Segment> = vec![];
    // HashMap's Entry API lets us insert-or-get the key
    let mut segment_ids: HashMap<(NodeKey, NodeKey), usize> = HashMap::new();

    for ring in rings.iter() {
        for (a, b) in ring.0.iter().tuple_windows() {
            let (ka, kb) = (node_key(a), node_key(b));
            if ka == kb {
                continue;
            }
            let key = if ka < kb { (ka, kb) } else { (kb, ka) };
            match segment_ids.entry(key) {
                Entry::Occupied(entry) => segments[*entry.get()].count += 1,
                Entry::Vacant(entry) => {
                    entry.insert(segments.len());
                    segments.push(Segment { from: *a, to: *b, count: 1 });
                }
            }
        }
    }

    let mut incident: HashMap<NodeKey, Vec<usize>> = HashMap::new();
    for (i, s) in segments.iter().enumerate() {
        if s.count % 2 == 1 {
            incident.entry(node_key(&s.from)).or_default().push(i);
            incident.entry(node_key(&s.to)).or_default().push(i);
        }
    }

    let mut used = vec![false; segments.len()];
    let mut traced = vec![];

    for start in 0..segments.len() {
        if used[start] || segments[start].count % 2 == 0 {
            continue;
        }
        used[start] = true;

        let origin = node_key(&segments[start].from);
        let mut points = vec![segments[start].from, segments[start].to];
        let mut at = node_key(&segments[start].to);

        while at != origin {
            let next = incident
                .get(&at)
                .and_then(|ids| ids.iter().cloned().find(|&i| !used[i]));
            match next {
                None => break,
                Some(i) => {
                    used[i] = true;
                    let s = &segments[i];
                    let c = if node_key(&s.from) == at { s.to } else { s.from };
                    at = node_key(&c);
                    points.push(c);
                }
            }
        }

        if at == origin && points.len() >= 4 {
            traced.push(LineString(points));
        } else {
            tracing::debug!(points = points.len(), "Discarding a dangling chain of segments");
        }
    }

    traced
}

fn polygonize(rings: Vec<LineString>) -> Vec<Polygon> {
    let candidates: Vec<Candidate> = trace_rings(rings).into_iter().map(Candidate::new).collect();

    // parent = smallest ring strictly containing this one
    let parents: Vec<Option<usize>> = (0..candidates.len())
        .map(|i| {
            (0..candidates.len())
                .filter(|&j| j != i && candidates[j].area > candidates[i].area)
                .filter(|&j| candidates[j].contains(&candidates[i], false))
                .min_by(|&a, &b| {
                    candidates[a]
                        .area
                        .partial_cmp(&candidates[b].area)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        })
        .collect();

    fn depth(i: usize, parents: &[Option<usize>]) -> usize {
        let mut d = 0;
        let mut at = i;
        while let Some(p) = parents[at] {
            d += 1;
            at = p;
        }
        d
    }

    let mut shell_index: HashMap<usize, usize> = HashMap::new();
    let mut polygons: Vec<Polygon> = vec![];
    let mut holes: Vec<(usize, LineString)> = vec![];

    for (i, candidate) in candidates.into_iter().enumerate() {
        if depth(i, &parents) % 2 == 0 {
            shell_index.insert(i, polygons.len());
            polygons.push(Polygon::new(oriented(candidate.ring, WindingOrder::Clockwise), vec![]));
        } else if let Some(parent) = parents[i] {
            holes.push((parent, oriented(candidate.ring, WindingOrder::CounterClockwise)));
        }
    }

    for (parent, hole) in holes {
        if let Some(&p) = shell_index.get(&parent) {
            polygons[p].interiors.push(hole);
        }
    }

    polygons
}

fn has_nested_hole(polygon: &Polygon) -> bool {
    let holes: Vec<Candidate> = polygon.interiors.iter().cloned().map(Candidate::new).collect();
    for (i, outer) in holes.iter().enumerate() {
        for (j, inner) in holes.iter().enumerate() {
            if i != j && outer.area > inner.area && outer.contains(inner, false) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod test {
    use super::*;

    fn ring(coords: &[(f64, f64)]) -> LineString {
        LineString(coords.iter().map(|&(x, y)| Coordinate::new(x, y)).collect())
    }

    /// Clockwise square with its lower-left corner at (x, y).
    fn shell(x: f64, y: f64, size: f64) -> LineString {
        ring(&[(x, y), (x, y + size), (x + size, y + size), (x + size, y), (x, y)])
    }

    fn hole(x: f64, y: f64, size: f64) -> LineString {
        let mut r = shell(x, y, size);
        r.reverse();
        r
    }

    const ALL: [RingStrategy; 4] = [
        RingStrategy::Legacy,
        RingStrategy::Extended,
        RingStrategy::Sequential,
        RingStrategy::Polygonizer,
    ];

    #[test]
    fn one_shell_one_hole() {
        for &strategy in ALL.iter() {
            let polygons = assemble(vec![shell(0., 0., 10.), hole(2., 2., 2.)], strategy).unwrap();
            assert_eq!(1, polygons.len(), "{:?}", strategy);
            assert_eq!(1, polygons[0].interiors.len(), "{:?}", strategy);
        }
    }

    #[test]
    fn two_shells_each_with_a_hole() {
        let rings = vec![shell(0., 0., 10.), shell(20., 0., 10.), hole(22., 2., 2.), hole(2., 2., 2.)];
        let polygons = assemble(rings, RingStrategy::Legacy).unwrap();
        assert_eq!(2, polygons.len());
        assert_eq!(1, polygons[0].interiors.len());
        assert_eq!(1, polygons[1].interiors.len());
        assert_eq!(2., polygons[0].interiors[0].0[0].x);
        assert_eq!(22., polygons[1].interiors[0].0[0].x);
    }

    #[test]
    fn hole_goes_to_smallest_enclosing_shell() {
        // island in a lake: big shell, lake hole, island shell, pond hole in the island
        let rings = vec![shell(0., 0., 100.), hole(10., 10., 80.), shell(20., 20., 60.), hole(30., 30., 10.)];
        let polygons = assemble(rings, RingStrategy::Legacy).unwrap();
        assert_eq!(2, polygons.len());
        assert_eq!(vec![hole(10., 10., 80.)], polygons[0].interiors);
        assert_eq!(vec![hole(30., 30., 10.)], polygons[1].interiors);
    }

    #[test]
    fn only_counter_clockwise_rings_are_reversed_into_shells() {
        for &strategy in ALL.iter() {
            let polygons = assemble(vec![hole(0., 0., 10.)], strategy).unwrap();
            assert_eq!(1, polygons.len());
            assert!(polygons[0].interiors.is_empty());
            assert_eq!(WindingOrder::Clockwise, polygons[0].exterior.winding_order());
        }
    }

    #[test]
    fn hole_inside_hole_is_an_error() {
        let rings = vec![shell(0., 0., 100.), hole(10., 10., 50.), hole(20., 20., 10.)];
        match assemble(rings, RingStrategy::Legacy) {
            Err(ShapefileError::NestedHole { polygon: 0 }) => {}
            other => panic!("expected NestedHole, got {:?}", other),
        }
    }

    #[test]
    fn sequential_splits_on_hole_inside_hole() {
        let rings = vec![shell(0., 0., 100.), hole(10., 10., 50.), hole(20., 20., 10.)];
        let polygons = assemble(rings, RingStrategy::Sequential).unwrap();
        assert_eq!(2, polygons.len());
        assert_eq!(1, polygons[0].interiors.len());
        assert!(polygons[1].interiors.is_empty());
    }

    #[test]
    fn sequential_starts_new_polygon_for_outside_ring() {
        let rings = vec![shell(0., 0., 10.), hole(20., 0., 5.)];
        let polygons = assemble(rings, RingStrategy::Sequential).unwrap();
        assert_eq!(2, polygons.len());
        assert_eq!(WindingOrder::Clockwise, polygons[1].exterior.winding_order());
    }

    #[test]
    fn extended_promotes_orphan_holes() {
        let rings = vec![shell(0., 0., 10.), hole(20., 0., 5.)];
        let polygons = assemble(rings, RingStrategy::Extended).unwrap();
        assert_eq!(2, polygons.len());
        assert!(polygons[0].interiors.is_empty());

        let polygons = assemble(vec![shell(0., 0., 10.), hole(20., 0., 5.)], RingStrategy::Legacy).unwrap();
        assert_eq!(1, polygons.len());
        assert_eq!(1, polygons[0].interiors.len());
    }

    #[test]
    fn extended_looks_past_boundary_vertices() {
        // the hole's first vertex sits on the shell's boundary
        let rings = vec![shell(0., 0., 10.), ring(&[(0., 5.), (2., 5.), (2., 7.), (0., 5.)])];
        assert_eq!(WindingOrder::CounterClockwise, rings[1].winding_order());
        let polygons = assemble(rings, RingStrategy::Extended).unwrap();
        assert_eq!(1, polygons.len());
        assert_eq!(1, polygons[0].interiors.len());
    }

    #[test]
    fn polygonizer_ignores_orientation() {
        // shell written counter-clockwise, hole written clockwise
        let rings = vec![hole(0., 0., 10.), shell(2., 2., 2.)];
        let polygons = assemble(rings, RingStrategy::Polygonizer).unwrap();
        assert_eq!(1, polygons.len());
        assert_eq!(1, polygons[0].interiors.len());
        assert_eq!(WindingOrder::Clockwise, polygons[0].exterior.winding_order());
        assert_eq!(WindingOrder::CounterClockwise, polygons[0].interiors[0].winding_order());
    }

    #[test]
    fn polygonizer_dissolves_shared_edges() {
        // two adjacent squares share the edge x=10
        let rings = vec![shell(0., 0., 10.), shell(10., 0., 10.)];
        let polygons = assemble(rings, RingStrategy::Polygonizer).unwrap();
        assert_eq!(1, polygons.len());
        assert_eq!(200., polygons[0].exterior.area());
    }
}
