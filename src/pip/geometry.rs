//! Polygon assembly from the member ways of a boundary relation.
//!
//! Open ways are stitched into closed rings by matching endpoint coordinates,
//! using a depth-first search with backtracking. The rings are then grouped
//! into polygons by containment: every outer ring that is not inside another
//! unused ring starts a polygon and takes the rings directly inside it as holes.
//! See <https://wiki.openstreetmap.org/wiki/Relation:multipolygon/Algorithm>.

use geo::{Contains, Coord, Geometry, LineString, MultiPolygon, Polygon};
use thiserror::Error;

use crate::models::{CompleteArea, CompleteWay, Node};

/// Upper bound on candidate extensions tried while closing a single ring.
const MAX_EXTENSION_STEPS: usize = 100_000;

/// Why the ways of an area could not be turned into a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("ways could not be assigned to any closed ring")]
    UnassignedWays,
    #[error("an inner ring is not enclosed by any outer ring")]
    InnerWithoutOuter,
    #[error("rings left that cannot be used as outer ring")]
    UnassignedRings,
    #[error("containment test failed on a degenerate ring")]
    Containment,
    #[error("ring search exceeded its step budget")]
    SearchExhausted,
    #[error("area has no ways")]
    Empty,
}

/// Member role of a way in a boundary relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Outer,
    Inner,
}

/// A member way with its role.
#[derive(Debug, Clone, Copy)]
pub struct RoleWay<'a> {
    pub role: Role,
    pub way: &'a CompleteWay,
}

/// A closed ring and the role of the way it started from.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub role: Role,
    pub coords: LineString<f64>,
}

/// Build a polygon or multipolygon from the outer and inner ways of `area`.
pub fn build_area_geometry(area: &CompleteArea) -> Result<Geometry<f64>, AssemblyError> {
    let ways: Vec<RoleWay<'_>> = area
        .outer_ways
        .iter()
        .map(|way| RoleWay {
            role: Role::Outer,
            way,
        })
        .chain(area.inner_ways.iter().map(|way| RoleWay {
            role: Role::Inner,
            way,
        }))
        .collect();

    if ways.is_empty() {
        return Err(AssemblyError::Empty);
    }

    let rings = assign_rings(&ways)?;
    group_rings(&rings)
}

/// Turn every way into part of exactly one closed ring.
pub fn assign_rings(ways: &[RoleWay<'_>]) -> Result<Vec<Ring>, AssemblyError> {
    let mut assigned = vec![false; ways.len()];
    let mut rings = Vec::new();

    for start in 0..ways.len() {
        if assigned[start] {
            continue;
        }
        let ring = assign_ring(ways, start, &mut assigned)?;
        rings.push(ring);
    }

    Ok(rings)
}

fn assign_ring(
    ways: &[RoleWay<'_>],
    start: usize,
    assigned: &mut [bool],
) -> Result<Ring, AssemblyError> {
    let entry = ways[start];
    assigned[start] = true;

    if entry.way.is_closed() {
        return Ok(Ring {
            role: entry.role,
            coords: LineString::new(entry.way.coords()),
        });
    }

    let mut chain = entry.way.coords();
    match complete_ring(ways, assigned, &mut chain, entry.role) {
        Ok(true) => Ok(Ring {
            role: entry.role,
            coords: LineString::new(chain),
        }),
        Ok(false) => {
            assigned[start] = false;
            Err(AssemblyError::UnassignedWays)
        }
        Err(e) => {
            assigned[start] = false;
            Err(e)
        }
    }
}

/// One level of the extension search: the next candidate to try and the way
/// currently appended at this level, with the number of coordinates it added.
struct Frame {
    cursor: usize,
    taken: Option<(usize, usize)>,
}

/// Extend `chain` with unassigned ways of the same role until it closes.
///
/// On success the used ways stay marked as assigned. On failure every flag
/// and coordinate added by the search has been undone.
fn complete_ring(
    ways: &[RoleWay<'_>],
    assigned: &mut [bool],
    chain: &mut Vec<Coord<f64>>,
    role: Role,
) -> Result<bool, AssemblyError> {
    if chain.is_empty() {
        return Ok(false);
    }

    let mut stack = vec![Frame {
        cursor: 0,
        taken: None,
    }];
    let mut steps = 0usize;

    while let Some(frame) = stack.last_mut() {
        // Backtrack whatever this level appended before trying its next candidate
        if let Some((idx, added)) = frame.taken.take() {
            assigned[idx] = false;
            chain.truncate(chain.len() - added);
        }

        let Some((idx, segment)) = next_extension(ways, assigned, chain, role, frame.cursor) else {
            stack.pop();
            continue;
        };

        steps += 1;
        if steps > MAX_EXTENSION_STEPS {
            // Leave the chain and flags as they were on entry
            for frame in stack.iter_mut().rev() {
                if let Some((idx, added)) = frame.taken.take() {
                    assigned[idx] = false;
                    chain.truncate(chain.len() - added);
                }
            }
            return Err(AssemblyError::SearchExhausted);
        }

        frame.cursor = idx + 1;
        frame.taken = Some((idx, segment.len()));
        assigned[idx] = true;
        chain.extend(segment);

        if chain.first() == chain.last() {
            return Ok(true);
        }

        stack.push(Frame {
            cursor: 0,
            taken: None,
        });
    }

    Ok(false)
}

/// Find the first unassigned way at or after `from` with `role` that continues
/// the chain, returning its index and the coordinates to append.
fn next_extension(
    ways: &[RoleWay<'_>],
    assigned: &[bool],
    chain: &[Coord<f64>],
    role: Role,
    from: usize,
) -> Option<(usize, Vec<Coord<f64>>)> {
    let tail = *chain.last()?;

    (from..ways.len()).find_map(|idx| {
        if assigned[idx] || ways[idx].role != role {
            return None;
        }
        let nodes = &ways[idx].way.nodes;
        let (first, last) = (nodes.first()?.coord(), nodes.last()?.coord());

        if first == tail {
            Some((idx, nodes[1..].iter().map(Node::coord).collect()))
        } else if last == tail {
            let reversed: Vec<Coord<f64>> =
                nodes[..nodes.len() - 1].iter().rev().map(Node::coord).collect();
            Some((idx, reversed))
        } else {
            None
        }
    })
}

fn is_testable_ring(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4
        && ring.is_closed()
        && ring.0.iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

/// `contains[x][y]`: ring x contains ring y.
fn containment_matrix(rings: &[Ring]) -> Result<Vec<Vec<bool>>, AssemblyError> {
    if !rings.iter().all(|ring| is_testable_ring(&ring.coords)) {
        return Err(AssemblyError::Containment);
    }

    let polygons: Vec<Polygon<f64>> = rings
        .iter()
        .map(|ring| Polygon::new(ring.coords.clone(), vec![]))
        .collect();

    Ok(polygons
        .iter()
        .map(|x| polygons.iter().map(|y| x.contains(y)).collect())
        .collect())
}

/// True when no other unused ring contains ring `idx`.
fn is_uncontained(contains: &[Vec<bool>], used: &[bool], idx: usize) -> bool {
    (0..used.len()).all(|other| other == idx || used[other] || !contains[other][idx])
}

/// Group closed rings into a polygon (one outer ring) or a multipolygon.
pub fn group_rings(rings: &[Ring]) -> Result<Geometry<f64>, AssemblyError> {
    if rings.is_empty() {
        return Err(AssemblyError::Empty);
    }

    let contains = containment_matrix(rings)?;
    let mut used = vec![false; rings.len()];
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    while used.contains(&false) {
        let outer_idx = (0..rings.len())
            .find(|&idx| !used[idx] && is_uncontained(&contains, &used, idx))
            .ok_or(AssemblyError::UnassignedRings)?;

        if rings[outer_idx].role == Role::Inner {
            return Err(AssemblyError::InnerWithoutOuter);
        }
        used[outer_idx] = true;

        let mut holes = Vec::new();
        for idx in 0..rings.len() {
            if !used[idx] && contains[outer_idx][idx] && is_uncontained(&contains, &used, idx) {
                holes.push(rings[idx].coords.clone());
                used[idx] = true;
            }
        }

        let polygon = Polygon::new(rings[outer_idx].coords.clone(), holes);
        if polygons.is_empty() && !used.contains(&false) {
            return Ok(Geometry::Polygon(polygon));
        }
        polygons.push(polygon);
    }

    Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn way(points: &[(f64, f64)]) -> CompleteWay {
        CompleteWay::new(points.iter().map(|&(x, y)| Node::new(y, x)).collect())
    }

    fn area(outer: Vec<CompleteWay>, inner: Vec<CompleteWay>) -> CompleteArea {
        CompleteArea {
            name: "Test".to_string(),
            outer_ways: outer,
            inner_ways: inner,
            ..Default::default()
        }
    }

    fn square(x0: f64, y0: f64, size: f64) -> CompleteWay {
        way(&[
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
            (x0, y0),
        ])
    }

    fn vertex_set(ring: &LineString<f64>) -> Vec<(i64, i64)> {
        let mut v: Vec<_> = ring
            .0
            .iter()
            .map(|c| ((c.x * 1e6) as i64, (c.y * 1e6) as i64))
            .collect();
        v.sort();
        v.dedup();
        v
    }

    #[test]
    fn test_closed_way_is_polygon() {
        let geometry = build_area_geometry(&area(vec![square(0.0, 0.0, 1.0)], vec![])).unwrap();
        match geometry {
            Geometry::Polygon(p) => assert!(p.interiors().is_empty()),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_split_ring_in_arbitrary_order() {
        // Square split into four fragments, given shuffled and partly reversed
        let fragments = vec![
            way(&[(1.0, 1.0), (0.0, 1.0)]),
            way(&[(0.0, 0.0), (1.0, 0.0)]),
            way(&[(0.0, 0.0), (0.0, 1.0)]),
            way(&[(1.0, 0.0), (1.0, 1.0)]),
        ];
        let geometry = build_area_geometry(&area(fragments, vec![])).unwrap();
        let Geometry::Polygon(polygon) = geometry else {
            panic!("expected polygon");
        };
        assert!(polygon.exterior().is_closed());
        assert_eq!(
            vertex_set(polygon.exterior()),
            vertex_set(&LineString::new(square(0.0, 0.0, 1.0).coords()))
        );
    }

    #[test]
    fn test_backtracking_past_dead_end() {
        // From (0,0)->(1,0) the first candidate leads to a spur that never closes
        let fragments = vec![
            way(&[(0.0, 0.0), (1.0, 0.0)]),
            way(&[(1.0, 0.0), (2.0, 5.0)]),
            way(&[(1.0, 0.0), (1.0, 1.0)]),
            way(&[(1.0, 1.0), (0.0, 0.0)]),
        ];
        let ways: Vec<_> = fragments
            .iter()
            .map(|w| RoleWay {
                role: Role::Outer,
                way: w,
            })
            .collect();
        let mut assigned = vec![false; ways.len()];
        let ring = assign_ring(&ways, 0, &mut assigned).unwrap();

        assert_eq!(ring.coords.0.len(), 4);
        assert_eq!(assigned, vec![true, false, true, true]);

        // The spur is left over and cannot form a ring of its own
        assert_eq!(assign_rings(&ways), Err(AssemblyError::UnassignedWays));
    }

    #[test]
    fn test_unclosable_fragments_fail() {
        let fragments = vec![
            way(&[(0.0, 0.0), (1.0, 0.0)]),
            way(&[(1.0, 1.0), (0.0, 1.0)]),
        ];
        assert_eq!(
            build_area_geometry(&area(fragments, vec![])),
            Err(AssemblyError::UnassignedWays)
        );
    }

    #[test]
    fn test_roles_are_not_mixed() {
        // Two halves of one ring, but with different roles
        let outer = way(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let inner = way(&[(1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        assert_eq!(
            build_area_geometry(&area(vec![outer], vec![inner])),
            Err(AssemblyError::UnassignedWays)
        );
    }

    #[test]
    fn test_outer_with_hole() {
        let geometry = build_area_geometry(&area(
            vec![square(0.0, 0.0, 10.0)],
            vec![square(2.0, 2.0, 2.0)],
        ))
        .unwrap();
        let Geometry::Polygon(polygon) = geometry else {
            panic!("expected polygon");
        };
        assert_eq!(polygon.interiors().len(), 1);
    }

    #[test]
    fn test_open_inner_fragments_form_hole() {
        let inner = vec![
            way(&[(4.0, 4.0), (2.0, 4.0), (2.0, 2.0)]),
            way(&[(2.0, 2.0), (4.0, 2.0), (4.0, 4.0)]),
        ];
        let geometry = build_area_geometry(&area(vec![square(0.0, 0.0, 10.0)], inner)).unwrap();
        let Geometry::Polygon(polygon) = geometry else {
            panic!("expected polygon");
        };
        assert_eq!(polygon.interiors().len(), 1);
        assert_eq!(
            vertex_set(&polygon.interiors()[0]),
            vertex_set(&LineString::new(square(2.0, 2.0, 2.0).coords()))
        );
    }

    #[test]
    fn test_overlapping_outers_are_both_emitted() {
        // Neither ring contains the other, so both start a polygon
        let geometry = build_area_geometry(&area(
            vec![square(0.0, 0.0, 2.0), square(1.0, 1.0, 2.0)],
            vec![],
        ))
        .unwrap();
        let Geometry::MultiPolygon(multi) = geometry else {
            panic!("expected multipolygon");
        };
        assert_eq!(multi.0.len(), 2);
    }

    #[test]
    fn test_search_budget_exhausted() {
        // A spur into a complete graph: the chain can never return to the
        // spur's free end, and the graph has far too many trails to try
        let corners: Vec<(f64, f64)> = (0..14)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::TAU / 14.0;
                (angle.cos(), angle.sin())
            })
            .collect();
        let mut fragments = vec![way(&[(5.0, 5.0), corners[0]])];
        for a in 0..corners.len() {
            for b in a + 1..corners.len() {
                fragments.push(way(&[corners[a], corners[b]]));
            }
        }

        assert_eq!(
            build_area_geometry(&area(fragments, vec![])),
            Err(AssemblyError::SearchExhausted)
        );
    }

    #[test]
    fn test_disjoint_outers_make_multipolygon() {
        let geometry = build_area_geometry(&area(
            vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)],
            vec![],
        ))
        .unwrap();
        let Geometry::MultiPolygon(multi) = geometry else {
            panic!("expected multipolygon");
        };
        assert_eq!(multi.0.len(), 2);
        assert!(multi.0.iter().all(|p| p.interiors().is_empty()));
    }

    #[test]
    fn test_inner_without_outer() {
        let result = build_area_geometry(&area(
            vec![square(0.0, 0.0, 1.0)],
            vec![square(5.0, 5.0, 1.0)],
        ));
        assert_eq!(result, Err(AssemblyError::InnerWithoutOuter));
    }

    #[test]
    fn test_island_inside_hole() {
        // outer > inner > outer: an island in a lake becomes a second polygon
        let geometry = build_area_geometry(&area(
            vec![square(0.0, 0.0, 10.0), square(4.0, 4.0, 1.0)],
            vec![square(2.0, 2.0, 6.0)],
        ))
        .unwrap();
        let Geometry::MultiPolygon(multi) = geometry else {
            panic!("expected multipolygon");
        };
        assert_eq!(multi.0.len(), 2);
        assert_eq!(multi.0[0].interiors().len(), 1);
        assert!(multi.0[1].interiors().is_empty());
    }

    #[test]
    fn test_duplicate_rings_unassignable() {
        let result = build_area_geometry(&area(
            vec![square(0.0, 0.0, 1.0), square(0.0, 0.0, 1.0)],
            vec![],
        ));
        assert_eq!(result, Err(AssemblyError::UnassignedRings));
    }

    #[test]
    fn test_degenerate_ring_fails_containment() {
        let sliver = way(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
        assert_eq!(
            build_area_geometry(&area(vec![sliver], vec![])),
            Err(AssemblyError::Containment)
        );
    }

    #[test]
    fn test_empty_area() {
        assert_eq!(
            build_area_geometry(&area(vec![], vec![])),
            Err(AssemblyError::Empty)
        );
    }

    #[test]
    fn test_empty_way_fails() {
        assert_eq!(
            build_area_geometry(&area(vec![CompleteWay::default()], vec![])),
            Err(AssemblyError::UnassignedWays)
        );
    }
}
