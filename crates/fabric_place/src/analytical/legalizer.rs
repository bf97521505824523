//! Area-based spreading legalizer.
//!
//! Legalizes the continuous coordinates of one block type onto that type's
//! device sites. Blocks are binned onto the type's tile grid; every
//! overfull bin grows a rectangular area (step = one column of the type
//! horizontally, one block height vertically, toward the lowest-density
//! side) until its capacity covers its occupation, then the area is
//! recursively bipartitioned along its longer axis with capacity-matched
//! median cuts until single tiles assign blocks one-for-one.
//!
//! The result is a pure function of the continuous input: identical
//! coordinates legalize identically.

use crate::PlaceError;
use fabric_circuit::Grid;
use std::collections::{BTreeMap, BTreeSet};

/// Legalizes the blocks of one type.
///
/// `columns` are the device columns owned by the type, `block_height` its
/// row stride; `xs`/`ys` hold one continuous coordinate pair per block.
/// Returns the legal `(x, y)` site position per block, in input order.
pub fn legalize_type(
    grid: &Grid,
    block_height: u32,
    columns: &[u32],
    xs: &[f64],
    ys: &[f64],
) -> Result<Vec<(u32, u32)>, PlaceError> {
    assert_eq!(xs.len(), ys.len());
    if xs.is_empty() {
        return Ok(Vec::new());
    }
    if columns.is_empty() {
        return Err(PlaceError::Infeasible {
            message: "no columns available for block type".into(),
        });
    }

    // The type's tile grid: every (column, row) site start.
    let mut rows: Vec<u32> = Vec::new();
    let mut row = 1;
    while row + block_height <= grid.height() - 1 {
        rows.push(row);
        row += block_height;
    }
    if rows.is_empty() {
        return Err(PlaceError::Infeasible {
            message: "device too short for block type".into(),
        });
    }
    if columns.len() * rows.len() < xs.len() {
        return Err(PlaceError::Infeasible {
            message: format!(
                "{} blocks but only {} sites",
                xs.len(),
                columns.len() * rows.len()
            ),
        });
    }

    // Bin every block to its nearest tile.
    let mut bins: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    for block in 0..xs.len() {
        let ci = nearest(columns, xs[block]);
        let ri = nearest(&rows, ys[block]);
        bins.entry((ci, ri)).or_default().push(block);
    }

    let mut assignment = vec![(0u32, 0u32); xs.len()];
    let mut claimed: BTreeSet<(usize, usize)> = BTreeSet::new();

    // Spread the overfull bins first.
    let overfull: Vec<(usize, usize)> = bins
        .iter()
        .filter(|(_, blocks)| blocks.len() > 1)
        .map(|(&tile, _)| tile)
        .collect();
    for seed in overfull {
        if claimed.contains(&seed) {
            continue;
        }
        let area = grow_area(seed, &mut bins, &mut claimed, columns.len(), rows.len())?;
        partition(area.tiles, area.blocks, columns, &rows, xs, ys, &mut assignment);
    }

    // Everything left sits alone in its bin.
    for (&(ci, ri), blocks) in &bins {
        debug_assert!(blocks.len() <= 1);
        for &block in blocks {
            assignment[block] = (columns[ci], rows[ri]);
        }
    }

    Ok(assignment)
}

/// Index of the slot in `values` closest to `target`.
fn nearest(values: &[u32], target: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, &value) in values.iter().enumerate() {
        let distance = (value as f64 - target).abs();
        if distance < best_distance {
            best_distance = distance;
            best = index;
        }
    }
    best
}

struct Area {
    tiles: Vec<(usize, usize)>,
    blocks: Vec<usize>,
}

/// Grows an area from `seed` until it holds as many tiles as blocks,
/// absorbing the bins it covers and claiming their tiles.
fn grow_area(
    seed: (usize, usize),
    bins: &mut BTreeMap<(usize, usize), Vec<usize>>,
    claimed: &mut BTreeSet<(usize, usize)>,
    num_columns: usize,
    num_rows: usize,
) -> Result<Area, PlaceError> {
    let (mut left, mut right) = (seed.0, seed.0);
    let (mut top, mut bottom) = (seed.1, seed.1);

    let mut tiles = vec![seed];
    claimed.insert(seed);
    let mut blocks = bins.remove(&seed).unwrap_or_default();

    while blocks.len() > tiles.len() {
        // Candidate strips in each direction, unclaimed tiles only.
        let strip = |horizontal: i32, vertical: i32| -> Option<Vec<(usize, usize)>> {
            let tiles: Vec<(usize, usize)> = if horizontal == -1 {
                if left == 0 {
                    return None;
                }
                (top..=bottom).map(|ri| (left - 1, ri)).collect()
            } else if horizontal == 1 {
                if right + 1 >= num_columns {
                    return None;
                }
                (top..=bottom).map(|ri| (right + 1, ri)).collect()
            } else if vertical == -1 {
                if top == 0 {
                    return None;
                }
                (left..=right).map(|ci| (ci, top - 1)).collect()
            } else {
                if bottom + 1 >= num_rows {
                    return None;
                }
                (left..=right).map(|ci| (ci, bottom + 1)).collect()
            };
            Some(tiles)
        };

        let mut best: Option<(f64, i32, i32, Vec<(usize, usize)>)> = None;
        for &(horizontal, vertical) in &[(-1, 0), (1, 0), (0, -1), (0, 1)] {
            let Some(candidate) = strip(horizontal, vertical) else {
                continue;
            };
            let fresh: Vec<&(usize, usize)> = candidate
                .iter()
                .filter(|tile| !claimed.contains(tile))
                .collect();
            if fresh.is_empty() {
                continue;
            }
            let occupancy: usize = fresh
                .iter()
                .map(|tile| bins.get(tile).map_or(0, Vec::len))
                .sum();
            let density = occupancy as f64 / fresh.len() as f64;
            let better = match &best {
                None => true,
                Some((best_density, ..)) => density < *best_density,
            };
            if better {
                best = Some((density, horizontal, vertical, candidate));
            }
        }

        let Some((_, horizontal, vertical, strip_tiles)) = best else {
            return Err(PlaceError::Infeasible {
                message: "legalizer area cannot grow further".into(),
            });
        };
        if horizontal == -1 {
            left -= 1;
        } else if horizontal == 1 {
            right += 1;
        } else if vertical == -1 {
            top -= 1;
        } else {
            bottom += 1;
        }
        for tile in strip_tiles {
            if claimed.insert(tile) {
                tiles.push(tile);
                if let Some(mut absorbed) = bins.remove(&tile) {
                    blocks.append(&mut absorbed);
                }
            }
        }
    }

    Ok(Area { tiles, blocks })
}

/// Recursively bipartitions `tiles`/`blocks` along the longer axis until
/// every tile holds at most one block, writing site positions into
/// `assignment`.
fn partition(
    tiles: Vec<(usize, usize)>,
    mut blocks: Vec<usize>,
    columns: &[u32],
    rows: &[u32],
    xs: &[f64],
    ys: &[f64],
    assignment: &mut [(u32, u32)],
) {
    debug_assert!(blocks.len() <= tiles.len());
    if tiles.len() == 1 {
        let (ci, ri) = tiles[0];
        for &block in &blocks {
            assignment[block] = (columns[ci], rows[ri]);
        }
        return;
    }

    let min_c = tiles.iter().map(|t| t.0).min().unwrap_or(0);
    let max_c = tiles.iter().map(|t| t.0).max().unwrap_or(0);
    let min_r = tiles.iter().map(|t| t.1).min().unwrap_or(0);
    let max_r = tiles.iter().map(|t| t.1).max().unwrap_or(0);
    let split_horizontally = (max_c - min_c) >= (max_r - min_r);

    // Split the tile set at the midpoint of the longer axis. With more
    // than one distinct tile the chosen axis has a nonzero range, so both
    // halves are nonempty.
    let (low_tiles, high_tiles): (Vec<_>, Vec<_>) = if split_horizontally {
        let mid = (min_c + max_c) / 2;
        tiles.into_iter().partition(|tile| tile.0 <= mid)
    } else {
        let mid = (min_r + max_r) / 2;
        tiles.into_iter().partition(|tile| tile.1 <= mid)
    };
    debug_assert!(!low_tiles.is_empty() && !high_tiles.is_empty());

    // Order the blocks along the split axis and hand the lower half its
    // capacity-proportional share (ties go low).
    blocks.sort_by(|&a, &b| {
        let (pa, pb) = if split_horizontally {
            (xs[a], xs[b])
        } else {
            (ys[a], ys[b])
        };
        pa.total_cmp(&pb).then(a.cmp(&b))
    });
    let capacity_low = low_tiles.len();
    let capacity_high = high_tiles.len();
    let total = capacity_low + capacity_high;
    let n = blocks.len();
    let proportional = (n as f64 * capacity_low as f64 / total as f64 + 0.5).floor() as usize;
    let k = proportional
        .max(n.saturating_sub(capacity_high))
        .min(capacity_low.min(n));

    let high_blocks = blocks.split_off(k);
    partition(low_tiles, blocks, columns, rows, xs, ys, assignment);
    partition(high_tiles, high_blocks, columns, rows, xs, ys, assignment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_arch::load_architecture;
    use fabric_circuit::Grid;
    use std::collections::HashMap;

    fn clb_grid(num_clbs: usize) -> (Grid, Vec<u32>) {
        let arch = load_architecture("basic").unwrap();
        let mut counts = HashMap::new();
        counts.insert(arch.clb_type(), num_clbs);
        let grid = Grid::build(&arch, &counts, None).unwrap();
        let columns = grid.columns_of_type(arch.clb_type()).to_vec();
        (grid, columns)
    }

    fn assert_legal(grid: &Grid, columns: &[u32], result: &[(u32, u32)]) {
        let mut seen = std::collections::HashSet::new();
        for &(x, y) in result {
            assert!(seen.insert((x, y)), "site ({x},{y}) assigned twice");
            assert!(columns.contains(&x));
            assert!(y >= 1 && y < grid.height() - 1);
        }
    }

    #[test]
    fn empty_input() {
        let (grid, columns) = clb_grid(4);
        let result = legalize_type(&grid, 1, &columns, &[], &[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn separated_blocks_keep_their_bins() {
        let (grid, columns) = clb_grid(8);
        let xs = vec![columns[0] as f64, columns[1] as f64];
        let ys = vec![1.0, 2.0];
        let result = legalize_type(&grid, 1, &columns, &xs, &ys).unwrap();
        assert_eq!(result[0], (columns[0], 1));
        assert_eq!(result[1], (columns[1], 2));
    }

    #[test]
    fn clustered_blocks_spread() {
        let (grid, columns) = clb_grid(16);
        // Everything piled on one point.
        let n = 9;
        let xs = vec![columns[0] as f64; n];
        let ys = vec![2.0; n];
        let result = legalize_type(&grid, 1, &columns, &xs, &ys).unwrap();
        assert_eq!(result.len(), n);
        assert_legal(&grid, &columns, &result);
    }

    #[test]
    fn determinism() {
        let (grid, columns) = clb_grid(16);
        let xs: Vec<f64> = (0..10).map(|i| 2.0 + (i % 3) as f64 * 0.1).collect();
        let ys: Vec<f64> = (0..10).map(|i| 1.0 + (i % 4) as f64 * 0.2).collect();
        let first = legalize_type(&grid, 1, &columns, &xs, &ys).unwrap();
        let second = legalize_type(&grid, 1, &columns, &xs, &ys).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn order_respects_coordinates() {
        let (grid, columns) = clb_grid(8);
        // Two blocks fighting over one tile: the lower-y block gets the
        // lower row after spreading.
        let xs = vec![columns[0] as f64, columns[0] as f64];
        let ys = vec![1.2, 1.4];
        let result = legalize_type(&grid, 1, &columns, &xs, &ys).unwrap();
        assert_legal(&grid, &columns, &result);
        assert!(result[0].1 <= result[1].1 || result[0].0 < result[1].0);
    }

    #[test]
    fn capacity_exceeded_is_infeasible() {
        let (grid, columns) = clb_grid(2);
        let sites = columns.len() * (grid.height() as usize - 2);
        let n = sites + 1;
        let xs = vec![columns[0] as f64; n];
        let ys = vec![1.0; n];
        let err = legalize_type(&grid, 1, &columns, &xs, &ys).unwrap_err();
        assert!(matches!(err, PlaceError::Infeasible { .. }));
    }

    #[test]
    fn full_device_still_legalizes() {
        let (grid, columns) = clb_grid(9);
        let sites = columns.len() * (grid.height() as usize - 2);
        let xs = vec![columns[0] as f64; sites];
        let ys = vec![1.0; sites];
        let result = legalize_type(&grid, 1, &columns, &xs, &ys).unwrap();
        assert_legal(&grid, &columns, &result);
        assert_eq!(result.len(), sites);
    }

    #[test]
    fn no_columns_is_infeasible() {
        let (grid, _) = clb_grid(4);
        let err = legalize_type(&grid, 1, &[], &[1.0], &[1.0]).unwrap_err();
        assert!(matches!(err, PlaceError::Infeasible { .. }));
    }
}
