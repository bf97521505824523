//! The device grid: column pattern, sizing, and site occupancy.
//!
//! The device is a square array. Column 0, column N-1, row 0, and row N-1
//! form the I/O ring (corners excluded). Interior columns follow the
//! hardblock pattern: hardblock type i claims column c iff
//! `(c - 1 - start_i) mod repeat_i == 0` (first matching type wins),
//! every other interior column is CLB.

use crate::error::CircuitError;
use crate::ids::BlockId;
use crate::site::Site;
use fabric_arch::{Architecture, BlockTypeId};
use std::collections::HashMap;

/// The device grid with its sites and occupancy state.
#[derive(Clone, Debug)]
pub struct Grid {
    width: u32,
    height: u32,
    columns: Vec<BlockTypeId>,
    sites: Vec<Option<Site>>,
    columns_per_type: HashMap<BlockTypeId, Vec<u32>>,
}

impl Grid {
    /// Builds the grid for the given per-type block counts.
    ///
    /// With `fixed_size == None` the device auto-sizes: the smallest square
    /// where every block type's capacity covers its occupancy. With a fixed
    /// size the capacities are checked and [`CircuitError::DeviceTooSmall`]
    /// is returned when the circuit does not fit.
    pub fn build(
        arch: &Architecture,
        counts: &HashMap<BlockTypeId, usize>,
        fixed_size: Option<u32>,
    ) -> Result<Self, CircuitError> {
        let io_type = arch.io_type();
        let clb_type = arch.clb_type();
        let hardblock_types = arch.hardblock_types();

        // A circuit with no blocks at all gets the degenerate 2 x 2 device
        // (two I/O columns, nothing interior).
        if fixed_size.is_none() && counts.values().all(|&count| count == 0) {
            return Ok(Self {
                width: 2,
                height: 2,
                columns: vec![io_type, io_type],
                sites: vec![None; 4],
                columns_per_type: HashMap::from([(io_type, vec![0, 1])]),
            });
        }

        let mut columns: Vec<BlockTypeId> = vec![io_type];
        let mut size: u32 = 2;

        loop {
            // Decide the type of interior column `size - 1`.
            let column = (size - 1) as i64;
            let hardblock = hardblock_types.iter().copied().find(|&hb| {
                let data = arch.block_type(hb);
                (column - 1 - data.start as i64).rem_euclid(data.repeat as i64) == 0
            });
            columns.push(hardblock.unwrap_or(clb_type));
            size += 1;

            let fits = match fixed_size {
                Some(fixed) => {
                    if size < fixed {
                        false
                    } else {
                        check_capacity(arch, &columns, size, counts)
                            .map_err(|message| CircuitError::DeviceTooSmall {
                                size: fixed,
                                message,
                            })?;
                        true
                    }
                }
                None => check_capacity(arch, &columns, size, counts).is_ok(),
            };
            if fits {
                break;
            }
        }

        columns.push(io_type);
        let width = size;
        let height = size;

        let mut columns_per_type: HashMap<BlockTypeId, Vec<u32>> = HashMap::new();
        for (x, &block_type) in columns.iter().enumerate() {
            columns_per_type.entry(block_type).or_default().push(x as u32);
        }

        // Instantiate the sites: the I/O ring (corners stay empty), then
        // the interior columns with their row stride.
        let mut sites: Vec<Option<Site>> = vec![None; (width * height) as usize];
        let io_capacity = arch.io_capacity();
        let index = |x: u32, y: u32| (x * height + y) as usize;

        for i in 1..size - 1 {
            sites[index(0, i)] = Some(Site::new(0, i, io_type, io_capacity));
            sites[index(size - 1, i)] = Some(Site::new(size - 1, i, io_type, io_capacity));
            sites[index(i, 0)] = Some(Site::new(i, 0, io_type, io_capacity));
            sites[index(i, size - 1)] = Some(Site::new(i, size - 1, io_type, io_capacity));
        }

        for x in 1..size - 1 {
            let block_type = columns[x as usize];
            let block_height = arch.block_type(block_type).height;
            let mut y = 1;
            while y + block_height <= size - 1 {
                sites[index(x, y)] = Some(Site::new(x, y, block_type, 1));
                y += block_height;
            }
        }

        Ok(Self {
            width,
            height,
            columns,
            sites,
            columns_per_type,
        })
    }

    /// Device width in columns.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Device height in rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The block type owning column `x`.
    pub fn column_type(&self, x: u32) -> BlockTypeId {
        self.columns[x as usize]
    }

    /// The interior columns owned by `block_type`, ascending.
    pub fn columns_of_type(&self, block_type: BlockTypeId) -> &[u32] {
        self.columns_per_type
            .get(&block_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (x * self.height + y) as usize
    }

    /// The site starting exactly at `(x, y)`, if any.
    pub fn site_at_exact(&self, x: u32, y: u32) -> Option<&Site> {
        self.sites[self.index(x, y)].as_ref()
    }

    /// The site covering `(x, y)`: multi-row hardblock sites are found by
    /// walking down to their base row.
    pub fn site_at(&self, x: u32, y: u32) -> Option<&Site> {
        let mut row = y;
        loop {
            if let Some(site) = self.sites[self.index(x, row)].as_ref() {
                return Some(site);
            }
            if row == 0 {
                return None;
            }
            row -= 1;
        }
    }

    fn site_at_mut(&mut self, x: u32, y: u32) -> Option<&mut Site> {
        let index = self.index(x, y);
        self.sites[index].as_mut()
    }

    /// All site positions accepting `block_type`, column-major.
    pub fn sites_of_type(&self, block_type: BlockTypeId) -> Vec<(u32, u32)> {
        let mut positions = Vec::new();
        for x in 0..self.width {
            for y in 0..self.height {
                if let Some(site) = self.site_at_exact(x, y) {
                    if site.block_type == block_type {
                        positions.push((x, y));
                    }
                }
            }
        }
        positions
    }

    /// Records `block` at `(x, y, subblock)`.
    ///
    /// Fails when there is no site of the right kind at the position or the
    /// sub-slot is already taken.
    pub fn occupy(
        &mut self,
        block: BlockId,
        block_type: BlockTypeId,
        x: u32,
        y: u32,
        subblock: u32,
    ) -> Result<(), CircuitError> {
        let site = self
            .site_at_mut(x, y)
            .ok_or(CircuitError::NoSuchSite { block_type, x, y })?;
        if site.block_type != block_type || site.y != y || subblock >= site.capacity() {
            return Err(CircuitError::NoSuchSite { block_type, x, y });
        }
        if site.occupants[subblock as usize].is_some() {
            return Err(CircuitError::IllegalPlacement {
                block: format!("{block}"),
                x,
                y,
                subblock,
                message: "sub-slot already occupied".into(),
            });
        }
        site.occupants[subblock as usize] = Some(block);
        Ok(())
    }

    /// Clears the occupant of `(x, y, subblock)` and returns it.
    pub fn vacate(&mut self, x: u32, y: u32, subblock: u32) -> Option<BlockId> {
        let site = self.site_at_mut(x, y)?;
        site.occupants[subblock as usize].take()
    }

    /// The occupant of `(x, y, subblock)`, if any.
    pub fn occupant(&self, x: u32, y: u32, subblock: u32) -> Option<BlockId> {
        self.site_at_exact(x, y)
            .and_then(|site| site.occupant(subblock))
    }
}

/// Checks that the capacity of every type covers its block count on a
/// device of `size` with the given interior `columns` (the trailing I/O
/// column not yet appended). Returns which capacity failed.
fn check_capacity(
    arch: &Architecture,
    columns: &[BlockTypeId],
    size: u32,
    counts: &HashMap<BlockTypeId, usize>,
) -> Result<(), String> {
    let rows = (size - 2) as usize;

    let io_count = counts.get(&arch.io_type()).copied().unwrap_or(0);
    let io_sites = 4 * rows * arch.io_capacity() as usize;
    if io_sites < io_count {
        return Err(format!("{io_count} I/O blocks > capacity {io_sites}"));
    }

    let clb_count = counts.get(&arch.clb_type()).copied().unwrap_or(0);
    let clb_columns = columns
        .iter()
        .filter(|&&block_type| block_type == arch.clb_type())
        .count();
    let clb_sites = rows * clb_columns;
    if clb_sites < clb_count {
        return Err(format!("{clb_count} CLBs > capacity {clb_sites}"));
    }

    for &hardblock in arch.hardblock_types() {
        let count = counts.get(&hardblock).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        let data = arch.block_type(hardblock);
        let hb_columns = columns
            .iter()
            .filter(|&&block_type| block_type == hardblock)
            .count();
        let sites = hb_columns * (rows / data.height as usize);
        if sites < count {
            return Err(format!(
                "{count} `{}` blocks > capacity {sites}",
                data.name
            ));
        }
    }
    Ok(())
}
