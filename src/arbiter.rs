//! Multi-modem candidate arbiter: collects simultaneously decoded
//! frames from one channel's `[subchan][slice]` grid, scores them,
//! and picks a winner. See `spec.md` §4.7.
//!
//! Grounded on the teacher's `src/mtgraph.rs` for the general shape of
//! "several producers feed one decision point, consumed inline with
//! the sample pump"; the teacher never arbitrates between competing
//! decodes of the same signal (each of its blocks owns a single
//! decode path), so the grid, scoring formula and spectrum rendering
//! are built here from `spec.md` §4.7/§8.

use rand::Rng;

use crate::ax25::Packet;

/// FEC family a candidate was decoded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FecKind {
    None,
    Fx25,
    Il2p,
}

/// Retry count ceiling used by the plain-AX.25 scoring term.
pub const RETRY_MAX: u32 = 8;

/// A provisionally decoded frame awaiting arbitration across a
/// channel's subchannels and slicers.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub packet: Packet,
    pub level: f64,
    pub fec_kind: FecKind,
    pub retries: u32,
    pub age: u64,
    pub crc: u16,
}

impl Candidate {
    #[must_use]
    pub fn new(packet: Packet, level: f64, fec_kind: FecKind, retries: u32, crc: u16) -> Self {
        Self {
            packet,
            level,
            fec_kind,
            retries,
            age: 0,
            crc,
        }
    }
}

/// The winning candidate plus its grid position and a rendered
/// spectrum string, ready for [`crate::queue::DeliveryItem::Received`].
pub struct Winner {
    pub subchan: usize,
    pub slice: usize,
    pub candidate: Candidate,
    pub spectrum: String,
}

/// Per-channel candidate grid.
pub struct Grid {
    cells: Vec<Vec<Option<Candidate>>>,
    num_subchans: usize,
    num_slicers: usize,
}

impl Grid {
    #[must_use]
    pub fn new(num_subchans: usize, num_slicers: usize) -> Self {
        Self {
            cells: vec![vec![None; num_slicers]; num_subchans.max(1)],
            num_subchans: num_subchans.max(1),
            num_slicers: num_slicers.max(1),
        }
    }

    /// Store a newly completed frame; overwrites any existing cell.
    pub fn store(&mut self, subchan: usize, slice: usize, candidate: Candidate) {
        self.cells[subchan][slice] = Some(candidate);
    }

    /// Age every non-empty cell by one sample.
    pub fn tick(&mut self) {
        for row in &mut self.cells {
            for cell in row.iter_mut().flatten() {
                cell.age += 1;
            }
        }
    }

    /// Whether any cell has aged past the arbitration threshold.
    #[must_use]
    pub fn ready(&self, threshold: u64) -> bool {
        self.cells
            .iter()
            .flatten()
            .flatten()
            .any(|c| c.age > threshold)
    }

    #[must_use]
    pub fn is_single_cell(&self) -> bool {
        self.num_subchans == 1 && self.num_slicers == 1
    }

    fn linear_index(&self, subchan: usize, slice: usize) -> usize {
        slice * self.num_subchans + subchan
    }

    fn score(&self, subchan: usize, slice: usize) -> Option<i64> {
        let cell = self.cells[subchan][slice].as_ref()?;
        let base = match cell.fec_kind {
            FecKind::Il2p | FecKind::Fx25 => 9000 - 100 * i64::from(cell.retries),
            FecKind::None => (i64::from(RETRY_MAX) - i64::from(cell.retries)) * 1000 + 1,
        };
        let my_idx = self.linear_index(subchan, slice) as i64;
        let num_bars = (self.num_subchans * self.num_slicers) as i64;
        let mut bonus = 0i64;
        for s in 0..self.num_subchans {
            for sl in 0..self.num_slicers {
                if s == subchan && sl == slice {
                    continue;
                }
                if let Some(other) = &self.cells[s][sl] {
                    if other.crc == cell.crc {
                        let idx = self.linear_index(s, sl) as i64;
                        bonus += (num_bars + 1) - (my_idx - idx).abs();
                    }
                }
            }
        }
        Some(base + bonus)
    }

    /// Highest-scoring non-empty cell; ties break by lowest linear index.
    #[must_use]
    pub fn pick_best(&self) -> Option<(usize, usize)> {
        let mut best: Option<((usize, usize), i64, i64)> = None;
        for subchan in 0..self.num_subchans {
            for slice in 0..self.num_slicers {
                if let Some(score) = self.score(subchan, slice) {
                    let idx = self.linear_index(subchan, slice) as i64;
                    let take = match best {
                        None => true,
                        Some((_, best_idx, best_score)) => {
                            score > best_score || (score == best_score && idx < best_idx)
                        }
                    };
                    if take {
                        best = Some(((subchan, slice), idx, score));
                    }
                }
            }
        }
        best.map(|(pos, _, _)| pos)
    }

    /// Render the spectrum string: one glyph per cell, in
    /// slice-major linear order, showing occupancy and quality.
    ///
    /// Glyph scale: `'.'` empty, `':'` weak (level < 0.2), `'0'..'9'`
    /// proportional level, `'+'` saturated (level >= 1.0), `'|'`
    /// marks the winning cell.
    #[must_use]
    pub fn render_spectrum(&self, winner_subchan: usize, winner_slice: usize) -> String {
        let mut out = String::with_capacity(self.num_subchans * self.num_slicers);
        for slice in 0..self.num_slicers {
            for subchan in 0..self.num_subchans {
                if subchan == winner_subchan && slice == winner_slice {
                    out.push('|');
                    continue;
                }
                let glyph = match &self.cells[subchan][slice] {
                    None => '.',
                    Some(c) if c.level < 0.2 => ':',
                    Some(c) if c.level >= 1.0 => '+',
                    Some(c) => {
                        let digit = (c.level * 9.0).clamp(0.0, 9.0) as u32;
                        std::char::from_digit(digit, 10).unwrap_or('9')
                    }
                };
                out.push(glyph);
            }
        }
        out
    }

    /// Take and delete the winner, discarding every other cell's
    /// packet. `recv_error_rate` is a percentage (0..100); when > 0,
    /// draws a uniform sample and drops the winner as a testing hook
    /// per `spec.md` §4.7.
    pub fn arbitrate(&mut self, recv_error_rate: f64) -> Option<Winner> {
        let (subchan, slice) = self.pick_best()?;
        let spectrum = self.render_spectrum(subchan, slice);
        let candidate = self.cells[subchan][slice].take()?;
        for row in &mut self.cells {
            for cell in row.iter_mut() {
                *cell = None;
            }
        }
        if recv_error_rate > 0.0 && rand::rng().random::<f64>() < recv_error_rate / 100.0 {
            return None;
        }
        Some(Winner {
            subchan,
            slice,
            candidate,
            spectrum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ax25::{FrameKind, Packet};
    use crate::callsign::Callsign;

    fn dummy_packet() -> Packet {
        Packet {
            addresses: vec![
                crate::ax25::Address {
                    callsign: Callsign::parse("N0CALL").unwrap(),
                    command_response: true,
                    has_been_repeated: false,
                },
                crate::ax25::Address {
                    callsign: Callsign::parse("N0CALL-1").unwrap(),
                    command_response: false,
                    has_been_repeated: false,
                },
            ],
            modulo128: false,
            control: FrameKind::U {
                kind: crate::ax25::UKind::Ui,
                pf: false,
            },
            pid: Some(crate::ax25::pid::NO_LAYER3),
            info: vec![1, 2, 3],
        }
    }

    #[test]
    fn single_cell_grid_is_fast_path() {
        let grid = Grid::new(1, 1);
        assert!(grid.is_single_cell());
    }

    #[test]
    fn pick_best_prefers_fewer_retries() {
        let mut grid = Grid::new(2, 1);
        grid.store(0, 0, Candidate::new(dummy_packet(), 0.5, FecKind::None, 0, 0xABCD));
        grid.store(1, 0, Candidate::new(dummy_packet(), 0.5, FecKind::None, 3, 0x1234));
        let (subchan, _) = grid.pick_best().unwrap();
        assert_eq!(subchan, 0);
    }

    #[test]
    fn pick_best_ties_break_by_lowest_linear_index() {
        let mut grid = Grid::new(2, 1);
        grid.store(0, 0, Candidate::new(dummy_packet(), 0.5, FecKind::None, 0, 0xABCD));
        grid.store(1, 0, Candidate::new(dummy_packet(), 0.5, FecKind::None, 0, 0x1234));
        let (subchan, slice) = grid.pick_best().unwrap();
        assert_eq!((subchan, slice), (0, 0));
    }

    #[test]
    fn matching_crc_neighbor_adds_bonus() {
        let mut isolated = Grid::new(3, 1);
        isolated.store(0, 0, Candidate::new(dummy_packet(), 0.5, FecKind::None, 0, 0xAAAA));
        let isolated_score = isolated.score(0, 0).unwrap();

        let mut with_neighbor = Grid::new(3, 1);
        with_neighbor.store(0, 0, Candidate::new(dummy_packet(), 0.5, FecKind::None, 0, 0xAAAA));
        with_neighbor.store(1, 0, Candidate::new(dummy_packet(), 0.5, FecKind::None, 0, 0xAAAA));
        let with_neighbor_score = with_neighbor.score(0, 0).unwrap();

        assert!(with_neighbor_score > isolated_score);
    }

    #[test]
    fn arbitrate_clears_all_cells() {
        let mut grid = Grid::new(2, 1);
        grid.store(0, 0, Candidate::new(dummy_packet(), 0.5, FecKind::None, 0, 1));
        grid.store(1, 0, Candidate::new(dummy_packet(), 0.5, FecKind::None, 0, 2));
        let winner = grid.arbitrate(0.0).unwrap();
        assert_eq!(winner.subchan, 0);
        assert!(grid.cells.iter().flatten().all(Option::is_none));
    }

    #[test]
    fn spectrum_string_marks_winner_and_empties() {
        let mut grid = Grid::new(2, 1);
        grid.store(0, 0, Candidate::new(dummy_packet(), 0.9, FecKind::None, 0, 1));
        let spectrum = grid.render_spectrum(0, 0);
        assert_eq!(spectrum.chars().next(), Some('|'));
        assert_eq!(spectrum.chars().nth(1), Some('.'));
    }
}
