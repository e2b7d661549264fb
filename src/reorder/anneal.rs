//! Simulated annealing.
//!
//! Starts from a sifted order and applies random moves: exchanging two
//! variables, or jumping one variable up or down to another level. A move
//! that does not improve the size is kept with probability
//! `exp(-growth / temperature)`; the temperature decays geometrically.

use log::debug;
use rand::Rng;

use crate::error::Step;
use crate::manager::Manager;
use crate::reorder::{best_size, Move};

const BETA: f64 = 0.6;
const ALPHA: f64 = 0.9;
const EXCHANGE_PROB: f64 = 0.4;
const JUMP_UP_PROB: f64 = 0.36;
const MAX_GEN_RATIO: f64 = 15.0;
const STOP_TEMP: f64 = 1.0;

impl Manager {
    pub(crate) fn annealing(&mut self, lower: usize, upper: usize) -> Step<()> {
        self.sifting(lower, upper)?;
        let nvars = upper - lower + 1;
        if nvars < 2 {
            return Ok(());
        }

        let mut size = self.reorder_size();
        let mut best_cost = size;
        let mut best_order = self.current_order(lower, upper);
        let mut temperature = BETA * size as f64;
        let max_gen = (MAX_GEN_RATIO * nvars as f64) as usize;
        // The last four sizes seen at the end of a temperature step.
        let mut history = [size + 10, size + 20, size, size + 10];

        while temperature > STOP_TEMP || history.iter().any(|&c| c != history[0]) {
            if self.budget.exhausted() {
                debug!("Annealing stopped by its budget at temperature {:.2}", temperature);
                break;
            }
            for _ in 0..max_gen {
                let coin: f64 = self.rng.gen();
                let (x, y) = self.distinct_levels(lower, upper);
                if coin < EXCHANGE_PROB {
                    self.anneal_exchange(x, y, temperature)?;
                } else if coin < EXCHANGE_PROB + JUMP_UP_PROB {
                    self.anneal_jump_up(y, x, temperature)?;
                } else {
                    self.anneal_jump_down(x, y, temperature)?;
                }
                size = self.reorder_size();
                if size < best_cost {
                    best_cost = size;
                    best_order = self.current_order(lower, upper);
                }
            }
            history = [history[1], history[2], history[3], size];
            temperature *= ALPHA;
        }

        debug!("Annealing best size {}", best_cost);
        self.impose_order(lower, &best_order)
    }

    fn distinct_levels(&mut self, lower: usize, upper: usize) -> (usize, usize) {
        let x = self.rng.gen_range(lower..=upper);
        let mut y = self.rng.gen_range(lower..=upper);
        while y == x {
            y = self.rng.gen_range(lower..=upper);
        }
        (x.min(y), x.max(y))
    }

    fn anneal_exchange(&mut self, x: usize, y: usize, temperature: f64) -> Step<()> {
        let initial = self.reorder_size();
        let mut moves = Vec::new();
        self.swap_any(x, y, &mut moves)?;
        self.backward_prob(initial, &moves, temperature)
    }

    /// Moves the variable at level `y` up towards `x`.
    fn anneal_jump_up(&mut self, mut y: usize, x: usize, temperature: f64) -> Step<()> {
        let initial = self.reorder_size();
        let mut limit = initial;
        let mut moves = Vec::new();
        while y > x {
            let size = self.swap_in_place(y - 1)?;
            moves.push(Move::swap(y - 1, y, size));
            if size as f64 > limit as f64 * self.config.max_growth {
                break;
            }
            limit = limit.min(size);
            y -= 1;
        }
        self.backward_prob(initial, &moves, temperature)
    }

    /// Moves the variable at level `x` down towards `y`.
    fn anneal_jump_down(&mut self, mut x: usize, y: usize, temperature: f64) -> Step<()> {
        let initial = self.reorder_size();
        let mut limit = initial;
        let mut moves = Vec::new();
        while x < y {
            let size = self.swap_in_place(x)?;
            moves.push(Move::swap(x, x + 1, size));
            if size as f64 > limit as f64 * self.config.max_growth {
                break;
            }
            limit = limit.min(size);
            x += 1;
        }
        self.backward_prob(initial, &moves, temperature)
    }

    /// Like [`Manager::sift_backward`], but a move sequence that found
    /// nothing better than `initial` may be kept as is, with the Metropolis
    /// probability.
    fn backward_prob(&mut self, initial: usize, moves: &[Move], temperature: f64) -> Step<()> {
        let best = best_size(initial, moves);
        if best == initial {
            let growth = self.reorder_size() as f64 - initial as f64;
            let coin: f64 = self.rng.gen();
            if coin < (-growth / temperature).exp() {
                return Ok(());
            }
        }
        self.sift_backward(initial, moves)
    }
}
