//! Depth-first word search over the letter grid, pruned by the dictionary.
use crate::config::SolverConfig;
use crate::dictionary::{DictionaryIndex, NodeId};
use crate::merge::canonical_unit;
use crate::recognizer::{Letters, MAX_CELLS};
use log::debug;
use serde::Serialize;
use std::collections::HashSet;

/// Neighbour offsets in the order they are visited: N, NE, E, SE, S, SW, W, NW
const COMPASS: [(isize, isize); 8] = [
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
];

/// A found word and the cells that spell it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordResult {
    pub word: String,
    /// (row, col) per cell, in spelling order
    pub path: Vec<(usize, usize)>,
}

impl WordResult {
    /// The cell the word starts on
    pub fn start(&self) -> Option<(usize, usize)> {
        self.path.first().copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Solution {
    /// Longest first, then alphabetical, capped at `max_results`
    pub words: Vec<WordResult>,
    /// Cells entered with a valid prefix
    pub nodes_visited: usize,
    /// Distinct words found before the cap was applied
    pub total_found: usize,
}

pub struct Solver<'d> {
    dictionary: &'d DictionaryIndex,
    config: SolverConfig,
}

/// Mutable state of one search
struct Search<'a> {
    dictionary: &'a DictionaryIndex,
    units: &'a [String],
    neighbors: &'a [Vec<usize>],
    n: usize,
    min_word_length: usize,
    prefix: String,
    path: Vec<usize>,
    found: HashSet<String>,
    words: Vec<WordResult>,
    nodes_visited: usize,
}

impl<'a> Search<'a> {
    fn visit(&mut self, cell: usize, node: NodeId, visited: u64) {
        let units = self.units;
        let unit = &units[cell];
        // every byte of the unit must extend the prefix, Q before U
        let node = match self.dictionary.walk(node, unit) {
            Some(node) if !unit.is_empty() => node,
            _ => return,
        };
        self.nodes_visited += 1;
        let visited = visited | 1 << cell;
        self.prefix.push_str(unit);
        self.path.push(cell);

        if self.dictionary.is_word(node)
            && self.prefix.len() >= self.min_word_length
            && !self.found.contains(&self.prefix)
        {
            self.found.insert(self.prefix.clone());
            let n = self.n;
            self.words.push(WordResult {
                word: self.prefix.clone(),
                path: self.path.iter().map(|&i| (i / n, i % n)).collect(),
            });
        }
        if self.dictionary.has_children(node) {
            let neighbors = self.neighbors;
            for &next in &neighbors[cell] {
                if visited & (1 << next) == 0 {
                    self.visit(next, node, visited);
                }
            }
        }

        self.prefix.truncate(self.prefix.len() - unit.len());
        self.path.pop();
    }
}

/// Neighbour lists of an `n x n` grid, compass order
fn neighbors(n: usize) -> Vec<Vec<usize>> {
    (0..n * n)
        .map(|cell| {
            let (row, col) = ((cell / n) as isize, (cell % n) as isize);
            COMPASS
                .iter()
                .map(|(dr, dc)| (row + dr, col + dc))
                .filter(|&(r, c)| r >= 0 && c >= 0 && r < n as isize && c < n as isize)
                .map(|(r, c)| r as usize * n + c as usize)
                .collect()
        })
        .collect()
}

impl<'d> Solver<'d> {
    pub fn new(dictionary: &'d DictionaryIndex, config: SolverConfig) -> Self {
        Solver { dictionary, config }
    }

    /// Find every dictionary word that can be spelled by moving between adjacent cells without
    /// reusing one.
    ///
    /// Start cells are tried in row-major order and neighbours in compass order; when a word can
    /// be spelled along several paths the first one found is kept. Cells that are not letters,
    /// such as `?`, never match. A `Q` cell always spells `QU`.
    pub fn solve(&self, letters: &Letters) -> Solution {
        let n = letters.n();
        if n == 0 || n * n > MAX_CELLS {
            return Solution::default();
        }
        let units: Vec<String> = letters
            .iter()
            .flatten()
            .map(|unit| canonical_unit(unit.trim()))
            .collect();
        let neighbors = neighbors(n);
        let mut search = Search {
            dictionary: self.dictionary,
            units: &units,
            neighbors: &neighbors,
            n,
            min_word_length: self.config.min_word_length.max(1),
            prefix: String::new(),
            path: Vec::new(),
            found: HashSet::new(),
            words: Vec::new(),
            nodes_visited: 0,
        };
        for cell in 0..n * n {
            search.visit(cell, DictionaryIndex::ROOT, 0);
        }

        let mut words = search.words;
        words.sort_by(|a, b| b.word.len().cmp(&a.word.len()).then_with(|| a.word.cmp(&b.word)));
        let total_found = words.len();
        if self.config.max_results > 0 {
            words.truncate(self.config.max_results);
        }
        debug!(
            "solver: {} words, {} nodes visited",
            total_found, search.nodes_visited
        );
        Solution {
            words,
            nodes_visited: search.nodes_visited,
            total_found,
        }
    }
}
