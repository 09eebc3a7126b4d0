//! Prefix tree over the word list.
//!
//! The index is built once and is read-only afterwards; there is no public way to insert a word
//! into an existing index, so an `Arc<DictionaryIndex>` can be shared between threads freely.
use crate::Error;
use log::debug;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

const ALPHABET: usize = 26;

/// Index of a node in the tree. The root is [`DictionaryIndex::ROOT`].
pub type NodeId = u32;

#[derive(Debug, Clone)]
struct Node {
    /// Child per letter A..Z, 0 means no child (the root is never a child)
    children: [NodeId; ALPHABET],
    is_word: bool,
}

impl Node {
    fn new() -> Self {
        Node {
            children: [0; ALPHABET],
            is_word: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DictionaryIndex {
    nodes: Vec<Node>,
    words: usize,
    min_word_length: usize,
}

/// Uppercase `line` and accept it if it is purely alphabetic and long enough.
fn normalize(line: &str, min_word_length: usize) -> Option<String> {
    let word = line.trim().to_ascii_uppercase();
    if word.is_empty() || word.len() < min_word_length {
        return None;
    }
    if !word.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    Some(word)
}

impl DictionaryIndex {
    pub const ROOT: NodeId = 0;

    fn empty(min_word_length: usize) -> Self {
        DictionaryIndex {
            nodes: vec![Node::new()],
            words: 0,
            min_word_length,
        }
    }

    /// Build an index from `words`, skipping entries shorter than `min_word_length` or containing
    /// anything other than the letters A-Z (case-insensitive).
    pub fn from_words<I, S>(words: I, min_word_length: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = DictionaryIndex::empty(min_word_length);
        for word in words {
            if let Some(word) = normalize(word.as_ref(), min_word_length) {
                index.insert(&word);
            }
        }
        debug!(
            "dictionary: {} words, {} nodes",
            index.words,
            index.nodes.len()
        );
        index
    }

    /// Build an index from a newline-delimited word list.
    pub fn from_reader<R: BufRead>(reader: R, min_word_length: usize) -> io::Result<Self> {
        let lines = reader.lines().collect::<io::Result<Vec<String>>>()?;
        Ok(DictionaryIndex::from_words(lines, min_word_length))
    }

    pub fn from_file<P: AsRef<Path>>(path: P, min_word_length: usize) -> Result<Self, Error> {
        let path = path.as_ref();
        let read_error = |source| Error::DictionaryRead {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(read_error)?;
        DictionaryIndex::from_reader(BufReader::new(file), min_word_length).map_err(read_error)
    }

    fn insert(&mut self, word: &str) {
        let mut node = Self::ROOT as usize;
        for b in word.bytes() {
            let slot = (b - b'A') as usize;
            let next = self.nodes[node].children[slot];
            node = if next != 0 {
                next as usize
            } else {
                let id = self.nodes.len();
                self.nodes.push(Node::new());
                self.nodes[node].children[slot] = id as NodeId;
                id
            };
        }
        if !self.nodes[node].is_word {
            self.nodes[node].is_word = true;
            self.words += 1;
        }
    }

    /// Follow the edge for `letter` out of `node`.
    #[inline]
    pub fn child(&self, node: NodeId, letter: u8) -> Option<NodeId> {
        if !letter.is_ascii_uppercase() {
            return None;
        }
        match self.nodes[node as usize].children[(letter - b'A') as usize] {
            0 => None,
            id => Some(id),
        }
    }

    /// Follow every letter of `letters` in sequence, stopping at the first missing edge.
    pub fn walk(&self, node: NodeId, letters: &str) -> Option<NodeId> {
        letters
            .bytes()
            .try_fold(node, |node, letter| self.child(node, letter))
    }

    #[inline]
    pub fn is_word(&self, node: NodeId) -> bool {
        self.nodes[node as usize].is_word
    }

    #[inline]
    pub fn has_children(&self, node: NodeId) -> bool {
        self.nodes[node as usize].children.iter().any(|&c| c != 0)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.walk(Self::ROOT, &word.to_ascii_uppercase())
            .map_or(false, |node| self.is_word(node))
    }

    pub fn is_prefix(&self, prefix: &str) -> bool {
        self.walk(Self::ROOT, &prefix.to_ascii_uppercase()).is_some()
    }

    /// Number of distinct words
    pub fn len(&self) -> usize {
        self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn min_word_length(&self) -> usize {
        self.min_word_length
    }
}
