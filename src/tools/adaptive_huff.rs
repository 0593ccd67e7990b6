//! Module to perform the adaptive Huffman coding.
//! This is used by the `huffman` module.
//!
//! The tree starts out as a single NYT ("not yet transmitted") node.  Each time a new
//! byte arrives the NYT node spawns a new NYT and a leaf for the byte.  Encoder and
//! decoder perform the same updates in the same order, so the code never has to be
//! transmitted.
//!
//! Nodes live in an arena and refer to each other by index.  Nothing is ever removed,
//! a node keeps its arena slot for the whole pass even as it moves around the tree.
//! Each node has an `id` that belongs to its position in the tree rather than to the
//! node, ids are exchanged when nodes are swapped.  The sibling property is that a
//! larger id never has a smaller weight.

use bit_vec::BitVec;
use crate::Error;

/// number of symbols in the alphabet, also the id of the initial root
pub const NUM_SYMB: usize = 256;

#[derive(Clone,Debug,PartialEq)]
struct Node {
    /// rank, orders nodes that have equal weight, goes negative once
    /// more than half the alphabet has been seen
    id: i32,
    /// count of occurrences in the subtree
    weight: u64,
    /// index of parent node, root has none
    parent: Option<usize>,
    /// index of left and right sons, a leaf has neither
    son: [Option<usize>;2],
    /// only leaves that stand for a byte have this
    symbol: Option<u8>
}

impl Node {
    fn create(id: i32,weight: u64,parent: Option<usize>,symbol: Option<u8>) -> Self {
        Self {
            id,
            weight,
            parent,
            son: [None,None],
            symbol
        }
    }
}

/// Components for the Huffman stage of compression.
/// The tree is constantly updated as data is encoded or decoded.
#[derive(Clone,Debug,PartialEq)]
pub struct AdaptiveHuffman {
    nodes: Vec<Node>,
    root: usize,
    nyt: usize,
    /// map from symbols (index) to leaves (value)
    symb_map: Vec<Option<usize>>
}

impl AdaptiveHuffman {
    /// Create the initial tree, a single node that is both root and NYT.
    /// Encoder and decoder must both start from here.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::create(NUM_SYMB as i32,0,None,None)],
            root: 0,
            nyt: 0,
            symb_map: vec![None;NUM_SYMB]
        }
    }
    /// which son of its parent is `node`, 0 is left, 1 is right
    fn side(&self,node: usize) -> usize {
        match self.nodes[node].parent {
            Some(p) if self.nodes[p].son[1] == Some(node) => 1,
            _ => 0
        }
    }
    fn is_leaf(&self,node: usize) -> bool {
        self.nodes[node].son[0].is_none() && self.nodes[node].son[1].is_none()
    }
    /// Replace the NYT node with a new NYT (left) and a leaf for `c` (right).
    /// Returns the former NYT, which is now their parent.
    fn spawn(&mut self,c: u8) -> usize {
        let old = self.nyt;
        let old_id = self.nodes[old].id;
        let new_nyt = self.nodes.len();
        let leaf = new_nyt + 1;
        self.nodes.push(Node::create(old_id - 2,0,Some(old),None));
        self.nodes.push(Node::create(old_id - 1,1,Some(old),Some(c)));
        self.nodes[old].son = [Some(new_nyt),Some(leaf)];
        self.nodes[old].weight = 1;
        self.symb_map[c as usize] = Some(leaf);
        self.nyt = new_nyt;
        old
    }
    /// Find the node with the largest id among those with `weight`.
    /// Walks down from the root, skipping subtrees that are too light.
    fn highest_with_weight(&self,weight: u64) -> Option<usize> {
        let mut ans: Option<usize> = None;
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.nodes[node].weight < weight {
                continue;
            }
            if self.nodes[node].weight == weight {
                ans = match ans {
                    Some(best) if self.nodes[best].id > self.nodes[node].id => Some(best),
                    _ => Some(node)
                };
            }
            stack.extend(self.nodes[node].son.iter().flatten());
        }
        ans
    }
    /// Exchange the tree positions of two nodes, subtrees come along.
    /// Neither node can be the root.
    fn swap_nodes(&mut self,n1: usize,n2: usize) {
        let (p1,p2) = match (self.nodes[n1].parent,self.nodes[n2].parent) {
            (Some(p1),Some(p2)) => (p1,p2),
            _ => return
        };
        let s1 = self.side(n1);
        let s2 = self.side(n2);
        self.nodes[p1].son[s1] = Some(n2);
        self.nodes[p2].son[s2] = Some(n1);
        self.nodes[n1].parent = Some(p2);
        self.nodes[n2].parent = Some(p1);
        let id1 = self.nodes[n1].id;
        self.nodes[n1].id = self.nodes[n2].id;
        self.nodes[n2].id = id1;
    }
    /// Increment weights from `node` up to the root, restoring the sibling property
    /// by swapping before each increment.
    fn update(&mut self,node: Option<usize>) {
        let mut curr = node;
        while let Some(c) = curr {
            if let Some(highest) = self.highest_with_weight(self.nodes[c].weight) {
                if highest != c && Some(highest) != self.nodes[c].parent && highest != self.root {
                    log::trace!("swap node {} with {}",self.nodes[c].id,self.nodes[highest].id);
                    self.swap_nodes(c,highest);
                }
            }
            self.nodes[c].weight += 1;
            curr = self.nodes[c].parent;
        }
    }
    /// Bits leading from the root to `node`, 0 for left, 1 for right.
    /// The length is the depth of the node.
    fn path(&self,mut node: usize) -> BitVec {
        let mut rev = Vec::new();
        while node != self.root {
            rev.push(self.side(node) == 1);
            node = match self.nodes[node].parent {
                Some(p) => p,
                None => break
            };
        }
        rev.iter().rev().copied().collect()
    }
    /// Code for `c` given the current tree, then update the tree.
    /// A byte seen for the first time is the path to NYT followed by the byte itself.
    pub fn encode_symbol(&mut self,c: u8) -> BitVec {
        match self.symb_map[c as usize] {
            Some(leaf) => {
                let ans = self.path(leaf);
                self.update(Some(leaf));
                ans
            },
            None => {
                let mut ans = self.path(self.nyt);
                ans.append(&mut BitVec::from_bytes(&[c]));
                let old_nyt = self.spawn(c);
                self.update(self.nodes[old_nyt].parent);
                ans
            }
        }
    }
    /// Descend from the root taking bits from `next_bit` until a leaf is reached,
    /// then update the tree the same way the encoder did.
    pub fn decode_symbol<F>(&mut self,mut next_bit: F) -> Result<u8,Error>
    where F: FnMut() -> Result<bool,Error> {
        let mut node = self.root;
        while !self.is_leaf(node) {
            let side = next_bit()? as usize;
            node = match self.nodes[node].son[side] {
                Some(son) => son,
                None => return Err(Error::Corrupt("half open branch".to_string()))
            };
        }
        if node == self.nyt {
            let mut c: u8 = 0;
            for _i in 0..8 {
                c <<= 1;
                c |= next_bit()? as u8;
            }
            if self.symb_map[c as usize].is_some() {
                log::error!("literal {:02X} already has a leaf",c);
                return Err(Error::Corrupt(format!("repeated literal {:02X}",c)));
            }
            let old_nyt = self.spawn(c);
            self.update(self.nodes[old_nyt].parent);
            return Ok(c);
        }
        match self.nodes[node].symbol {
            Some(c) => {
                self.update(Some(node));
                Ok(c)
            },
            None => Err(Error::Corrupt("leaf without symbol".to_string()))
        }
    }
}

// *************** TESTS *****************

#[cfg(test)]
fn sibling_property_holds(huff: &AdaptiveHuffman) -> bool {
    // ids must be distinct, and weights nondecreasing in id order
    let mut ranked: Vec<(i32,u64)> = huff.nodes.iter().map(|n| (n.id,n.weight)).collect();
    ranked.sort();
    ranked.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 <= w[1].1)
}

#[cfg(test)]
fn weights_are_sums(huff: &AdaptiveHuffman) -> bool {
    huff.nodes.iter().all(|n| match n.son {
        [Some(l),Some(r)] => n.weight == huff.nodes[l].weight + huff.nodes[r].weight,
        [None,None] => true,
        _ => false
    })
}

#[test]
fn first_symbol_is_literal() {
    let mut huff = AdaptiveHuffman::new();
    let code = huff.encode_symbol(b'A');
    // root was NYT so the path is empty
    assert_eq!(code,BitVec::from_bytes(&[b'A']));
    assert_eq!(huff.nodes[huff.root].weight,1);
    assert_eq!(huff.nodes[huff.nyt].id,254);
    let leaf = huff.symb_map[b'A' as usize].unwrap();
    assert_eq!(huff.nodes[leaf].id,255);
    assert_eq!(huff.nodes[leaf].weight,1);
    // the leaf is now one bit away
    let code = huff.encode_symbol(b'A');
    assert_eq!(code.len(),1);
    assert!(code[0]);
    // a new symbol is the NYT path and then the byte
    let code = huff.encode_symbol(b'B');
    let mut expected = BitVec::from_elem(1,false);
    expected.append(&mut BitVec::from_bytes(&[b'B']));
    assert_eq!(code,expected);
}

#[test]
fn tree_invariants() {
    for (alphabet,seed) in [(2,1),(7,2),(40,3),(256,4)] {
        let mut huff = AdaptiveHuffman::new();
        for c in crate::pseudo_random(2000,alphabet,seed) {
            huff.encode_symbol(c);
            assert!(sibling_property_holds(&huff));
            assert!(weights_are_sums(&huff));
            let nyts: Vec<&Node> = huff.nodes.iter().filter(|n| n.son==[None,None] && n.symbol.is_none()).collect();
            assert_eq!(nyts.len(),1);
            assert_eq!(nyts[0].weight,0);
            assert_eq!(huff.nodes[huff.nyt].symbol,None);
            assert!(huff.nodes.len() <= 2*NUM_SYMB + 1);
        }
    }
}

#[test]
fn encoder_and_decoder_agree() {
    let symbols = crate::pseudo_random(3000,60,77);
    let mut encoder = AdaptiveHuffman::new();
    let mut decoder = AdaptiveHuffman::new();
    for c in symbols {
        let code = encoder.encode_symbol(c);
        let mut bits = code.iter();
        let decoded = decoder.decode_symbol(|| bits.next().ok_or(Error::Truncated)).expect("decode failed");
        assert_eq!(decoded,c);
        assert!(bits.next().is_none());
        assert_eq!(encoder,decoder);
    }
}

#[test]
fn all_bytes() {
    let mut huff = AdaptiveHuffman::new();
    for c in 0..=255 {
        huff.encode_symbol(c);
    }
    for c in 0..=255 {
        assert!(huff.symb_map[c].is_some());
    }
    assert_eq!(huff.nodes.len(),2*NUM_SYMB + 1);
    assert!(sibling_property_holds(&huff));
    // NYT is still there and reachable
    assert!(huff.path(huff.nyt).len() > 0);
}

#[test]
fn repeated_literal_is_rejected() {
    let mut huff = AdaptiveHuffman::new();
    huff.encode_symbol(b'x');
    // NYT is the left son of the root, then the literal 'x' again
    let mut bits = BitVec::from_elem(1,false);
    bits.append(&mut BitVec::from_bytes(&[b'x']));
    let mut iter = bits.iter();
    let ans = huff.decode_symbol(|| iter.next().ok_or(Error::Truncated));
    assert!(matches!(ans,Err(Error::Corrupt(_))));
}
