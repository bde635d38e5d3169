//! Burkhard-Keller tree for near-match lookups under edit distance

use std::collections::{BTreeMap, HashSet};

struct Node {
    label: String,
    /// Child node index keyed by its distance to this node
    children: BTreeMap<usize, usize>,
}

/// BK-tree over strings with Levenshtein distance
#[derive(Default)]
pub struct BkTree {
    nodes: Vec<Node>,
    items: HashSet<String>,
}

impl BkTree {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tree = Self::default();
        for item in items {
            tree.insert(item.into());
        }
        tree
    }

    pub fn insert(&mut self, item: String) {
        if self.items.contains(&item) {
            return;
        }

        let new_index = self.nodes.len();
        if self.nodes.is_empty() {
            self.items.insert(item.clone());
            self.nodes.push(Node {
                label: item,
                children: BTreeMap::new(),
            });
            return;
        }

        let mut parent = 0;
        loop {
            let distance = levenshtein(&item, &self.nodes[parent].label);
            match self.nodes[parent].children.get(&distance) {
                Some(&child) => parent = child,
                None => {
                    self.nodes[parent].children.insert(distance, new_index);
                    break;
                }
            }
        }

        self.items.insert(item.clone());
        self.nodes.push(Node {
            label: item,
            children: BTreeMap::new(),
        });
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether any stored item lies within `max_distance` of `item`
    pub fn contains_within(&self, item: &str, max_distance: usize) -> bool {
        if self.nodes.is_empty() {
            return false;
        }

        let mut to_visit = vec![0];
        while let Some(index) = to_visit.pop() {
            let node = &self.nodes[index];
            let distance = levenshtein(item, &node.label);
            if distance <= max_distance {
                return true;
            }

            // Triangle inequality bounds the children worth visiting
            let lower = distance.saturating_sub(max_distance);
            let upper = distance + max_distance;
            to_visit.extend(node.children.range(lower..=upper).map(|(_, &child)| child));
        }

        false
    }
}

/// Levenshtein edit distance over chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let (long, short): (Vec<char>, Vec<char>) = if a.chars().count() >= b.chars().count() {
        (a.chars().collect(), b.chars().collect())
    } else {
        (b.chars().collect(), a.chars().collect())
    };

    if short.is_empty() {
        return long.len();
    }

    let mut previous: Vec<usize> = (0..=short.len()).collect();
    let mut current = vec![0; short.len() + 1];
    for (i, c1) in long.iter().enumerate() {
        current[0] = i + 1;
        for (j, c2) in short.iter().enumerate() {
            let insertion = previous[j + 1] + 1;
            let deletion = current[j] + 1;
            let substitution = previous[j] + usize::from(c1 != c2);
            current[j + 1] = insertion.min(deletion).min(substitution);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[short.len()]
}
