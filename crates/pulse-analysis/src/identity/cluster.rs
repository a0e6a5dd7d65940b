use pulse_core::AuthorIdentity;

use super::similarity::{AliasFingerprint, MatchPolicy};

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, left: usize, right: usize) {
        let left = self.find(left);
        let right = self.find(right);
        if left == right {
            return;
        }
        match self.rank[left].cmp(&self.rank[right]) {
            std::cmp::Ordering::Less => self.parent[left] = right,
            std::cmp::Ordering::Greater => self.parent[right] = left,
            std::cmp::Ordering::Equal => {
                self.parent[right] = left;
                self.rank[left] += 1;
            }
        }
    }
}

/// Groups identities connected through any pair of matching aliases. Each
/// returned cluster lists identity ids ascending; singletons are omitted.
pub fn duplicate_clusters(identities: &[AuthorIdentity], policy: &MatchPolicy) -> Vec<Vec<i64>> {
    let prints = identities
        .iter()
        .map(|identity| {
            identity
                .aliases
                .iter()
                .map(|alias| AliasFingerprint::new(alias, policy))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut sets = UnionFind::new(identities.len());
    for left in 0..identities.len() {
        for right in left + 1..identities.len() {
            let linked = prints[left]
                .iter()
                .any(|a| prints[right].iter().any(|b| a.matches(b, policy)));
            if linked {
                sets.union(left, right);
            }
        }
    }

    let mut groups = std::collections::BTreeMap::<usize, Vec<i64>>::new();
    for (position, identity) in identities.iter().enumerate() {
        let root = sets.find(position);
        groups.entry(root).or_default().push(identity.id);
    }

    let mut clusters = groups
        .into_values()
        .filter(|ids| ids.len() > 1)
        .map(|mut ids| {
            ids.sort_unstable();
            ids
        })
        .collect::<Vec<_>>();
    clusters.sort();
    clusters
}
