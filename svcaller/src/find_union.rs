/// Disjoint sets over node indices `0..len`, used to take connected components of the evidence graph.
#[derive(Debug, Clone, Default)]
pub struct FindUnion {
    /// If parents[i] = j, the j-th node represents the component where the i-th node resides.
    parents: Vec<usize>,
    /// sizes[i] is the size of the component if the i-th node is its representative.
    sizes: Vec<usize>,
}

impl FindUnion {
    pub fn new(len: usize) -> Self {
        Self {
            parents: (0..len).collect(),
            sizes: vec![1; len],
        }
    }
    pub fn len(&self) -> usize {
        self.parents.len()
    }
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
    /// Find the representative of `index`. None if out of range.
    pub fn find(&mut self, index: usize) -> Option<usize> {
        if self.len() <= index {
            return None;
        }
        let mut node = index;
        while node != self.parents[node] {
            // Path halving.
            self.parents[node] = self.parents[self.parents[node]];
            node = self.parents[node];
        }
        Some(node)
    }
    /// Merge the components of `node1` and `node2`. None if either is out of range.
    pub fn unite(&mut self, node1: usize, node2: usize) -> Option<()> {
        let (root1, root2) = (self.find(node1)?, self.find(node2)?);
        if root1 == root2 {
            return Some(());
        }
        let (large, small) = match self.sizes[root1] < self.sizes[root2] {
            true => (root2, root1),
            false => (root1, root2),
        };
        self.parents[small] = large;
        self.sizes[large] += self.sizes[small];
        Some(())
    }
    /// All components, each sorted ascendingly, ordered by their smallest member.
    /// The result depends only on the partition, not on the order of `unite` calls.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root = vec![usize::MAX; self.len()];
        let mut components: Vec<Vec<usize>> = vec![];
        for node in 0..self.len() {
            let root = self.find(node).unwrap_or(node);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = components.len();
                components.push(vec![]);
            }
            components[slot_of_root[root]].push(node);
        }
        components
    }
}
