//! Merkle tree state: the treehash stack, the amortised authentication-path
//! traversal engine and the parallel initial tree builder.

use std::collections::VecDeque;
use std::thread;

use zeroize::Zeroize;

use crate::address::{ADDR_TYPE_HASHTREE, ADDR_TYPE_LTREE, ADDR_TYPE_OTS, Address};
use crate::hash::{Prf, rand_hash};
use crate::params::N;
use crate::wots;

/// Seed material threaded through leaf computation.
///
/// The PRFs are borrowed from the owning key rather than stored in the tree
/// state, so the state remains a pure tree of owned arrays.
#[derive(Clone, Copy)]
pub(crate) struct LeafContext<'a> {
    pub(crate) wots_prf: &'a Prf,
    pub(crate) pub_prf: &'a Prf,
}

/// A computed tree node together with its position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeRecord {
    node: [u8; N],
    height: u32,
    index: u32,
}

/// A treehash stack producing the node at `target` height over the leaf
/// range starting at `leaf`.
///
/// Whenever the top two entries share a height they are combined into their
/// parent; otherwise an update step pushes the next leaf. A stack whose top
/// has reached the target height is done and must not be scheduled further.
#[derive(Debug)]
struct Stack {
    nodes: Vec<NodeRecord>,
    target: u32,
    leaf: u32,
    layer: u32,
    tree: u64,
}

impl Stack {
    fn new(target: u32, leaf: u32, layer: u32, tree: u64) -> Self {
        Self {
            nodes: Vec::with_capacity(target as usize + 1),
            target,
            leaf,
            layer,
            tree,
        }
    }

    /// Smallest height present on the stack; the target height when empty,
    /// `u32::MAX` once the target node has been produced.
    fn low(&self) -> u32 {
        let Some(top) = self.nodes.last() else {
            return self.target;
        };
        if top.height == self.target {
            return u32::MAX;
        }
        self.nodes.iter().map(|n| n.height).min().unwrap_or(u32::MAX)
    }

    /// Resets the stack to compute the `target`-height node whose leaf range
    /// starts at `start`.
    fn initialize(&mut self, start: u32, target: u32) {
        self.leaf = start;
        self.target = target;
        self.nodes.clear();
    }

    fn top(&self) -> &NodeRecord {
        self.nodes.last().expect("treehash stack is empty")
    }

    fn push(&mut self, node: NodeRecord) {
        self.nodes.push(node);
    }

    /// Computes the WOTS+ public key for the cursor leaf, folds it with the
    /// L-tree and pushes the result at height zero.
    fn new_leaf(&mut self, ctx: LeafContext<'_>) {
        let mut adrs = Address::new();
        adrs.set_type(ADDR_TYPE_OTS);
        adrs.set_layer(self.layer);
        adrs.set_tree(self.tree);
        adrs.set_ots(self.leaf);
        let mut sk = wots::derive_private(ctx.wots_prf, &adrs);
        let pk = wots::public_from_private(&sk, ctx.pub_prf, adrs);
        sk.zeroize();
        adrs.set_type(ADDR_TYPE_LTREE);
        adrs.set_ltree(self.leaf);
        let node = wots::ltree(pk, ctx.pub_prf, adrs);
        self.push(NodeRecord {
            node,
            height: 0,
            index: self.leaf,
        });
        self.leaf += 1;
    }

    /// Performs up to `steps` elementary treehash steps, pulling fresh
    /// bottom-level input from `next_leaf`. Does nothing if the target node
    /// is already on top.
    fn update_with(&mut self, steps: u64, pub_prf: &Prf, mut next_leaf: impl FnMut(&mut Self)) {
        if self.nodes.last().is_some_and(|top| top.height == self.target) {
            return;
        }
        let mut adrs = Address::new();
        adrs.set_type(ADDR_TYPE_HASHTREE);
        adrs.set_layer(self.layer);
        adrs.set_tree(self.tree);
        for _ in 0..steps {
            if let [.., left, right] = self.nodes[..] {
                if left.height == right.height {
                    adrs.set_tree_height(right.height);
                    adrs.set_tree_index(right.index >> 1);
                    let parent = NodeRecord {
                        node: rand_hash(&left.node, &right.node, pub_prf, adrs),
                        height: right.height + 1,
                        index: right.index >> 1,
                    };
                    self.nodes.truncate(self.nodes.len() - 2);
                    self.nodes.push(parent);
                    continue;
                }
            }
            next_leaf(self);
        }
    }

    /// As [`Stack::update_with`], producing fresh leaves from `ctx`.
    fn update(&mut self, steps: u64, ctx: LeafContext<'_>) {
        self.update_with(steps, ctx.pub_prf, |s| s.new_leaf(ctx));
    }
}

/// Per-key Merkle state: the current authentication path plus the per-height
/// treehash stacks preparing future paths (BDS traversal).
///
/// After construction, and again after every [`Traversal::advance`],
/// `auth[h]` is the height-`h` sibling on the path from `leaf` to the root,
/// and `stacks[h]` is seeded to produce the authentication node needed after
/// the next `2^h` leaf boundary.
pub(crate) struct Traversal {
    leaf: u32,
    height: u32,
    stacks: Vec<Stack>,
    auth: Vec<[u8; N]>,
    layer: u32,
    tree: u64,
}

impl Traversal {
    /// Builds the initial tree: the root, the authentication path for leaf 0
    /// and the seeded per-height stacks.
    ///
    /// `2^proc_log2` workers (clamped to the tree size) each reduce one
    /// subtree of height `height - proc_log2` on its own stack over a
    /// disjoint leaf range. The main thread walks the leftmost subtree and,
    /// once the workers are joined, stitches their roots in above it. The
    /// result is byte-identical for every worker count.
    pub(crate) fn build_initial(
        height: u32,
        layer: u32,
        tree: u64,
        ctx: LeafContext<'_>,
        proc_log2: u32,
    ) -> (Self, [u8; N]) {
        let lp = proc_log2.min(height);
        let sub_height = height - lp;
        let subtrees = 1u32 << lp;

        thread::scope(|scope| {
            let workers: Vec<_> = (1..subtrees)
                .map(|i| {
                    scope.spawn(move || {
                        let mut s = Stack::new(sub_height, i << sub_height, layer, tree);
                        s.update((1u64 << (sub_height + 1)) - 1, ctx);
                        *s.top()
                    })
                })
                .collect();
            let mut workers = Some(workers);

            let mut pending: VecDeque<NodeRecord> = VecDeque::new();
            let mut stacks = Vec::with_capacity(height as usize);
            let mut auth = Vec::with_capacity(height as usize);
            let mut s = Stack::new(height, 0, layer, tree);

            for i in 0..height {
                if i == sub_height {
                    // Subtree roots are consumed from here on; join first.
                    if let Some(handles) = workers.take() {
                        for handle in handles {
                            let node = match handle.join() {
                                Ok(node) => node,
                                Err(panic) => std::panic::resume_unwind(panic),
                            };
                            pending.push_back(node);
                        }
                    }
                }

                s.update(1, ctx);
                let mut seeded = Stack::new(i, 1 << i, layer, tree);
                seeded.push(*s.top());
                stacks.push(seeded);

                if i < sub_height {
                    s.update((1u64 << (i + 1)) - 1, ctx);
                } else {
                    s.update_with((1u64 << (i - sub_height + 1)) - 1, ctx.pub_prf, |s| {
                        let node = pending.pop_front().expect("subtree root queue exhausted");
                        s.push(node);
                    });
                }
                auth.push(s.top().node);
            }
            s.update(1, ctx);
            let root = s.top().node;

            (
                Self {
                    leaf: 0,
                    height,
                    stacks,
                    auth,
                    layer,
                    tree,
                },
                root,
            )
        })
    }

    pub(crate) fn leaf(&self) -> u32 {
        self.leaf
    }

    pub(crate) fn layer(&self) -> u32 {
        self.layer
    }

    pub(crate) fn tree(&self) -> u64 {
        self.tree
    }

    /// Authentication path for the current leaf, bottom height first.
    pub(crate) fn auth(&self) -> &[[u8; N]] {
        &self.auth
    }

    /// Captures the authentication nodes for the next leaf from every stack
    /// whose `2^h` boundary the increment crosses, then re-seeds those
    /// stacks for the boundary after that.
    fn refresh_auth(&mut self) {
        for h in 0..self.height {
            let pow = 1u32 << h;
            if (self.leaf + 1) & (pow - 1) == 0 {
                let stack = &mut self.stacks[h as usize];
                self.auth[h as usize] = stack.top().node;
                let start = ((self.leaf + 1) + pow) ^ pow;
                stack.initialize(start, h);
            }
        }
    }

    /// Spends the per-signature budget of `2H - 1` elementary steps, always
    /// advancing the stack whose lowest node sits lowest; ties go to the
    /// smaller height.
    fn build(&mut self, ctx: LeafContext<'_>) {
        for _ in 0..2 * self.height - 1 {
            let mut min = u32::MAX;
            let mut focus = 0;
            for (h, stack) in self.stacks.iter().enumerate() {
                let low = stack.low();
                if low < min {
                    min = low;
                    focus = h;
                }
            }
            self.stacks[focus].update(1, ctx);
        }
    }

    /// Moves the state past the current leaf: refresh the authentication
    /// path, schedule stack work, increment the leaf counter.
    pub(crate) fn advance(&mut self, ctx: LeafContext<'_>) {
        self.refresh_auth();
        self.build(ctx);
        self.leaf += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prfs() -> (Prf, Prf) {
        (Prf::new([0x55; N]), Prf::new([0xAA; N]))
    }

    /// Computes a single leaf the way `Stack::new_leaf` does.
    fn leaf_node(ctx: LeafContext<'_>, index: u32) -> [u8; N] {
        let mut s = Stack::new(0, index, 0, 0);
        s.update(1, ctx);
        s.top().node
    }

    /// Full reference tree: `levels[h][i]` is the height-`h` node with
    /// index `i`.
    fn reference_tree(ctx: LeafContext<'_>, height: u32) -> Vec<Vec<[u8; N]>> {
        let mut levels = Vec::with_capacity(height as usize + 1);
        let leaves: Vec<_> = (0..1u32 << height).map(|i| leaf_node(ctx, i)).collect();
        levels.push(leaves);
        for h in 0..height {
            let below = &levels[h as usize];
            let mut adrs = Address::new();
            adrs.set_type(ADDR_TYPE_HASHTREE);
            let level: Vec<_> = (0..below.len() / 2)
                .map(|i| {
                    adrs.set_tree_height(h);
                    adrs.set_tree_index(i as u32);
                    rand_hash(&below[2 * i], &below[2 * i + 1], ctx.pub_prf, adrs)
                })
                .collect();
            levels.push(level);
        }
        levels
    }

    #[test]
    fn stack_low_reports_progress() {
        let (wots_prf, pub_prf) = prfs();
        let ctx = LeafContext {
            wots_prf: &wots_prf,
            pub_prf: &pub_prf,
        };

        let mut s = Stack::new(2, 0, 0, 0);
        assert_eq!(s.low(), 2);
        s.update(1, ctx);
        assert_eq!(s.low(), 0);
        s.update((1 << 3) - 2, ctx);
        assert_eq!(s.low(), u32::MAX);
        // Further updates on a finished stack are no-ops.
        let top = *s.top();
        s.update(5, ctx);
        assert_eq!(*s.top(), top);
    }

    #[test]
    fn full_stack_run_matches_reference_root() {
        let (wots_prf, pub_prf) = prfs();
        let ctx = LeafContext {
            wots_prf: &wots_prf,
            pub_prf: &pub_prf,
        };

        let levels = reference_tree(ctx, 3);
        let mut s = Stack::new(3, 0, 0, 0);
        s.update((1 << 4) - 1, ctx);
        assert_eq!(s.top().node, levels[3][0]);
        assert_eq!(s.top().height, 3);
        assert_eq!(s.top().index, 0);
    }

    #[test]
    fn traversal_tracks_reference_auth_paths() {
        let (wots_prf, pub_prf) = prfs();
        let ctx = LeafContext {
            wots_prf: &wots_prf,
            pub_prf: &pub_prf,
        };

        let height = 3u32;
        let levels = reference_tree(ctx, height);
        let (mut state, root) = Traversal::build_initial(height, 0, 0, ctx, 0);
        assert_eq!(root, levels[height as usize][0]);

        for leaf in 0..1u32 << height {
            for h in 0..height {
                let sibling = levels[h as usize][((leaf >> h) ^ 1) as usize];
                assert_eq!(
                    state.auth()[h as usize], sibling,
                    "auth node mismatch at leaf {leaf} height {h}"
                );
            }
            state.advance(ctx);
        }
    }

    #[test]
    fn initial_build_is_worker_count_independent() {
        let (wots_prf, pub_prf) = prfs();
        let ctx = LeafContext {
            wots_prf: &wots_prf,
            pub_prf: &pub_prf,
        };

        let height = 4u32;
        let (base, base_root) = Traversal::build_initial(height, 0, 0, ctx, 0);
        for proc_log2 in [1, 2, 4, 6] {
            let (state, root) = Traversal::build_initial(height, 0, 0, ctx, proc_log2);
            assert_eq!(root, base_root, "root differs for 2^{proc_log2} workers");
            assert_eq!(state.auth, base.auth);
            assert_eq!(state.leaf, base.leaf);
            for (a, b) in state.stacks.iter().zip(&base.stacks) {
                assert_eq!(a.nodes, b.nodes);
                assert_eq!(a.target, b.target);
                assert_eq!(a.leaf, b.leaf);
            }
        }
    }
}
