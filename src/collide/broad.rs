//! Incremental sweep and prune broad phase.
//!
//! Maintains, for each of the three world axes, a sorted array of AABB edges.
//! Moving an object shifts its edges through the arrays with an insertion
//! sort; every edge crossed on the way is a potential change in overlap
//! status, so the pair bookkeeping falls out of the sort itself. Under
//! temporal coherency the arrays stay almost sorted and the per-step cost is
//! proportional to the number of edge crossings, not the object count.

use cgmath::BaseFloat;
use collision::Aabb3;

/// Handle to an object registered with the broad phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BroadphaseHandle(pub(crate) u32);

/// Receiver for pair overlap changes.
///
/// The broad phase calls these synchronously from within `add`/`update`/
/// `remove`, with the user data of the two involved objects. Callbacks may
/// mutate the pair cache but must not re-enter the broad phase.
pub trait PairEvents {
    /// A pair of objects started overlapping on all three axes.
    fn pair_added(&mut self, a: u32, b: u32);
    /// A previously overlapping pair stopped overlapping.
    fn pair_removed(&mut self, a: u32, b: u32);
}

/// Edge of an AABB projected on one axis.
#[derive(Clone, Copy, Debug)]
struct Edge<S> {
    position: S,
    proxy: u32,
    is_max: bool,
}

/// Per-object bookkeeping: the current index of the object's min and max
/// edge in each axis's edge array.
///
/// Invariant: `min_edges[axis] < max_edges[axis]` at all times.
#[derive(Clone, Copy, Debug)]
struct Proxy {
    min_edges: [u32; 3],
    max_edges: [u32; 3],
    data: u32,
    live: bool,
}

/// The slot of the sentinel proxy owning the `±∞` edges bracketing every
/// axis array.
const SENTINEL: u32 = 0;

/// The axis after `axis`, i.e. `(axis + 1) % 3`.
#[inline]
fn next_axis(axis: usize) -> usize {
    (1 << axis) & 3
}

/// Incremental 3-axis sweep and prune.
///
/// ### Type parameters:
///
/// - `S`: Scalar type, `f32` or `f64`
#[derive(Debug)]
pub struct AxisSweep3<S> {
    proxies: Vec<Proxy>,
    free: Vec<u32>,
    edges: [Vec<Edge<S>>; 3],
}

impl<S> AxisSweep3<S>
where
    S: BaseFloat,
{
    /// Create a broad phase expecting roughly `object_count_hint` objects.
    /// The hint only sizes the initial allocations.
    pub fn new(object_count_hint: usize) -> Self {
        let expected_edges = (object_count_hint + 1) * 2;

        let sentinel = Proxy {
            min_edges: [0; 3],
            max_edges: [1; 3],
            data: u32::max_value(),
            live: false,
        };

        let mut edges: [Vec<Edge<S>>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for axis in &mut edges {
            axis.reserve(expected_edges);
            axis.push(Edge {
                position: S::min_value(),
                proxy: SENTINEL,
                is_max: false,
            });
            axis.push(Edge {
                position: S::max_value(),
                proxy: SENTINEL,
                is_max: true,
            });
        }

        Self {
            proxies: vec![sentinel],
            free: Vec::new(),
            edges,
        }
    }

    /// Register a new object with its initial bounding box.
    ///
    /// Fires `pair_added` for every pair the new object starts overlapping
    /// with.
    pub fn add<E>(&mut self, aabb: &Aabb3<S>, data: u32, events: &mut E) -> BroadphaseHandle
    where
        E: PairEvents,
    {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.proxies[slot as usize] = Proxy {
                    min_edges: [0; 3],
                    max_edges: [0; 3],
                    data,
                    live: true,
                };
                slot
            }
            None => {
                self.proxies.push(Proxy {
                    min_edges: [0; 3],
                    max_edges: [0; 3],
                    data,
                    live: true,
                });
                (self.proxies.len() - 1) as u32
            }
        };

        for axis in 0..3 {
            let edges = &mut self.edges[axis];

            // Displace the upper sentinel, append the new edges, put the
            // sentinel back on top.
            edges.pop();

            self.proxies[slot as usize].min_edges[axis] = edges.len() as u32;
            edges.push(Edge {
                position: aabb.min[axis],
                proxy: slot,
                is_max: false,
            });

            self.proxies[slot as usize].max_edges[axis] = edges.len() as u32;
            edges.push(Edge {
                position: aabb.max[axis],
                proxy: slot,
                is_max: true,
            });

            edges.push(Edge {
                position: S::max_value(),
                proxy: SENTINEL,
                is_max: true,
            });
            self.proxies[SENTINEL as usize].max_edges[axis] = (edges.len() - 1) as u32;
        }

        // The first two axes only move the edges into place; overlap
        // decisions are taken once, on the last axis, where the other two
        // axis orderings are already final.
        for axis in 0..2 {
            let min_edge = self.proxies[slot as usize].min_edges[axis];
            self.sort_min_down(axis, min_edge, events, false);
            let max_edge = self.proxies[slot as usize].max_edges[axis];
            self.sort_max_down(axis, max_edge, events, false);
        }
        let min_edge = self.proxies[slot as usize].min_edges[2];
        self.sort_min_down(2, min_edge, events, true);
        let max_edge = self.proxies[slot as usize].max_edges[2];
        self.sort_max_down(2, max_edge, events, true);

        BroadphaseHandle(slot)
    }

    /// Move an object to a new bounding box.
    ///
    /// Expansion can only add overlaps, contraction can only remove them,
    /// so each of the four sort directions reports through exactly one of
    /// the two callbacks.
    pub fn update<E>(&mut self, handle: BroadphaseHandle, aabb: &Aabb3<S>, events: &mut E)
    where
        E: PairEvents,
    {
        let slot = handle.0 as usize;
        if slot >= self.proxies.len() || !self.proxies[slot].live {
            log::debug!("broadphase update for unknown handle {:?}", handle);
            return;
        }

        for axis in 0..3 {
            let min_edge = self.proxies[slot].min_edges[axis];
            let max_edge = self.proxies[slot].max_edges[axis];

            let dmin = aabb.min[axis] - self.edges[axis][min_edge as usize].position;
            let dmax = aabb.max[axis] - self.edges[axis][max_edge as usize].position;

            self.edges[axis][min_edge as usize].position = aabb.min[axis];
            self.edges[axis][max_edge as usize].position = aabb.max[axis];

            // expand (only adds overlaps)
            if dmin < S::zero() {
                self.sort_min_down(axis, min_edge, events, true);
            }
            if dmax > S::zero() {
                self.sort_max_up(axis, max_edge, events, true);
            }

            // shrink (only removes overlaps)
            if dmin > S::zero() {
                self.sort_min_up(axis, min_edge, events, true);
            }
            if dmax < S::zero() {
                self.sort_max_down(axis, max_edge, events, true);
            }
        }
    }

    /// Unregister an object.
    ///
    /// Fires `pair_removed` for every pair the object currently overlaps,
    /// then extracts its six edges. Removing an unknown handle is a no-op.
    pub fn remove<E>(&mut self, handle: BroadphaseHandle, events: &mut E)
    where
        E: PairEvents,
    {
        let slot = handle.0;
        if slot as usize >= self.proxies.len()
            || slot == SENTINEL
            || !self.proxies[slot as usize].live
        {
            log::debug!("broadphase remove for unknown handle {:?}", handle);
            return;
        }

        // Every pair involving the handle is implicitly removed.
        for other in 1..self.proxies.len() as u32 {
            if other == slot || !self.proxies[other as usize].live {
                continue;
            }
            if self.test_overlap_3d(slot, other) {
                events.pair_removed(
                    self.proxies[slot as usize].data,
                    self.proxies[other as usize].data,
                );
            }
        }

        for axis in 0..3 {
            let min_edge = self.proxies[slot as usize].min_edges[axis] as usize;
            let max_edge = self.proxies[slot as usize].max_edges[axis] as usize;

            // Max first, it sits at the higher index.
            self.edges[axis].remove(max_edge);
            self.edges[axis].remove(min_edge);

            for (index, edge) in self.edges[axis].iter().enumerate() {
                let proxy = &mut self.proxies[edge.proxy as usize];
                if edge.is_max {
                    proxy.max_edges[axis] = index as u32;
                } else {
                    proxy.min_edges[axis] = index as u32;
                }
            }
        }

        self.proxies[slot as usize].live = false;
        self.free.push(slot);
    }

    /// User data an object was registered with.
    pub fn data(&self, handle: BroadphaseHandle) -> u32 {
        self.proxies[handle.0 as usize].data
    }

    /// Move a min edge towards lower positions. Crossing another object's
    /// max edge can only start an overlap.
    fn sort_min_down<E>(&mut self, axis: usize, edge_id: u32, events: &mut E, notify: bool)
    where
        E: PairEvents,
    {
        let mut edge = edge_id as usize;
        let mut prev = edge - 1;

        while self.edges[axis][edge].position < self.edges[axis][prev].position {
            let proxy = self.edges[axis][edge].proxy;
            let prev_proxy = self.edges[axis][prev].proxy;

            if self.edges[axis][prev].is_max {
                if notify && self.test_overlap_2d(proxy, prev_proxy, axis) {
                    events.pair_added(
                        self.proxies[proxy as usize].data,
                        self.proxies[prev_proxy as usize].data,
                    );
                }
                self.proxies[prev_proxy as usize].max_edges[axis] += 1;
            } else {
                self.proxies[prev_proxy as usize].min_edges[axis] += 1;
            }
            self.proxies[proxy as usize].min_edges[axis] -= 1;

            self.edges[axis].swap(edge, prev);

            // The lower sentinel compares below everything and stops the
            // walk before `prev` can underflow.
            edge -= 1;
            prev = edge - 1;
        }
    }

    /// Move a min edge towards higher positions. Crossing another object's
    /// max edge can only end an overlap.
    fn sort_min_up<E>(&mut self, axis: usize, edge_id: u32, events: &mut E, notify: bool)
    where
        E: PairEvents,
    {
        let mut edge = edge_id as usize;
        let mut next = edge + 1;

        while self.edges[axis][edge].position > self.edges[axis][next].position {
            let proxy = self.edges[axis][edge].proxy;
            let next_proxy = self.edges[axis][next].proxy;

            if self.edges[axis][next].is_max {
                if notify && self.test_overlap_2d(proxy, next_proxy, axis) {
                    events.pair_removed(
                        self.proxies[proxy as usize].data,
                        self.proxies[next_proxy as usize].data,
                    );
                }
                self.proxies[next_proxy as usize].max_edges[axis] -= 1;
            } else {
                self.proxies[next_proxy as usize].min_edges[axis] -= 1;
            }
            self.proxies[proxy as usize].min_edges[axis] += 1;

            self.edges[axis].swap(edge, next);

            edge += 1;
            next = edge + 1;
        }
    }

    /// Move a max edge towards higher positions. Crossing another object's
    /// min edge can only start an overlap.
    fn sort_max_up<E>(&mut self, axis: usize, edge_id: u32, events: &mut E, notify: bool)
    where
        E: PairEvents,
    {
        let mut edge = edge_id as usize;
        let mut next = edge + 1;

        while self.edges[axis][edge].position > self.edges[axis][next].position {
            let proxy = self.edges[axis][edge].proxy;
            let next_proxy = self.edges[axis][next].proxy;

            if !self.edges[axis][next].is_max {
                if notify && self.test_overlap_2d(proxy, next_proxy, axis) {
                    events.pair_added(
                        self.proxies[proxy as usize].data,
                        self.proxies[next_proxy as usize].data,
                    );
                }
                self.proxies[next_proxy as usize].min_edges[axis] -= 1;
            } else {
                self.proxies[next_proxy as usize].max_edges[axis] -= 1;
            }
            self.proxies[proxy as usize].max_edges[axis] += 1;

            self.edges[axis].swap(edge, next);

            // The upper sentinel stops the walk.
            edge += 1;
            next = edge + 1;
        }
    }

    /// Move a max edge towards lower positions. Crossing another object's
    /// min edge can only end an overlap.
    fn sort_max_down<E>(&mut self, axis: usize, edge_id: u32, events: &mut E, notify: bool)
    where
        E: PairEvents,
    {
        let mut edge = edge_id as usize;
        let mut prev = edge - 1;

        while self.edges[axis][edge].position < self.edges[axis][prev].position {
            let proxy = self.edges[axis][edge].proxy;
            let prev_proxy = self.edges[axis][prev].proxy;

            if !self.edges[axis][prev].is_max {
                if notify && self.test_overlap_2d(proxy, prev_proxy, axis) {
                    events.pair_removed(
                        self.proxies[proxy as usize].data,
                        self.proxies[prev_proxy as usize].data,
                    );
                }
                self.proxies[prev_proxy as usize].min_edges[axis] += 1;
            } else {
                self.proxies[prev_proxy as usize].max_edges[axis] += 1;
            }
            self.proxies[proxy as usize].max_edges[axis] -= 1;

            self.edges[axis].swap(edge, prev);

            edge -= 1;
            prev = edge - 1;
        }
    }

    /// Overlap test on the two axes perpendicular to `axis`, comparing edge
    /// indices instead of positions.
    fn test_overlap_2d(&self, p1: u32, p2: u32, axis: usize) -> bool {
        let axis_1 = next_axis(axis);
        let axis_2 = next_axis(axis_1);
        let a = &self.proxies[p1 as usize];
        let b = &self.proxies[p2 as usize];

        !(a.max_edges[axis_1] < b.min_edges[axis_1]
            || b.max_edges[axis_1] < a.min_edges[axis_1]
            || a.max_edges[axis_2] < b.min_edges[axis_2]
            || b.max_edges[axis_2] < a.min_edges[axis_2])
    }

    /// Full 3-axis overlap test by edge indices.
    fn test_overlap_3d(&self, p1: u32, p2: u32) -> bool {
        let a = &self.proxies[p1 as usize];
        let b = &self.proxies[p2 as usize];

        (0..3).all(|axis| {
            a.max_edges[axis] > b.min_edges[axis] && b.max_edges[axis] > a.min_edges[axis]
        })
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        for axis in 0..3 {
            let edges = &self.edges[axis];
            for pair in edges.windows(2) {
                assert!(
                    pair[0].position <= pair[1].position,
                    "axis {} edge array not sorted",
                    axis
                );
            }
            for (index, edge) in edges.iter().enumerate() {
                let proxy = &self.proxies[edge.proxy as usize];
                let recorded = if edge.is_max {
                    proxy.max_edges[axis]
                } else {
                    proxy.min_edges[axis]
                };
                assert_eq!(recorded as usize, index, "stale edge index on axis {}", axis);
            }
            for (slot, proxy) in self.proxies.iter().enumerate() {
                if slot != SENTINEL as usize && !proxy.live {
                    continue;
                }
                assert!(
                    proxy.min_edges[axis] < proxy.max_edges[axis],
                    "min edge not below max edge on axis {}",
                    axis
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use cgmath::Point3;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        added: usize,
        removed: usize,
        pairs: HashSet<(u32, u32)>,
    }

    impl PairEvents for Recorder {
        fn pair_added(&mut self, a: u32, b: u32) {
            self.added += 1;
            assert!(self.pairs.insert(key(a, b)), "duplicate pair add");
        }

        fn pair_removed(&mut self, a: u32, b: u32) {
            self.removed += 1;
            assert!(self.pairs.remove(&key(a, b)), "removing unknown pair");
        }
    }

    #[test]
    fn add_single_object_touches_nothing() {
        let mut bp = AxisSweep3::new(10);
        let mut events = Recorder::default();
        bp.add(&aabb(0., 0., 0., 1., 1., 1.), 1, &mut events);
        bp.check_invariants();
        assert_eq!(events.added, 0);
        assert_eq!(events.removed, 0);
    }

    #[test]
    fn non_overlapping_boxes() {
        let mut bp = AxisSweep3::new(10);
        let mut events = Recorder::default();
        bp.add(&aabb(0., 0., 0., 1., 1., 1.), 1, &mut events);
        bp.add(&aabb(1.5, 1.5, 1.5, 2., 2., 2.), 2, &mut events);
        bp.check_invariants();
        assert_eq!(events.added, 0);
    }

    #[test]
    fn overlap_at_insertion() {
        let mut bp = AxisSweep3::new(10);
        let mut events = Recorder::default();
        bp.add(&aabb(0., 0., 0., 1., 1., 1.), 1, &mut events);
        bp.add(&aabb(0., 0., 0., 2., 2., 2.), 2, &mut events);
        bp.check_invariants();
        assert_eq!(events.added, 1);
        assert_eq!(events.removed, 0);
        assert!(events.pairs.contains(&(1, 2)));
    }

    #[test]
    fn third_box_overlapping_both() {
        let mut bp = AxisSweep3::new(10);
        let mut events = Recorder::default();
        bp.add(&aabb(0., 0., 0., 1., 1., 1.), 1, &mut events);
        bp.add(&aabb(1.5, 1.5, 1.5, 2., 2., 2.), 2, &mut events);
        bp.add(&aabb(0., 0., 0., 2., 2., 2.), 3, &mut events);
        bp.check_invariants();
        assert_eq!(events.added, 2);
        assert_eq!(events.removed, 0);
        assert!(events.pairs.contains(&(1, 3)));
        assert!(events.pairs.contains(&(2, 3)));
    }

    #[test]
    fn update_moves_object_into_and_out_of_overlap() {
        let mut bp = AxisSweep3::new(10);
        let mut events = Recorder::default();
        bp.add(&aabb(0., 0., 0., 1., 1., 1.), 1, &mut events);
        let mover = bp.add(&aabb(5., 0., 0., 6., 1., 1.), 2, &mut events);
        assert_eq!(events.added, 0);

        bp.update(mover, &aabb(0.5, 0.5, 0.5, 1.5, 1.5, 1.5), &mut events);
        bp.check_invariants();
        assert_eq!(events.added, 1);
        assert!(events.pairs.contains(&(1, 2)));

        bp.update(mover, &aabb(5., 5., 5., 6., 6., 6.), &mut events);
        bp.check_invariants();
        assert_eq!(events.removed, 1);
        assert!(events.pairs.is_empty());
    }

    #[test]
    fn update_along_single_axis_keeps_pair_count() {
        let mut bp = AxisSweep3::new(4);
        let mut events = Recorder::default();
        bp.add(&aabb(0., 0., 0., 1., 1., 1.), 1, &mut events);
        let mover = bp.add(&aabb(0.5, 0., 0., 1.5, 1., 1.), 2, &mut events);
        assert_eq!(events.added, 1);

        // Slide along X while still overlapping: no events either way.
        bp.update(mover, &aabb(0.2, 0., 0., 1.2, 1., 1.), &mut events);
        bp.check_invariants();
        assert_eq!(events.added, 1);
        assert_eq!(events.removed, 0);
    }

    #[test]
    fn remove_fires_pair_removed_for_overlaps() {
        let mut bp = AxisSweep3::new(10);
        let mut events = Recorder::default();
        bp.add(&aabb(0., 0., 0., 1., 1., 1.), 1, &mut events);
        bp.add(&aabb(1.5, 1.5, 1.5, 2., 2., 2.), 2, &mut events);
        let big = bp.add(&aabb(0., 0., 0., 2., 2., 2.), 3, &mut events);
        assert_eq!(events.added, 2);

        bp.remove(big, &mut events);
        bp.check_invariants();
        assert_eq!(events.removed, 2);
        assert!(events.pairs.is_empty());
    }

    #[test]
    fn add_then_remove_restores_behavior() {
        let mut bp = AxisSweep3::new(10);
        let mut events = Recorder::default();
        bp.add(&aabb(0., 0., 0., 1., 1., 1.), 1, &mut events);
        let temp = bp.add(&aabb(0.5, 0.5, 0.5, 2., 2., 2.), 2, &mut events);
        bp.remove(temp, &mut events);
        bp.check_invariants();
        assert!(events.pairs.is_empty());

        // Future operations behave as if `temp` never existed.
        bp.add(&aabb(0.5, 0.5, 0.5, 1.5, 1.5, 1.5), 3, &mut events);
        bp.check_invariants();
        let expected: HashSet<(u32, u32)> = [(1, 3)].iter().cloned().collect();
        assert_eq!(events.pairs, expected);
    }

    #[test]
    fn remove_unknown_handle_is_noop() {
        let mut bp = AxisSweep3::<f32>::new(2);
        let mut events = Recorder::default();
        let handle = bp.add(&aabb(0., 0., 0., 1., 1., 1.), 1, &mut events);
        bp.remove(handle, &mut events);
        // Second removal finds a dead slot.
        bp.remove(handle, &mut events);
        bp.check_invariants();
        assert_eq!(events.removed, 0);
    }

    #[test]
    fn net_events_match_live_overlaps_after_shuffle() {
        let mut bp = AxisSweep3::new(8);
        let mut events = Recorder::default();
        let mut handles = Vec::new();
        for i in 0..6 {
            let offset = i as f32 * 0.75;
            handles.push(bp.add(
                &aabb(offset, 0., 0., offset + 1., 1., 1.),
                i as u32,
                &mut events,
            ));
        }
        bp.check_invariants();
        for (i, &handle) in handles.iter().enumerate() {
            let offset = (5 - i) as f32 * 0.6;
            bp.update(
                handle,
                &aabb(offset, offset, 0., offset + 1., offset + 1., 1.),
                &mut events,
            );
        }
        bp.check_invariants();
        assert_eq!(events.added - events.removed, events.pairs.len());

        // Ground truth: after the shuffle only neighbours still overlap.
        let expected: HashSet<(u32, u32)> =
            [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)].iter().cloned().collect();
        assert_eq!(events.pairs, expected);
    }

    // util
    fn key(a: u32, b: u32) -> (u32, u32) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn aabb(
        min_x: f32,
        min_y: f32,
        min_z: f32,
        max_x: f32,
        max_y: f32,
        max_z: f32,
    ) -> Aabb3<f32> {
        Aabb3::new(
            Point3::new(min_x, min_y, min_z),
            Point3::new(max_x, max_y, max_z),
        )
    }
}
