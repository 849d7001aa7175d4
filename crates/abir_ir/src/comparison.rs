//! Comparison scratch state and the canonical-type propagation state
//! machine.
//!
//! During type canonicalization, the equality engine may let a
//! sub-type temporarily borrow the canonical type of its comparison
//! counterpart ("on-the-fly canonicalization"). Without it,
//! canonicalizing recursive types is quadratic. The borrowed canonical
//! is *tentative* until every recursive comparison it depends on has
//! completed:
//!
//! - **Initial**: no canonical type.
//! - **Propagated**: canonical set, `canonical_type_propagated` set,
//!   not confirmed; the node sits in the non-confirmed set and its
//!   dependency set names the in-progress recursive types justifying
//!   the tentative state.
//! - **Confirmed**: the recursive comparisons completed successfully;
//!   the dependency set is cleared and the canonical becomes final.
//! - **Cancelled**: a recursive comparison failed; the canonical is
//!   cleared and the node returns to Initial.
//!
//! All of the state lives here, on the environment: the operand stacks
//! of the in-progress comparison, the per-pair re-entrancy sets for
//! class and function types, the set of types known to be recursive,
//! the set of types with a non-confirmed propagated canonical, and the
//! (optional, guarded) pairwise result cache.

use crate::{Environment, TypeId};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Mutable comparison scratch owned by the environment.
#[derive(Default)]
pub(crate) struct CmpState {
    /// Stack of left-hand composite operands of the comparison in
    /// progress.
    left_operands: SmallVec<[TypeId; 8]>,
    /// Stack of right-hand composite operands. The right-hand side is
    /// the type being canonicalized.
    right_operands: SmallVec<[TypeId; 8]>,
    /// Left sides of class pairs currently being compared.
    left_classes: FxHashSet<TypeId>,
    /// Right sides of class pairs currently being compared.
    right_classes: FxHashSet<TypeId>,
    /// Left sides of function-type pairs currently being compared.
    left_fns: FxHashSet<TypeId>,
    /// Right sides of function-type pairs currently being compared.
    right_fns: FxHashSet<TypeId>,
    /// Types detected to be recursive by an in-progress comparison.
    recursive_types: FxHashSet<TypeId>,
    /// Types carrying a propagated canonical that is not yet
    /// confirmed.
    non_confirmed: FxHashSet<TypeId>,
    /// Pairwise comparison results, when caching is allowed.
    results_cache: FxHashMap<(TypeId, TypeId), bool>,
    /// How many structural composite comparisons have run. Lets tests
    /// observe that the ODR fast path skipped structural work.
    structural_comparisons: u64,
}

impl Environment {
    // === Re-entrancy sets ===

    /// Mark a pair of classes (or unions) as being compared.
    pub fn mark_classes_being_compared(&mut self, l: TypeId, r: TypeId) {
        self.cmp.left_classes.insert(l);
        self.cmp.right_classes.insert(r);
    }

    /// Unmark a pair of classes (or unions).
    pub fn unmark_classes_being_compared(&mut self, l: TypeId, r: TypeId) {
        self.cmp.left_classes.remove(&l);
        self.cmp.right_classes.remove(&r);
    }

    /// Whether the pair of classes is already being compared.
    pub fn classes_being_compared(&self, l: TypeId, r: TypeId) -> bool {
        self.cmp.left_classes.contains(&l) && self.cmp.right_classes.contains(&r)
    }

    /// Mark a pair of function types as being compared.
    pub fn mark_fn_types_being_compared(&mut self, l: TypeId, r: TypeId) {
        self.cmp.left_fns.insert(l);
        self.cmp.right_fns.insert(r);
    }

    /// Unmark a pair of function types.
    pub fn unmark_fn_types_being_compared(&mut self, l: TypeId, r: TypeId) {
        self.cmp.left_fns.remove(&l);
        self.cmp.right_fns.remove(&r);
    }

    /// Whether the pair of function types is already being compared.
    pub fn fn_types_being_compared(&self, l: TypeId, r: TypeId) -> bool {
        self.cmp.left_fns.contains(&l) && self.cmp.right_fns.contains(&r)
    }

    // === Operand stacks ===

    /// Push a pair of composite operands onto the comparison stacks.
    pub fn push_comparison_operands(&mut self, l: TypeId, r: TypeId) {
        self.cmp.left_operands.push(l);
        self.cmp.right_operands.push(r);
    }

    /// Pop a pair of composite operands; the tops must match what was
    /// pushed.
    pub fn pop_comparison_operands(&mut self, l: TypeId, r: TypeId) {
        let popped_l = self.cmp.left_operands.pop();
        let popped_r = self.cmp.right_operands.pop();
        debug_assert_eq!(popped_l, Some(l), "unbalanced comparison operand stack");
        debug_assert_eq!(popped_r, Some(r), "unbalanced comparison operand stack");
    }

    /// Whether a composite comparison is in progress.
    pub fn in_type_comparison(&self) -> bool {
        !self.cmp.right_operands.is_empty()
    }

    /// A recursion cycle on `right` was detected: mark every type
    /// deeper than `right` on the right operand stack as depending on
    /// it, and record `right` as recursive.
    ///
    /// Only the right-hand stack matters: the right-hand side is the
    /// one being canonicalized, hence the one that may receive
    /// propagated canonicals.
    pub fn mark_dependant_types_compared_until(&mut self, right: TypeId) {
        let stack: SmallVec<[TypeId; 8]> = self.cmp.right_operands.clone();
        let mut found = false;
        for t in stack {
            if !found {
                found = t == right;
                continue;
            }
            self.type_node_mut(t).depends_on.insert(right);
        }
        self.cmp.recursive_types.insert(right);
        tracing::trace!(ty = ?right, "detected recursive type");
    }

    /// Whether `t` is currently known to be recursive.
    pub fn is_recursive_type(&self, t: TypeId) -> bool {
        self.cmp.recursive_types.contains(&t)
    }

    // === Propagation ===

    /// Let `r` borrow the canonical type of `l`, if `l` has one and
    /// `r` has none. Inside an enclosing comparison the borrow is
    /// tentative; otherwise it is confirmed on the spot.
    ///
    /// Returns whether a propagation happened.
    pub fn maybe_propagate_canonical_type(&mut self, l: TypeId, r: TypeId) -> bool {
        if !self.config().on_the_fly_canonicalization {
            return false;
        }
        let Some(canonical) = self.canonical_type(l) else {
            return false;
        };
        if self.canonical_type(r).is_some() {
            return false;
        }

        let in_progress = self.in_type_comparison();
        let node = self.type_node_mut(r);
        node.canonical = Some(canonical);
        node.canonical_type_propagated = true;
        if in_progress {
            node.propagated_canonical_type_confirmed = false;
            self.cmp.non_confirmed.insert(r);
            tracing::trace!(ty = ?r, canonical = ?canonical, "tentatively propagated canonical type");
        } else {
            node.propagated_canonical_type_confirmed = true;
            tracing::trace!(ty = ?r, canonical = ?canonical, "propagated and confirmed canonical type");
        }
        true
    }

    /// The comparison of the recursive type `t` completed
    /// successfully: confirm the propagated canonicals of every type
    /// whose dependencies are now covered, and retire `t` from the
    /// recursive set.
    pub fn confirm_ct_propagation(&mut self, t: TypeId) {
        let pending: Vec<TypeId> = self.cmp.non_confirmed.iter().copied().collect();
        for s in pending {
            let node = self.type_node_mut(s);
            node.depends_on.remove(&t);
            if node.depends_on.is_empty() {
                node.propagated_canonical_type_confirmed = true;
                self.cmp.non_confirmed.remove(&s);
                tracing::trace!(ty = ?s, "confirmed propagated canonical type");
            }
        }

        let node = self.type_node_mut(t);
        node.depends_on.clear();
        node.propagated_canonical_type_confirmed = true;
        self.cmp.non_confirmed.remove(&t);
        self.cmp.recursive_types.remove(&t);
    }

    /// The comparison of the recursive type `t` failed: cancel the
    /// propagated canonical of `t` and of everything that transitively
    /// depended on it.
    pub fn cancel_ct_propagation(&mut self, t: TypeId) {
        let mut dependants = FxHashSet::default();
        self.collect_dependants(t, &mut dependants);

        for s in dependants {
            self.clear_propagated_canonical_type(s);
            let node = self.type_node_mut(s);
            node.depends_on.clear();
            self.cmp.non_confirmed.remove(&s);
            tracing::trace!(ty = ?s, "cancelled propagated canonical type");
        }

        self.clear_propagated_canonical_type(t);
        self.type_node_mut(t).depends_on.clear();
        self.cmp.non_confirmed.remove(&t);
    }

    /// Transitive closure, within the non-confirmed set, of types
    /// depending on `target`.
    fn collect_dependants(&self, target: TypeId, collected: &mut FxHashSet<TypeId>) {
        for &s in &self.cmp.non_confirmed {
            if collected.contains(&s) {
                continue;
            }
            if self.type_node(s).depends_on(target) {
                collected.insert(s);
                self.collect_dependants(s, collected);
            }
        }
    }

    /// Clear a tentatively propagated canonical. A confirmed canonical
    /// is never cleared.
    fn clear_propagated_canonical_type(&mut self, t: TypeId) {
        let node = self.type_node_mut(t);
        if node.canonical_type_propagated && !node.propagated_canonical_type_confirmed {
            node.canonical = None;
            node.canonical_type_propagated = false;
        }
    }

    /// Force-confirm every remaining tentative propagation. Invoked
    /// when a translation unit finishes canonicalizing: nothing is in
    /// doubt anymore, the pass is over.
    pub fn confirm_all_propagations(&mut self) {
        if !self.cmp.non_confirmed.is_empty() {
            tracing::debug!(
                count = self.cmp.non_confirmed.len(),
                "force-confirming remaining tentative propagations"
            );
        }
        let pending: Vec<TypeId> = self.cmp.non_confirmed.drain().collect();
        for s in pending {
            let node = self.type_node_mut(s);
            node.depends_on.clear();
            node.propagated_canonical_type_confirmed = true;
        }
    }

    /// Number of types whose propagated canonical is still tentative.
    pub fn pending_propagation_count(&self) -> usize {
        self.cmp.non_confirmed.len()
    }

    /// Whether `t`'s propagated canonical is still tentative.
    pub fn is_propagation_pending(&self, t: TypeId) -> bool {
        self.cmp.non_confirmed.contains(&t)
    }

    // === Result cache ===

    /// Look up a previously cached comparison result.
    pub fn cached_comparison_result(&self, l: TypeId, r: TypeId) -> Option<bool> {
        if !self.config().allow_comparison_caching {
            return None;
        }
        self.cmp.results_cache.get(&(l, r)).copied()
    }

    /// Cache a comparison result. Positive results are only safe to
    /// cache when neither side is recursive or depends on a recursive
    /// type; a `true` under a pending recursion could still be
    /// cancelled.
    pub fn cache_comparison_result(&mut self, l: TypeId, r: TypeId, value: bool) {
        if !self.config().allow_comparison_caching {
            return;
        }
        if value
            && (self.is_recursive_type(l)
                || self.is_recursive_type(r)
                || self.type_node(l).depends_on_recursive_type()
                || self.type_node(r).depends_on_recursive_type())
        {
            return;
        }
        self.cmp.results_cache.insert((l, r), value);
    }

    /// Drop every cached comparison result.
    pub fn clear_comparison_results_cache(&mut self) {
        self.cmp.results_cache.clear();
    }

    // === Instrumentation ===

    /// Record one structural composite comparison.
    pub fn note_structural_comparison(&mut self) {
        self.cmp.structural_comparisons += 1;
    }

    /// How many structural composite comparisons have run so far.
    pub fn structural_comparison_count(&self) -> u64 {
        self.cmp.structural_comparisons
    }

    // === Comparison epilogue ===

    /// Epilogue of a composite-type comparison: on success, propagate
    /// the left side's canonical to the right side; then, if the right
    /// side had been detected recursive, confirm or cancel the
    /// propagations that hinged on it.
    pub fn return_comparison_result(&mut self, l: TypeId, r: TypeId, value: bool) -> bool {
        if value {
            self.maybe_propagate_canonical_type(l, r);
        }
        if self.is_recursive_type(r) {
            if value {
                self.confirm_ct_propagation(r);
            } else {
                self.cancel_ct_propagation(r);
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Qualifiers;

    fn env_with_types(n: usize) -> (Environment, Vec<TypeId>) {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let mut types = vec![int];
        for _ in 1..n {
            // Distinct nodes to play the role of arbitrary types.
            types.push(env.new_qualified_type(int, Qualifiers::empty()));
        }
        (env, types)
    }

    #[test]
    fn propagation_is_tentative_inside_a_comparison() {
        let (mut env, t) = env_with_types(3);
        let (canonical_side, receiver, outer) = (t[0], t[1], t[2]);
        env.set_canonical_type(canonical_side, canonical_side);

        env.push_comparison_operands(canonical_side, outer);
        assert!(env.maybe_propagate_canonical_type(canonical_side, receiver));
        assert_eq!(env.canonical_type(receiver), Some(canonical_side));
        assert!(env.type_node(receiver).canonical_type_propagated());
        assert!(!env.type_node(receiver).propagated_canonical_type_confirmed());
        assert!(env.is_propagation_pending(receiver));
        env.pop_comparison_operands(canonical_side, outer);
    }

    #[test]
    fn propagation_confirms_immediately_outside_comparisons() {
        let (mut env, t) = env_with_types(2);
        env.set_canonical_type(t[0], t[0]);

        assert!(env.maybe_propagate_canonical_type(t[0], t[1]));
        assert!(env.type_node(t[1]).propagated_canonical_type_confirmed());
        assert!(!env.is_propagation_pending(t[1]));
    }

    #[test]
    fn propagation_respects_the_config_switch() {
        let (mut env, t) = env_with_types(2);
        env.set_canonical_type(t[0], t[0]);
        env.config_mut().on_the_fly_canonicalization = false;
        assert!(!env.maybe_propagate_canonical_type(t[0], t[1]));
        assert_eq!(env.canonical_type(t[1]), None);
    }

    #[test]
    fn cycle_marking_records_dependencies_below_the_anchor() {
        let (mut env, t) = env_with_types(4);
        let (anchor_l, anchor_r, deep_l, deep_r) = (t[0], t[1], t[2], t[3]);

        env.push_comparison_operands(anchor_l, anchor_r);
        env.push_comparison_operands(deep_l, deep_r);

        env.mark_dependant_types_compared_until(anchor_r);
        assert!(env.is_recursive_type(anchor_r));
        assert!(env.type_node(deep_r).depends_on(anchor_r));
        // The anchor itself does not depend on itself.
        assert!(!env.type_node(anchor_r).depends_on(anchor_r));
        // Left-hand operands are never marked.
        assert!(!env.type_node(deep_l).depends_on(anchor_r));

        env.pop_comparison_operands(deep_l, deep_r);
        env.pop_comparison_operands(anchor_l, anchor_r);
    }

    #[test]
    fn confirm_clears_dependencies_and_retires_the_root() {
        let (mut env, t) = env_with_types(4);
        let (root_l, root_r, sub_l, sub_r) = (t[0], t[1], t[2], t[3]);
        env.set_canonical_type(root_l, root_l);
        env.set_canonical_type(sub_l, sub_l);

        // Simulate: inside the (root_l, root_r) comparison, a cycle on
        // root_r was detected while comparing (sub_l, sub_r), and
        // sub_r received a tentative canonical.
        env.push_comparison_operands(root_l, root_r);
        env.push_comparison_operands(sub_l, sub_r);
        env.mark_dependant_types_compared_until(root_r);
        env.pop_comparison_operands(sub_l, sub_r);
        assert!(env.maybe_propagate_canonical_type(sub_l, sub_r));
        assert!(env.is_propagation_pending(sub_r));
        env.pop_comparison_operands(root_l, root_r);

        // The root comparison completes successfully.
        let value = env.return_comparison_result(root_l, root_r, true);
        assert!(value);
        assert!(env.type_node(sub_r).propagated_canonical_type_confirmed());
        assert!(!env.is_propagation_pending(sub_r));
        assert!(!env.is_recursive_type(root_r));
        assert_eq!(env.canonical_type(sub_r), Some(sub_l));
    }

    #[test]
    fn cancel_rolls_back_to_initial() {
        let (mut env, t) = env_with_types(4);
        let (root_l, root_r, sub_l, sub_r) = (t[0], t[1], t[2], t[3]);
        env.set_canonical_type(sub_l, sub_l);

        env.push_comparison_operands(root_l, root_r);
        env.push_comparison_operands(sub_l, sub_r);
        env.mark_dependant_types_compared_until(root_r);
        env.pop_comparison_operands(sub_l, sub_r);
        assert!(env.maybe_propagate_canonical_type(sub_l, sub_r));
        env.pop_comparison_operands(root_l, root_r);

        // The root comparison fails.
        let value = env.return_comparison_result(root_l, root_r, false);
        assert!(!value);
        assert_eq!(env.canonical_type(sub_r), None);
        assert!(!env.type_node(sub_r).canonical_type_propagated());
        assert!(!env.is_propagation_pending(sub_r));
    }

    #[test]
    fn force_confirmation_sweeps_the_pending_set() {
        let (mut env, t) = env_with_types(3);
        env.set_canonical_type(t[0], t[0]);

        env.push_comparison_operands(t[0], t[2]);
        assert!(env.maybe_propagate_canonical_type(t[0], t[1]));
        env.pop_comparison_operands(t[0], t[2]);
        assert_eq!(env.pending_propagation_count(), 1);

        env.confirm_all_propagations();
        assert_eq!(env.pending_propagation_count(), 0);
        assert!(env.type_node(t[1]).propagated_canonical_type_confirmed());
        assert_eq!(env.canonical_type(t[1]), Some(t[0]));
    }

    #[test]
    fn cache_is_gated_and_guarded() {
        let (mut env, t) = env_with_types(3);

        // Disabled by default.
        env.cache_comparison_result(t[0], t[1], true);
        assert_eq!(env.cached_comparison_result(t[0], t[1]), None);

        env.config_mut().allow_comparison_caching = true;
        env.cache_comparison_result(t[0], t[1], true);
        assert_eq!(env.cached_comparison_result(t[0], t[1]), Some(true));

        // A positive result for a recursive type is not cached.
        env.push_comparison_operands(t[0], t[2]);
        env.mark_dependant_types_compared_until(t[2]);
        env.pop_comparison_operands(t[0], t[2]);
        env.cache_comparison_result(t[2], t[1], true);
        assert_eq!(env.cached_comparison_result(t[2], t[1]), None);
        // A negative one is.
        env.cache_comparison_result(t[2], t[1], false);
        assert_eq!(env.cached_comparison_result(t[2], t[1]), Some(false));
    }
}
