//! Value controls and their change observers
//!
//! Every leaf node owns a [`Control`] holding its current value. Nodes that react
//! to their own value changes (conditional triggers, selectors, parameter adders)
//! additionally own exactly one [`Subscription`], registered with the tree's
//! [`ObserverRegistry`]. A subscription is not `Clone`: it is released explicitly
//! during teardown, and a released subscription never fires again.

use serde_json::Value;
use std::collections::HashMap;

use super::node::NodeId;

/// Identifier of a live observer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What an observer does when its node's value changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverKind {
    /// Run conditional maintenance for the node's descriptors
    Conditional,
    /// Turn the submitted value into a new custom property on the parent group
    ParameterAdder,
}

/// Owned handle to a registered observer
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription {
    id: SubscriptionId,
    kind: ObserverKind,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn kind(&self) -> ObserverKind {
        self.kind
    }
}

/// Registry of live observers, keyed by subscription id
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    next_id: u64,
    live: HashMap<SubscriptionId, NodeId>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for `node`
    pub fn subscribe(&mut self, node: NodeId, kind: ObserverKind) -> Subscription {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.live.insert(id, node);
        Subscription { id, kind }
    }

    /// Release an observer. Returns false if it was already gone.
    pub fn release(&mut self, subscription: Subscription) -> bool {
        self.live.remove(&subscription.id).is_some()
    }

    pub fn is_live(&self, subscription: &Subscription) -> bool {
        self.live.contains_key(&subscription.id)
    }

    /// Node observed by a live subscription
    pub fn observed_node(&self, id: SubscriptionId) -> Option<NodeId> {
        self.live.get(&id).copied()
    }

    /// Number of live observers
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// Value holder bound to a leaf node
#[derive(Debug)]
pub struct Control {
    value: Value,
    subscription: Option<Subscription>,
}

impl Control {
    pub fn new(initial: Value) -> Self {
        Self {
            value: initial,
            subscription: None,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    pub(crate) fn set(&mut self, value: Value) {
        self.value = value;
    }

    pub(crate) fn attach(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
    }

    pub(crate) fn take_subscription(&mut self) -> Option<Subscription> {
        self.subscription.take()
    }
}
