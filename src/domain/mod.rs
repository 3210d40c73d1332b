pub mod control;
pub mod diagnostics;
pub mod error;
pub mod node;
pub mod path;

pub use control::{Control, ObserverKind, ObserverRegistry, Subscription, SubscriptionId};
pub use diagnostics::Diagnostic;
pub use error::{FetchError, FormError, FormResult};
pub use node::{
    ConditionalSchema, Constraint, DescriptorId, FieldArray, FieldConfig, FieldGroup, FieldKind,
    FieldOption, FormNode, NodeId, NodeRole, NodeShape, Rule, TreeEvent,
};
pub use path::{PathSegment, PropertyPath};
