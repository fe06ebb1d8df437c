//! External collaborator ports: model backend and conversation store.

mod mock;
mod store;
mod traits;

pub use mock::{MockModelBackend, MockSettings, MockStep};
pub use store::InMemoryStore;
pub use traits::{ConversationStore, InvocationRequest, ModelBackend, ModelOutput};
