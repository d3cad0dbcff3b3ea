// PassGuard — Service layer
//
// Policy-checked operations over the stores. Every mutation runs the same
// sequence: authorize against the policy engine, touch the store, append to
// the activity log.

mod systems;
mod users;

pub use systems::{SystemRequest, SystemService, SystemWithSecret};
pub use users::{CreateUserRequest, UpdateUserRequest, UserService};
