// PassGuard — Store Module
//
// SQLite-backed storage for user accounts and system credential entries.
// System secrets are field-encrypted via the credential cipher before they
// ever reach a row; user passwords are bcrypt-hashed.

mod db;
mod error;
mod models;
mod systems;
mod users;

pub use db::Database;
pub use error::StoreError;
pub use models::{
    Actor, Category, NewSystem, NewUser, Role, SystemRecord, SystemUpdate, UserProfile,
    UserRecord, UserUpdate,
};
pub use systems::{SqliteSystemStore, SystemStore};
pub use users::{SqliteUserStore, UserStore};
