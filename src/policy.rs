// PassGuard — Access Policy Engine
//
// Pure decision logic over an `Actor` and a target category/subcategory.
// No I/O here; the service layer consults this before touching the store.
//
// Tier rules:
//   ultra_admin, super_admin  every operation, every entry
//   admin                     all four operations, gated on category grants;
//                             subcategory grants narrow READ visibility only
//   user                      View only, gated on category AND subcategory

use crate::error::{Error, Result};
use crate::store::{Actor, Category, Role, SystemRecord};

/// The operations the policy engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    View,
    Create,
    Update,
    Delete,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Operation::View => "view",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Decide whether `actor` may perform `op` on an entry in the given
/// category (and subcategory, for reads by restricted users).
pub fn authorize(
    actor: &Actor,
    op: Operation,
    category: Category,
    subcategory: Option<&str>,
) -> Result<()> {
    if actor.role.is_unrestricted() {
        return Ok(());
    }

    match actor.role {
        Role::Admin => {
            if !actor.allowed_categories.contains(&category) {
                return Err(denied(actor, op, category));
            }
            Ok(())
        }
        Role::User => {
            if op != Operation::View {
                return Err(Error::Unauthorized(
                    "Your role does not permit modifying entries".to_string(),
                ));
            }
            if !actor.allowed_categories.contains(&category) {
                return Err(denied(actor, op, category));
            }
            if !subcategory_permits(actor, category, subcategory) {
                return Err(denied(actor, op, category));
            }
            Ok(())
        }
        // is_unrestricted() covered these above.
        Role::UltraAdmin | Role::SuperAdmin => Ok(()),
    }
}

/// Moving an entry across categories requires access to both the old and
/// the new category.
pub fn authorize_category_change(
    actor: &Actor,
    from: Category,
    to: Category,
) -> Result<()> {
    authorize(actor, Operation::Update, from, None)?;
    if from != to {
        authorize(actor, Operation::Update, to, None)?;
    }
    Ok(())
}

/// Whether a stored entry shows up in this actor's listings. Unlike
/// `authorize`, subcategory grants narrow visibility for admins too.
pub fn visible_in_listing(actor: &Actor, system: &SystemRecord) -> bool {
    if actor.role.is_unrestricted() {
        return true;
    }
    if !actor.allowed_categories.contains(&system.category) {
        return false;
    }
    subcategory_permits(actor, system.category, system.subcategory.as_deref())
}

/// Filter a result set down to what the actor may see.
pub fn filter_accessible(actor: &Actor, systems: Vec<SystemRecord>) -> Vec<SystemRecord> {
    systems
        .into_iter()
        .filter(|s| visible_in_listing(actor, s))
        .collect()
}

/// An actor with no recorded subcategory list for a category sees every
/// entry in it. Once a list is recorded, entries carrying a subcategory
/// must match it, so an empty list denies every tagged entry; entries with
/// no subcategory stay visible either way.
fn subcategory_permits(actor: &Actor, category: Category, subcategory: Option<&str>) -> bool {
    let Some(sub) = subcategory else {
        return true;
    };
    match actor.allowed_subcategories.get(&category) {
        Some(allowed) => allowed.iter().any(|a| a == sub),
        None => true,
    }
}

fn denied(actor: &Actor, op: Operation, category: Category) -> Error {
    tracing::debug!(
        actor_id = actor.id,
        op = op.as_str(),
        category = %category,
        "Access denied"
    );
    Error::Unauthorized(format!(
        "Access denied: you may not {} entries in '{}'",
        op.as_str(),
        category
    ))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;

    fn actor(role: Role, categories: &[Category]) -> Actor {
        Actor {
            id: 1,
            email: "actor@example.test".to_string(),
            role,
            allowed_categories: categories.to_vec(),
            allowed_subcategories: HashMap::new(),
        }
    }

    fn actor_with_subs(
        role: Role,
        categories: &[Category],
        category: Category,
        subs: &[&str],
    ) -> Actor {
        let mut a = actor(role, categories);
        a.allowed_subcategories
            .insert(category, subs.iter().map(|s| s.to_string()).collect());
        a
    }

    fn system(category: Category, subcategory: Option<&str>) -> SystemRecord {
        SystemRecord {
            id: 7,
            name: "Test System".to_string(),
            description: None,
            category,
            subcategory: subcategory.map(|s| s.to_string()),
            username: None,
            url: None,
            notes: None,
            created_by: 2,
            created_by_email: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unrestricted_tiers_pass_everything() {
        for role in [Role::UltraAdmin, Role::SuperAdmin] {
            let a = actor(role, &[]);
            for op in [
                Operation::View,
                Operation::Create,
                Operation::Update,
                Operation::Delete,
            ] {
                assert!(authorize(&a, op, Category::Network, Some("firewalls")).is_ok());
            }
        }
    }

    #[test]
    fn test_admin_gated_on_category() {
        let a = actor(Role::Admin, &[Category::Network]);
        assert!(authorize(&a, Operation::Create, Category::Network, None).is_ok());
        assert!(authorize(&a, Operation::Delete, Category::Network, None).is_ok());

        let err = authorize(&a, Operation::Create, Category::Database, None).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_admin_writes_ignore_subcategory_grants() {
        let a = actor_with_subs(
            Role::Admin,
            &[Category::Network],
            Category::Network,
            &["firewalls"],
        );
        // Subcategory restrictions narrow reads, not writes.
        assert!(authorize(&a, Operation::Update, Category::Network, Some("routers")).is_ok());
    }

    #[test]
    fn test_admin_listing_narrowed_by_subcategory() {
        let a = actor_with_subs(
            Role::Admin,
            &[Category::Network],
            Category::Network,
            &["firewalls"],
        );
        assert!(visible_in_listing(&a, &system(Category::Network, Some("firewalls"))));
        assert!(!visible_in_listing(&a, &system(Category::Network, Some("routers"))));
        // Untagged entries stay visible under a subcategory restriction.
        assert!(visible_in_listing(&a, &system(Category::Network, None)));
    }

    #[test]
    fn test_user_is_view_only() {
        let a = actor(Role::User, &[Category::Network]);
        assert!(authorize(&a, Operation::View, Category::Network, None).is_ok());
        for op in [Operation::Create, Operation::Update, Operation::Delete] {
            let err = authorize(&a, op, Category::Network, None).unwrap_err();
            assert!(matches!(err, Error::Unauthorized(_)));
        }
    }

    #[test]
    fn test_user_view_gated_on_category_and_subcategory() {
        let a = actor_with_subs(
            Role::User,
            &[Category::Network],
            Category::Network,
            &["firewalls"],
        );
        assert!(authorize(&a, Operation::View, Category::Network, Some("firewalls")).is_ok());
        assert!(authorize(&a, Operation::View, Category::Network, None).is_ok());
        assert!(authorize(&a, Operation::View, Category::Network, Some("routers")).is_err());
        assert!(authorize(&a, Operation::View, Category::Database, None).is_err());
    }

    #[test]
    fn test_no_subcategory_list_means_whole_category() {
        let a = actor(Role::User, &[Category::Database]);
        assert!(authorize(&a, Operation::View, Category::Database, Some("warehouses")).is_ok());
    }

    #[test]
    fn test_empty_subcategory_list_denies_tagged_entries() {
        let a = actor_with_subs(
            Role::User,
            &[Category::WebSoftware],
            Category::WebSoftware,
            &[],
        );
        // A recorded-but-empty list matches nothing: tagged entries are
        // hidden, untagged entries in the category remain visible.
        assert!(
            authorize(&a, Operation::View, Category::WebSoftware, Some("cms_platforms")).is_err()
        );
        assert!(!visible_in_listing(
            &a,
            &system(Category::WebSoftware, Some("cms_platforms"))
        ));
        assert!(visible_in_listing(&a, &system(Category::WebSoftware, None)));
    }

    #[test]
    fn test_category_change_requires_both_sides() {
        let a = actor(Role::Admin, &[Category::Network]);
        assert!(authorize_category_change(&a, Category::Network, Category::Network).is_ok());
        assert!(authorize_category_change(&a, Category::Network, Category::Database).is_err());
        assert!(authorize_category_change(&a, Category::Database, Category::Network).is_err());

        let b = actor(Role::Admin, &[Category::Network, Category::Database]);
        assert!(authorize_category_change(&b, Category::Network, Category::Database).is_ok());
    }

    #[test]
    fn test_filter_accessible() {
        let a = actor_with_subs(
            Role::User,
            &[Category::Network],
            Category::Network,
            &["firewalls"],
        );
        let all = vec![
            system(Category::Network, Some("firewalls")),
            system(Category::Network, Some("routers")),
            system(Category::Network, None),
            system(Category::Database, None),
        ];
        let visible = filter_accessible(&a, all);
        assert_eq!(visible.len(), 2);
        assert!(visible
            .iter()
            .all(|s| s.category == Category::Network
                && s.subcategory.as_deref() != Some("routers")));
    }
}
