//! Groups, memberships, and the role-authorization rules.
//!
//! A membership row is the join point between a group and a user; messages
//! attribute through it, so it carries the role context at time of sending.
//! The invariants with teeth live here as pure functions so the store only
//! has to count admins transactionally:
//!
//! - hierarchy is admin > mentor > member;
//! - only an admin may grant or revoke admin;
//! - a mentor may grant/revoke mentor and member;
//! - plain members administer nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, invite::InviteCode};

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Member,
  Mentor,
  Admin,
}

impl Role {
  /// The discriminant string stored in the `role` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Member => "member",
      Self::Mentor => "mentor",
      Self::Admin => "admin",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "member" => Ok(Self::Member),
      "mentor" => Ok(Self::Mentor),
      "admin" => Ok(Self::Admin),
      other => Err(Error::UnknownRole(other.to_owned())),
    }
  }

  fn rank(self) -> u8 {
    match self {
      Self::Member => 0,
      Self::Mentor => 1,
      Self::Admin => 2,
    }
  }

  /// May `actor` change a membership from `current` to `target`?
  ///
  /// Anything involving the admin role — granting it or taking it away —
  /// requires an admin actor. The sole-admin guard is separate and
  /// transactional; this function is pure authorization.
  pub fn may_assign(actor: Role, current: Role, target: Role) -> bool {
    if actor == Role::Member {
      return false;
    }
    if target == Role::Admin || current == Role::Admin {
      return actor == Role::Admin;
    }
    // Mentor and admin may both shuffle mentor/member assignments.
    true
  }

  /// May `actor` remove a member holding `target` from the group?
  pub fn may_remove(actor: Role, target: Role) -> bool {
    if actor == Role::Member {
      return false;
    }
    if target == Role::Admin {
      return actor == Role::Admin;
    }
    actor.rank() >= target.rank()
  }
}

impl std::fmt::Display for Role {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Group ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
  pub group_id:    Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub is_public:   bool,
  /// Unique across all groups; regenerable by an admin, at which point the
  /// old code stops resolving.
  pub invite_code: InviteCode,
  pub created_by:  Uuid,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::GroupStore::create_group`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
  pub name:        String,
  pub description: Option<String>,
  #[serde(default)]
  pub is_public:   bool,
}

// ─── Membership ──────────────────────────────────────────────────────────────

/// A (group × user) row. At most one per pair, enforced by a storage-level
/// uniqueness constraint rather than a check-then-insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
  pub membership_id: Uuid,
  pub group_id:      Uuid,
  pub user_id:       Uuid,
  pub role:          Role,
  pub joined_at:     DateTime<Utc>,
}

/// A membership joined with its user, for member listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
  pub membership:   Membership,
  pub email:        String,
  pub display_name: String,
  pub is_active:    bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn role_parse_roundtrip() {
    for role in [Role::Member, Role::Mentor, Role::Admin] {
      assert_eq!(Role::parse(role.as_str()).unwrap(), role);
    }
    assert!(matches!(Role::parse("owner"), Err(Error::UnknownRole(_))));
  }

  #[test]
  fn only_admin_touches_admin() {
    assert!(Role::may_assign(Role::Admin, Role::Member, Role::Admin));
    assert!(Role::may_assign(Role::Admin, Role::Admin, Role::Member));
    assert!(!Role::may_assign(Role::Mentor, Role::Member, Role::Admin));
    assert!(!Role::may_assign(Role::Mentor, Role::Admin, Role::Member));
  }

  #[test]
  fn mentor_manages_mentor_and_member() {
    assert!(Role::may_assign(Role::Mentor, Role::Member, Role::Mentor));
    assert!(Role::may_assign(Role::Mentor, Role::Mentor, Role::Member));
    assert!(Role::may_remove(Role::Mentor, Role::Member));
    assert!(Role::may_remove(Role::Mentor, Role::Mentor));
    assert!(!Role::may_remove(Role::Mentor, Role::Admin));
  }

  #[test]
  fn plain_members_administer_nothing() {
    assert!(!Role::may_assign(Role::Member, Role::Member, Role::Mentor));
    assert!(!Role::may_remove(Role::Member, Role::Member));
  }
}
