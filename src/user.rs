//! The user table and the pluggable user-property codec (§4.4, §3 "User").

use std::collections::HashMap;

use crate::error::SyncErrorKind;

/// A participant's availability, as carried in the `status` attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserStatus {
    Available,
    Unavailable,
}

impl UserStatus {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            UserStatus::Available => "available",
            UserStatus::Unavailable => "unavailable",
        }
    }

    pub fn from_wire_str(s: &str) -> UserStatus {
        match s {
            "unavailable" => UserStatus::Unavailable,
            // Unknown or missing status defaults to available.
            _ => UserStatus::Available,
        }
    }
}

/// A participant in the session, owned by exactly one [`crate::user::UserTable`].
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub status: UserStatus,
    /// Subclass-defined attributes, opaque to the base protocol.
    pub attributes: Vec<(String, String)>,
}

/// The session's roster: unique-id, unique-name set of participants (§3).
#[derive(Clone, Debug, Default)]
pub struct UserTable {
    users: HashMap<u64, User>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    fn name_taken(&self, name: &str, exclude: Option<u64>) -> bool {
        self.users
            .values()
            .any(|u| u.name == name && Some(u.id) != exclude)
    }

    /// Validate uniqueness of `id` and `name`, optionally excluding one existing user (update
    /// paths, e.g. a user re-announcing themselves with a new status).
    pub fn validate(&self, id: u64, name: &str, exclude: Option<u64>) -> Result<(), SyncErrorKind> {
        if self.users.contains_key(&id) && Some(id) != exclude {
            return Err(SyncErrorKind::IdInUse);
        }
        if self.name_taken(name, exclude) {
            return Err(SyncErrorKind::NameInUse);
        }
        Ok(())
    }

    /// Validate and insert a new user (§4.2 "Content items").
    pub fn add_user(&mut self, user: User) -> Result<(), SyncErrorKind> {
        self.validate(user.id, &user.name, None)?;
        self.users.insert(user.id, user);
        Ok(())
    }
}

/// Decoded form of a `sync-user` element's attribute list, prior to uniqueness validation.
///
/// Decode and validate are kept as separate steps (§4.4): a missing `id`/`name` is
/// `IdNotPresent`/`NameNotPresent` raised by the *caller* at validation time, not by this
/// function, so that a subclass processing additional attributes can still report its own
/// errors for a structurally valid frame.
pub struct DecodedUserProps {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub status: UserStatus,
    /// Attributes not recognised by the base protocol, preserved in encounter order.
    pub extra: Vec<(String, String)>,
}

/// Decode the base protocol's recognised attributes (`id`, `name`, `status`) out of a
/// `sync-user` frame's attribute list; everything else is left for a subclass to interpret.
pub fn decode_user_props(attributes: &[(String, String)]) -> DecodedUserProps {
    let mut id = None;
    let mut name = None;
    let mut status = UserStatus::Available;
    let mut extra = Vec::new();

    for (key, value) in attributes {
        match key.as_str() {
            "id" => id = value.parse::<u64>().ok(),
            "name" => name = Some(value.clone()),
            "status" => status = UserStatus::from_wire_str(value),
            _ => extra.push((key.clone(), value.clone())),
        }
    }

    DecodedUserProps {
        id,
        name,
        status,
        extra,
    }
}

/// Validate a decoded attribute set against the user table, surfacing the required-attribute
/// and uniqueness errors from §4.4, then materialise a [`User`].
pub fn validate_and_build_user(
    props: DecodedUserProps,
    table: &UserTable,
    exclude: Option<u64>,
) -> Result<User, SyncErrorKind> {
    let id = props.id.ok_or(SyncErrorKind::IdNotPresent)?;
    let name = props.name.ok_or(SyncErrorKind::NameNotPresent)?;
    table.validate(id, &name, exclude)?;

    Ok(User {
        id,
        name,
        status: props.status,
        attributes: props.extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
            status: UserStatus::Available,
            attributes: vec![],
        }
    }

    #[test]
    fn rejects_duplicate_id() {
        let mut table = UserTable::new();
        table.add_user(user(1, "Ann")).unwrap();
        assert_eq!(
            table.add_user(user(1, "Bob")).unwrap_err(),
            SyncErrorKind::IdInUse
        );
    }

    #[test]
    fn rejects_duplicate_name() {
        let mut table = UserTable::new();
        table.add_user(user(1, "Ann")).unwrap();
        assert_eq!(
            table.add_user(user(2, "Ann")).unwrap_err(),
            SyncErrorKind::NameInUse
        );
    }

    #[test]
    fn decode_missing_id_is_reported_at_validation() {
        let props = decode_user_props(&[("name".to_string(), "Ann".to_string())]);
        let table = UserTable::new();
        assert_eq!(
            validate_and_build_user(props, &table, None).unwrap_err(),
            SyncErrorKind::IdNotPresent
        );
    }

    #[test]
    fn validate_allows_excluded_user_to_keep_its_own_id_and_name() {
        let mut table = UserTable::new();
        table.add_user(user(1, "Ann")).unwrap();
        assert!(table.validate(1, "Ann", Some(1)).is_ok());
    }
}
