//! Builtin fixture module `quade.fixtures`: people.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::types::Kwargs;
use crate::registry::Registry;
use crate::store::{ContentTypes, Model, Session};

pub const MODULE_PATH: &str = "quade.fixtures";

/// A person account created by the people fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl Model for User {
    const TABLE: &'static str = "user";
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersonArgs {
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
    email: Option<String>,
}

impl PersonArgs {
    fn into_user(self, session: &Session<'_>, first: &str, last: &str) -> User {
        let username = self
            .username
            .unwrap_or_else(|| format!("quade_user_{}", session.count::<User>() + 1));
        let email = self
            .email
            .unwrap_or_else(|| format!("{username}@example.com"));
        User {
            first_name: self.first_name.unwrap_or_else(|| first.to_string()),
            last_name: self.last_name.unwrap_or_else(|| last.to_string()),
            username,
            email,
            is_staff: false,
            is_superuser: false,
        }
    }
}

/// Creates a regular user. Defaults to "Jane Doe".
pub fn customer(session: &mut Session<'_>, kwargs: &Kwargs) -> Result<User> {
    let user = kwargs.parse::<PersonArgs>()?.into_user(session, "Jane", "Doe");
    Ok(session.insert(user)?.model)
}

/// Creates a staff user. Defaults to "John Staff".
pub fn staff_user(session: &mut Session<'_>, kwargs: &Kwargs) -> Result<User> {
    let mut user = kwargs
        .parse::<PersonArgs>()?
        .into_user(session, "John", "Staff");
    user.is_staff = true;
    Ok(session.insert(user)?.model)
}

/// Registration function of the module.
pub fn register(registry: &mut Registry) {
    registry.register("customer", customer);
    registry.register("staff_user", staff_user);
}

/// Content types for the objects these fixtures create.
pub fn register_models(types: &mut ContentTypes) {
    types.register::<User>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;

    fn db() -> Database {
        let mut types = ContentTypes::default();
        register_models(&mut types);
        Database::in_memory(types)
    }

    #[test]
    fn customer_defaults_to_jane_doe() {
        let db = db();
        let mut session = db.session().expect("session");
        let user = customer(&mut session, &Kwargs::new()).expect("customer");
        assert_eq!(user.to_string(), "Jane Doe");
        assert_eq!(user.username, "quade_user_1");
        assert_eq!(user.email, "quade_user_1@example.com");
        assert!(!user.is_staff);
    }

    #[test]
    fn staff_user_accepts_name_overrides() {
        let db = db();
        let mut session = db.session().expect("session");
        let kwargs = Kwargs::new()
            .with("first_name", "Baron")
            .with("last_name", "von Count");
        let user = staff_user(&mut session, &kwargs).expect("staff_user");
        assert_eq!(user.to_string(), "Baron von Count");
        assert!(user.is_staff);
        assert_eq!(session.count::<User>(), 1);
    }

    #[test]
    fn unexpected_keyword_argument_is_an_error() {
        let db = db();
        let mut session = db.session().expect("session");
        let kwargs = Kwargs::new().with("nickname", "JD");
        let err = customer(&mut session, &kwargs).unwrap_err();
        assert!(format!("{err:#}").contains("nickname"), "{err:#}");
        assert_eq!(session.count::<User>(), 0);
    }

    #[test]
    fn register_adds_both_people_fixtures() {
        let mut registry = Registry::new();
        register(&mut registry);
        assert_eq!(registry.registered_names(), vec!["customer", "staff_user"]);
    }
}
