//! Permission scopes
//!
//! A `Scope` describes one Graph permission as listed in the permissions
//! reference. The catalogue is a read-only `static` table; `Scopes` is the
//! set a connection requests during authentication.
//!
//! Two scopes are the same iff their permission strings match
//! (case-insensitively) and they are of the same permission type: delegated
//! `User.Read` and application `User.Read` are distinct grants.

use std::fmt;

use crate::error::{Error, Result};

/// Whether a permission is exercised on behalf of a signed-in user or by the
/// application itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionType {
    Delegated,
    Application,
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionType::Delegated => write!(f, "delegated"),
            PermissionType::Application => write!(f, "application"),
        }
    }
}

/// A named permission descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Scope {
    pub permission: &'static str,
    pub permission_type: PermissionType,
    pub admin_consent_required: bool,
    pub display: &'static str,
    pub description: &'static str,
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.permission_type == other.permission_type
            && self.permission.eq_ignore_ascii_case(other.permission)
    }
}

impl Eq for Scope {}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.permission, self.permission_type)
    }
}

const fn delegated(
    permission: &'static str,
    admin_consent_required: bool,
    display: &'static str,
    description: &'static str,
) -> Scope {
    Scope {
        permission,
        permission_type: PermissionType::Delegated,
        admin_consent_required,
        display,
        description,
    }
}

const fn application(
    permission: &'static str,
    display: &'static str,
    description: &'static str,
) -> Scope {
    Scope {
        permission,
        permission_type: PermissionType::Application,
        admin_consent_required: true,
        display,
        description,
    }
}

// OpenID Connect

pub const DELEGATED_EMAIL: Scope = delegated(
    "email",
    false,
    "View users' email address",
    "Allows the app to read your users' primary email address.",
);
pub const DELEGATED_OFFLINE_ACCESS: Scope = delegated(
    "offline_access",
    false,
    "Access user's data anytime",
    "Allows the app to read and update user data, even when they are not currently using the app.",
);
pub const DELEGATED_OPENID: Scope = delegated(
    "openid",
    false,
    "Sign users in",
    "Allows users to sign in to the app with their work or school accounts and allows the app to see basic user profile information.",
);
pub const DELEGATED_PROFILE: Scope = delegated(
    "profile",
    false,
    "View users' basic profile",
    "Allows the app to see your users' basic profile (name, picture, user name).",
);

// Users

pub const DELEGATED_USER_READ: Scope = delegated(
    "User.Read",
    false,
    "Sign-in and read user profile",
    "Allows users to sign-in to the app, and allows the app to read the profile of signed-in users.",
);
pub const DELEGATED_USER_READ_WRITE: Scope = delegated(
    "User.ReadWrite",
    false,
    "Read and write access to user profile",
    "Allows the app to read your profile and update your profile information on your behalf.",
);
pub const DELEGATED_USER_READ_BASIC_ALL: Scope = delegated(
    "User.ReadBasic.All",
    false,
    "Read all users' basic profiles",
    "Allows the app to read a basic set of profile properties of other users in your organization on behalf of the signed-in user.",
);
pub const DELEGATED_USER_READ_ALL: Scope = delegated(
    "User.Read.All",
    true,
    "Read all users' full profiles",
    "Allows the app to read the full set of profile properties, reports, and managers of other users in your organization, on behalf of the signed-in user.",
);
pub const DELEGATED_USER_READ_WRITE_ALL: Scope = delegated(
    "User.ReadWrite.All",
    true,
    "Read and write all users' full profiles",
    "Allows the app to read and write the full set of profile properties, reports, and managers of other users in your organization, on behalf of the signed-in user.",
);
pub const APPLICATION_USER_READ_ALL: Scope = application(
    "User.Read.All",
    "Read all users' full profiles",
    "Allows the app to read the full set of profile properties, group membership, reports and managers of other users in your organization, without a signed-in user.",
);
pub const APPLICATION_USER_READ_WRITE_ALL: Scope = application(
    "User.ReadWrite.All",
    "Read and write all users' full profiles",
    "Allows the app to read and write the full set of profile properties, group membership, reports and managers of other users in your organization, without a signed-in user.",
);
pub const APPLICATION_USER_INVITE_ALL: Scope = application(
    "User.Invite.All",
    "Invite guest users to the organization",
    "Allows the app to invite guest users to your organization, without a signed-in user.",
);

// Directory

pub const DELEGATED_DIRECTORY_READ_ALL: Scope = delegated(
    "Directory.Read.All",
    true,
    "Read directory data",
    "Allows the app to read data in your organization's directory, such as users, groups and apps.",
);
pub const DELEGATED_DIRECTORY_READ_WRITE_ALL: Scope = delegated(
    "Directory.ReadWrite.All",
    true,
    "Read and write directory data",
    "Allows the app to read and write data in your organization's directory, such as users, and groups.",
);
pub const DELEGATED_DIRECTORY_ACCESS_AS_USER_ALL: Scope = delegated(
    "Directory.AccessAsUser.All",
    true,
    "Access directory as the signed-in user",
    "Allows the app to have the same access to information in the directory as the signed-in user.",
);
pub const APPLICATION_DIRECTORY_READ_ALL: Scope = application(
    "Directory.Read.All",
    "Read directory data",
    "Allows the app to read data in your organization's directory, such as users, groups and apps, without a signed-in user.",
);
pub const APPLICATION_DIRECTORY_READ_WRITE_ALL: Scope = application(
    "Directory.ReadWrite.All",
    "Read and write directory data",
    "Allows the app to read and write data in your organization's directory, such as users, and groups, without a signed-in user.",
);

// Mail

pub const DELEGATED_MAILBOX_SETTINGS_READ: Scope = delegated(
    "MailboxSettings.Read",
    false,
    "Read user mailbox settings",
    "Allows the app to read the user's mailbox settings.",
);
pub const APPLICATION_MAILBOX_SETTINGS_READ: Scope = application(
    "MailboxSettings.Read",
    "Read all user mailbox settings",
    "Allows the app to read user's mailbox settings without a signed-in user.",
);

/// Every catalogued scope. Built at compile time, never mutated.
pub static CATALOGUE: &[Scope] = &[
    DELEGATED_EMAIL,
    DELEGATED_OFFLINE_ACCESS,
    DELEGATED_OPENID,
    DELEGATED_PROFILE,
    DELEGATED_USER_READ,
    DELEGATED_USER_READ_WRITE,
    DELEGATED_USER_READ_BASIC_ALL,
    DELEGATED_USER_READ_ALL,
    DELEGATED_USER_READ_WRITE_ALL,
    APPLICATION_USER_READ_ALL,
    APPLICATION_USER_READ_WRITE_ALL,
    APPLICATION_USER_INVITE_ALL,
    DELEGATED_DIRECTORY_READ_ALL,
    DELEGATED_DIRECTORY_READ_WRITE_ALL,
    DELEGATED_DIRECTORY_ACCESS_AS_USER_ALL,
    APPLICATION_DIRECTORY_READ_ALL,
    APPLICATION_DIRECTORY_READ_WRITE_ALL,
    DELEGATED_MAILBOX_SETTINGS_READ,
    APPLICATION_MAILBOX_SETTINGS_READ,
];

/// Find a catalogued scope by permission string (case-insensitive) and type.
pub fn lookup(permission: &str, permission_type: PermissionType) -> Option<&'static Scope> {
    CATALOGUE.iter().find(|scope| {
        scope.permission_type == permission_type
            && scope.permission.eq_ignore_ascii_case(permission)
    })
}

/// Every catalogued scope of the given type.
pub fn all(permission_type: PermissionType) -> Scopes {
    CATALOGUE
        .iter()
        .filter(|scope| scope.permission_type == permission_type)
        .copied()
        .collect()
}

/// Unordered set of requested scopes. Insertion order only affects
/// `query_string`.
#[derive(Debug, Clone, Default)]
pub struct Scopes(Vec<Scope>);

impl PartialEq for Scopes {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|scope| other.has_scope(scope))
    }
}

impl Eq for Scopes {}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve permission strings from configuration against the catalogue.
    pub fn parse<S: AsRef<str>>(permissions: &[S], permission_type: PermissionType) -> Result<Self> {
        permissions
            .iter()
            .map(|permission| {
                let permission = permission.as_ref();
                lookup(permission, permission_type).copied().ok_or_else(|| {
                    Error::Config(format!("unknown {permission_type} scope: {permission}"))
                })
            })
            .collect()
    }

    /// Add a scope; a scope already present is not duplicated.
    pub fn insert(&mut self, scope: Scope) {
        if !self.has_scope(&scope) {
            self.0.push(scope);
        }
    }

    /// Membership by (permission, type).
    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.0.iter().any(|held| held == scope)
    }

    /// True when refresh tokens are expected from the token endpoint.
    pub fn has_offline_access(&self) -> bool {
        self.has_scope(&DELEGATED_OFFLINE_ACCESS)
    }

    /// Space-separated permission list, as the `scope` form field expects.
    pub fn query_string(&self) -> String {
        self.0
            .iter()
            .map(|scope| scope.permission)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Scope> for Scopes {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        let mut scopes = Scopes::new();
        for scope in iter {
            scopes.insert(scope);
        }
        scopes
    }
}
