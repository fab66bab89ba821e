use std::fmt;
use std::str::FromStr;

use crate::auth::{Role, Session};

/// Walled-off part of the app's screen space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Auth,
    DriverHome,
    ShipperHome,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Auth, Section::DriverHome, Section::ShipperHome];

    /// Route name used by the navigation layer.
    pub fn name(&self) -> &'static str {
        match self {
            Section::Auth => "auth",
            Section::DriverHome => "driverHome",
            Section::ShipperHome => "shipperHome",
        }
    }

    /// Home section for a role.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Driver => Section::DriverHome,
            Role::Shipper => Section::ShipperHome,
        }
    }

    /// Role a section is reserved for; the entry section has none.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Section::Auth => None,
            Section::DriverHome => Some(Role::Driver),
            Section::ShipperHome => Some(Role::Shipper),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown section: {} (expected auth, driverHome or shipperHome)", s))
    }
}

/// What a mounted section should do with the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Render,
    RedirectTo(Section),
    ShowLoading,
}

/// Decide what `section` does for `session`.
pub fn evaluate(section: Section, session: &Session) -> Decision {
    match section.required_role() {
        None => evaluate_entry(session),
        Some(required) => evaluate_gated(required, session),
    }
}

fn evaluate_gated(required: Role, session: &Session) -> Decision {
    match session {
        Session::Checking => Decision::ShowLoading,
        Session::Unauthenticated => Decision::RedirectTo(Section::Auth),
        // Never redirect before the role is known, or the user bounces between sections
        Session::AuthenticatedPendingRole => Decision::ShowLoading,
        Session::AuthenticatedWithRole { role, .. } if *role != required => {
            Decision::RedirectTo(Section::for_role(*role))
        }
        Session::AuthenticatedWithRole { .. } => Decision::Render,
    }
}

fn evaluate_entry(session: &Session) -> Decision {
    match session {
        Session::Checking | Session::AuthenticatedPendingRole => Decision::ShowLoading,
        Session::Unauthenticated => Decision::Render,
        Session::AuthenticatedWithRole { role, .. } => Decision::RedirectTo(Section::for_role(*role)),
    }
}
