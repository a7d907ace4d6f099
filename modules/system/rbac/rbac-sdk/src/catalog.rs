//! Permission catalog.
//!
//! Every resource type the authorizer knows about, together with the actions
//! that may be requested against it. Roles, scopes and allow-lists are
//! validated against this table.

use crate::models::Action;

/// Matches any resource type or any action.
pub const WILDCARD: &str = "*";

/// Resource type names.
pub mod resource {
    pub const WILDCARD: &str = super::WILDCARD;
    pub const API_KEY: &str = "api_key";
    pub const ASSIGN_ORG_ROLE: &str = "assign_org_role";
    pub const ASSIGN_ROLE: &str = "assign_role";
    pub const AUDIT_LOG: &str = "audit_log";
    pub const DEBUG_INFO: &str = "debug_info";
    pub const DEPLOYMENT_CONFIG: &str = "deployment_config";
    pub const DEPLOYMENT_STATS: &str = "deployment_stats";
    pub const FILE: &str = "file";
    pub const GROUP: &str = "group";
    pub const LICENSE: &str = "license";
    pub const OAUTH2_APP: &str = "oauth2_app";
    pub const ORGANIZATION: &str = "organization";
    pub const ORGANIZATION_MEMBER: &str = "organization_member";
    pub const PROVISIONER_DAEMON: &str = "provisioner_daemon";
    pub const REPLICAS: &str = "replicas";
    pub const SYSTEM: &str = "system";
    pub const TAILNET_COORDINATOR: &str = "tailnet_coordinator";
    pub const TEMPLATE: &str = "template";
    pub const USER: &str = "user";
    pub const WORKSPACE: &str = "workspace";
    pub const WORKSPACE_DORMANT: &str = "workspace_dormant";
    pub const WORKSPACE_PROXY: &str = "workspace_proxy";
}

/// One catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDef {
    pub name: &'static str,
    pub actions: &'static [Action],
}

impl ResourceDef {
    /// Whether `action` may be requested against this resource type.
    ///
    /// The wildcard action is valid everywhere, and every action is valid
    /// against the wildcard resource.
    #[must_use]
    pub fn supports(&self, action: &Action) -> bool {
        action.is_wildcard() || self.name == WILDCARD || self.actions.contains(action)
    }
}

const CRUD: &[Action] = &[Action::CREATE, Action::READ, Action::UPDATE, Action::DELETE];

const WORKSPACE_ACTIONS: &[Action] = &[
    Action::CREATE,
    Action::READ,
    Action::UPDATE,
    Action::DELETE,
    Action::SSH,
    Action::APPLICATION_CONNECT,
    Action::START,
    Action::STOP,
];

static RESOURCES: &[ResourceDef] = &[
    ResourceDef {
        name: resource::WILDCARD,
        actions: &[],
    },
    ResourceDef {
        name: resource::API_KEY,
        actions: CRUD,
    },
    ResourceDef {
        name: resource::ASSIGN_ORG_ROLE,
        actions: &[Action::ASSIGN, Action::DELETE, Action::READ],
    },
    ResourceDef {
        name: resource::ASSIGN_ROLE,
        actions: &[Action::ASSIGN, Action::DELETE, Action::READ],
    },
    ResourceDef {
        name: resource::AUDIT_LOG,
        actions: &[Action::CREATE, Action::READ],
    },
    ResourceDef {
        name: resource::DEBUG_INFO,
        actions: &[Action::READ],
    },
    ResourceDef {
        name: resource::DEPLOYMENT_CONFIG,
        actions: &[Action::READ, Action::UPDATE],
    },
    ResourceDef {
        name: resource::DEPLOYMENT_STATS,
        actions: &[Action::READ],
    },
    ResourceDef {
        name: resource::FILE,
        actions: &[Action::CREATE, Action::READ],
    },
    ResourceDef {
        name: resource::GROUP,
        actions: CRUD,
    },
    ResourceDef {
        name: resource::LICENSE,
        actions: &[Action::CREATE, Action::READ, Action::DELETE],
    },
    ResourceDef {
        name: resource::OAUTH2_APP,
        actions: CRUD,
    },
    ResourceDef {
        name: resource::ORGANIZATION,
        actions: CRUD,
    },
    ResourceDef {
        name: resource::ORGANIZATION_MEMBER,
        actions: CRUD,
    },
    ResourceDef {
        name: resource::PROVISIONER_DAEMON,
        actions: CRUD,
    },
    ResourceDef {
        name: resource::REPLICAS,
        actions: &[Action::READ],
    },
    ResourceDef {
        name: resource::SYSTEM,
        actions: CRUD,
    },
    ResourceDef {
        name: resource::TAILNET_COORDINATOR,
        actions: CRUD,
    },
    ResourceDef {
        name: resource::TEMPLATE,
        actions: &[
            Action::CREATE,
            Action::READ,
            Action::UPDATE,
            Action::DELETE,
            Action::VIEW_INSIGHTS,
            Action::USE,
        ],
    },
    ResourceDef {
        name: resource::USER,
        actions: &[
            Action::CREATE,
            Action::READ,
            Action::UPDATE,
            Action::DELETE,
            Action::READ_PERSONAL,
            Action::UPDATE_PERSONAL,
        ],
    },
    ResourceDef {
        name: resource::WORKSPACE,
        actions: WORKSPACE_ACTIONS,
    },
    ResourceDef {
        name: resource::WORKSPACE_DORMANT,
        actions: WORKSPACE_ACTIONS,
    },
    ResourceDef {
        name: resource::WORKSPACE_PROXY,
        actions: CRUD,
    },
];

/// Look up a resource type.
#[must_use]
pub fn resource(name: &str) -> Option<&'static ResourceDef> {
    RESOURCES.iter().find(|r| r.name == name)
}

/// All catalog entries, the wildcard resource first.
#[must_use]
pub fn resources() -> &'static [ResourceDef] {
    RESOURCES
}

/// Concrete resource type names, without the wildcard.
pub fn resource_names() -> impl Iterator<Item = &'static str> {
    RESOURCES
        .iter()
        .map(|r| r.name)
        .filter(|name| *name != WILDCARD)
}

/// Whether `action` is valid against `resource_type`. Unknown types are never valid.
#[must_use]
pub fn is_valid_action(resource_type: &str, action: &Action) -> bool {
    resource(resource_type).is_some_and(|r| r.supports(action))
}

/// Every concrete action mentioned anywhere in the catalog, sorted.
#[must_use]
pub fn all_actions() -> Vec<Action> {
    let mut actions: Vec<Action> = RESOURCES
        .iter()
        .flat_map(|r| r.actions.iter().cloned())
        .collect();
    actions.sort();
    actions.dedup();
    actions
}
