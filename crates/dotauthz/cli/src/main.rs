// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! dotauthz CLI Tool
//!
//! Command-line interface over an authorization state file: define contexts
//! and roles, assign them, and check permissions.

mod config;

use anyhow::{Context as _, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use config::CliConfig;
use dotauthz_core::{
    AccessDecision, AssignmentId, AuditEventType, AuthzSystem, ConditionSpec, ConditionType, Context, ContextId, DecisionReason, NewAssignment, NewCustomRole, PermissionSet, RoleId, RoleType, RoleUpdate, RuntimeContext, Snapshot, SystemRole,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dotauthz")]
#[command(about = "dotauthz - Hierarchical authorization CLI")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// State file holding the authorization snapshot (JSON)
    #[arg(long, short = 's', global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Context selection shared by several commands
#[derive(clap::Args, Debug, Clone, Default)]
struct Scope {
    /// Organization ID (omit for the system context)
    #[arg(long)]
    org: Option<String>,

    /// Project ID (requires --org)
    #[arg(long, requires = "org")]
    project: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Get or create a context
    Context {
        #[command(flatten)]
        scope: Scope,
    },
    /// Show the ancestor chain of a context
    Hierarchy {
        /// Context ID
        context_id: u64,
    },
    /// List the built-in system roles
    SystemRoles,
    /// Create a custom role in an organization
    CreateRole {
        /// Organization ID
        org: String,
        /// Role name
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Fully qualified grant, e.g. billing.view or materials.*
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Module grants as module=action,action
        #[arg(long = "module")]
        modules: Vec<String>,
        /// Interface the role may open
        #[arg(long = "interface")]
        interfaces: Vec<String>,
        /// Condition attached to every assignment, as type=json
        #[arg(long = "condition")]
        conditions: Vec<String>,
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Update a custom role; the slug never changes
    UpdateRole {
        /// Organization ID
        org: String,
        /// Role slug
        slug: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Replaces the system grants when given
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Replaces the module grants when given
        #[arg(long = "module")]
        modules: Vec<String>,
        /// Replaces the interface list when given
        #[arg(long = "interface")]
        interfaces: Vec<String>,
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Deactivate a custom role and all of its assignments
    DeactivateRole {
        /// Organization ID
        org: String,
        /// Role slug
        slug: String,
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Copy a custom role into another organization
    CloneRole {
        /// Source organization ID
        org: String,
        /// Role slug
        slug: String,
        /// Target organization ID
        target_org: String,
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// List the custom roles of an organization
    Roles {
        /// Organization ID
        org: String,
        /// Include deactivated roles
        #[arg(long)]
        all: bool,
    },
    /// Show the flattened grants of a role
    Permissions {
        /// Role slug
        role: String,
        /// Owning organization, for custom roles
        #[arg(long)]
        org: Option<String>,
        /// Treat the slug as a custom role
        #[arg(long)]
        custom: bool,
    },
    /// Assign a role to a user in a context
    Assign {
        /// User ID
        user: String,
        /// Role slug
        role: String,
        #[command(flatten)]
        scope: Scope,
        /// Treat the slug as a custom role
        #[arg(long)]
        custom: bool,
        /// Expiry (RFC 3339)
        #[arg(long)]
        expires: Option<DateTime<Utc>>,
        #[arg(long)]
        by: Option<String>,
    },
    /// Revoke an assignment
    Revoke {
        /// Assignment ID
        assignment_id: u64,
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Move the expiry of an assignment
    Extend {
        /// Assignment ID
        assignment_id: u64,
        /// New expiry (RFC 3339)
        expires: DateTime<Utc>,
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Attach a condition to an assignment
    AddCondition {
        /// Assignment ID
        assignment_id: u64,
        /// time, location, budget, project_count or custom
        condition_type: String,
        /// Condition data (JSON)
        data: String,
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Check whether a user holds a permission in a context
    Check {
        /// User ID
        user: String,
        /// Permission, e.g. materials.view
        permission: String,
        #[command(flatten)]
        scope: Scope,
        /// Caller IP address
        #[arg(long)]
        ip: Option<IpAddr>,
        /// Caller region
        #[arg(long)]
        region: Option<String>,
        /// Requested amount
        #[arg(long)]
        amount: Option<f64>,
        /// Evaluation instant (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Print the full decision
        #[arg(long)]
        explain: bool,
    },
    /// Check whether a user holds a role on the chain of a context
    HasRole {
        /// User ID
        user: String,
        /// Role slug
        role: String,
        #[command(flatten)]
        scope: Scope,
    },
    /// Show the audit trail
    Audit {
        /// Only events where this user is actor or target
        #[arg(long)]
        user: Option<String>,
        /// Only events of this type
        #[arg(long)]
        event_type: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Print statistics instead of events
        #[arg(long)]
        stats: bool,
    },
}

impl Commands {
    /// Whether the command changes the state file
    fn writes_state(&self) -> bool {
        !matches!(
            self,
            Commands::Hierarchy { .. } | Commands::SystemRoles | Commands::Roles { .. } | Commands::Permissions { .. } | Commands::HasRole { .. } | Commands::Audit { .. }
        )
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = CliConfig::resolve_config(cli.config, cli.state)?;
    let snapshot = Snapshot::load_or_default(&config.state_file).with_context(|| format!("loading state from {}", config.state_file.display()))?;
    let system = AuthzSystem::from_snapshot(config.authz.clone(), snapshot)?;

    let writes_state = cli.command.writes_state();

    match cli.command {
        Commands::Context { scope } => handle_context(&system, &scope)?,
        Commands::Hierarchy { context_id } => handle_hierarchy(&system, context_id)?,
        Commands::SystemRoles => handle_system_roles()?,
        Commands::CreateRole {
            org,
            name,
            description,
            permissions,
            modules,
            interfaces,
            conditions,
            by,
        } => {
            let mut input = NewCustomRole::new(org, name, by);
            input.description = description;
            input.system_permissions = permissions.into_iter().collect();
            input.module_permissions = parse_modules(&modules)?;
            input.interface_access = interfaces.into_iter().collect();
            input.conditions_template = conditions.iter().map(|condition| parse_condition(condition)).collect::<Result<_>>()?;
            handle_create_role(&system, input)?
        }
        Commands::UpdateRole {
            org,
            slug,
            name,
            description,
            permissions,
            modules,
            interfaces,
            by,
        } => {
            let update = RoleUpdate {
                name,
                description: description.map(Some),
                system_permissions: (!permissions.is_empty()).then(|| permissions.into_iter().collect()),
                module_permissions: if modules.is_empty() { None } else { Some(parse_modules(&modules)?) },
                interface_access: (!interfaces.is_empty()).then(|| interfaces.into_iter().collect()),
                conditions_template: None,
            };
            handle_update_role(&system, &org, &slug, update, &by)?
        }
        Commands::DeactivateRole { org, slug, by } => handle_deactivate_role(&system, &org, &slug, &by)?,
        Commands::CloneRole { org, slug, target_org, by } => handle_clone_role(&system, &org, &slug, &target_org, &by)?,
        Commands::Roles { org, all } => handle_roles(&system, &org, all)?,
        Commands::Permissions { role, org, custom } => handle_permissions(&system, &role, org.as_deref(), custom)?,
        Commands::Assign {
            user,
            role,
            scope,
            custom,
            expires,
            by,
        } => handle_assign(&system, &user, &role, &scope, custom, expires, by)?,
        Commands::Revoke { assignment_id, by } => handle_revoke(&system, assignment_id, &by)?,
        Commands::Extend { assignment_id, expires, by } => handle_extend(&system, assignment_id, expires, &by)?,
        Commands::AddCondition {
            assignment_id,
            condition_type,
            data,
            by,
        } => handle_add_condition(&system, assignment_id, &condition_type, &data, &by)?,
        Commands::Check {
            user,
            permission,
            scope,
            ip,
            region,
            amount,
            at,
            explain,
        } => {
            let mut runtime = RuntimeContext::at(at.unwrap_or_else(Utc::now));
            runtime.client_ip = ip;
            runtime.region = region;
            runtime.amount = amount;
            handle_check(&system, &user, &permission, &scope, &runtime, explain)?
        }
        Commands::HasRole { user, role, scope } => handle_has_role(&system, &user, &role, &scope)?,
        Commands::Audit { user, event_type, limit, stats } => handle_audit(&system, user.as_deref(), event_type.as_deref(), limit, stats)?,
    }

    if writes_state {
        system.snapshot().save(&config.state_file).with_context(|| format!("saving state to {}", config.state_file.display()))?;
        info!(state_file = %config.state_file.display(), "State saved");
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Get or create the context a scope names
fn scope_context(system: &AuthzSystem, scope: &Scope) -> Result<Context> {
    let context = match (scope.org.as_deref(), scope.project.as_deref()) {
        (None, None) => system.get_system_context(),
        (Some(org), None) => system.get_organization_context(org)?,
        (Some(org), Some(project)) => system.get_project_context(project, org)?,
        (None, Some(_)) => bail!("--project requires --org"),
    };
    Ok(context)
}

/// Find the context a scope names without creating it
fn find_scope_context(system: &AuthzSystem, scope: &Scope) -> Result<Option<Context>> {
    let context = match (scope.org.as_deref(), scope.project.as_deref()) {
        (None, None) => system.find_system_context(),
        (Some(org), None) => system.find_organization_context(org),
        (Some(org), Some(project)) => system.find_project_context(project, org),
        (None, Some(_)) => bail!("--project requires --org"),
    };
    Ok(context)
}

fn find_role_id(system: &AuthzSystem, org: &str, slug: &str) -> Result<RoleId> {
    system.find_role(org, slug).map(|role| role.id).ok_or_else(|| anyhow!("no custom role '{}' in organization {}", slug, org))
}

/// Parse `module=action,action` grants
fn parse_modules(specs: &[String]) -> Result<BTreeMap<String, PermissionSet>> {
    let mut modules: BTreeMap<String, PermissionSet> = BTreeMap::new();

    for spec in specs {
        let (module, actions) = spec.split_once('=').ok_or_else(|| anyhow!("module grant '{}' is not module=action,action", spec))?;
        let module = module.trim();
        if module.is_empty() {
            bail!("module grant '{}' has no module name", spec);
        }

        let entry = modules.entry(module.to_string()).or_default();
        for action in actions.split(',').map(str::trim).filter(|action| !action.is_empty()) {
            entry.insert(action);
        }
    }

    Ok(modules)
}

/// Parse a `type=json` condition
fn parse_condition(spec: &str) -> Result<ConditionSpec> {
    let (condition_type, data) = spec.split_once('=').ok_or_else(|| anyhow!("condition '{}' is not type=json", spec))?;
    let condition_type: ConditionType = condition_type.trim().parse()?;
    let data: Value = serde_json::from_str(data).with_context(|| format!("condition data for {}", condition_type))?;
    Ok(ConditionSpec::new(condition_type, data))
}

fn handle_context(system: &AuthzSystem, scope: &Scope) -> Result<()> {
    let context = scope_context(system, scope)?;
    print_json(&context)
}

fn handle_hierarchy(system: &AuthzSystem, context_id: u64) -> Result<()> {
    let chain = system.get_hierarchy(ContextId(context_id));
    if chain.is_empty() {
        bail!("context {} not found", context_id);
    }

    for context in chain {
        println!("{}\t{}\t{}", context.id, context.context_type, context.resource_id.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn handle_system_roles() -> Result<()> {
    for role in SystemRole::ALL {
        println!("{}\t{}\t{}", role.slug(), role.name(), role.permissions().join(","));
    }
    Ok(())
}

fn handle_create_role(system: &AuthzSystem, input: NewCustomRole) -> Result<()> {
    let role = system.create_role(input)?;
    println!("Role created with slug: {}", role.slug);
    Ok(())
}

fn handle_update_role(system: &AuthzSystem, org: &str, slug: &str, update: RoleUpdate, by: &str) -> Result<()> {
    if update.is_empty() {
        bail!("nothing to update");
    }

    let role = system.update_role(find_role_id(system, org, slug)?, update, by)?;
    print_json(&role)
}

fn handle_deactivate_role(system: &AuthzSystem, org: &str, slug: &str, by: &str) -> Result<()> {
    let outcome = system.deactivate_role(find_role_id(system, org, slug)?, by)?;
    println!("Role {} deactivated; {} assignment(s) deactivated", outcome.role.slug, outcome.assignments_deactivated.len());
    Ok(())
}

fn handle_clone_role(system: &AuthzSystem, org: &str, slug: &str, target_org: &str, by: &str) -> Result<()> {
    let clone = system.clone_role(find_role_id(system, org, slug)?, target_org, by)?;
    println!("Role cloned into organization {} with slug: {}", clone.organization_id, clone.slug);
    Ok(())
}

fn handle_roles(system: &AuthzSystem, org: &str, include_inactive: bool) -> Result<()> {
    for role in system.list_roles(org, include_inactive) {
        let status = if role.is_active { "active" } else { "inactive" };
        println!("{}\t{}\t{}", role.slug, role.name, status);
    }
    Ok(())
}

fn handle_permissions(system: &AuthzSystem, role: &str, org: Option<&str>, custom: bool) -> Result<()> {
    let role_type = if custom { RoleType::Custom } else { RoleType::System };
    for permission in system.role_permissions(role_type, role, org)? {
        println!("{}", permission);
    }
    Ok(())
}

fn handle_assign(system: &AuthzSystem, user: &str, role: &str, scope: &Scope, custom: bool, expires: Option<DateTime<Utc>>, by: Option<String>) -> Result<()> {
    let context = scope_context(system, scope)?;
    let role_type = if custom { RoleType::Custom } else { RoleType::System };

    let mut input = NewAssignment::new(user, role, role_type, context.id);
    input.assigned_by = by;
    input.expires_at = expires;

    let assignment = system.assign_role(input)?;
    println!("Assignment created with ID: {}", assignment.id);
    Ok(())
}

fn handle_revoke(system: &AuthzSystem, assignment_id: u64, by: &str) -> Result<()> {
    let assignment = system.revoke_assignment(AssignmentId(assignment_id), by)?;
    println!("Assignment {} revoked", assignment.id);
    Ok(())
}

fn handle_extend(system: &AuthzSystem, assignment_id: u64, expires: DateTime<Utc>, by: &str) -> Result<()> {
    let assignment = system.extend_assignment(AssignmentId(assignment_id), expires, by)?;
    println!("Assignment {} now expires at {}", assignment.id, expires.to_rfc3339());
    Ok(())
}

fn handle_add_condition(system: &AuthzSystem, assignment_id: u64, condition_type: &str, data: &str, by: &str) -> Result<()> {
    let condition_type: ConditionType = condition_type.parse()?;
    let data: Value = serde_json::from_str(data).context("condition data")?;

    let condition = system.attach_condition(AssignmentId(assignment_id), ConditionSpec::new(condition_type, data), by)?;
    println!("Condition attached with ID: {}", condition.id);
    Ok(())
}

fn handle_check(system: &AuthzSystem, user: &str, permission: &str, scope: &Scope, runtime: &RuntimeContext, explain: bool) -> Result<()> {
    let decision = match find_scope_context(system, scope)? {
        Some(context) => system.explain(user, permission, context.id, Some(runtime)),
        None => AccessDecision {
            allowed: false,
            reason: DecisionReason::UnknownContext,
            granted_by: None,
            role_slug: None,
            assignments_considered: 0,
        },
    };

    if explain {
        print_json(&decision)?;
    } else {
        println!("{}", if decision.allowed { "allowed" } else { "denied" });
    }
    Ok(())
}

fn handle_has_role(system: &AuthzSystem, user: &str, role: &str, scope: &Scope) -> Result<()> {
    let has_role = find_scope_context(system, scope)?.is_some_and(|context| system.has_role(user, role, context.id));
    println!("{}", has_role);
    Ok(())
}

fn handle_audit(system: &AuthzSystem, user: Option<&str>, event_type: Option<&str>, limit: usize, stats: bool) -> Result<()> {
    let logger = system.audit_logger();

    if stats {
        let statistics = logger.get_statistics();
        println!("total: {}", statistics.total_events);
        println!("successful: {}", statistics.successful_events);
        println!("failed: {}", statistics.failed_events);
        println!("denied: {}", statistics.denied_events);

        let by_type: BTreeSet<(AuditEventType, usize)> = statistics.events_by_type.into_iter().collect();
        for (event_type, count) in by_type {
            println!("{}: {}", event_type, count);
        }
        return Ok(());
    }

    let events = match (user, event_type) {
        (Some(user), None) => logger.get_user_events(user, Some(limit)),
        (None, Some(event_type)) => logger.get_events_by_type(event_type.parse()?, Some(limit)),
        (Some(user), Some(event_type)) => {
            let event_type: AuditEventType = event_type.parse()?;
            logger.get_user_events(user, None).into_iter().filter(|event| event.event_type == event_type).take(limit).collect()
        }
        (None, None) => logger.get_events(Some(limit)),
    };

    print_json(&events)
}
