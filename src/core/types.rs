//! LM-001: Core types — verbs, resource kinds, function units, roles, nodes.
//!
//! Defines the YAML schema types for `lamina.yaml` alongside the in-memory
//! model the compiler works on. Config types derive Serialize/Deserialize and
//! JsonSchema so `lamina schema` can describe them.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Top-level lamina.yaml
// ============================================================================

/// Root configuration — the functions and stores of one service.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LaminaConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-supplied service name (stack name is derived from it)
    pub service: String,

    /// Optional template description
    #[serde(default)]
    pub description: Option<String>,

    /// Stack scope token (user or environment); falls back to $USER
    #[serde(default)]
    pub scope: Option<String>,

    /// Fixed build identifier; defaults to a digest of the config text
    #[serde(default)]
    pub build_id: Option<String>,

    /// Backing stores, injected by the store decorator
    #[serde(default)]
    pub stores: IndexMap<String, StoreDecl>,

    /// Trigger verb → handler (order-preserving)
    #[serde(default)]
    pub functions: IndexMap<Verb, FunctionDecl>,
}

/// A backing store declaration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreDecl {
    /// Store kind (table, bucket, queue, stream, topic)
    pub kind: ResourceKind,

    /// Kind-specific properties, emitted unchanged
    #[serde(default)]
    pub properties: serde_json::Value,

    /// Other logical ids this store requires first
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A handler bound to a trigger verb.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionDecl {
    /// Opaque handler reference (e.g. `hello_world::get`)
    pub handler: String,

    /// Memory size in MB
    #[serde(default = "default_memory")]
    pub memory: u32,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u32,

    /// Stores this function accesses (privilege targets + dependencies)
    #[serde(default)]
    pub uses: Vec<String>,

    /// Verbs to grant on `uses` targets; defaults to the trigger verb
    #[serde(default)]
    pub verbs: Vec<Verb>,

    /// Extra logical ids required before this function
    #[serde(default)]
    pub depends_on: Vec<String>,
}

fn default_memory() -> u32 {
    ResourceLimits::default().memory_mb
}

fn default_timeout() -> u32 {
    ResourceLimits::default().timeout_secs
}

// ============================================================================
// Vocabulary
// ============================================================================

/// Operation verb used to select permissions.
///
/// Serialized upper-case; parsed case-insensitively through [`FromStr`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// Every verb, in declaration order.
    pub const ALL: [Verb; 6] = [
        Verb::Get,
        Verb::Head,
        Verb::Post,
        Verb::Put,
        Verb::Patch,
        Verb::Delete,
    ];
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Head => write!(f, "HEAD"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Patch => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|v| v.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown verb: {}", s))
    }
}

impl TryFrom<String> for Verb {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Resource kind — the fixed vocabulary of emitted resource types.
///
/// In YAML a kind is a plain string: one of the lower-case built-in names, or
/// a provider type such as `Custom::Seeder`, which becomes [`Self::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceKind {
    Function,
    Role,
    Table,
    Bucket,
    Queue,
    Stream,
    Topic,
    /// Any other provider type, carried opaquely (e.g. `Custom::Seeder`)
    Custom(String),
}

impl ResourceKind {
    /// Provider type name in the emitted template.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Function => "AWS::Lambda::Function",
            Self::Role => "AWS::IAM::Role",
            Self::Table => "AWS::DynamoDB::Table",
            Self::Bucket => "AWS::S3::Bucket",
            Self::Queue => "AWS::SQS::Queue",
            Self::Stream => "AWS::Kinesis::Stream",
            Self::Topic => "AWS::SNS::Topic",
            Self::Custom(t) => t,
        }
    }

    /// Whether this kind may be declared under `stores:`.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Self::Table | Self::Bucket | Self::Queue | Self::Stream | Self::Topic
        )
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s {
            "function" => Self::Function,
            "role" => Self::Role,
            "table" => Self::Table,
            "bucket" => Self::Bucket,
            "queue" => Self::Queue,
            "stream" => Self::Stream,
            "topic" => Self::Topic,
            _ if s.contains("::") => Self::Custom(s.to_string()),
            _ => {
                return Err(format!(
                    "unknown resource kind: {} (expected a built-in kind or a Provider::Type name)",
                    s
                ))
            }
        })
    }
}

impl TryFrom<String> for ResourceKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.to_string()
    }
}

impl JsonSchema for ResourceKind {
    fn schema_name() -> String {
        "ResourceKind".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = String::json_schema(gen).into_object();
        schema.metadata().description = Some(
            "function, role, table, bucket, queue, stream, topic, or a Provider::Type name"
                .to_string(),
        );
        schema.into()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Role => write!(f, "role"),
            Self::Table => write!(f, "table"),
            Self::Bucket => write!(f, "bucket"),
            Self::Queue => write!(f, "queue"),
            Self::Stream => write!(f, "stream"),
            Self::Topic => write!(f, "topic"),
            Self::Custom(t) => write!(f, "{}", t),
        }
    }
}

// ============================================================================
// Function units
// ============================================================================

/// Opaque reference to user handler code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerRef(String);

impl HandlerRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Memory/timeout limits, passed through to the artifact uninterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub memory_mb: u32,
    pub timeout_secs: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: 128,
            timeout_secs: 10,
        }
    }
}

/// A resource a function is granted access to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetRef {
    pub logical_id: String,
    pub kind: ResourceKind,
}

impl TargetRef {
    pub fn new(logical_id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
        }
    }
}

/// Requested access: a target and the verbs the function performs on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    pub target: TargetRef,
    pub verbs: Vec<Verb>,
}

/// One deployable compute unit, declared per handler.
#[derive(Debug, Clone)]
pub struct FunctionUnit {
    pub trigger: Verb,
    pub handler: HandlerRef,
    pub limits: ResourceLimits,
    pub access: Vec<Access>,
    pub depends_on: Vec<String>,
    pub(crate) role: RoleDefinition,
}

impl FunctionUnit {
    pub fn new(trigger: Verb, handler: HandlerRef) -> Self {
        Self {
            trigger,
            handler,
            limits: ResourceLimits::default(),
            access: Vec::new(),
            depends_on: Vec::new(),
            role: RoleDefinition::default(),
        }
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Grant `verbs` on `target` without adding a dependency edge.
    pub fn with_access(mut self, target: TargetRef, verbs: impl IntoIterator<Item = Verb>) -> Self {
        self.access.push(Access {
            target,
            verbs: verbs.into_iter().collect(),
        });
        self
    }

    /// Grant `verbs` on `target` and require it to exist first.
    pub fn uses(self, target: TargetRef, verbs: impl IntoIterator<Item = Verb>) -> Self {
        let id = target.logical_id.clone();
        self.with_access(target, verbs).depends_on(id)
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// The synthesized role (empty until the compiler runs synthesis).
    pub fn role(&self) -> &RoleDefinition {
        &self.role
    }
}

// ============================================================================
// Roles
// ============================================================================

/// A target plus the deduplicated, ordered permissions granted on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Privilege {
    pub target: TargetRef,
    pub permissions: Vec<String>,
}

/// The privileges of exactly one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDefinition {
    pub(crate) privileges: Vec<Privilege>,
}

impl RoleDefinition {
    pub fn privileges(&self) -> &[Privilege] {
        &self.privileges
    }

    pub fn is_empty(&self) -> bool {
        self.privileges.is_empty()
    }

    /// Permissions granted on a target, if any.
    pub fn permissions_for(&self, logical_id: &str) -> Option<&[String]> {
        self.privileges
            .iter()
            .find(|p| p.target.logical_id == logical_id)
            .map(|p| p.permissions.as_slice())
    }
}

// ============================================================================
// Resource nodes
// ============================================================================

/// A logical resource in the template graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNode {
    pub id: String,
    pub kind: ResourceKind,
    pub properties: serde_json::Value,
    pub depends_on: Vec<String>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            properties: serde_json::Value::Object(serde_json::Map::new()),
            depends_on: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Change to a resource between two emitted artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Destroy,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Destroy => write!(f, "DESTROY"),
            Self::NoOp => write!(f, "NO-OP"),
        }
    }
}

/// A single planned change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    /// Logical id
    pub resource_id: String,

    /// Provider type name
    pub resource_type: String,

    /// Action to take
    pub action: PlanAction,
}

/// Diff of a freshly compiled template against the last artifact.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// Stack name
    pub stack: String,

    /// Changes in emission order, destroys last
    pub changes: Vec<PlannedChange>,

    /// Summary counts
    pub to_create: u32,
    pub to_update: u32,
    pub to_destroy: u32,
    pub unchanged: u32,
}

impl DeploymentPlan {
    pub fn has_changes(&self) -> bool {
        self.to_create + self.to_update + self.to_destroy > 0
    }
}

// ============================================================================
// Tests
// ============================================================================
