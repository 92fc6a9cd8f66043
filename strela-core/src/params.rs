//! Query parameters for list, watch and write calls
use crate::Error;
use serde::Serialize;

/// Query of a list or watch call
#[derive(Clone, Debug, PartialEq)]
pub struct ListParams {
    /// Only objects whose labels match, e.g. `strela.dev/type=proxy`
    pub label_selector: Option<String>,
    /// Only objects whose fields match, e.g. `metadata.name=lobby-0`
    pub field_selector: Option<String>,
    /// Server side timeout in seconds
    ///
    /// Watches without one are closed by the server after roughly five minutes; a
    /// watch timeout must stay below 295.
    pub timeout: Option<u32>,
    /// Page size of a list; not allowed on watches
    pub limit: Option<u32>,
    /// Token of the next page of a list; not allowed on watches
    pub continue_token: Option<String>,
    /// Ask for `BOOKMARK` watch events
    ///
    /// Bookmarks are a hint: servers may send none at all.
    pub bookmarks: bool,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            label_selector: None,
            field_selector: None,
            timeout: None,
            limit: None,
            continue_token: None,
            bookmarks: true,
        }
    }
}

impl ListParams {
    pub(crate) fn validate_watch(&self) -> Result<(), Error> {
        let problem = match self {
            Self { timeout: Some(t), .. } if *t >= 295 => "a watch timeout must be below 295 seconds",
            Self { limit: Some(_), .. } => "watches cannot be paged with a limit",
            Self {
                continue_token: Some(_),
                ..
            } => "watches cannot continue a paged list",
            _ => return Ok(()),
        };
        Err(Error::RequestValidation(problem.into()))
    }

    pub(crate) fn populate_selectors(&self, qp: &mut form_urlencoded::Serializer<String>) {
        let selectors = [
            ("fieldSelector", &self.field_selector),
            ("labelSelector", &self.label_selector),
        ];
        for (key, value) in selectors {
            if let Some(value) = value {
                qp.append_pair(key, value);
            }
        }
    }

    pub(crate) fn populate_list_qp(&self, qp: &mut form_urlencoded::Serializer<String>) {
        self.populate_selectors(qp);
        let limit = self.limit.map(|l| l.to_string());
        let timeout = self.timeout.map(|t| t.to_string());
        let paging = [
            ("limit", limit.as_ref()),
            ("continue", self.continue_token.as_ref()),
            ("timeoutSeconds", timeout.as_ref()),
        ];
        for (key, value) in paging {
            if let Some(value) = value {
                qp.append_pair(key, value);
            }
        }
    }
}

/// Builder style setters
///
/// ```
/// use strela_core::params::ListParams;
/// let lp = ListParams::default()
///     .timeout(60)
///     .labels("strela.dev/type=proxy");
/// ```
impl ListParams {
    /// Set the server side timeout
    #[must_use]
    pub fn timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout = Some(timeout_secs);
        self
    }

    /// Filter by field selector
    #[must_use]
    pub fn fields(mut self, field_selector: &str) -> Self {
        self.field_selector = Some(field_selector.to_string());
        self
    }

    /// Filter by label selector
    #[must_use]
    pub fn labels(mut self, label_selector: &str) -> Self {
        self.label_selector = Some(label_selector.to_string());
        self
    }

    /// Page the list
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Fetch the page after the one that returned `token`
    #[must_use]
    pub fn continue_token(mut self, token: &str) -> Self {
        self.continue_token = Some(token.to_string());
        self
    }

    /// Do not ask the server for bookmark events
    #[must_use]
    pub fn disable_bookmarks(mut self) -> Self {
        self.bookmarks = false;
        self
    }
}

/// Query of a create or replace call
#[derive(Default, Clone, Debug, PartialEq)]
pub struct PostParams {
    /// Validate only, persist nothing
    pub dry_run: bool,
    /// Name recorded as the owner of the written fields
    pub field_manager: Option<String>,
}

impl PostParams {
    pub(crate) fn populate_qp(&self, qp: &mut form_urlencoded::Serializer<String>) {
        write_common(qp, self.dry_run, self.field_manager.as_deref());
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        validate_field_manager(self.field_manager.as_deref(), "PostParams")
    }
}

fn write_common(qp: &mut form_urlencoded::Serializer<String>, dry_run: bool, field_manager: Option<&str>) {
    if dry_run {
        qp.append_pair("dryRun", "All");
    }
    if let Some(manager) = field_manager {
        qp.append_pair("fieldManager", manager);
    }
}

fn validate_field_manager(fm: Option<&str>, owner: &str) -> Result<(), Error> {
    match fm {
        Some(fm) if fm.len() > 128 => Err(Error::RequestValidation(format!(
            "{owner}::field_manager must be at most 128 characters"
        ))),
        _ => Ok(()),
    }
}

/// A partial update and the strategy the server merges it with
///
/// ```
/// use strela_core::params::Patch;
/// let patch = serde_json::json!({
///     "spec": { "replicas": 3 }
/// });
/// let patch = Patch::Merge(&patch);
/// ```
#[non_exhaustive]
#[derive(Debug, PartialEq, Clone)]
pub enum Patch<T: Serialize> {
    /// Server side apply; needs a field manager
    Apply(T),
    /// RFC 7386 merge patch
    Merge(T),
    /// Merge patch that understands list merge keys of built-in kinds
    Strategic(T),
}

impl<T: Serialize> Patch<T> {
    pub(crate) fn is_apply(&self) -> bool {
        matches!(self, Patch::Apply(_))
    }

    /// The content type the api server expects for this patch strategy
    pub fn content_type(&self) -> &'static str {
        match &self {
            Self::Apply(_) => "application/apply-patch+yaml",
            Self::Merge(_) => "application/merge-patch+json",
            Self::Strategic(_) => "application/strategic-merge-patch+json",
        }
    }

    pub(crate) fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Apply(p) | Self::Merge(p) | Self::Strategic(p) => serde_json::to_vec(p),
        }
    }
}

/// Query of a patch call
#[derive(Default, Clone, Debug)]
pub struct PatchParams {
    /// Validate only, persist nothing
    pub dry_run: bool,
    /// Take over fields owned by other managers; [`Patch::Apply`] only
    pub force: bool,
    /// Name recorded as the owner of the written fields; required by [`Patch::Apply`]
    pub field_manager: Option<String>,
}

impl PatchParams {
    pub(crate) fn validate<P: Serialize>(&self, patch: &Patch<P>) -> Result<(), Error> {
        validate_field_manager(self.field_manager.as_deref(), "PatchParams")?;
        match (patch.is_apply(), self.force, &self.field_manager) {
            (false, true, _) => Err(Error::RequestValidation("only apply patches can be forced".into())),
            (true, _, None) => Err(Error::RequestValidation("apply patches need a field manager".into())),
            _ => Ok(()),
        }
    }

    pub(crate) fn populate_qp(&self, qp: &mut form_urlencoded::Serializer<String>) {
        write_common(qp, self.dry_run, self.field_manager.as_deref());
        if self.force {
            qp.append_pair("force", "true");
        }
    }

    /// Params for a server side apply by `manager`
    #[must_use]
    pub fn apply(manager: &str) -> Self {
        Self {
            field_manager: Some(manager.into()),
            ..Self::default()
        }
    }

    /// Win conflicts with other field managers
    #[must_use]
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Perform a dryRun only
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Body of a delete call
#[derive(Default, Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    /// Validate only, delete nothing
    #[serde(serialize_with = "dry_run_all_ser", skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    /// Seconds a pod gets to shut down; `Some(0)` kills at once, `None` keeps the kind's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_seconds: Option<u32>,
    /// What happens to dependents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_policy: Option<PropagationPolicy>,
    /// Delete only if these still hold, answered with `409 Conflict` otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<Preconditions>,
}

impl DeleteParams {
    fn propagating(policy: PropagationPolicy) -> Self {
        Self {
            propagation_policy: Some(policy),
            ..Self::default()
        }
    }

    /// Collect dependents in the background
    pub fn background() -> Self {
        Self::propagating(PropagationPolicy::Background)
    }

    /// Delete dependents before the object itself
    pub fn foreground() -> Self {
        Self::propagating(PropagationPolicy::Foreground)
    }

    /// Leave dependents behind
    pub fn orphan() -> Self {
        Self::propagating(PropagationPolicy::Orphan)
    }

    /// Validate only
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Shutdown period in seconds
    #[must_use]
    pub fn grace_period(mut self, secs: u32) -> Self {
        self.grace_period_seconds = Some(secs);
        self
    }

    /// Only delete while `preconditions` hold
    #[must_use]
    pub fn preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = Some(preconditions);
        self
    }

    pub(crate) fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

// the body form of dryRun is a list of stages, and `All` is the only one
fn dry_run_all_ser<S>(dry_run: &bool, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::ser::Serializer,
{
    if *dry_run {
        s.collect_seq(["All"])
    } else {
        s.serialize_none()
    }
}

/// Conditions a delete is guarded by
#[derive(Default, Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preconditions {
    /// The object must still be at this version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    /// The object must still have this uid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// What a delete does to objects owned by the deleted one
#[derive(Clone, Debug, Serialize, PartialEq)]
pub enum PropagationPolicy {
    /// Keep them, without owner
    Orphan,
    /// Delete them after the owner is gone
    Background,
    /// Delete them before the owner
    Foreground,
}
