//! Declarative experiment catalog.
//!
//! Templates (actions, targets, stop conditions) are static per-deployment
//! data: loaded once, validated once, never mutated. The launcher consumes
//! templates by id only; their semantics belong to the remote service.

use serde::Deserialize;
use std::{collections::BTreeMap, env, fs, path::PathBuf};

use crate::types::ExperimentTemplateId;

/// Environment variable overriding the scheduled adapter's template id.
pub const ENV_SCHEDULE_TEMPLATE_ID: &str = "EXPERIMENT_TEMPLATE_ID";

#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    pub templates: BTreeMap<String, TemplateConfig>,
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemplateConfig {
    #[serde(default)]
    pub description: Option<String>,
    pub actions: BTreeMap<String, ActionConfig>,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
    #[serde(default, rename = "stopConditions")]
    pub stop_conditions: Vec<StopCondition>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ActionConfig {
    #[serde(rename = "actionId")]
    pub action_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Maps the action's target references onto target names declared in
    /// the same template.
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(rename = "selectionMode")]
    pub selection_mode: String,
    #[serde(default, rename = "resourceArns")]
    pub resource_arns: Vec<String>,
    #[serde(default, rename = "resourceTags")]
    pub resource_tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StopCondition {
    pub source: StopConditionSource,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StopConditionSource {
    /// The experiment runs to completion with no external abort.
    None,
    /// The experiment aborts when the named alarm fires.
    Alarm,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(rename = "templateId")]
    pub template_id: String,
}

pub fn resolve_catalog_path() -> anyhow::Result<PathBuf> {
    if let Ok(p) = env::var("LAUNCHER_CONFIG") {
        return Ok(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg)
            .join("experiment-launcher")
            .join("templates.json");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let candidate = PathBuf::from("templates.json");
    if candidate.exists() {
        return Ok(candidate);
    }

    Err(anyhow::anyhow!(
        "Could not find templates.json (set LAUNCHER_CONFIG or create ./templates.json)"
    ))
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            while let Some(c) = chars.next() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_template(cfg: TemplateConfig) -> TemplateConfig {
    let mut cfg = cfg;

    for action in cfg.actions.values_mut() {
        for val in action.parameters.values_mut() {
            *val = expand_env_vars(val);
        }
    }
    for target in cfg.targets.values_mut() {
        target.resource_arns = target
            .resource_arns
            .iter()
            .map(|a| expand_env_vars(a))
            .collect();
        for val in target.resource_tags.values_mut() {
            *val = expand_env_vars(val);
        }
    }
    for cond in cfg.stop_conditions.iter_mut() {
        if let Some(value) = cond.value.as_mut() {
            *value = expand_env_vars(value);
        }
    }

    cfg
}

fn validate_selection_mode(mode: &str) -> bool {
    if mode == "ALL" {
        return true;
    }
    for prefix in ["COUNT(", "PERCENT("] {
        if let Some(rest) = mode.strip_prefix(prefix) {
            if let Some(num) = rest.strip_suffix(')') {
                return !num.is_empty() && num.chars().all(|c| c.is_ascii_digit());
            }
        }
    }
    false
}

fn validate_template(id: &str, cfg: &TemplateConfig) -> anyhow::Result<()> {
    if id.is_empty() {
        return Err(anyhow::anyhow!("Template with empty id"));
    }

    if cfg.actions.is_empty() {
        return Err(anyhow::anyhow!("Template `{}` declares no actions", id));
    }

    for (name, action) in &cfg.actions {
        if action.action_id.is_empty() {
            return Err(anyhow::anyhow!(
                "Action `{}` of template `{}` has an empty actionId",
                name,
                id
            ));
        }
        for target_ref in action.targets.values() {
            if !cfg.targets.contains_key(target_ref) {
                return Err(anyhow::anyhow!(
                    "Action `{}` of template `{}` references unknown target `{}`",
                    name,
                    id,
                    target_ref
                ));
            }
        }
    }

    for (name, target) in &cfg.targets {
        if !validate_selection_mode(&target.selection_mode) {
            return Err(anyhow::anyhow!(
                "Target `{}` of template `{}` has invalid selectionMode `{}` \
                 (expected ALL, COUNT(n) or PERCENT(n))",
                name,
                id,
                target.selection_mode
            ));
        }
    }

    for cond in &cfg.stop_conditions {
        if cond.source == StopConditionSource::Alarm
            && cond.value.as_deref().unwrap_or("").is_empty()
        {
            return Err(anyhow::anyhow!(
                "Template `{}` has an alarm stop condition without a value",
                id
            ));
        }
    }

    Ok(())
}

/// The validated, immutable catalog.
#[derive(Debug)]
pub struct Catalog {
    templates: BTreeMap<ExperimentTemplateId, TemplateConfig>,
    schedule_template: Option<ExperimentTemplateId>,
}

/// Deployment-time override for the scheduled template. Matches the
/// original environment wiring; the config entry is the fallback.
fn schedule_env_override() -> Option<String> {
    match env::var(ENV_SCHEDULE_TEMPLATE_ID) {
        Ok(id) if !id.is_empty() => Some(id),
        _ => None,
    }
}

impl Catalog {
    pub fn from_config(
        cfg: CatalogConfig,
        schedule_override: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut templates = BTreeMap::new();
        for (id, template_cfg) in cfg.templates {
            let expanded = expand_template(template_cfg);
            validate_template(&id, &expanded)?;
            templates.insert(ExperimentTemplateId::new(id), expanded);
        }

        let schedule_template = schedule_override
            .map(ExperimentTemplateId::new)
            .or_else(|| {
                cfg.schedule
                    .map(|s| ExperimentTemplateId::new(s.template_id))
            });

        if let Some(id) = &schedule_template {
            if id.is_empty() {
                return Err(anyhow::anyhow!("Schedule template id is empty"));
            }
        }

        Ok(Self {
            templates,
            schedule_template,
        })
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = resolve_catalog_path()?;
        let raw = fs::read_to_string(&path)?;
        let cfg: CatalogConfig = serde_json::from_str(&raw)?;
        Self::from_config(cfg, schedule_env_override())
    }

    pub fn template(&self, id: &ExperimentTemplateId) -> Option<&TemplateConfig> {
        self.templates.get(id)
    }

    pub fn templates(&self) -> impl Iterator<Item = (&ExperimentTemplateId, &TemplateConfig)> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The static template the scheduled trigger launches, if configured.
    pub fn schedule_template(&self) -> Option<&ExperimentTemplateId> {
        self.schedule_template.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog_json() -> &'static str {
        r#"{
            "templates": {
                "tmpl-stop-instance": {
                    "description": "Stop and restart one instance",
                    "actions": {
                        "stopInstances": {
                            "actionId": "compute:stop-instances",
                            "parameters": { "startInstancesAfterDuration": "PT1M" },
                            "targets": { "Instances": "instanceTargets" }
                        }
                    },
                    "targets": {
                        "instanceTargets": {
                            "resourceType": "compute:instance",
                            "selectionMode": "ALL",
                            "resourceTags": { "FIS-Target": "true" }
                        }
                    },
                    "stopConditions": [
                        { "source": "alarm", "value": "arn:alarm/NetworkInAbnormal" }
                    ]
                }
            },
            "schedule": { "templateId": "tmpl-stop-instance" }
        }"#
    }

    fn parse(raw: &str) -> anyhow::Result<Catalog> {
        let cfg: CatalogConfig = serde_json::from_str(raw)?;
        Catalog::from_config(cfg, None)
    }

    #[test]
    fn test_sample_catalog_loads_and_validates() {
        let catalog = parse(sample_catalog_json()).unwrap();
        assert_eq!(catalog.len(), 1);

        let id = ExperimentTemplateId::new("tmpl-stop-instance");
        let template = catalog.template(&id).unwrap();
        assert_eq!(template.actions.len(), 1);
        assert_eq!(
            template.stop_conditions[0].source,
            StopConditionSource::Alarm
        );
        assert_eq!(catalog.schedule_template(), Some(&id));
    }

    #[test]
    fn test_rejects_empty_template_id() {
        let raw = r#"{
            "templates": {
                "": { "actions": { "a": { "actionId": "compute:stop-instances" } } }
            }
        }"#;
        let err = parse(raw).unwrap_err().to_string();
        assert!(err.contains("empty id"));
    }

    #[test]
    fn test_schedule_override_takes_precedence_over_config_entry() {
        let cfg: CatalogConfig = serde_json::from_str(sample_catalog_json()).unwrap();
        let catalog = Catalog::from_config(cfg, Some("tmpl-override".to_string())).unwrap();
        assert_eq!(
            catalog.schedule_template(),
            Some(&ExperimentTemplateId::new("tmpl-override"))
        );
    }

    #[test]
    fn test_schedule_env_override_reads_deployment_variable() {
        // Process-wide env var; only this test touches it.
        unsafe { env::set_var(ENV_SCHEDULE_TEMPLATE_ID, "tmpl-from-env") };
        assert_eq!(schedule_env_override(), Some("tmpl-from-env".to_string()));

        unsafe { env::set_var(ENV_SCHEDULE_TEMPLATE_ID, "") };
        assert_eq!(schedule_env_override(), None);

        unsafe { env::remove_var(ENV_SCHEDULE_TEMPLATE_ID) };
        assert_eq!(schedule_env_override(), None);
    }

    #[test]
    fn test_rejects_template_without_actions() {
        let raw = r#"{ "templates": { "tmpl-empty": { "actions": {} } } }"#;
        let err = parse(raw).unwrap_err().to_string();
        assert!(err.contains("no actions"));
    }

    #[test]
    fn test_rejects_action_with_unknown_target_reference() {
        let raw = r#"{
            "templates": {
                "tmpl-dangling": {
                    "actions": {
                        "a": {
                            "actionId": "compute:stop-instances",
                            "targets": { "Instances": "missing" }
                        }
                    }
                }
            }
        }"#;
        let err = parse(raw).unwrap_err().to_string();
        assert!(err.contains("unknown target"));
    }

    #[test]
    fn test_rejects_alarm_stop_condition_without_value() {
        let raw = r#"{
            "templates": {
                "tmpl-no-alarm-value": {
                    "actions": { "a": { "actionId": "compute:stop-instances" } },
                    "stopConditions": [ { "source": "alarm" } ]
                }
            }
        }"#;
        let err = parse(raw).unwrap_err().to_string();
        assert!(err.contains("alarm stop condition"));
    }

    #[test]
    fn test_selection_modes() {
        assert!(validate_selection_mode("ALL"));
        assert!(validate_selection_mode("COUNT(3)"));
        assert!(validate_selection_mode("PERCENT(50)"));
        assert!(!validate_selection_mode("SOME"));
        assert!(!validate_selection_mode("COUNT()"));
        assert!(!validate_selection_mode("COUNT(abc)"));
    }

    #[test]
    fn test_env_expansion_resolves_set_vars_and_keeps_unset_literal() {
        // Process-wide env var; name chosen to not collide with other tests.
        unsafe { env::set_var("LAUNCHER_TEST_REGION", "eu-west-1") };
        let expanded = expand_env_vars("arn:${LAUNCHER_TEST_REGION}:${UNSET_VAR}:doc");
        assert_eq!(expanded, "arn:eu-west-1:${UNSET_VAR}:doc");
    }

    #[test]
    fn test_catalog_path_resolution_prefers_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, sample_catalog_json()).unwrap();

        unsafe { env::set_var("LAUNCHER_CONFIG", &path) };
        let resolved = resolve_catalog_path().unwrap();
        unsafe { env::remove_var("LAUNCHER_CONFIG") };

        assert_eq!(resolved, path);
    }
}
