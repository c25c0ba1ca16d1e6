use convoy_config::Instance;

/// Label compose puts on every object it creates for a project.
pub const PROJECT_LABEL: &str = "com.docker.compose.project";
/// Label compose puts on every container, naming its service.
pub const SERVICE_LABEL: &str = "com.docker.compose.service";
/// Label topology compose files use to tag an instance's role.
pub const ROLE_LABEL: &str = "convoy.role";

/// Selects runtime objects by project, labels and exact names.
///
/// All label criteria must match. When `names` is non-empty the object's name
/// must be one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    pub project: Option<String>,
    pub labels: Vec<(String, Option<String>)>,
    pub names: Vec<String>,
}

impl InstanceFilter {
    pub fn project(name: impl Into<String>) -> Self {
        Self { project: Some(name.into()), ..Self::default() }
    }

    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), Some(value.into())));
        self
    }

    /// Require the label to be present, whatever its value.
    pub fn with_label_key(mut self, key: impl Into<String>) -> Self {
        self.labels.push((key.into(), None));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.labels.is_empty() && self.names.is_empty()
    }

    /// True when the filter narrows by project or label, which is what
    /// network and volume listings can honor.
    pub fn has_label_criteria(&self) -> bool {
        self.project.is_some() || !self.labels.is_empty()
    }

    /// `--filter label=...` arguments.
    pub fn label_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let project = self.project.as_ref().map(|p| (PROJECT_LABEL, Some(p.as_str())));
        let labels = self.labels.iter().map(|(k, v)| (k.as_str(), v.as_deref()));
        for (key, value) in project.into_iter().chain(labels) {
            args.push("--filter".to_owned());
            args.push(match value {
                Some(value) => format!("label={key}={value}"),
                None => format!("label={key}"),
            });
        }
        args
    }

    /// `--filter` arguments for `docker ps`: labels plus anchored name patterns.
    pub fn ps_args(&self) -> Vec<String> {
        let mut args = self.label_args();
        for name in &self.names {
            args.push("--filter".to_owned());
            args.push(format!("name=^{name}$"));
        }
        args
    }

    pub fn matches(&self, instance: &Instance) -> bool {
        if let Some(project) = &self.project
            && instance.labels.get(PROJECT_LABEL) != Some(project)
        {
            return false;
        }
        let labels_match = self.labels.iter().all(|(key, value)| match value {
            Some(value) => instance.labels.get(key) == Some(value),
            None => instance.labels.contains_key(key),
        });
        labels_match && (self.names.is_empty() || self.names.contains(&instance.name))
    }
}
