use std::path::PathBuf;

/// A compose project: the files that define it and the name that isolates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
    pub name: String,
    pub files: Vec<PathBuf>,
    pub working_dir: PathBuf,
    /// Exported to the compose command, available for `${VAR}` substitution.
    pub env: Vec<(String, String)>,
}

impl ComposeProject {
    /// Project for a single compose file, run from the file's directory.
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let working_dir = file.parent().map(PathBuf::from).unwrap_or_default();
        Self { name: name.into(), files: vec![file], working_dir, env: Vec::new() }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["-p".to_owned(), self.name.clone()];
        for file in &self.files {
            args.push("-f".to_owned());
            args.push(file.display().to_string());
        }
        args
    }

    /// `-p <name> -f <file>... up -d`
    pub fn up_args(&self) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(["up", "-d"].map(String::from));
        args
    }

    /// `-p <name> -f <file>... down --volumes --remove-orphans`
    pub fn down_args(&self) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(["down", "--volumes", "--remove-orphans"].map(String::from));
        args
    }
}
