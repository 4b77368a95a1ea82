use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub new_session: bool,
    pub start_path: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("missing value for argument: {0}")]
    MissingValue(String),
    #[error("invalid --path value (must start with '/'): {0}")]
    InvalidPath(String),
    #[error("help requested")]
    HelpRequested,
}

impl CliOptions {
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(CliError::HelpRequested),
                "--new-session" => options.new_session = true,
                "--path" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    options.start_path = Some(parse_path(&value)?);
                }
                unknown => return Err(CliError::UnknownArgument(unknown.to_string())),
            }
        }

        Ok(options)
    }
}

fn parse_path(value: &str) -> Result<String, CliError> {
    let trimmed = value.trim();
    if !trimmed.starts_with('/') {
        return Err(CliError::InvalidPath(value.to_string()));
    }
    Ok(trimmed.to_string())
}
