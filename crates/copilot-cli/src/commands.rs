use thiserror::Error;

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    NewConversation,
    OpenPanel,
    ClosePanel,
    TogglePanel,
    Path(String),
    History,
    Save(String),
    Load(String),
    Delete(String),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: /{0}")]
    Unknown(String),
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("path must start with '/': {0}")]
    InvalidPath(String),
}

impl Command {
    /// Blank lines yield `None`. Anything not starting with `/` is a message.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Self::Say(line.to_string())));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "new" => Self::NewConversation,
            "open" => Self::OpenPanel,
            "close" => Self::ClosePanel,
            "toggle" => Self::TogglePanel,
            "history" => Self::History,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            "path" => {
                let path = required(argument, "path")?;
                if !path.starts_with('/') {
                    return Err(CommandError::InvalidPath(path));
                }
                Self::Path(path)
            }
            "save" => Self::Save(required(argument, "save")?),
            "load" => Self::Load(required(argument, "load")?),
            "delete" => Self::Delete(required(argument, "delete")?),
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(Some(command))
    }
}

fn required(argument: &str, command: &'static str) -> Result<String, CommandError> {
    if argument.is_empty() {
        return Err(CommandError::MissingArgument(command));
    }
    Ok(argument.to_string())
}

pub const COMMAND_HELP: &str = "\
Type a message and press enter to ask the assistant.

Commands:
  /new             start a new conversation
  /open            show the assistant panel
  /close           hide the assistant panel
  /toggle          toggle the assistant panel
  /path <path>     set the current page path
  /history         print the transcript
  /save <name>     save the conversation under a name
  /load <name>     load a saved conversation
  /delete <name>   delete a saved conversation
  /help            show this help
  /quit            exit";
