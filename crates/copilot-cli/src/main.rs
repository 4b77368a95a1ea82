mod cli;
mod commands;
mod navigator;

use std::sync::Arc;

use cli::{CliError, CliOptions};
use commands::{COMMAND_HELP, Command};
use copilot_core::actions::ActionDispatcher;
use copilot_core::agent::{AgentContext, AgentGateway, HttpAgentBackend};
use copilot_core::config::{ClientConfig, SessionStorageMode};
use copilot_core::controller::{HistorySync, SendOutcome, SendRejection, SessionController};
use copilot_core::history::{HistoryLoader, HttpHistoryService};
use copilot_core::session::{
    DisabledSessionStore, FileSessionStore, MemorySessionStore, Message, SessionIdentity,
    SessionStore,
};
use navigator::TerminalNavigator;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "copilot_cli=info,copilot_core=info".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(CliError::HelpRequested) => {
            print_usage();
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to read client config: {err}");
            std::process::exit(1);
        }
    };

    let start_path = options
        .start_path
        .clone()
        .unwrap_or_else(|| config.start_path.clone());
    let navigator = Arc::new(TerminalNavigator::new(start_path));

    let controller = match build_controller(&config, navigator.clone()) {
        Ok(controller) => controller,
        Err(err) => {
            error!("failed to build assistant client: {err}");
            std::process::exit(1);
        }
    };

    info!(
        storage = config.session_storage.as_str(),
        agent_url = %config.agent_url,
        "copilot starting"
    );

    controller.open_panel();
    let sync = if options.new_session {
        controller.start_new_conversation().await
    } else {
        controller.establish().await
    };
    report_history(&controller, &sync);
    println!("Type /help for commands.");

    run_loop(&controller, &navigator).await;
}

fn build_controller(
    config: &ClientConfig,
    navigator: Arc<TerminalNavigator>,
) -> Result<SessionController, copilot_core::config::ConfigError> {
    let store: Arc<dyn SessionStore> = match config.session_storage {
        SessionStorageMode::File => Arc::new(FileSessionStore::new(&config.data_dir)),
        SessionStorageMode::Memory => Arc::new(MemorySessionStore::new()),
        SessionStorageMode::Disabled => Arc::new(DisabledSessionStore),
    };

    let backend = HttpAgentBackend::new(config.agent_url.clone(), config.agent_timeout)?;
    let history = HttpHistoryService::new(reqwest::Client::new(), config.history_url.clone());

    Ok(SessionController::new(
        AgentGateway::new(Arc::new(backend)),
        HistoryLoader::new(Arc::new(history)),
        ActionDispatcher::new(navigator),
        SessionIdentity::new(store),
    )
    .with_temperature(config.temperature))
}

async fn run_loop(controller: &SessionController, navigator: &TerminalNavigator) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                error!("failed to read input: {err}");
                break;
            }
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        if !handle_command(controller, navigator, command).await {
            break;
        }
    }
}

/// Returns `false` when the user asked to quit.
async fn handle_command(
    controller: &SessionController,
    navigator: &TerminalNavigator,
    command: Command,
) -> bool {
    match command {
        Command::Say(text) => {
            let context = AgentContext::new(navigator.current_path());
            let outcome = controller.send_message(&text, context).await;
            render_send(controller, &outcome);
        }
        Command::NewConversation => {
            let sync = controller.start_new_conversation().await;
            report_history(controller, &sync);
        }
        Command::OpenPanel => {
            controller.open_panel();
            print_transcript(&controller.messages());
        }
        Command::ClosePanel => controller.close_panel(),
        Command::TogglePanel => {
            if controller.toggle_panel() {
                print_transcript(&controller.messages());
            }
        }
        Command::Path(path) => {
            navigator.set_path(path);
            println!("current path: {}", navigator.current_path());
        }
        Command::History => print_transcript(&controller.messages()),
        Command::Save(name) => controller.save_conversation(&name),
        Command::Load(name) => controller.load_conversation(&name),
        Command::Delete(name) => controller.delete_conversation(&name),
        Command::Help => println!("{COMMAND_HELP}"),
        Command::Quit => return false,
    }
    true
}

fn render_send(controller: &SessionController, outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Rejected(SendRejection::EmptyMessage) => {}
        SendOutcome::Rejected(SendRejection::Busy) => {
            println!("still waiting for the previous reply");
        }
        SendOutcome::Completed { outcome, .. } => {
            if !controller.is_panel_open() {
                println!("(reply received; /open to view)");
                return;
            }
            println!("assistant: {}", outcome.text_response);
        }
        SendOutcome::Superseded(_) => {}
    }
}

fn report_history(controller: &SessionController, sync: &HistorySync) {
    let session_id = controller.session_id().unwrap_or_default();
    match sync {
        HistorySync::Loaded { messages } => {
            println!("session {session_id} ({messages} earlier messages)");
        }
        HistorySync::Failed(_) => {
            println!("session {session_id}");
        }
        HistorySync::Unchanged | HistorySync::Superseded => return,
    }
    if controller.is_panel_open() {
        print_transcript(&controller.messages());
    }
}

fn print_transcript(messages: &[Message]) {
    for message in messages.iter().filter(|m| m.role.is_conversational()) {
        println!("{}: {}", message.role.as_str(), message.text());
    }
}

fn print_usage() {
    eprintln!(
        "Usage: copilot-cli [--new-session] [--path <path>]\n\
         \n\
         Environment:\n\
         - COPILOT_AGENT_URL (required)  agent chat endpoint\n\
         - COPILOT_HISTORY_URL           history endpoint (default: <agent origin>/api/agent/history)\n\
         - COPILOT_SESSION_STORAGE       file | memory | disabled (default: file)\n\
         - COPILOT_DATA_DIR              directory for the session file (default: .copilot)\n\
         - COPILOT_AGENT_TIMEOUT_MS      request timeout in milliseconds (default: none)\n\
         - COPILOT_TEMPERATURE           sampling temperature (default: 0.7)\n\
         - COPILOT_START_PATH            initial page path (default: /)\n\
         \n\
         Options:\n\
         - --new-session   Start a fresh conversation instead of resuming\n\
         - --path <path>   Initial page path, overrides COPILOT_START_PATH\n\
         - --help          Show this help text"
    );
}
