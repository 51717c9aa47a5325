use crate::workspace::Workspace;
use resman_chat::{load_instructions, tool_schemas, ChatSession, OpenAiClient, OpenAiSummarizer, ToolRunner};
use resman_store::{Settings, WorkspaceLock};
use resman_tools::{CommandEnv, PdfTextExtractor, PdftotextExtractor, ScholarClient};
use std::io::{BufRead, Write};
use std::path::Path;

/// Interactive loop: one line in, one assistant answer out, until `exit`,
/// `quit`, or end of input.
pub fn execute(cwd: &Path, model_override: Option<&str>) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    let _lock = WorkspaceLock::acquire(&ws.paths, "chat")?;

    // Keys are checked before anything touches the log.
    let mut settings = Settings::load(&ws.paths)?;
    if let Some(model) = model_override {
        settings.model = model.to_string();
    }
    let api_key = settings.require_openai_key()?.to_string();
    ws.log.ensure_exists()?;
    let instructions = load_instructions(&ws.paths.instructions_md)?;

    let scholar = match settings.s2_key.as_deref() {
        Some(key) => Some(ScholarClient::new(key)?),
        None => None,
    };
    let pdf = settings.pdf_enabled.then(PdftotextExtractor::default);
    let client = OpenAiClient::new(api_key.as_str(), settings.model.clone());
    let summarizer = OpenAiSummarizer::new(&client);

    let runner = ToolRunner::new(
        CommandEnv {
            paths: &ws.paths,
            log: &ws.log,
            archive: &ws.archive,
            settings: &settings,
            scholar: scholar.as_ref(),
            summarizer: Some(&summarizer),
        },
        pdf.as_ref().map(|p| p as &dyn PdfTextExtractor),
    );
    let mut session = ChatSession::new(
        &client,
        instructions,
        tool_schemas(settings.pdf_enabled),
        runner,
    );

    let key_prefix: String = api_key.chars().take(10).collect();
    println!("resman chat");
    println!("Model: {}", settings.model);
    println!("API key source: {} ({key_prefix}...)", settings.api_key_source);
    println!("S2_KEY loaded: {}", scholar.is_some());
    println!("PDF full text: {}", if pdf.is_some() { "enabled" } else { "disabled" });
    println!("Type 'exit' to quit.\n");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut line = String::new();
    loop {
        print!("You: ");
        stdout.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            println!("Bye.");
            break;
        }
        match session.turn(input) {
            Ok(text) => println!("\nAssistant: {text}\n"),
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                eprintln!("error: {e:#}\n");
            }
        }
    }
    Ok(())
}
